// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! ASN lookup, behind a trait so the policy engine stays I/O-free and
//! unit-testable (the MaxMind ASN database is an external collaborator,
//! out of scope per the spec's own component list).

use std::{net::IpAddr, path::Path, sync::Arc};

/// Resolves an IP address to its `AS{number}` string, the way
/// `original_source/crawl.py`'s `ASN.asn(address)` does with
/// `geoip2.database.Reader`. Returns `None` when the address has no ASN
/// record (mirrors `AddressNotFoundError`).
pub trait AsnResolver: Send + Sync {
    fn lookup(&self, addr: IpAddr) -> Option<String>;
}

/// `maxminddb`-backed resolver over a GeoLite2-ASN (or equivalent)
/// database file.
pub struct MaxMindAsnResolver {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindAsnResolver {
    pub fn open(path: &Path) -> Result<Self, maxminddb::MaxMindDbError> {
        Ok(Self { reader: maxminddb::Reader::open_readfile(path)? })
    }
}

impl AsnResolver for MaxMindAsnResolver {
    fn lookup(&self, addr: IpAddr) -> Option<String> {
        let record: maxminddb::geoip2::Asn = self.reader.lookup(addr).ok()?;
        record.autonomous_system_number.map(|n| format!("AS{n}"))
    }
}

/// A resolver that never finds an ASN, for deployments with ASN filtering
/// disabled or without a database file available.
pub struct NoAsnResolver;

impl AsnResolver for NoAsnResolver {
    fn lookup(&self, _addr: IpAddr) -> Option<String> {
        None
    }
}

pub type SharedAsnResolver = Arc<dyn AsnResolver>;

#[cfg(test)]
mod test {
    use super::*;

    struct Fixed(Option<&'static str>);
    impl AsnResolver for Fixed {
        fn lookup(&self, _addr: IpAddr) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn no_resolver_always_none() {
        assert_eq!(NoAsnResolver.lookup("1.2.3.4".parse().unwrap()), None);
    }

    #[test]
    fn fixed_resolver_returns_configured_asn() {
        let r = Fixed(Some("AS15169"));
        assert_eq!(r.lookup("8.8.8.8".parse().unwrap()), Some("AS15169".to_string()));
    }
}
