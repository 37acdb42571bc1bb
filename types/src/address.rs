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

use std::{fmt, net::IpAddr, str::FromStr};

use thiserror::Error;

/// The address tuple from spec §3: `(host, port, services)`.
///
/// `host` is either a dotted IPv4, colon IPv6, or a `.onion` name. Two
/// addresses are equal iff all three components are equal (derived `Eq`
/// already gives us that for the owned fields below).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: Host,
    pub port: u16,
    pub services: u64,
}

/// The three shapes a peer's `host` component can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    V4(std::net::Ipv4Addr),
    V6(std::net::Ipv6Addr),
    Onion(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("empty host")]
    EmptyHost,
    #[error("not a valid IPv4/IPv6 address or .onion name: {0}")]
    InvalidHost(String),
    #[error("port out of range: {0}")]
    InvalidPort(i64),
}

impl Host {
    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        if raw.is_empty() {
            return Err(AddressParseError::EmptyHost);
        }
        if let Some(prefix) = raw.strip_suffix(".onion") {
            if prefix.is_empty() {
                return Err(AddressParseError::InvalidHost(raw.to_string()));
            }
            return Ok(Host::Onion(raw.to_string()));
        }
        match IpAddr::from_str(raw) {
            Ok(IpAddr::V4(v4)) => Ok(Host::V4(v4)),
            Ok(IpAddr::V6(v6)) => Ok(Host::V6(v6)),
            Err(_) => Err(AddressParseError::InvalidHost(raw.to_string())),
        }
    }

    pub fn is_onion(&self) -> bool {
        matches!(self, Host::Onion(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, Host::V6(_))
    }

    /// Returns the IP address, if this host isn't a `.onion` name.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Host::V4(v4) => Some(IpAddr::V4(*v4)),
            Host::V6(v6) => Some(IpAddr::V6(*v6)),
            Host::Onion(_) => None,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::V4(v4) => write!(f, "{v4}"),
            Host::V6(v6) => write!(f, "{v6}"),
            Host::Onion(name) => write!(f, "{name}"),
        }
    }
}

impl Address {
    pub fn new(host: Host, port: u16, services: u64) -> Self {
        Self { host, port, services }
    }

    /// Parses `(host, port, services)` from their individual string/integer
    /// forms, as produced by the wire-gossip decoder or by the coordination
    /// store's tuple encoding.
    pub fn parse(host: &str, port: i64, services: u64) -> Result<Self, AddressParseError> {
        if !(1..=65535).contains(&port) {
            return Err(AddressParseError::InvalidPort(port));
        }
        Ok(Self {
            host: Host::parse(host)?,
            port: port as u16,
            services,
        })
    }

    /// The `node:{host}-{port}` probed-marker key (deliberately omits
    /// `services`; see SPEC_FULL.md §3/§9 on the `node:*` vs `up`
    /// inconsistency, kept as specified).
    pub fn probed_key(&self) -> String {
        format!("node:{}-{}", self.host, self.port)
    }

    /// The `node:{host}-{port}-{services}` reachable-marker key.
    pub fn reachable_key(&self) -> String {
        format!("node:{}-{}-{}", self.host, self.port, self.services)
    }

    /// The `peer:{host}-{port}` address-book cache key.
    pub fn peer_cache_key(&self) -> String {
        format!("peer:{}-{}", self.host, self.port)
    }

    /// The `version:{host}-{port}` version-record key.
    pub fn version_key(&self) -> String {
        format!("version:{}-{}", self.host, self.port)
    }

    /// The `height:{host}-{port}-{services}` height-record key.
    pub fn height_key(&self) -> String {
        format!("height:{}-{}-{}", self.host, self.port, self.services)
    }

    /// The `(host, port)` pair used as the key for the pinger's `open`/
    /// `opendata` sets.
    pub fn host_port(&self) -> (String, u16) {
        (self.host.to_string(), self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_ipv4() {
        let a = Address::parse("1.2.3.4", 8333, 9).unwrap();
        assert_eq!(a.host, Host::V4("1.2.3.4".parse().unwrap()));
        assert_eq!(a.reachable_key(), "node:1.2.3.4-8333-9");
        assert_eq!(a.probed_key(), "node:1.2.3.4-8333");
    }

    #[test]
    fn parses_onion() {
        let a = Address::parse("abcdefghij234567.onion", 8333, 0).unwrap();
        assert!(a.host.is_onion());
    }

    #[test]
    fn rejects_bad_port() {
        assert_eq!(Address::parse("1.2.3.4", 0, 0), Err(AddressParseError::InvalidPort(0)));
        assert_eq!(Address::parse("1.2.3.4", 70000, 0), Err(AddressParseError::InvalidPort(70000)));
    }

    #[test]
    fn equality_requires_all_three_components() {
        let a = Address::parse("1.2.3.4", 8333, 9).unwrap();
        let b = Address::parse("1.2.3.4", 8333, 1).unwrap();
        assert_ne!(a, b);
    }
}
