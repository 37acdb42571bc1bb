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

//! The address-exclusion policy itself (spec §4.1), grounded directly on
//! `original_source/crawl.py::is_excluded` and its `update_*` refresh
//! helpers.

use std::{
    collections::HashSet,
    net::IpAddr,
    sync::Arc,
};

use gossipmap_types::Address;
use parking_lot::RwLock;

use crate::{
    asn::SharedAsnResolver,
    feed::SharedPolicyFeed,
    networks::{ip_to_network_v6, parse_network_list, Ipv4Network, Ipv6Network},
};

/// Static policy configuration, read once at startup (spec §6); only the
/// *tables* this holds (ASN sets, network lists) are refreshed at runtime.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    pub exclude_private: bool,
    pub exclude_ipv4_bogons: bool,
    pub exclude_ipv6_bogons: bool,
    pub exclude_ipv4_networks_from_url: Option<String>,
    pub exclude_ipv6_networks_from_url: Option<String>,
    pub include_asns_from_url: Option<String>,
    pub default_exclude_ipv4_networks: Vec<Ipv4Network>,
    pub default_exclude_ipv6_networks: Vec<Ipv6Network>,
    pub static_include_asns: Option<HashSet<String>>,
    pub static_exclude_asns: Option<HashSet<String>>,
}

/// The mutable policy tables, swapped as one unit under a single lock
/// (spec §9 Design Notes: never updated field-by-field, to avoid a reader
/// observing a half-refreshed policy).
#[derive(Debug, Clone, Default)]
struct PolicyTables {
    exclude_ipv4_networks: Vec<Ipv4Network>,
    exclude_ipv6_networks: Vec<Ipv6Network>,
    include_asns: Option<HashSet<String>>,
    exclude_asns: Option<HashSet<String>>,
}

/// The address-filtering policy engine: holds the current tables plus the
/// collaborators needed to refresh them (spec §4.1/§4.4).
pub struct Filter {
    config: PolicyConfig,
    tables: RwLock<PolicyTables>,
    asn: SharedAsnResolver,
    feed: SharedPolicyFeed,
}

const IPV4_BOGON_URLS: &[&str] = &[
    "http://www.team-cymru.org/Services/Bogons/fullbogons-ipv4.txt",
    "http://www.spamhaus.org/drop/drop.txt",
    "https://www.spamhaus.org/drop/edrop.txt",
];

const IPV6_BOGON_URLS: &[&str] = &["http://www.team-cymru.org/Services/Bogons/fullbogons-ipv6.txt"];

impl Filter {
    pub fn new(config: PolicyConfig, asn: SharedAsnResolver, feed: SharedPolicyFeed) -> Arc<Self> {
        let tables = PolicyTables {
            exclude_ipv4_networks: config.default_exclude_ipv4_networks.clone(),
            exclude_ipv6_networks: config.default_exclude_ipv6_networks.clone(),
            include_asns: config.static_include_asns.clone(),
            exclude_asns: config.static_exclude_asns.clone(),
        };
        Arc::new(Self { config, tables: RwLock::new(tables), asn, feed })
    }

    /// Rebuilds the excluded-network and included-ASN tables from the
    /// bogon feeds and configured URLs, mirroring
    /// `update_excluded_networks`/`update_included_asns` (spec §4.4's cron
    /// refresh). The whole table is rebuilt from the static defaults and
    /// then swapped in atomically.
    pub fn refresh(&self) {
        let mut v4 = self.config.default_exclude_ipv4_networks.clone();
        let mut v6 = self.config.default_exclude_ipv6_networks.clone();

        if self.config.exclude_ipv4_bogons {
            for url in IPV4_BOGON_URLS {
                let txt = self.feed.fetch_text(url);
                parse_network_list(&txt, &mut v4, &mut v6);
            }
        }
        if self.config.exclude_ipv6_bogons {
            for url in IPV6_BOGON_URLS {
                let txt = self.feed.fetch_text(url);
                parse_network_list(&txt, &mut v4, &mut v6);
            }
        }
        if let Some(url) = &self.config.exclude_ipv4_networks_from_url {
            let txt = self.feed.fetch_text(url);
            parse_network_list(&txt, &mut v4, &mut v6);
        }
        if let Some(url) = &self.config.exclude_ipv6_networks_from_url {
            let txt = self.feed.fetch_text(url);
            parse_network_list(&txt, &mut v4, &mut v6);
        }

        let include_asns = if let Some(url) = &self.config.include_asns_from_url {
            let txt = self.feed.fetch_text(url);
            Some(list_included_asns(&txt))
        } else {
            self.config.static_include_asns.clone()
        };

        let mut tables = self.tables.write();
        tables.exclude_ipv4_networks = v4;
        tables.exclude_ipv6_networks = v6;
        tables.include_asns = include_asns;
        tables.exclude_asns = self.config.static_exclude_asns.clone();
    }

    /// Implements the precedence order from `is_excluded` (spec §4.1)
    /// exactly:
    /// 1. `.onion` addresses are never excluded here.
    /// 2. Private addresses excluded when `exclude_private` is set.
    /// 3. Addresses without an ASN are excluded when ASN filtering is
    ///    active at all.
    /// 4. Addresses whose ASN is in `exclude_asns` are excluded.
    /// 5. Addresses that fail to parse, or fall in an excluded network,
    ///    are excluded.
    /// 6. Addresses whose ASN is not in `include_asns` are excluded.
    /// 7. Otherwise the address is included.
    pub fn excluded(&self, address: &Address) -> bool {
        if address.host.is_onion() {
            return false;
        }
        let Some(ip) = address.host.ip() else { return false };

        if self.config.exclude_private && is_private(ip) {
            return true;
        }

        let tables = self.tables.read();
        let asn_filtering_active = tables.include_asns.is_some() || tables.exclude_asns.is_some();
        let asn = if asn_filtering_active { self.asn.lookup(ip) } else { None };
        if asn_filtering_active && asn.is_none() {
            return true;
        }

        if let (Some(exclude), Some(asn)) = (&tables.exclude_asns, &asn) {
            if exclude.contains(asn) {
                return true;
            }
        }

        let in_excluded_network = match ip {
            IpAddr::V4(v4) => {
                let bits = u32::from(v4);
                tables.exclude_ipv4_networks.iter().any(|net| net.contains(bits))
            }
            IpAddr::V6(v6) => {
                let bits = u128::from(v6);
                tables.exclude_ipv6_networks.iter().any(|net| net.contains(bits))
            }
        };
        if in_excluded_network {
            return true;
        }

        if let Some(include) = &tables.include_asns {
            match &asn {
                Some(asn) if include.contains(asn) => {}
                _ => return true,
            }
        }

        false
    }

    /// Groups an IPv6 address into its configured `/prefix` network, for
    /// the per-prefix fairness cap (spec §3/§4.3/§4.5).
    pub fn ipv6_prefix_network(addr: std::net::Ipv6Addr, prefix: u32) -> String {
        ip_to_network_v6(addr, prefix)
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// Parses an `AS{number}` allow-list, the way
/// `original_source/crawl.py::list_included_asns` does: lines not
/// starting with `AS` are dropped silently.
pub fn list_included_asns(txt: &str) -> HashSet<String> {
    txt.trim()
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("AS"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{asn::NoAsnResolver, feed::PolicyFeed};
    use std::net::IpAddr;

    struct StaticFeed(&'static str);
    impl PolicyFeed for StaticFeed {
        fn fetch_text(&self, _url: &str) -> String {
            self.0.to_string()
        }
    }

    struct FixedAsn(Option<&'static str>);
    impl crate::asn::AsnResolver for FixedAsn {
        fn lookup(&self, _addr: IpAddr) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn addr(host: &str) -> Address {
        Address::parse(host, 8333, 1).unwrap()
    }

    #[test]
    fn onion_is_never_excluded() {
        let filter = Filter::new(PolicyConfig::default(), Arc::new(NoAsnResolver), Arc::new(StaticFeed("")));
        assert!(!filter.excluded(&addr("abcdefghij234567.onion")));
    }

    #[test]
    fn private_address_excluded_when_configured() {
        let config = PolicyConfig { exclude_private: true, ..Default::default() };
        let filter = Filter::new(config, Arc::new(NoAsnResolver), Arc::new(StaticFeed("")));
        assert!(filter.excluded(&addr("10.0.0.1")));
        assert!(!filter.excluded(&addr("8.8.8.8")));
    }

    #[test]
    fn excluded_network_takes_precedence_over_default_include() {
        let config = PolicyConfig {
            default_exclude_ipv4_networks: vec![crate::networks::Ipv4Network {
                network: u32::from(std::net::Ipv4Addr::new(1, 2, 0, 0)),
                netmask: 0xffff0000,
            }],
            ..Default::default()
        };
        let filter = Filter::new(config, Arc::new(NoAsnResolver), Arc::new(StaticFeed("")));
        assert!(filter.excluded(&addr("1.2.3.4")));
        assert!(!filter.excluded(&addr("1.3.3.4")));
    }

    #[test]
    fn missing_asn_excluded_when_asn_filtering_active() {
        let mut include = HashSet::new();
        include.insert("AS15169".to_string());
        let config = PolicyConfig { static_include_asns: Some(include), ..Default::default() };
        let filter = Filter::new(config, Arc::new(FixedAsn(None)), Arc::new(StaticFeed("")));
        assert!(filter.excluded(&addr("8.8.8.8")));
    }

    #[test]
    fn address_outside_include_asns_excluded() {
        let mut include = HashSet::new();
        include.insert("AS15169".to_string());
        let config = PolicyConfig { static_include_asns: Some(include), ..Default::default() };
        let filter = Filter::new(config, Arc::new(FixedAsn(Some("AS64512"))), Arc::new(StaticFeed("")));
        assert!(filter.excluded(&addr("8.8.8.8")));
    }

    #[test]
    fn address_in_include_asns_kept() {
        let mut include = HashSet::new();
        include.insert("AS15169".to_string());
        let config = PolicyConfig { static_include_asns: Some(include), ..Default::default() };
        let filter = Filter::new(config, Arc::new(FixedAsn(Some("AS15169"))), Arc::new(StaticFeed("")));
        assert!(!filter.excluded(&addr("8.8.8.8")));
    }

    #[test]
    fn refresh_rebuilds_tables_from_feed() {
        let config = PolicyConfig { exclude_ipv4_bogons: true, ..Default::default() };
        let filter = Filter::new(config, Arc::new(NoAsnResolver), Arc::new(StaticFeed("1.2.3.0/24\n")));
        assert!(!filter.excluded(&addr("1.2.3.4")));
        filter.refresh();
        assert!(filter.excluded(&addr("1.2.3.4")));
    }

    #[test]
    fn list_included_asns_drops_non_as_lines() {
        let set = list_included_asns("AS15169\nnot-an-asn\nAS64512\n");
        assert_eq!(set.len(), 2);
    }
}
