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

//! Numeric network/netmask tables (spec §4.1 rule 5) and the `ip_to_network`
//! helper used for IPv6 prefix grouping (spec §4.3/§4.5, §8).

use std::net::{Ipv4Addr, Ipv6Addr};

/// `(network_address, netmask)` pair for one address family, matching
/// `original_source/utils.py::list_excluded_networks`'s
/// `(int(network.network_address), int(network.netmask))` tuples exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Network {
    pub network: u32,
    pub netmask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Network {
    pub network: u128,
    pub netmask: u128,
}

impl Ipv4Network {
    pub fn contains(&self, addr: u32) -> bool {
        (addr & self.netmask) == self.network
    }
}

impl Ipv6Network {
    pub fn contains(&self, addr: u128) -> bool {
        (addr & self.netmask) == self.network
    }
}

fn ipv4_mask(prefix: u32) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

fn ipv6_mask(prefix: u32) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - prefix)
    }
}

/// Parses a line like `10.0.0.0/8` or `2001:db8::/32` into its network and
/// netmask, non-strictly (host bits beyond the prefix are masked off, the
/// way Python's `ip_network(..., strict=False)` does). Returns `None` for
/// anything that doesn't parse as a CIDR, mirroring
/// `list_excluded_networks`'s "invalid CIDRs are dropped silently" (spec
/// §4.1).
pub fn parse_cidr(line: &str) -> Option<Network> {
    let (addr_part, prefix_part) = match line.split_once('/') {
        Some(parts) => parts,
        None => (line, if line.contains(':') { "128" } else { "32" }),
    };
    let prefix: u32 = prefix_part.parse().ok()?;

    if let Ok(v4) = addr_part.parse::<Ipv4Addr>() {
        if prefix > 32 {
            return None;
        }
        let mask = ipv4_mask(prefix);
        let addr_bits = u32::from(v4);
        Some(Network::V4(Ipv4Network {
            network: addr_bits & mask,
            netmask: mask,
        }))
    } else if let Ok(v6) = addr_part.parse::<Ipv6Addr>() {
        if prefix > 128 {
            return None;
        }
        let mask = ipv6_mask(prefix);
        let addr_bits = u128::from(v6);
        Some(Network::V6(Ipv6Network {
            network: addr_bits & mask,
            netmask: mask,
        }))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    V4(Ipv4Network),
    V6(Ipv6Network),
}

/// Parses a newline-delimited blob of CIDR lines (optionally with `#`/`;`
/// comments, per spec §4.1) into network tables, appending to `v4`/`v6`.
pub fn parse_network_list(text: &str, v4: &mut Vec<Ipv4Network>, v6: &mut Vec<Ipv6Network>) {
    for raw_line in text.lines() {
        let line = raw_line.split('#').next().unwrap_or("").split(';').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        match parse_cidr(line) {
            Some(Network::V4(net)) => v4.push(net),
            Some(Network::V6(net)) => v6.push(net),
            None => continue,
        }
    }
}

/// Returns the CIDR notation `{network_address}/{prefix}` for `addr`'s
/// `/prefix` network, used to group crawl/ping attempts by IPv6 prefix
/// (spec §3 "Prefix counter"). Idempotent under re-application (spec §8):
/// `ip_to_network(ip_to_network(a,p).network, p) == same`.
pub fn ip_to_network_v6(addr: Ipv6Addr, prefix: u32) -> String {
    let mask = ipv6_mask(prefix);
    let network = u128::from(addr) & mask;
    format!("{}/{prefix}", Ipv6Addr::from(network))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_ipv4_cidr() {
        let net = parse_cidr("10.0.0.0/8").unwrap();
        match net {
            Network::V4(n) => {
                assert_eq!(n.network, u32::from(Ipv4Addr::new(10, 0, 0, 0)));
                assert!(n.contains(u32::from(Ipv4Addr::new(10, 1, 2, 3))));
                assert!(!n.contains(u32::from(Ipv4Addr::new(11, 0, 0, 0))));
            }
            _ => panic!("expected v4"),
        }
    }

    #[test]
    fn drops_invalid_cidr_silently() {
        assert!(parse_cidr("not a cidr").is_none());
        assert!(parse_cidr("10.0.0.0/99").is_none());
    }

    #[test]
    fn strips_comments() {
        let mut v4 = Vec::new();
        let mut v6 = Vec::new();
        parse_network_list("10.0.0.0/8 # comment\n; full comment line\n172.16.0.0/12\n", &mut v4, &mut v6);
        assert_eq!(v4.len(), 2);
    }

    #[test]
    fn ipv6_network_is_idempotent() {
        let addr: Ipv6Addr = "2001:db8::abcd".parse().unwrap();
        let once = ip_to_network_v6(addr, 64);
        let (net_str, _) = once.split_once('/').unwrap();
        let net_addr: Ipv6Addr = net_str.parse().unwrap();
        let twice = ip_to_network_v6(net_addr, 64);
        assert_eq!(once, twice);
    }
}
