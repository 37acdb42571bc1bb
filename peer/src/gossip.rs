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

//! Turns raw `addr`/`addrv2` wire messages into the `(host, port, services,
//! timestamp)` shape `crawl.py`'s `get_peers` builds from `addr_msg['addr_list']`.

use std::net::IpAddr;

use bitcoin::p2p::address::AddrV2;
use bitcoin::p2p::message::NetworkMessage;
use gossipmap_types::address::Host;

/// One peer gossiped to us by a neighbor, before age/exclusion filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipEntry {
    pub host: Host,
    pub port: u16,
    pub services: u64,
    pub timestamp: i64,
}

/// Extracts every gossip entry from a batch of `addr`/`addrv2` messages,
/// plus the largest single message's entry count, used for the `count > 1`
/// early-stop and the hard 1000-entry anti-flood rejection (spec §4.3).
///
/// The count is a per-message maximum, not a sum across the batch: `crawl.py`
/// stops polling on `any([msg['count'] > 1 for msg in msgs])`, which a single
/// bulk dump satisfies but two separate one-entry relay announcements in the
/// same poll window do not. Summing would stop early on the latter and
/// return those trickle entries instead of continuing to wait for a real dump.
///
/// Tor v2/v3, I2P, and CJDNS `addrv2` entries are skipped: decoding them
/// into a dialable `.onion`/`.b32.i2p` name needs a checksum/base32 encoder
/// this crate doesn't otherwise have a use for (see DESIGN.md). Dialing
/// configured `onion_nodes` is unaffected; only discovery of *new* onion
/// peers via gossip is narrowed.
pub fn addr_entries(messages: &[NetworkMessage], default_port: u16) -> (usize, Vec<GossipEntry>) {
    let mut raw_count = 0;
    let mut entries = Vec::new();

    for message in messages {
        match message {
            NetworkMessage::Addr(addr_list) => {
                raw_count = raw_count.max(addr_list.len());
                for (timestamp, addr) in addr_list {
                    let Ok(socket_addr) = addr.socket_addr() else { continue };
                    let host = match socket_addr.ip() {
                        IpAddr::V4(v4) => Host::V4(v4),
                        IpAddr::V6(v6) => Host::V6(v6),
                    };
                    let port = if socket_addr.port() != 0 { socket_addr.port() } else { default_port };
                    entries.push(GossipEntry {
                        host,
                        port,
                        services: addr.services.to_u64(),
                        timestamp: *timestamp as i64,
                    });
                }
            }
            NetworkMessage::AddrV2(addr_list) => {
                raw_count = raw_count.max(addr_list.len());
                for entry in addr_list {
                    let host = match entry.addr {
                        AddrV2::Ipv4(v4) => Host::V4(v4),
                        AddrV2::Ipv6(v6) => Host::V6(v6),
                        _ => continue,
                    };
                    let port = if entry.port != 0 { entry.port } else { default_port };
                    entries.push(GossipEntry {
                        host,
                        port,
                        services: entry.services.to_u64(),
                        timestamp: entry.time as i64,
                    });
                }
            }
            _ => {}
        }
    }

    (raw_count, entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::p2p::address::Address as WireAddress;
    use bitcoin::p2p::ServiceFlags;
    use std::net::SocketAddr;

    #[test]
    fn extracts_ipv4_addr_entries_with_default_port() {
        let wire_addr = WireAddress::new(&"1.2.3.4:0".parse::<SocketAddr>().unwrap(), ServiceFlags::NETWORK);
        let messages = vec![NetworkMessage::Addr(vec![(1_700_000_000, wire_addr)])];
        let (raw_count, entries) = addr_entries(&messages, 8333);
        assert_eq!(raw_count, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].host, Host::V4("1.2.3.4".parse().unwrap()));
        assert_eq!(entries[0].port, 8333);
        assert_eq!(entries[0].timestamp, 1_700_000_000);
    }

    #[test]
    fn ignores_non_addr_messages() {
        let messages = vec![NetworkMessage::GetAddr, NetworkMessage::Verack];
        let (raw_count, entries) = addr_entries(&messages, 8333);
        assert_eq!(raw_count, 0);
        assert!(entries.is_empty());
    }
}
