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

//! Address-book harvest: `getaddr`/poll, cache lookup, and the anti-flood
//! and per-node caps, grounded in `original_source/crawl.py`'s `getaddr`,
//! `get_peers`, and `get_cached_peers`.

use std::collections::HashSet;
use std::time::Duration;

use gossipmap_filter::Filter;
use gossipmap_peer::{addr_entries, PeerSession};
use gossipmap_store::{CoordinationStore, StoreError};
use gossipmap_types::address::Address;
use gossipmap_types::config::CrawlerConfig;
use gossipmap_types::Candidate;
use rand::Rng;
use tracing::{debug, warn};

const MAX_RAW_ADDR_BATCH: usize = gossipmap_types::constants::MAX_RAW_ADDR_BATCH;
const ADDR_POLL_INTERVAL: Duration = Duration::from_millis(gossipmap_types::constants::ADDR_POLL_INTERVAL_MS);

/// Sends `getaddr` and polls up to `socket_timeout` 0.3 s ticks for an
/// `addr`/`addrv2` reply with more than one entry, the way `getaddr` busy-
/// waits in the original.
async fn getaddr_and_poll(session: &mut PeerSession, socket_timeout_secs: u64, default_port: u16) -> Vec<Candidate> {
    if session.getaddr().await.is_err() {
        return Vec::new();
    }

    for _ in 0..socket_timeout_secs {
        tokio::time::sleep(ADDR_POLL_INTERVAL).await;
        let messages = session.get_messages(&["addr", "addrv2"]);
        if messages.is_empty() {
            continue;
        }
        let (total, entries) = addr_entries(&messages, default_port);
        if total > 1 {
            let now = chrono_now();
            return entries
                .into_iter()
                .map(|e| Candidate { address: Address::new(e.host, e.port, e.services), timestamp: e.timestamp.max(0).min(now) })
                .collect();
        }
    }
    Vec::new()
}

fn chrono_now() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Harvests peers fresh from the wire, applying the age filter, the
/// exclusion policy, the 1000-entry anti-flood reject, and the
/// `peers_per_node` cap (spec §4.3, `get_peers`).
async fn fresh_peers(session: &mut PeerSession, filter: &Filter, conf: &CrawlerConfig) -> Vec<Candidate> {
    let now = chrono_now();
    let raw = getaddr_and_poll(session, conf.socket_timeout, conf.port).await;

    let mut seen = HashSet::new();
    let mut peers = Vec::new();
    let mut excluded = 0usize;
    for candidate in raw {
        let age = now - candidate.timestamp;
        if age < 0 || age > conf.max_age {
            continue;
        }
        if filter.excluded(&candidate.address) {
            excluded += 1;
            continue;
        }
        if seen.insert(candidate.address.clone()) {
            peers.push(candidate);
        }
    }
    debug!(peers = peers.len(), excluded, "harvested");

    if peers.len() > MAX_RAW_ADDR_BATCH {
        warn!(count = peers.len(), "peers rejected, batch too large");
        return Vec::new();
    }
    peers.truncate(conf.peers_per_node);
    peers
}

/// Returns the peer's address book, reusing the `peer:{host}-{port}` TTL
/// cache when present and otherwise harvesting fresh and seeding the cache
/// (spec §4.3, `get_cached_peers`).
pub async fn cached_peers(
    store: &dyn CoordinationStore,
    session: &mut PeerSession,
    filter: &Filter,
    conf: &CrawlerConfig,
    peer_address: &Address,
) -> Result<Vec<Address>, StoreError> {
    let cache_key = peer_address.peer_cache_key();

    let cached = store.get(&cache_key).await?;
    let peers = if let Some(raw) = cached {
        parse_cached(&raw)
    } else {
        let fresh = fresh_peers(session, filter, conf).await;
        let encoded = encode_candidates(&fresh);
        let mut ttl = conf.addr_ttl as f64;
        let jitter: u64 = rand::thread_rng().gen_range(0..=conf.addr_ttl_var);
        ttl += (jitter as f64 / 100.0) * ttl;
        store.setex(&cache_key, ttl as u64, &encoded).await?;
        fresh
    };

    Ok(peers.into_iter().map(|c| c.address).collect())
}

fn encode_candidates(candidates: &[Candidate]) -> String {
    let mut out = String::from("[");
    for (i, c) in candidates.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&c.encode());
    }
    out.push(']');
    out
}

fn parse_cached(raw: &str) -> Vec<Candidate> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut candidates = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if let Ok(candidate) = Candidate::parse(&inner[start..=i]) {
                        candidates.push(candidate);
                    }
                    start = i + 1;
                }
            }
            _ => {}
        }
    }
    candidates
}

#[cfg(test)]
mod test {
    use super::*;
    use gossipmap_types::address::Host;

    #[test]
    fn round_trips_candidate_list_encoding() {
        let candidates = vec![
            Candidate { address: Address::new(Host::V4("1.2.3.4".parse().unwrap()), 8333, 9), timestamp: 1700 },
            Candidate { address: Address::new(Host::V4("5.6.7.8".parse().unwrap()), 8334, 1), timestamp: 1800 },
        ];
        let encoded = encode_candidates(&candidates);
        let parsed = parse_cached(&encoded);
        assert_eq!(parsed, candidates);
    }

    #[test]
    fn parses_empty_list() {
        assert!(parse_cached("[]").is_empty());
    }
}
