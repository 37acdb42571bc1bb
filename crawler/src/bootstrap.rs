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

//! Seeds the `pending` set at master startup, grounded in
//! `original_source/crawl.py::set_pending`.
//!
//! The upstream function resolves each configured seeder via
//! `socket.getaddrinfo` and falls back to a hardcoded `.onion` list; a
//! leftover `return` right after its first debug line currently short-circuits
//! that in the original file. We restore the full path described in its own
//! docstring rather than carry the short-circuit forward.

use std::net::IpAddr;

use gossipmap_filter::Filter;
use gossipmap_store::{CoordinationStore, StoreError};
use gossipmap_types::address::{Address, Host};
use gossipmap_types::config::CrawlerConfig;
use gossipmap_types::Candidate;
use tracing::{debug, warn};

use crate::constants::TO_SERVICES;

async fn resolve_seeder(seeder: &str, want_ipv6: bool) -> Vec<IpAddr> {
    match tokio::net::lookup_host((seeder, 0)).await {
        Ok(addrs) => addrs
            .map(|a| a.ip())
            .filter(|ip| want_ipv6 || ip.is_ipv4())
            .collect(),
        Err(err) => {
            warn!(%seeder, %err, "seeder DNS resolution failed");
            Vec::new()
        }
    }
}

/// Populates `pending` from the configured DNS seeders plus, when
/// `onion` is enabled, the hardcoded `onion_nodes` list.
pub async fn seed_pending(store: &dyn CoordinationStore, filter: &Filter, conf: &CrawlerConfig) -> Result<(), StoreError> {
    for seeder in conf.seeders() {
        for ip in resolve_seeder(&seeder, conf.ipv6).await {
            let host = match ip {
                IpAddr::V4(v4) => Host::V4(v4),
                IpAddr::V6(v6) => Host::V6(v6),
            };
            let address = Address::new(host, conf.port, TO_SERVICES);
            if filter.excluded(&address) {
                debug!(%address, "exclude");
                continue;
            }
            debug!(%seeder, %address, "seeded");
            store.sadd("pending", &Candidate::encode_address(&address)).await?;
        }
    }

    if conf.onion {
        for onion_host in conf.onion_nodes() {
            let Ok(host) = Host::parse(&onion_host) else {
                warn!(%onion_host, "bad onion_nodes entry");
                continue;
            };
            let address = Address::new(host, conf.port, TO_SERVICES);
            store.sadd("pending", &Candidate::encode_address(&address)).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use gossipmap_filter::{asn::NoAsnResolver, feed::PolicyFeed, Filter, PolicyConfig};
    use gossipmap_store::MemoryStore;

    use super::*;

    struct EmptyFeed;
    impl PolicyFeed for EmptyFeed {
        fn fetch_text(&self, _url: &str) -> String {
            String::new()
        }
    }

    fn test_filter() -> Arc<Filter> {
        Filter::new(PolicyConfig::default(), Arc::new(NoAsnResolver), Arc::new(EmptyFeed))
    }

    #[tokio::test]
    async fn seeds_onion_nodes_when_onion_enabled() {
        let store = MemoryStore::new();
        let conf = CrawlerConfig {
            logfile: "crawl.log".into(),
            log_to_console: false,
            magic_number: "f9beb4d9".into(),
            port: 8333,
            db: 0,
            seeders: String::new(),
            workers: 1,
            debug: false,
            source_address: String::new(),
            protocol_version: 70016,
            user_agent: "/gossipmap/".into(),
            services: 0,
            relay: false,
            socket_timeout: 15,
            cron_delay: 10,
            snapshot_delay: 60,
            addr_ttl: 21600,
            addr_ttl_var: 10,
            max_age: 10800,
            peers_per_node: 100,
            ipv6: false,
            ipv6_prefix: 64,
            nodes_per_ipv6_prefix: 4,
            include_asns: String::new(),
            include_asns_from_url: String::new(),
            exclude_asns: String::new(),
            exclude_private: false,
            exclude_ipv4_networks: String::new(),
            exclude_ipv6_networks: String::new(),
            exclude_ipv4_bogons: false,
            exclude_ipv6_bogons: false,
            exclude_ipv4_networks_from_url: String::new(),
            exclude_ipv6_networks_from_url: String::new(),
            onion: true,
            tor_proxies: String::new(),
            onion_nodes: "abcdefghij234567.onion".into(),
            include_checked: false,
            crawl_dir: "/tmp".into(),
        };

        seed_pending(&store, &test_filter(), &conf).await.unwrap();
        assert_eq!(store.scard("pending").await.unwrap(), 1);
    }
}
