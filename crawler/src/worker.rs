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

//! The crawler's worker loop (spec §4.3): pop a candidate, gate it, dial
//! and handshake, write the result. Grounded in
//! `original_source/crawl.py`'s `task`/`connect`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use gossipmap_filter::Filter;
use gossipmap_peer::{HandshakeConfig, PeerSession};
use gossipmap_store::{CoordinationStore, Pipeline, StoreError};
use gossipmap_types::address::{Address, Host};
use gossipmap_types::config::{CrawlerConfig, Role};
use gossipmap_types::{Candidate, VersionRecord};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::harvest;

/// Runs forever, popping one candidate at a time from `pending`. Bounded by
/// the number of worker tasks spawned in `main`, never per candidate (spec
/// §5).
pub async fn run(store: Arc<dyn CoordinationStore>, filter: Arc<Filter>, conf: Arc<CrawlerConfig>, role: Role, magic_number: [u8; 4]) -> Result<(), StoreError> {
    loop {
        if !role.is_master() {
            wait_for_master_running(store.as_ref(), conf.socket_timeout).await?;
        }

        let Some(raw) = store.spop("pending").await? else {
            tokio::time::sleep(Duration::from_secs(gossipmap_types::constants::EMPTY_PENDING_BACKOFF_SECS)).await;
            continue;
        };

        let address = match Candidate::parse_address(&raw) {
            Ok(address) => address,
            Err(err) => {
                debug!(%err, raw, "malformed pending entry");
                continue;
            }
        };

        if address.host.is_ipv6() && !conf.ipv6 {
            continue;
        }

        if store.exists(&address.probed_key()).await? {
            continue;
        }

        if let Host::V6(v6) = &address.host {
            if (conf.ipv6_prefix as u32) < 128 {
                let cidr = Filter::ipv6_prefix_network(*v6, conf.ipv6_prefix as u32);
                let cidr_key = format!("crawl:cidr:{cidr}");
                let count = store.incr(&cidr_key).await?;
                if count as u64 > conf.nodes_per_ipv6_prefix {
                    debug!(%cidr, count, "CIDR limit hit");
                    continue;
                }
            }
        }

        connect(store.as_ref(), filter.as_ref(), &conf, &address, magic_number).await?;
    }
}

async fn wait_for_master_running(store: &dyn CoordinationStore, socket_timeout_secs: u64) -> Result<(), StoreError> {
    loop {
        if store.get("crawl:master:state").await?.as_deref() == Some("running") {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(socket_timeout_secs)).await;
    }
}

/// Dials and handshakes with one candidate, then records the outcome
/// (spec §4.3, `connect`). Errors from the peer session are logged and
/// swallowed; only store failures propagate (spec §7).
async fn connect(
    store: &dyn CoordinationStore,
    filter: &Filter,
    conf: &CrawlerConfig,
    address: &Address,
    magic_number: [u8; 4],
) -> Result<(), StoreError> {
    let probed_key = address.probed_key();
    store.set(&probed_key, "").await?;

    let height = store.get("height").await?.and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);

    let proxy = if address.host.is_onion() && conf.onion {
        conf.tor_proxies().ok().filter(|p| !p.is_empty()).and_then(|proxies| proxies.choose(&mut rand::thread_rng()).cloned())
    } else {
        None
    };
    let proxy_addr: Option<std::net::SocketAddr> = proxy.and_then(|hp| format!("{}:{}", hp.host, hp.port).parse().ok());

    let source_address: Option<IpAddr> = conf.source_address.parse().ok();
    let socket_timeout = Duration::from_secs(conf.socket_timeout);

    let session = PeerSession::open(&address.host.to_string(), address.port, source_address, proxy_addr, socket_timeout, magic_number).await;

    let mut session = match session {
        Ok(session) => session,
        Err(err) => {
            debug!(%address, %err, "connect failed");
            return Ok(());
        }
    };

    let handshake_result = session
        .handshake(&HandshakeConfig {
            protocol_version: conf.protocol_version,
            services: conf.services,
            user_agent: conf.user_agent.clone(),
            relay: conf.relay,
            start_height: height,
        })
        .await;

    let info = match handshake_result {
        Ok(info) => info,
        Err(err) => {
            debug!(%address, %err, "handshake failed");
            session.close();
            return Ok(());
        }
    };

    let peers = harvest::cached_peers(store, &mut session, filter, conf, address).await?;
    session.close();

    let height_key = format!("height:{}-{}-{}", address.host, address.port, info.services);
    let version_key = address.version_key();
    let up_key = format!("node:{}-{}-{}", address.host, address.port, info.services);

    let mut pipeline = Pipeline::new().setex(height_key, conf.max_age.max(0) as u64, info.height.to_string()).setex(
        version_key,
        conf.max_age.max(0) as u64,
        VersionRecord { protocol_version: info.protocol_version, user_agent: info.user_agent.clone(), services: info.services }.encode(),
    );
    for peer in &peers {
        pipeline = pipeline.sadd("pending", Candidate::encode_address(peer));
    }
    pipeline = pipeline.set(probed_key, String::new()).sadd("up", up_key);

    store.execute_pipeline(pipeline).await
}
