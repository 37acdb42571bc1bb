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

//! One durable pinger session (spec §4.5): claim `open`, dial, handshake,
//! then the keepalive loop — ping cadence, version re-read, inventory
//! sink — until the transport gives out. Grounded in
//! `original_source/ping.py`'s `task`/`Keepalive`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_blockdata::Inventory;
use gossipmap_filter::Filter;
use gossipmap_peer::{HandshakeConfig, PeerSession};
use gossipmap_store::{CoordinationStore, Pipeline, StoreError};
use gossipmap_types::address::{Address, Host};
use gossipmap_types::config::PingerConfig;
use gossipmap_types::tuple::{OpenEntry, OpendataEntry};
use gossipmap_types::{constants, ReachableNode, VersionRecord};
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::guard::SessionGuard;

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

fn onion_proxy(address: &Address, conf: &PingerConfig) -> Option<SocketAddr> {
    if !(address.host.is_onion() && conf.onion) {
        return None;
    }
    conf.tor_proxies()
        .ok()
        .filter(|proxies| !proxies.is_empty())
        .and_then(|proxies| proxies.choose(&mut rand::thread_rng()).cloned())
        .and_then(|hp| format!("{}:{}", hp.host, hp.port).parse().ok())
}

/// Claims, dials, and maintains one durable session for `node` (spec
/// §4.5). Every exit path — filter reject, dial failure, handshake
/// failure, or the keepalive loop ending — runs through the same
/// [`SessionGuard`] teardown.
pub async fn run(store: Arc<dyn CoordinationStore>, conf: Arc<PingerConfig>, node: ReachableNode, magic_number: [u8; 4]) -> Result<(), StoreError> {
    let address = node.address.clone();
    let open_member = OpenEntry::from_address(&address).encode();

    let mut cidr_key = None;
    if let Host::V6(v6) = &address.host {
        if (conf.ipv6_prefix as u32) < 128 {
            let cidr = Filter::ipv6_prefix_network(*v6, conf.ipv6_prefix as u32);
            let key = format!("ping:cidr:{cidr}");
            let count = store.incr(&key).await?;
            if count as u64 > conf.nodes_per_ipv6_prefix {
                debug!(%cidr, count, "ping CIDR limit hit");
                store.decr(&key).await?;
                return Ok(());
            }
            cidr_key = Some(key);
        }
    }

    if !store.sadd("open", &open_member).await? {
        debug!(%address, "already open, skipping");
        if let Some(key) = &cidr_key {
            store.decr(key).await?;
        }
        return Ok(());
    }

    let mut guard = SessionGuard::new(store.clone(), cidr_key, open_member);

    let proxy_addr = onion_proxy(&address, &conf);
    let source_address = conf.source_address.parse().ok();
    let socket_timeout = Duration::from_secs(conf.socket_timeout);

    let mut session = match PeerSession::open(&address.host.to_string(), address.port, source_address, proxy_addr, socket_timeout, magic_number).await {
        Ok(session) => session,
        Err(err) => {
            debug!(%address, %err, "ping connect failed");
            guard.release().await?;
            return Ok(());
        }
    };

    let handshake = session
        .handshake(&HandshakeConfig {
            protocol_version: conf.protocol_version,
            services: conf.services,
            user_agent: conf.user_agent.clone(),
            relay: conf.relay,
            start_height: node.height as i32,
        })
        .await;

    let info = match handshake {
        Ok(info) => info,
        Err(err) => {
            debug!(%address, %err, "ping handshake failed");
            session.close();
            guard.release().await?;
            return Ok(());
        }
    };

    if address.host.is_onion() {
        let onion_key = format!("onion:{}", session.local_port());
        store.set(&onion_key, &OpenEntry { host: address.host.to_string(), port: address.port }.encode()).await?;
    }

    let mut opendata = OpendataEntry {
        host: address.host.to_string(),
        port: address.port,
        user_agent: info.user_agent.clone(),
        start_time: now_unix(),
        services: info.services,
    };
    store.sadd("opendata", &opendata.encode()).await?;
    guard.set_opendata(opendata.encode());

    let mut current_version = VersionRecord { protocol_version: info.protocol_version, user_agent: info.user_agent, services: info.services };

    info!(%address, "pinging");
    keepalive(&store, &conf, &address, &mut session, &mut opendata, &mut current_version, &mut guard).await?;

    session.close();
    guard.release().await?;
    Ok(())
}

/// The 0.1 s cooperative loop (spec §4.5 step 5), expressed as a
/// `tokio::time::interval` tick per SPEC_FULL.md's cooperative-scheduling
/// mapping: ping cadence, version re-read, and inventory sink, exiting on
/// a transport error (never on a bare poll finding nothing to do).
async fn keepalive(
    store: &Arc<dyn CoordinationStore>,
    conf: &PingerConfig,
    address: &Address,
    session: &mut PeerSession,
    opendata: &mut OpendataEntry,
    current_version: &mut VersionRecord,
    guard: &mut SessionGuard,
) -> Result<(), StoreError> {
    let ping_delay = Duration::from_secs(constants::DEFAULT_PING_DELAY_SECS);
    let version_delay = Duration::from_secs(conf.version_delay);

    let mut last_ping = Instant::now() - ping_delay;
    let mut last_version_check = Instant::now();
    let mut tick = tokio::time::interval(Duration::from_millis(constants::KEEPALIVE_TICK_MS));

    loop {
        tick.tick().await;

        if last_ping.elapsed() >= ping_delay {
            let nonce: u64 = rand::random();
            if session.ping(nonce).await.is_err() {
                break;
            }
            last_ping = Instant::now();
            let ping_key = format!("ping:{}-{}:{}", address.host, address.port, nonce);
            let pipeline = Pipeline::new().lpush(ping_key.clone(), now_ms().to_string()).expire(ping_key, conf.rtt_ttl);
            store.execute_pipeline(pipeline).await?;
        }

        if last_version_check.elapsed() >= version_delay {
            last_version_check = Instant::now();
            if let Some(raw) = store.get(&address.version_key()).await? {
                if let Ok(record) = VersionRecord::parse(&raw) {
                    if record != *current_version {
                        let updated = OpendataEntry { user_agent: record.user_agent.clone(), services: record.services, ..opendata.clone() };
                        let pipeline = Pipeline::new().srem("opendata", opendata.encode()).sadd("opendata", updated.encode());
                        store.execute_pipeline(pipeline).await?;
                        guard.set_opendata(updated.encode());
                        *opendata = updated;
                        *current_version = record;
                    }
                }
            }
        }

        let messages = session.get_messages(&["inv"]);
        if !messages.is_empty() {
            sink_inventory(store, address, &messages, conf.inv_ttl).await?;
        }

        if session.is_closed() {
            break;
        }
    }

    Ok(())
}

/// For every block-inventory entry (`type == 2`), upserts `binv:{hash}`
/// with LT-semantics keyed by the lowest observed timestamp (spec §3, §4.5
/// step 5 "sink").
async fn sink_inventory(store: &Arc<dyn CoordinationStore>, address: &Address, messages: &[NetworkMessage], inv_ttl: u64) -> Result<(), StoreError> {
    let member = format!("{}-{}", address.host, address.port);
    let now = now_ms();
    let mut pipeline = Pipeline::new();
    let mut any = false;

    for message in messages {
        let NetworkMessage::Inv(items) = message else { continue };
        for item in items {
            if let Inventory::Block(hash) = item {
                let key = format!("binv:{hash}");
                pipeline = pipeline.zadd_lt(key.clone(), member.clone(), now).expire(key, inv_ttl);
                any = true;
            }
        }
    }

    if any {
        store.execute_pipeline(pipeline).await?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::net::Ipv6Addr;

    use gossipmap_store::MemoryStore;
    use gossipmap_types::address::Host;

    use super::*;

    fn test_conf() -> PingerConfig {
        PingerConfig {
            logfile: "ping.log".into(),
            log_to_console: false,
            magic_number: "f9beb4d9".into(),
            db: 0,
            workers: 4,
            debug: false,
            source_address: String::new(),
            protocol_version: 70016,
            user_agent: "/gossipmap/".into(),
            services: 0,
            relay: false,
            socket_timeout: 15,
            cron_delay: 10,
            rtt_ttl: 1800,
            inv_ttl: 1800,
            version_delay: 1800,
            ipv6_prefix: 64,
            nodes_per_ipv6_prefix: 2,
            onion: false,
            tor_proxies: String::new(),
            crawl_dir: "/tmp".into(),
        }
    }

    /// Spec §8 scenario 5: a third peer in an already-saturated /64 aborts
    /// before touching `open` or net-changing the CIDR counter.
    #[tokio::test]
    async fn third_peer_in_saturated_prefix_never_opens() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        let conf = Arc::new(test_conf());
        let cidr_key = "ping:cidr:2001:db8::/64";
        store.incr(cidr_key).await.unwrap();
        store.incr(cidr_key).await.unwrap();

        let address = gossipmap_types::Address::new(Host::V6("2001:db8::3".parse::<Ipv6Addr>().unwrap()), 8333, 9);
        let node = ReachableNode { address, height: 0 };
        run(store.clone(), conf, node, [0xf9, 0xbe, 0xb4, 0xd9]).await.unwrap();

        assert_eq!(store.scard("open").await.unwrap(), 0);
        assert_eq!(store.get(cidr_key).await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn already_open_peer_is_skipped_without_dialing() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        let conf = Arc::new(test_conf());
        let address = gossipmap_types::Address::parse("1.2.3.4", 8333, 9).unwrap();
        store.sadd("open", &OpenEntry::from_address(&address).encode()).await.unwrap();

        let node = ReachableNode { address, height: 0 };
        run(store.clone(), conf, node, [0xf9, 0xbe, 0xb4, 0xd9]).await.unwrap();

        assert_eq!(store.scard("open").await.unwrap(), 1);
    }
}
