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

//! The master-only cron task (spec §4.4): reports `pending`'s size and, once
//! it drains, restarts the crawl cycle. Grounded in
//! `original_source/crawl.py`'s `cron`/`restart`/`dump`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gossipmap_filter::Filter;
use gossipmap_store::{CoordinationStore, Pipeline, StoreError};
use gossipmap_types::address::Address;
use gossipmap_types::config::{snapshot_channel, CrawlerConfig};
use gossipmap_types::{Candidate, HistoryEntry, VersionRecord};
use tracing::{info, warn};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Runs forever: reports `pending`'s size every `cron_delay` seconds, and
/// when it hits zero, restarts the crawl cycle (spec §4.4).
pub async fn run(store: Arc<dyn CoordinationStore>, filter: Arc<Filter>, conf: Arc<CrawlerConfig>, magic_number: [u8; 4]) -> Result<(), StoreError> {
    let mut start = now_unix();

    loop {
        let pending = store.scard("pending").await?;
        info!(pending, "pending");

        if pending == 0 {
            store.set("crawl:master:state", "starting").await?;
            let now = now_unix();
            let elapsed = now - start;
            store.set("elapsed", &elapsed.to_string()).await?;
            info!(elapsed, "restarting");

            restart(store.as_ref(), filter.clone(), &conf, now, magic_number).await?;

            while now_unix() - start < conf.snapshot_delay as i64 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            start = now_unix();
            store.set("crawl:master:state", "running").await?;
        }

        tokio::time::sleep(Duration::from_secs(conf.cron_delay)).await;
    }
}

/// Snapshots the reachable set, re-seeds `pending`, clears the per-cycle
/// keyspace, refreshes policy tables, and writes the JSON snapshot (spec
/// §4.4, `restart`).
async fn restart(store: &dyn CoordinationStore, filter: Arc<Filter>, conf: &CrawlerConfig, timestamp: i64, magic_number: [u8; 4]) -> Result<(), StoreError> {
    let up_members = store.smembers("up").await?;
    store.delete("up").await?;

    let mut pipeline = Pipeline::new();
    let mut nodes = Vec::with_capacity(up_members.len());
    for member in &up_members {
        if let Some(address) = parse_up_key(member) {
            pipeline = pipeline.sadd("pending", Candidate::encode_address(&address));
            nodes.push(address);
        }
    }

    for key in store.scan_keys("node:*").await? {
        pipeline = pipeline.delete(key);
    }
    for key in store.scan_keys("crawl:cidr:*").await? {
        pipeline = pipeline.delete(key);
    }

    if conf.include_checked {
        let checked = store.zrangebyscore("check", timestamp - conf.max_age, timestamp).await?;
        for raw in checked {
            if let Ok(address) = Candidate::parse_address(&raw) {
                if filter.excluded(&address) {
                    continue;
                }
                pipeline = pipeline.sadd("pending", Candidate::encode_address(&address));
            }
        }
    }

    store.execute_pipeline(pipeline).await?;

    let refresh_filter = filter.clone();
    tokio::task::spawn_blocking(move || refresh_filter.refresh())
        .await
        .map_err(|err| StoreError::Unavailable(err.to_string()))?;

    let reachable_count = nodes.len() as u64;
    info!(reachable_count, "reachable nodes");
    store.lpush("nodes", &HistoryEntry { timestamp, reachable: reachable_count }.encode()).await?;

    if let Some(height) = dump(store, conf, timestamp, &nodes).await? {
        info!(height, "snapshot height");
    }

    store.publish(&snapshot_channel(magic_number), &timestamp.to_string()).await?;

    Ok(())
}

/// Reconstructs an `Address` from an `up` set member (`node:{host}-{port}-{services}`).
fn parse_up_key(member: &str) -> Option<Address> {
    let rest = member.strip_prefix("node:")?;
    let mut parts = rest.rsplitn(3, '-');
    let services: u64 = parts.next()?.parse().ok()?;
    let port: i64 = parts.next()?.parse().ok()?;
    let host = parts.next()?;
    Address::parse(host, port, services).ok()
}

/// Writes `{crawl_dir}/{timestamp}.json`: `[host, port, services, height,
/// user_agent]` rows for every node in `nodes`, and returns the most
/// common height among them (spec §4.4, `dump`).
async fn dump(store: &dyn CoordinationStore, conf: &CrawlerConfig, timestamp: i64, nodes: &[Address]) -> Result<Option<i64>, StoreError> {
    let mut rows = Vec::with_capacity(nodes.len());
    let mut height_counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();

    for address in nodes {
        let height_key = address.height_key();
        let height: i64 = match store.get(&height_key).await? {
            Some(raw) => raw.parse().unwrap_or(0),
            None => {
                warn!(key = %height_key, "height missing");
                0
            }
        };
        let version_key = address.version_key();
        let user_agent = match store.get(&version_key).await? {
            Some(raw) => VersionRecord::parse(&raw).map(|v| v.user_agent).unwrap_or_default(),
            None => {
                warn!(key = %version_key, "version missing");
                String::new()
            }
        };
        *height_counts.entry(height).or_insert(0) += 1;
        rows.push(serde_json::json!([address.host.to_string(), address.port, address.services, height, user_agent]));
    }

    if rows.is_empty() {
        warn!("no reachable nodes to snapshot");
        return Ok(None);
    }

    let path = Path::new(&conf.crawl_dir).join(format!("{timestamp}.json"));
    let body = serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string());
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| StoreError::Unavailable(err.to_string()))?;
    }
    tokio::fs::write(&path, body).await.map_err(|err| StoreError::Unavailable(err.to_string()))?;
    info!(path = %path.display(), "wrote snapshot");

    let most_common = height_counts.into_iter().max_by_key(|(_, count)| *count).map(|(height, _)| height);
    Ok(most_common)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_up_key_with_negative_looking_host_segment() {
        let addr = parse_up_key("node:1.2.3.4-8333-9").unwrap();
        assert_eq!(addr.port, 8333);
        assert_eq!(addr.services, 9);
    }

    #[test]
    fn rejects_key_without_prefix() {
        assert!(parse_up_key("1.2.3.4-8333-9").is_none());
    }
}
