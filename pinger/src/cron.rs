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

//! The pinger's cron task (spec §4.6): master-role snapshot discovery plus
//! the (both-role) worker-pool dispatch loop. Grounded in
//! `original_source/ping.py`'s `cron`/`get_snapshot`/`get_nodes`/
//! `set_reachable`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gossipmap_store::{CoordinationStore, StoreError};
use gossipmap_types::address::Address;
use gossipmap_types::config::{snapshot_channel, PingerConfig, Role};
use gossipmap_types::{OpenEntry, ReachableNode};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::worker;

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Runs forever: on the master, discovers new crawl snapshots and seeds
/// `reachable`; on both roles, drains `reachable` into the worker pool up
/// to `workers` concurrent sessions (spec §4.6, §5 "the pinger is bounded
/// by a worker pool of size `workers`").
pub async fn run(store: Arc<dyn CoordinationStore>, conf: Arc<PingerConfig>, role: Role, magic_number: [u8; 4]) -> Result<(), StoreError> {
    let pool = Arc::new(Semaphore::new(conf.workers.max(1)));
    let mut last_snapshot: Option<PathBuf> = None;

    loop {
        if role.is_master() {
            if let Some(path) = latest_snapshot(&conf.crawl_dir) {
                if last_snapshot.as_ref() != Some(&path) {
                    match load_snapshot(&path, store.as_ref()).await {
                        Ok(inserted) => info!(path = %path.display(), inserted, "discovered snapshot"),
                        Err(err) => warn!(%err, path = %path.display(), "failed to load snapshot"),
                    }
                    tokio::time::sleep(Duration::from_secs(conf.socket_timeout)).await;
                    store.publish(&snapshot_channel(magic_number), &now_unix().to_string()).await?;
                    last_snapshot = Some(path);
                }
            }
        }

        dispatch(&store, &conf, &pool, magic_number);

        let open = store.scard("open").await?;
        info!(open, available_workers = pool.available_permits(), "pool");
        tokio::time::sleep(Duration::from_secs(conf.cron_delay)).await;
    }
}

/// Pops one reachable node per free pool slot and hands it to a worker
/// task, never exceeding `workers` concurrent sessions (spec §4.6 "Both").
fn dispatch(store: &Arc<dyn CoordinationStore>, conf: &Arc<PingerConfig>, pool: &Arc<Semaphore>, magic_number: [u8; 4]) {
    loop {
        let Ok(permit) = pool.clone().try_acquire_owned() else { break };

        let store = store.clone();
        let conf = conf.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let raw = match store.spop("reachable").await {
                Ok(Some(raw)) => raw,
                Ok(None) => return,
                Err(err) => {
                    warn!(%err, "reachable pop failed");
                    return;
                }
            };
            let node = match ReachableNode::parse(&raw) {
                Ok(node) => node,
                Err(err) => {
                    debug!(%err, raw, "malformed reachable entry");
                    return;
                }
            };
            if let Err(err) = worker::run(store, conf, node, magic_number).await {
                tracing::error!(%err, "pinger worker exited");
            }
        });
    }
}

/// Finds `{crawl_dir}/*.json` with the lexicographically greatest name
/// (timestamp filenames make lexicographic order chronological — spec §6).
fn latest_snapshot(dir: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .max_by_key(|path| path.file_name().map(|name| name.to_os_string()))
}

/// Loads a snapshot file and seeds `reachable` with every entry not
/// already holding an `open` session (spec §4.6 master step).
async fn load_snapshot(path: &Path, store: &dyn CoordinationStore) -> Result<usize, StoreError> {
    let body = tokio::fs::read_to_string(path).await.map_err(|err| StoreError::Unavailable(err.to_string()))?;
    let rows: Vec<(String, u16, u64, u32, String)> =
        serde_json::from_str(&body).map_err(|err| StoreError::Protocol(format!("malformed snapshot {}: {err}", path.display())))?;

    let mut inserted = 0;
    for (host, port, services, height, _user_agent) in rows {
        let Ok(address) = Address::parse(&host, port as i64, services) else { continue };
        let open_member = OpenEntry::from_address(&address).encode();
        if store.sismember("open", &open_member).await? {
            continue;
        }
        let node = ReachableNode { address, height };
        if store.sadd("reachable", &node.encode()).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn latest_snapshot_picks_lexicographically_greatest_filename() {
        let dir = std::env::temp_dir().join(format!("gossipmap-pinger-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("100.json"), "[]").unwrap();
        std::fs::write(dir.join("200.json"), "[]").unwrap();
        std::fs::write(dir.join("not-json.txt"), "").unwrap();

        let found = latest_snapshot(dir.to_str().unwrap()).unwrap();
        assert_eq!(found.file_name().unwrap().to_str().unwrap(), "200.json");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn load_snapshot_skips_entries_already_open() {
        let store = gossipmap_store::MemoryStore::new();
        let address = Address::parse("1.2.3.4", 8333, 9).unwrap();
        store.sadd("open", &OpenEntry::from_address(&address).encode()).await.unwrap();

        let dir = std::env::temp_dir().join(format!("gossipmap-pinger-test-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("100.json");
        std::fs::write(&path, r#"[["1.2.3.4",8333,9,810000,"/Satoshi:25.0.0/"],["5.6.7.8",8333,1,810000,"/Satoshi:25.0.0/"]]"#).unwrap();

        let inserted = load_snapshot(&path, &store).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.scard("reachable").await.unwrap(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
