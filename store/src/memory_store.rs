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

//! An in-process [`CoordinationStore`] stand-in for tests, the role the
//! teacher's `snarkos-integration::TestNode` plays for a real peer: no
//! network, same contract.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;

use crate::{
    coordination::CoordinationStore,
    error::StoreError,
    pipeline::{Pipeline, PipelineOp},
};

#[derive(Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    strings: HashMap<String, String>,
    zsets: HashMap<String, HashMap<String, i64>>,
    lists: HashMap<String, VecDeque<String>>,
    expiries: HashMap<String, Instant>,
    published: Vec<(String, String)>,
}

impl Inner {
    fn expire_if_due(&mut self, key: &str) {
        let Some(&deadline) = self.expiries.get(key) else { return };
        if Instant::now() < deadline {
            return;
        }
        self.expiries.remove(key);
        self.sets.remove(key);
        self.strings.remove(key);
        self.zsets.remove(key);
        self.lists.remove(key);
    }
}

/// An in-memory [`CoordinationStore`]. Every operation is guarded by one
/// [`Mutex`]; this is a test double, not a production deployment target,
/// so there is no need for finer-grained locking.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `(channel, message)` pair published so far, for tests
    /// that assert on the `snapshot:{magic}` pub/sub side effect.
    pub fn published(&self) -> Vec<(String, String)> {
        self.inner.lock().published.clone()
    }
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => candidate.starts_with(prefix),
        None => candidate == pattern,
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.sets.entry(key.to_string()).or_default().insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.sets.get_mut(key).map(|s| s.remove(member)).unwrap_or(false))
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.sets.get(key).map(|s| s.contains(member)).unwrap_or(false))
    }

    async fn spop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        let Some(set) = inner.sets.get_mut(key) else { return Ok(None) };
        let chosen = set.iter().choose(&mut rand::thread_rng()).cloned();
        if let Some(member) = &chosen {
            set.remove(member);
        }
        Ok(chosen)
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        let entry = inner.strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let value: i64 = entry.parse().unwrap_or(0);
        let value = value + 1;
        *entry = value.to_string();
        Ok(value)
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        let entry = inner.strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let value: i64 = entry.parse().unwrap_or(0);
        let value = value - 1;
        *entry = value.to_string();
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.expiries.remove(key);
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.strings.insert(key.to_string(), value.to_string());
        inner.expiries.insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.strings.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        Ok(inner.strings.contains_key(key)
            || inner.sets.contains_key(key)
            || inner.zsets.contains_key(key)
            || inner.lists.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.strings.remove(key);
        inner.sets.remove(key);
        inner.zsets.remove(key);
        inner.lists.remove(key);
        inner.expiries.remove(key);
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.sets.keys())
            .chain(inner.zsets.keys())
            .chain(inner.lists.keys())
            .cloned()
            .collect();
        let mut matched = Vec::new();
        for key in keys {
            inner.expire_if_due(&key);
            let still_present = inner.strings.contains_key(&key)
                || inner.sets.contains_key(&key)
                || inner.zsets.contains_key(&key)
                || inner.lists.contains_key(&key);
            if still_present && glob_match(pattern, &key) {
                matched.push(key);
            }
        }
        matched.sort();
        matched.dedup();
        Ok(matched)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        inner.lists.entry(key.to_string()).or_default().push_front(value.to_string());
        Ok(())
    }

    async fn zadd_lt(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        let zset = inner.zsets.entry(key.to_string()).or_default();
        let should_insert = zset.get(member).map(|&current| score < current).unwrap_or(true);
        if should_insert {
            zset.insert(member.to_string(), score);
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.expiries.insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        Ok(())
    }

    async fn zrangebyscore(&self, key: &str, min: i64, max: i64) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.expire_if_due(key);
        let Some(zset) = inner.zsets.get(key) else { return Ok(Vec::new()) };
        let mut members: Vec<(&String, &i64)> = zset.iter().filter(|(_, &score)| score >= min && score <= max).collect();
        members.sort_by_key(|(_, &score)| score);
        Ok(members.into_iter().map(|(member, _)| member.clone()).collect())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.published.push((channel.to_string(), message.to_string()));
        Ok(())
    }

    async fn execute_pipeline(&self, pipeline: Pipeline) -> Result<(), StoreError> {
        for op in pipeline.ops() {
            match op {
                PipelineOp::Sadd { key, member } => {
                    self.sadd(key, member).await?;
                }
                PipelineOp::Srem { key, member } => {
                    self.srem(key, member).await?;
                }
                PipelineOp::Set { key, value } => {
                    self.set(key, value).await?;
                }
                PipelineOp::SetEx { key, ttl_secs, value } => {
                    self.setex(key, *ttl_secs, value).await?;
                }
                PipelineOp::Delete { key } => {
                    self.delete(key).await?;
                }
                PipelineOp::LPush { key, value } => {
                    self.lpush(key, value).await?;
                }
                PipelineOp::ZaddLt { key, member, score } => {
                    self.zadd_lt(key, member, *score).await?;
                }
                PipelineOp::Expire { key, ttl_secs } => {
                    self.expire(key, *ttl_secs).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn sadd_reports_whether_member_was_new() {
        let store = MemoryStore::new();
        assert!(store.sadd("pending", "a").await.unwrap());
        assert!(!store.sadd("pending", "a").await.unwrap());
        assert_eq!(store.scard("pending").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn spop_removes_the_member_it_returns() {
        let store = MemoryStore::new();
        store.sadd("pending", "a").await.unwrap();
        let popped = store.spop("pending").await.unwrap().unwrap();
        assert_eq!(popped, "a");
        assert_eq!(store.scard("pending").await.unwrap(), 0);
        assert!(store.spop("pending").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zadd_lt_keeps_the_minimum_score() {
        let store = MemoryStore::new();
        store.zadd_lt("binv:deadbeef", "1.2.3.4-8333", 100).await.unwrap();
        store.zadd_lt("binv:deadbeef", "1.2.3.4-8333", 200).await.unwrap();
        let members = store.zrangebyscore("binv:deadbeef", 0, 150).await.unwrap();
        assert_eq!(members, vec!["1.2.3.4-8333".to_string()]);
        store.zadd_lt("binv:deadbeef", "1.2.3.4-8333", 50).await.unwrap();
        let members = store.zrangebyscore("binv:deadbeef", 0, 60).await.unwrap();
        assert_eq!(members, vec!["1.2.3.4-8333".to_string()]);
    }

    #[tokio::test]
    async fn scan_keys_matches_prefix_glob() {
        let store = MemoryStore::new();
        store.set("node:1.2.3.4-8333", "").await.unwrap();
        store.set("node:5.6.7.8-8333", "").await.unwrap();
        store.set("height:1.2.3.4-8333-9", "600000").await.unwrap();
        let mut keys = store.scan_keys("node:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["node:1.2.3.4-8333".to_string(), "node:5.6.7.8-8333".to_string()]);
    }

    #[tokio::test]
    async fn pipeline_applies_every_op() {
        let store = MemoryStore::new();
        let pipeline = Pipeline::new()
            .setex("height:1.2.3.4-8333-9", 10_800, "600000")
            .sadd("up", "node:1.2.3.4-8333-9")
            .set("node:1.2.3.4-8333", "");
        store.execute_pipeline(pipeline).await.unwrap();
        assert_eq!(store.get("height:1.2.3.4-8333-9").await.unwrap(), Some("600000".to_string()));
        assert!(store.sismember("up", "node:1.2.3.4-8333-9").await.unwrap());
        assert_eq!(store.get("node:1.2.3.4-8333").await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn publish_is_recorded_for_assertions() {
        let store = MemoryStore::new();
        store.publish("snapshot:f9beb4d9", "1700000000").await.unwrap();
        assert_eq!(store.published(), vec![("snapshot:f9beb4d9".to_string(), "1700000000".to_string())]);
    }

    #[tokio::test]
    async fn incr_and_decr_track_cidr_counters() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("crawl:cidr:2001:db8::/64").await.unwrap(), 1);
        assert_eq!(store.incr("crawl:cidr:2001:db8::/64").await.unwrap(), 2);
        assert_eq!(store.decr("crawl:cidr:2001:db8::/64").await.unwrap(), 1);
    }
}
