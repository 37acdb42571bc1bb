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

//! The [`CoordinationStore`] trait: the primitives spec §4.7 assumes the
//! coordination store provides, named one-for-one after the `redis_conn.*`
//! calls in `original_source/crawl.py` and `ping.py`.

use async_trait::async_trait;

use crate::{error::StoreError, pipeline::Pipeline};

/// Atomic set membership, counters, `setex`, LT-scored sorted sets,
/// keyspace scan, and pub/sub: the primitives `crawl.py`/`ping.py` lean on
/// (`sadd`/`srem`/`sismember`/`spop`/`scard`/`smembers`, `incr`/`decr`,
/// `get`/`set`/`setex`/`exists`/`delete`, `lpush`/`expire`,
/// `ZADD ... LT`/`zrangebyscore`, `publish`) plus a `scan_keys` stand-in
/// for `utils.get_keys`'s `SCAN` loop and [`Pipeline`] execution for the
/// multi-step atomic transitions spec §4.7 calls out.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Pops and returns a random member, or `None` if the set is empty.
    async fn spop(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn scard(&self, key: &str) -> Result<u64, StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Increments `key` by one, returning the new value. Absent keys start
    /// at 0, matching Redis `INCR` semantics.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn decr(&self, key: &str) -> Result<i64, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Returns every key matching `pattern` (a `SCAN`-style glob, e.g.
    /// `node:*`), the way `utils.get_keys` walks the keyspace without
    /// blocking on `KEYS`.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// `ZADD key LT score member`: inserts `member` with `score` only if
    /// `member` is absent or its current score is greater than `score`.
    async fn zadd_lt(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError>;

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError>;

    async fn zrangebyscore(&self, key: &str, min: i64, max: i64) -> Result<Vec<String>, StoreError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError>;

    /// Executes every queued operation as a single round-trip.
    async fn execute_pipeline(&self, pipeline: Pipeline) -> Result<(), StoreError>;
}
