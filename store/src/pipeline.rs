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

//! A batch of store mutations sent as a single round-trip (spec §4.7).
//!
//! `crawl.py`'s `connect()` builds one `redis_conn.pipeline()` and calls
//! `.execute()` once after queuing several `setex`/`sadd`/`set` calls; the
//! same shape shows up in `ping.py`'s `Keepalive.sink()` for the
//! `binv:*` ZADD/`expire` pair. We keep that one-round-trip-per-state-
//! transition property but as a plain value rather than a stateful
//! connection method, so it can be built up across several call sites and
//! handed to any [`crate::CoordinationStore`] implementation.

/// A single queued operation inside a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOp {
    Sadd { key: String, member: String },
    Srem { key: String, member: String },
    Set { key: String, value: String },
    SetEx { key: String, ttl_secs: u64, value: String },
    Delete { key: String },
    LPush { key: String, value: String },
    /// `ZADD key LT score member` — insert only if `score` is lower than
    /// the member's current score (or the member is absent).
    ZaddLt { key: String, member: String, score: i64 },
    Expire { key: String, ttl_secs: u64 },
}

/// A batch of [`PipelineOp`]s, built with the chainable methods below and
/// sent to the store with [`crate::CoordinationStore::execute_pipeline`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    ops: Vec<PipelineOp>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[PipelineOp] {
        &self.ops
    }

    pub fn sadd(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::Sadd { key: key.into(), member: member.into() });
        self
    }

    pub fn srem(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::Srem { key: key.into(), member: member.into() });
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::Set { key: key.into(), value: value.into() });
        self
    }

    pub fn setex(mut self, key: impl Into<String>, ttl_secs: u64, value: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::SetEx { key: key.into(), ttl_secs, value: value.into() });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::Delete { key: key.into() });
        self
    }

    pub fn lpush(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(PipelineOp::LPush { key: key.into(), value: value.into() });
        self
    }

    pub fn zadd_lt(mut self, key: impl Into<String>, member: impl Into<String>, score: i64) -> Self {
        self.ops.push(PipelineOp::ZaddLt { key: key.into(), member: member.into(), score });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl_secs: u64) -> Self {
        self.ops.push(PipelineOp::Expire { key: key.into(), ttl_secs });
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_queues_ops_in_order() {
        let pipeline = Pipeline::new()
            .setex("height:1.2.3.4-8333-9", 10_800, "600000")
            .setex("version:1.2.3.4-8333", 10_800, "(70016, '/gossipmap/', 9)")
            .sadd("pending", "('5.6.7.8', 8333, 9)")
            .sadd("up", "node:1.2.3.4-8333-9");
        assert_eq!(pipeline.ops().len(), 4);
        assert!(matches!(pipeline.ops()[0], PipelineOp::SetEx { .. }));
        assert!(matches!(pipeline.ops()[3], PipelineOp::Sadd { .. }));
    }

    #[test]
    fn empty_pipeline_is_empty() {
        assert!(Pipeline::new().is_empty());
        assert!(!Pipeline::new().set("k", "v").is_empty());
    }
}
