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

//! Redis-backed [`CoordinationStore`], grounded in `original_source/utils.py`'s
//! `new_redis_conn` and the `redis_conn.*`/`redis_pipe.*` calls throughout
//! `crawl.py`/`ping.py`.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use crate::{
    coordination::CoordinationStore,
    error::StoreError,
    pipeline::{Pipeline, PipelineOp},
};

/// Thin adapter over `redis::aio::ConnectionManager`, which reconnects on
/// its own after a dropped connection the same way `redis.StrictRedis`
/// silently retries in `utils.new_redis_conn`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str, db: i64) -> Result<Self, StoreError> {
        let url = if db != 0 {
            format!("{}/{}", url.trim_end_matches('/'), db)
        } else {
            url.to_string()
        };
        let client = Client::open(url).map_err(StoreError::from)?;
        let conn = client.get_connection_manager().await.map_err(StoreError::from)?;
        Ok(Self { conn })
    }

    fn apply_op(pipe: &mut redis::Pipeline, op: &PipelineOp) {
        match op {
            PipelineOp::Sadd { key, member } => {
                pipe.sadd(key, member).ignore();
            }
            PipelineOp::Srem { key, member } => {
                pipe.srem(key, member).ignore();
            }
            PipelineOp::Set { key, value } => {
                pipe.set(key, value).ignore();
            }
            PipelineOp::SetEx { key, ttl_secs, value } => {
                pipe.set_ex(key, value, *ttl_secs).ignore();
            }
            PipelineOp::Delete { key } => {
                pipe.del(key).ignore();
            }
            PipelineOp::LPush { key, value } => {
                pipe.lpush(key, value).ignore();
            }
            PipelineOp::ZaddLt { key, member, score } => {
                pipe.cmd("ZADD").arg(key).arg("LT").arg(*score).arg(member).ignore();
            }
            PipelineOp::Expire { key, ttl_secs } => {
                pipe.expire(key, *ttl_secs as i64).ignore();
            }
        }
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added: i64 = self.conn.clone().sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let removed: i64 = self.conn.clone().srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.conn.clone().sismember(key, member).await?)
    }

    async fn spop(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn.clone().spop(key).await?)
    }

    async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.conn.clone().scard(key).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.conn.clone().smembers(key).await?)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.conn.clone().incr(key, 1).await?)
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.conn.clone().decr(key, 1).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.conn.clone().set(key, value).await?)
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError> {
        Ok(self.conn.clone().set_ex(key, value, ttl_secs).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn.clone().get(key).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.conn.clone().exists(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        Ok(self.conn.clone().del(key).await?)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let (next_cursor, mut batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;
            found.append(&mut batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(found)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.conn.clone().lpush(key, value).await?)
    }

    async fn zadd_lt(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        redis::cmd("ZADD")
            .arg(key)
            .arg("LT")
            .arg(score)
            .arg(member)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        Ok(self.conn.clone().expire(key, ttl_secs as i64).await?)
    }

    async fn zrangebyscore(&self, key: &str, min: i64, max: i64) -> Result<Vec<String>, StoreError> {
        Ok(self.conn.clone().zrangebyscore(key, min, max).await?)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        Ok(self.conn.clone().publish(channel, message).await?)
    }

    async fn execute_pipeline(&self, pipeline: Pipeline) -> Result<(), StoreError> {
        if pipeline.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in pipeline.ops() {
            Self::apply_op(&mut pipe, op);
        }
        pipe.query_async(&mut self.conn.clone()).await?;
        Ok(())
    }
}
