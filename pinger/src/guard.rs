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

//! RAII cleanup for one pinger session (spec §4.5 step 6, §5 "all resource
//! releases ... must occur on every exit path"). `release()` is the normal
//! exit path, awaited so the caller observes the cleanup before logging;
//! `Drop` is the safety net for early `?` returns and panics, where
//! awaiting isn't possible, so it hands the same teardown to a detached
//! task instead.

use std::sync::Arc;

use gossipmap_store::{CoordinationStore, Pipeline, StoreError};

pub struct SessionGuard {
    store: Arc<dyn CoordinationStore>,
    cidr_key: Option<String>,
    open_member: String,
    opendata_member: Option<String>,
    released: bool,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn CoordinationStore>, cidr_key: Option<String>, open_member: String) -> Self {
        Self { store, cidr_key, open_member, opendata_member: None, released: false }
    }

    /// Records the `opendata` member currently inserted, so a later
    /// `set_opendata` (re-version) or the final teardown knows what to
    /// `srem`.
    pub fn set_opendata(&mut self, member: String) {
        self.opendata_member = Some(member);
    }

    /// Normal-path teardown: `srem` from `open`/`opendata` in one batch,
    /// then decrement the prefix counter if one was incremented.
    pub async fn release(mut self) -> Result<(), StoreError> {
        self.teardown().await
    }

    async fn teardown(&mut self) -> Result<(), StoreError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut pipeline = Pipeline::new().srem("open", self.open_member.clone());
        if let Some(member) = self.opendata_member.take() {
            pipeline = pipeline.srem("opendata", member);
        }
        self.store.execute_pipeline(pipeline).await?;

        if let Some(cidr_key) = &self.cidr_key {
            self.store.decr(cidr_key).await?;
        }
        Ok(())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let store = self.store.clone();
        let open_member = std::mem::take(&mut self.open_member);
        let opendata_member = self.opendata_member.take();
        let cidr_key = self.cidr_key.take();

        tokio::spawn(async move {
            let mut pipeline = Pipeline::new().srem("open", open_member);
            if let Some(member) = opendata_member {
                pipeline = pipeline.srem("opendata", member);
            }
            let _ = store.execute_pipeline(pipeline).await;
            if let Some(cidr_key) = cidr_key {
                let _ = store.decr(&cidr_key).await;
            }
        });
    }
}
