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

//! Typed client facade over the coordination store: set/counter/sorted-set
//! primitives, a batched [`Pipeline`], and two implementations — a real
//! `redis` client and an in-process double for tests (spec §4.7).

mod coordination;
mod error;
mod memory_store;
mod pipeline;
mod redis_store;

pub use coordination::CoordinationStore;
pub use error::StoreError;
pub use memory_store::MemoryStore;
pub use pipeline::{Pipeline, PipelineOp};
pub use redis_store::RedisStore;
