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

//! Crawl-cycle tunables that aren't exposed through configuration because
//! they are structural rather than deployment-specific (spec §4.3/§4.5).

/// Anti-flood cutoff: an `addr`/`addrv2` batch larger than this is rejected
/// wholesale rather than truncated (spec §4.3).
pub const MAX_RAW_ADDR_BATCH: usize = 1000;

/// Interval between `0.3s` polls while waiting on a `getaddr` reply (spec
/// §4.3's "0.3 s each").
pub const ADDR_POLL_INTERVAL_MS: u64 = 300;

/// Keepalive loop tick (spec §4.5/§5; a cooperative poll in the original,
/// a `tokio::select!` tick here, see SPEC_FULL.md §4.5).
pub const KEEPALIVE_TICK_MS: u64 = 100;

/// Default ping cadence absent an explicit override (spec §4.5).
pub const DEFAULT_PING_DELAY_SECS: u64 = 30;

/// Sleep between `pending`-pop retries when the set is momentarily empty
/// (spec §4.3 step 2).
pub const EMPTY_PENDING_BACKOFF_SECS: u64 = 1;
