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

/// The `to_services` a handshake advertises wanting from the peer. The
/// original crawler connects regardless of a candidate's advertised
/// services (it overrides the cached value with this constant — see
/// `crawl.py::connect`'s commented-out `to_services=services`), so we ask
/// for none in particular.
pub const TO_SERVICES: u64 = 0;
