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

use thiserror::Error;

/// Mirrors the three exception classes `protocol.py`'s `Connection` used to
/// raise (`ProtocolError`, `ConnectionError`, `socket.error`), named after
/// what the caller needs to decide on: keep polling, or give up and clean
/// up (spec §4.2, §4.5).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),
    #[error("connect to {0} failed: {1}")]
    Connect(String, std::io::Error),
    #[error("proxy dial to {0} via {1} failed: {2}")]
    Proxy(String, String, tokio_socks::Error),
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("wire codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
    #[error("handshake violated protocol: {0}")]
    Protocol(String),
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("peer closed the connection")]
    Closed,
}
