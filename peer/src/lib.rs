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

//! Bitcoin P2P wire session: dial, handshake, and message harvest for one
//! peer (spec §4.2), built on `bitcoin::p2p::message` rather than a
//! hand-rolled wire format.

pub mod codec;
mod error;
mod gossip;
mod session;
mod transport;

pub use codec::{BitcoinCodec, CodecError};
pub use error::SessionError;
pub use gossip::{addr_entries, GossipEntry};
pub use session::{HandshakeConfig, HandshakeInfo, PeerSession};
pub use transport::Transport;
