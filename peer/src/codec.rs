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

//! Frames the Bitcoin P2P wire format (24-byte header: 4 magic + 12 command
//! + 4 length + 4 checksum, followed by `length` bytes of payload) on top of
//! a `bitcoin::consensus` codec, the way `MessageCodec` in the teacher's
//! `node/messages/src/helpers/codec.rs` frames its own wire format over
//! `tokio_util::codec`. We hold our own header parsing (rather than
//! `LengthDelimitedCodec`) because the length field isn't at a fixed byte
//! offset the generic codec understands, and because `RawNetworkMessage`
//! already validates the checksum for us.

use bitcoin::consensus::encode;
use bitcoin::p2p::message::{NetworkMessage, RawNetworkMessage};
use bitcoin::p2p::Magic;
use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

const HEADER_LEN: usize = 24;
const LENGTH_OFFSET: usize = 16;

/// Bitcoin Core rejects messages whose payload exceeds 32 MiB; we use the
/// same ceiling so a peer can't make us buffer an unbounded frame.
const MAX_PAYLOAD_LEN: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("declared payload length {0} exceeds the maximum of {MAX_PAYLOAD_LEN}")]
    TooLarge(usize),
    #[error("malformed wire message: {0}")]
    Malformed(String),
}

pub struct BitcoinCodec {
    magic: Magic,
}

impl BitcoinCodec {
    pub fn new(magic_number: [u8; 4]) -> Self {
        Self { magic: Magic::from_bytes(magic_number) }
    }
}

impl Decoder for BitcoinCodec {
    type Item = NetworkMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&src[LENGTH_OFFSET..LENGTH_OFFSET + 4]);
        let payload_len = u32::from_le_bytes(len_bytes) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(CodecError::TooLarge(payload_len));
        }

        let frame_len = HEADER_LEN + payload_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        let raw: RawNetworkMessage = encode::deserialize(&frame).map_err(|err| CodecError::Malformed(err.to_string()))?;
        Ok(Some(raw.payload().clone()))
    }
}

impl Encoder<NetworkMessage> for BitcoinCodec {
    type Error = CodecError;

    fn encode(&mut self, item: NetworkMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let raw = RawNetworkMessage::new(self.magic, item);
        let bytes = encode::serialize(&raw);
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_getaddr_through_the_codec() {
        let mut codec = BitcoinCodec::new([0xf9, 0xbe, 0xb4, 0xd9]);
        let mut buf = BytesMut::new();
        codec.encode(NetworkMessage::GetAddr, &mut buf).unwrap();

        // A short prefix isn't a complete frame yet.
        let mut partial = buf.split_to(HEADER_LEN - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut whole = BytesMut::new();
        whole.extend_from_slice(&partial);
        whole.extend_from_slice(&buf);
        let decoded = codec.decode(&mut whole).unwrap().unwrap();
        assert!(matches!(decoded, NetworkMessage::GetAddr));
        assert!(whole.is_empty());
    }

    #[test]
    fn rejects_oversized_declared_length() {
        let mut codec = BitcoinCodec::new([0xf9, 0xbe, 0xb4, 0xd9]);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0u8; HEADER_LEN]);
        buf[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&(MAX_PAYLOAD_LEN as u32 + 1).to_le_bytes());
        assert!(matches!(codec.decode(&mut buf), Err(CodecError::TooLarge(_))));
    }
}
