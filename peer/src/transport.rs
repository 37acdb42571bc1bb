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

//! Unifies a direct TCP dial and a SOCKS5-proxied dial (for `.onion`
//! targets, spec §4.2 step 3) behind one `AsyncRead + AsyncWrite` type so
//! [`crate::codec::BitcoinCodec`] can be framed over either.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

pub enum Transport {
    Direct(TcpStream),
    Proxied(Socks5Stream<TcpStream>),
}

impl Transport {
    pub fn local_port(&self) -> io::Result<u16> {
        let addr = match self {
            Transport::Direct(stream) => stream.local_addr()?,
            Transport::Proxied(stream) => stream.get_ref().local_addr()?,
        };
        Ok(addr.port())
    }
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Direct(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Proxied(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Direct(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Proxied(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Direct(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Proxied(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Direct(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Proxied(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
