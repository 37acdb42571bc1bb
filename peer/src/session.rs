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

//! One peer connection: dial, handshake, and a small inbound mailbox that
//! `getaddr`/`get_messages`/the pinger's keepalive loop all read from
//! without blocking on the socket (spec §4.2).

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bitcoin::p2p::address::Address as WireAddress;
use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_network::VersionMessage;
use bitcoin::p2p::ServiceFlags;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tokio_socks::TargetAddr;
use tokio_util::codec::Framed;

use crate::codec::BitcoinCodec;
use crate::error::SessionError;
use crate::transport::Transport;

/// The handshake result: what spec §4.3/§4.5 stash as `version:*`/`height:*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    pub protocol_version: u32,
    pub user_agent: String,
    pub services: u64,
    pub height: i32,
}

/// Parameters for the version message `handshake()` sends — one field per
/// `[crawl]`/`[ping]` option the original `Connection` constructor takes.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub protocol_version: u32,
    pub services: u64,
    pub user_agent: String,
    pub relay: bool,
    pub start_height: i32,
}

enum InboundEvent {
    Message(NetworkMessage),
    Closed,
}

/// A live connection to one peer: a split write half plus a background
/// task draining the read half into a bounded mailbox, the same "spawn a
/// task to own one I/O object" shape the teacher uses for
/// `tokio_postgres`'s `connection` future in `storage.rs`.
pub struct PeerSession {
    to_host: String,
    to_port: u16,
    local_port: u16,
    sink: SplitSink<Framed<Transport, BitcoinCodec>, NetworkMessage>,
    inbound: mpsc::Receiver<InboundEvent>,
    reader: JoinHandle<()>,
    socket_timeout: Duration,
    closed: bool,
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn wire_address(ip: Option<IpAddr>, port: u16, services: ServiceFlags) -> WireAddress {
    let ip = ip.unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED));
    WireAddress::new(&SocketAddr::new(ip, port), services)
}

impl PeerSession {
    /// Dials `host:port`, directly or through `proxy` (a SOCKS5 address,
    /// used for `.onion` targets — spec §4.2 step 3/§4.5 step 3).
    /// `source_address`, when set, binds the outgoing direct socket the way
    /// `crawl.py`/`ping.py` pass `(CONF['source_address'], 0)` as the local
    /// endpoint.
    pub async fn open(
        host: &str,
        port: u16,
        source_address: Option<IpAddr>,
        proxy: Option<SocketAddr>,
        socket_timeout: Duration,
        magic_number: [u8; 4],
    ) -> Result<Self, SessionError> {
        let peer_label = format!("{host}:{port}");

        let transport = match proxy {
            Some(proxy_addr) => {
                let target = TargetAddr::Domain(host.to_string().into(), port);
                let stream = timeout(socket_timeout, Socks5Stream::connect(proxy_addr, target))
                    .await
                    .map_err(|_| SessionError::ConnectTimeout(peer_label.clone()))?
                    .map_err(|err| SessionError::Proxy(peer_label.clone(), proxy_addr.to_string(), err))?;
                Transport::Proxied(stream)
            }
            None => {
                let ip: IpAddr = host.parse().map_err(|_| {
                    SessionError::Connect(peer_label.clone(), std::io::Error::new(std::io::ErrorKind::InvalidInput, "host is not a dialable IP"))
                })?;
                let socket = if ip.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() }
                    .map_err(|err| SessionError::Connect(peer_label.clone(), err))?;
                if let Some(src) = source_address {
                    socket.bind(SocketAddr::new(src, 0)).map_err(|err| SessionError::Connect(peer_label.clone(), err))?;
                }
                let stream = timeout(socket_timeout, socket.connect(SocketAddr::new(ip, port)))
                    .await
                    .map_err(|_| SessionError::ConnectTimeout(peer_label.clone()))?
                    .map_err(|err| SessionError::Connect(peer_label.clone(), err))?;
                Transport::Direct(stream)
            }
        };

        let local_port = transport.local_port().map_err(|err| SessionError::Connect(peer_label.clone(), err))?;

        let framed = Framed::new(transport, BitcoinCodec::new(magic_number));
        let (sink, mut stream) = framed.split();
        let (tx, rx) = mpsc::channel(256);

        let reader = tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(message)) => {
                        if tx.send(InboundEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(_)) | None => {
                        let _ = tx.send(InboundEvent::Closed).await;
                        break;
                    }
                }
            }
        });

        Ok(Self {
            to_host: host.to_string(),
            to_port: port,
            local_port,
            sink,
            inbound: rx,
            reader,
            socket_timeout,
            closed: false,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn peer(&self) -> (&str, u16) {
        (&self.to_host, self.to_port)
    }

    async fn send(&mut self, message: NetworkMessage) -> Result<(), SessionError> {
        timeout(self.socket_timeout, self.sink.send(message))
            .await
            .map_err(|_| SessionError::HandshakeTimeout)?
            .map_err(SessionError::from)
    }

    /// Sends our version message, then waits for the peer's version and
    /// verack (in either order — Bitcoin Core itself doesn't fix one), up
    /// to `socket_timeout`.
    pub async fn handshake(&mut self, conf: &HandshakeConfig) -> Result<HandshakeInfo, SessionError> {
        let receiver = wire_address(self.to_host.parse().ok(), self.to_port, ServiceFlags::NONE);
        let sender = wire_address(None, 0, ServiceFlags::from(conf.services));
        let nonce: u64 = rand::random();

        let mut version_msg = VersionMessage::new(
            ServiceFlags::from(conf.services),
            now_unix(),
            receiver,
            sender,
            nonce,
            conf.user_agent.clone(),
            conf.start_height,
        );
        version_msg.version = conf.protocol_version;
        version_msg.relay = conf.relay;

        self.send(NetworkMessage::Version(version_msg)).await?;

        let deadline = Instant::now() + self.socket_timeout;
        let mut info = None;
        let mut verack_sent = false;
        let mut verack_received = false;

        loop {
            if info.is_some() && verack_received {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SessionError::HandshakeTimeout);
            }
            let event = timeout(remaining, self.inbound.recv()).await.map_err(|_| SessionError::HandshakeTimeout)?;
            match event {
                Some(InboundEvent::Message(NetworkMessage::Version(peer_version))) => {
                    info = Some(HandshakeInfo {
                        protocol_version: peer_version.version,
                        user_agent: peer_version.user_agent.clone(),
                        services: peer_version.services.to_u64(),
                        height: peer_version.start_height,
                    });
                    if !verack_sent {
                        self.send(NetworkMessage::Verack).await?;
                        verack_sent = true;
                    }
                }
                Some(InboundEvent::Message(NetworkMessage::Verack)) => {
                    verack_received = true;
                }
                Some(InboundEvent::Message(_)) => {
                    // Peers may interleave other traffic during the
                    // handshake; only version/verack matter here.
                }
                Some(InboundEvent::Closed) | None => {
                    self.closed = true;
                    return Err(SessionError::Closed);
                }
            }
        }

        info.ok_or_else(|| SessionError::Protocol("handshake completed without a version message".into()))
    }

    /// Fire-and-forget address request (spec §4.2 `getaddr(block=false)`).
    pub async fn getaddr(&mut self) -> Result<(), SessionError> {
        self.send(NetworkMessage::GetAddr).await
    }

    pub async fn ping(&mut self, nonce: u64) -> Result<(), SessionError> {
        self.send(NetworkMessage::Ping(nonce)).await
    }

    /// Drains whatever is already buffered in the inbound mailbox, filtered
    /// by `commands` (`NetworkMessage::cmd()` names); an empty filter
    /// returns everything. Never performs a socket read itself.
    pub fn get_messages(&mut self, commands: &[&str]) -> Vec<NetworkMessage> {
        let mut out = Vec::new();
        loop {
            match self.inbound.try_recv() {
                Ok(InboundEvent::Message(message)) => {
                    if commands.is_empty() || commands.contains(&message.cmd()) {
                        out.push(message);
                    }
                }
                Ok(InboundEvent::Closed) => {
                    self.closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        out
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Idempotent: aborts the reader task and drops the write half.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reader.abort();
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.close();
    }
}
