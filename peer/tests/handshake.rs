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

//! Drives a [`PeerSession`] against a bare-bones in-process peer that
//! speaks the wire protocol directly through [`BitcoinCodec`], the way
//! `test_connect_success` in the bitcoin-handshake reference exercises
//! `connect()` against a local `TcpListener`.

use std::time::Duration;

use bitcoin::p2p::address::Address as WireAddress;
use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_network::VersionMessage;
use bitcoin::p2p::ServiceFlags;
use futures::{SinkExt, StreamExt};
use gossipmap_peer::{BitcoinCodec, HandshakeConfig, PeerSession};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

const MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

fn stub_version(height: i32) -> VersionMessage {
    let addr = WireAddress::new(&"0.0.0.0:0".parse().unwrap(), ServiceFlags::NONE);
    let mut msg = VersionMessage::new(ServiceFlags::NETWORK, 0, addr.clone(), addr, 1, "/stub:1.0/".to_string(), height);
    msg.version = 70016;
    msg
}

#[tokio::test]
async fn handshake_completes_against_a_cooperative_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, BitcoinCodec::new(MAGIC));

        match framed.next().await.unwrap().unwrap() {
            NetworkMessage::Version(_) => {}
            other => panic!("expected version, got {other:?}"),
        }
        framed.send(NetworkMessage::Version(stub_version(600_000))).await.unwrap();
        framed.send(NetworkMessage::Verack).await.unwrap();

        match framed.next().await.unwrap().unwrap() {
            NetworkMessage::Verack => {}
            other => panic!("expected verack, got {other:?}"),
        }
    });

    let mut session = PeerSession::open(
        &server_addr.ip().to_string(),
        server_addr.port(),
        None,
        None,
        Duration::from_secs(5),
        MAGIC,
    )
    .await
    .unwrap();

    let info = session
        .handshake(&HandshakeConfig {
            protocol_version: 70016,
            services: 9,
            user_agent: "/gossipmap:0.1.0/".to_string(),
            relay: false,
            start_height: 0,
        })
        .await
        .unwrap();

    assert_eq!(info.protocol_version, 70016);
    assert_eq!(info.user_agent, "/stub:1.0/");
    assert_eq!(info.height, 600_000);

    server.await.unwrap();
}

#[tokio::test]
async fn get_messages_drains_without_blocking_and_filters_by_command() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, BitcoinCodec::new(MAGIC));
        framed.next().await.unwrap().unwrap(); // version
        framed.send(NetworkMessage::Version(stub_version(1))).await.unwrap();
        framed.send(NetworkMessage::Verack).await.unwrap();
        framed.next().await.unwrap().unwrap(); // verack

        framed.next().await.unwrap().unwrap(); // getaddr
        framed.send(NetworkMessage::GetAddr).await.unwrap();
        framed.send(NetworkMessage::Ping(42)).await.unwrap();
        // Keep the connection open briefly so the client's reader task has
        // time to drain both messages into its mailbox.
        tokio::time::sleep(Duration::from_millis(50)).await;
    });

    let mut session = PeerSession::open(
        &server_addr.ip().to_string(),
        server_addr.port(),
        None,
        None,
        Duration::from_secs(5),
        MAGIC,
    )
    .await
    .unwrap();
    session
        .handshake(&HandshakeConfig { protocol_version: 70016, services: 9, user_agent: "/gossipmap/".into(), relay: false, start_height: 0 })
        .await
        .unwrap();
    session.getaddr().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let addr_only = session.get_messages(&["getaddr"]);
    assert_eq!(addr_only.len(), 1);
    assert!(matches!(addr_only[0], NetworkMessage::GetAddr));

    let rest = session.get_messages(&[]);
    assert_eq!(rest.len(), 1);
    assert!(matches!(rest[0], NetworkMessage::Ping(42)));

    server.await.unwrap();
}
