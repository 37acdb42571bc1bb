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

//! Exercises [`CoordinationStore`] through a trait object, confirming the
//! contract is object-safe and that [`MemoryStore`] satisfies it the way a
//! real crawl/ping cycle would use it.

use gossipmap_store::{CoordinationStore, MemoryStore, Pipeline};

fn store() -> Box<dyn CoordinationStore> {
    Box::new(MemoryStore::new())
}

#[tokio::test]
async fn crawl_cycle_handoff_via_trait_object() {
    let store = store();

    // set_pending seeds `pending` from a seed host.
    store.sadd("pending", "('seed.example.com', 8333, 1)").await.unwrap();
    assert_eq!(store.scard("pending").await.unwrap(), 1);

    // task() pops a candidate and, on success, records the node.
    let candidate = store.spop("pending").await.unwrap().unwrap();
    assert_eq!(candidate, "('seed.example.com', 8333, 1)");
    assert_eq!(store.scard("pending").await.unwrap(), 0);

    let pipeline = Pipeline::new()
        .setex("height:seed.example.com-8333-1", 10_800, "600000")
        .setex("version:seed.example.com-8333", 10_800, "(70016, '/gossipmap/', 1)")
        .sadd("pending", "('5.6.7.8', 8333, 9)")
        .set("node:seed.example.com-8333", "")
        .sadd("up", "node:seed.example.com-8333-1");
    store.execute_pipeline(pipeline).await.unwrap();

    assert!(store.exists("node:seed.example.com-8333").await.unwrap());
    assert!(store.sismember("up", "node:seed.example.com-8333-1").await.unwrap());
    assert_eq!(store.scard("pending").await.unwrap(), 1);
}

#[tokio::test]
async fn restart_snapshots_up_into_pending_and_publishes() {
    let store = store();
    store.sadd("up", "node:1.2.3.4-8333-9").await.unwrap();
    store.sadd("up", "node:5.6.7.8-8333-9").await.unwrap();

    let nodes = store.smembers("up").await.unwrap();
    assert_eq!(nodes.len(), 2);
    store.delete("up").await.unwrap();
    for node in &nodes {
        let rest = node.strip_prefix("node:").unwrap();
        let mut parts = rest.rsplitn(2, '-');
        let services = parts.next().unwrap();
        let host_port = parts.next().unwrap();
        store.sadd("pending", &format!("({host_port}, {services})")).await.unwrap();
    }
    assert_eq!(store.scard("pending").await.unwrap(), 2);
    assert!(!store.exists("up").await.unwrap());

    store.publish("snapshot:f9beb4d9", "1700000000").await.unwrap();
}

#[tokio::test]
async fn pinger_keepalive_inventory_uses_lt_scored_zset() {
    let store = store();
    store.zadd_lt("binv:00112233", "1.2.3.4-8333", 1_700_000_100).await.unwrap();
    store.expire("binv:00112233", 600).await.unwrap();
    store.zadd_lt("binv:00112233", "1.2.3.4-8333", 1_700_000_050).await.unwrap();

    let members = store.zrangebyscore("binv:00112233", 0, 1_700_000_060).await.unwrap();
    assert_eq!(members, vec!["1.2.3.4-8333".to_string()]);
}

#[tokio::test]
async fn cidr_limit_counter_rolls_back_on_decr() {
    let store = store();
    let key = "ping:cidr:2001:db8::/64";
    let count = store.incr(key).await.unwrap();
    assert_eq!(count, 1);
    let rolled_back = store.decr(key).await.unwrap();
    assert_eq!(rolled_back, 0);
}
