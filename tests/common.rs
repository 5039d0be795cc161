//! Common test harness utilities for integration tests.
//!
//! This module provides helpers for:
//! - Building records with the `[0, a, b, c]` SSID layout
//! - Seeding a store with the six-record fixture
//! - Wiring stores together over the loopback transport

// Not all test files use all helpers; silence dead_code warnings for unused exports.
#![allow(dead_code)]

use quantum_retained::cluster::{LoopbackTransport, QueryHook, RequestHandler};
use quantum_retained::config::Options;
use quantum_retained::{InMemory, Message};
use std::sync::Arc;
use std::time::Duration;

/// Record under SSID `[0, a, b, c]` whose payload is `"a,b,c"`.
pub fn test_message(a: u32, b: u32, c: u32, time: u64) -> Message {
    Message::new([0, a, b, c], time, format!("{a},{b},{c}").into_bytes())
}

/// The six records every lookup scenario runs against, at times 1 through 6.
pub const FIXTURE: [(u32, u32, u32); 6] = [
    (1, 1, 1),
    (1, 1, 2),
    (1, 2, 1),
    (1, 2, 2),
    (1, 3, 1),
    (1, 3, 2),
];

pub fn seed(store: &InMemory) {
    for (i, (a, b, c)) in FIXTURE.into_iter().enumerate() {
        store
            .store(test_message(a, b, c, i as u64 + 1))
            .expect("seed fixture");
    }
}

pub fn options(value: serde_json::Value) -> Options {
    serde_json::from_value(value).expect("options object")
}

/// A configured store with the fixture loaded.
pub fn seeded_store() -> InMemory {
    let mut store = InMemory::new(None);
    store.configure(None).expect("default configuration");
    seed(&store);
    store
}

/// Node under test plus the peers it queries.
pub struct Cluster {
    pub node: InMemory,
    pub peers: Vec<Arc<InMemory>>,
    pub transport: Arc<LoopbackTransport>,
}

/// Build a node whose queries fan out to `peers.len()` peer stores, each
/// answering after the paired delay.
pub fn cluster(peer_delays: &[Duration], gather_timeout: Duration) -> Cluster {
    let transport = Arc::new(LoopbackTransport::new());
    let mut peers = Vec::new();
    for delay in peer_delays {
        let mut peer = InMemory::new(None);
        peer.configure(None).expect("peer configuration");
        let peer = Arc::new(peer);
        transport.add_delayed_peer(peer.clone() as Arc<dyn RequestHandler>, *delay);
        peers.push(peer);
    }
    let hook: Arc<dyn QueryHook> = transport.clone();
    let mut node = InMemory::new(Some(hook));
    node.configure(Some(&options(serde_json::json!({
        "timeout": format!("{}ms", gather_timeout.as_millis()),
    }))))
    .expect("node configuration");
    Cluster {
        node,
        peers,
        transport,
    }
}
