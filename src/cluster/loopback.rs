//! In-process transport connecting stores as if they were cluster peers.
//!
//! Each registered peer answers through its [`RequestHandler`] on its own
//! task, optionally after a fixed delay, so gather timeouts and slow peers
//! can be exercised without a network.

use super::awaiter::{Awaiter, ChannelAwaiter, ClusterError, QueryHook};
use super::router::RequestHandler;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Clone)]
struct Peer {
    handler: Arc<dyn RequestHandler>,
    delay: Duration,
}

#[derive(Default)]
pub struct LoopbackTransport {
    peers: RwLock<Vec<Peer>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&self, handler: Arc<dyn RequestHandler>) {
        self.add_delayed_peer(handler, Duration::ZERO);
    }

    /// Register a peer that answers only after `delay`.
    pub fn add_delayed_peer(&self, handler: Arc<dyn RequestHandler>, delay: Duration) {
        self.peers.write().push(Peer { handler, delay });
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }
}

impl QueryHook for LoopbackTransport {
    fn query(&self, name: &str, payload: &[u8]) -> Result<Box<dyn Awaiter>, ClusterError> {
        let peers = self.peers.read().clone();
        if peers.is_empty() {
            return Err(ClusterError::NoPeers);
        }
        let runtime = Handle::try_current()
            .map_err(|err| ClusterError::Unavailable(format!("no tokio runtime: {err}")))?;
        let (awaiter, sender) = ChannelAwaiter::new(Some(peers.len()));
        let payload: Arc<[u8]> = Arc::from(payload);
        for peer in peers {
            let sender = sender.clone();
            let name = name.to_string();
            let payload = payload.clone();
            runtime.spawn(async move {
                if !peer.delay.is_zero() {
                    tokio::time::sleep(peer.delay).await;
                }
                if let Some(response) = peer.handler.on_request(&name, &payload) {
                    if !sender.send(response) {
                        tracing::trace!(name = %name, "peer answered after gather finished");
                    }
                }
            });
        }
        Ok(Box::new(awaiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct Fixed(Option<&'static [u8]>);

    impl RequestHandler for Fixed {
        fn on_request(&self, _name: &str, _payload: &[u8]) -> Option<Vec<u8>> {
            self.0.map(<[u8]>::to_vec)
        }
    }

    #[tokio::test]
    async fn gathers_from_every_peer() {
        let transport = LoopbackTransport::new();
        transport.add_peer(Arc::new(Fixed(Some(b"one"))));
        transport.add_peer(Arc::new(Fixed(None)));
        transport.add_peer(Arc::new(Fixed(Some(b"two"))));
        let mut awaiter = transport.query("memstore", b"q").unwrap();
        let mut responses = awaiter.gather(Duration::from_secs(60)).await;
        responses.sort();
        assert_eq!(responses, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_peer_is_cut_off() {
        let transport = LoopbackTransport::new();
        transport.add_peer(Arc::new(Fixed(Some(b"fast"))));
        transport.add_delayed_peer(Arc::new(Fixed(Some(b"slow"))), Duration::from_secs(5));
        let mut awaiter = transport.query("memstore", b"q").unwrap();
        let responses = awaiter.gather(Duration::from_secs(2)).await;
        assert_eq!(responses, vec![Bytes::from_static(b"fast")]);
    }

    #[test]
    fn no_peers_is_an_error() {
        let transport = LoopbackTransport::new();
        assert!(matches!(
            transport.query("memstore", &[]),
            Err(ClusterError::NoPeers)
        ));
    }
}
