//! Remote-query hook and response collection.
//!
//! A store that wants cluster-wide results is handed a [`QueryHook`]. Each
//! call broadcasts one encoded query and returns an [`Awaiter`] that yields
//! whatever peers answered before the gather timeout. Peers that never answer
//! simply contribute nothing.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster unavailable: {0}")]
    Unavailable(String),
    #[error("no peers to query")]
    NoPeers,
}

/// Collects responses for one broadcast query.
pub trait Awaiter: Send {
    /// Resolve with every response received within `timeout`. Late responses
    /// are discarded.
    fn gather(&mut self, timeout: Duration) -> Pin<Box<dyn Future<Output = Vec<Bytes>> + Send + '_>>;
}

/// Broadcasts a named query to the peers of this node.
pub trait QueryHook: Send + Sync {
    fn query(&self, name: &str, payload: &[u8]) -> Result<Box<dyn Awaiter>, ClusterError>;
}

impl<F> QueryHook for F
where
    F: Fn(&str, &[u8]) -> Result<Box<dyn Awaiter>, ClusterError> + Send + Sync,
{
    fn query(&self, name: &str, payload: &[u8]) -> Result<Box<dyn Awaiter>, ClusterError> {
        self(name, payload)
    }
}

/// Awaiter fed through an unbounded channel.
///
/// `gather` returns early once `expected` responses arrived or every
/// [`ResponseSender`] was dropped.
pub struct ChannelAwaiter {
    rx: mpsc::UnboundedReceiver<Bytes>,
    expected: Option<usize>,
}

/// Sending half of a [`ChannelAwaiter`]; clone one per peer.
#[derive(Clone)]
pub struct ResponseSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ResponseSender {
    /// Deliver one response. Returns false once the awaiter is gone.
    pub fn send(&self, response: impl Into<Bytes>) -> bool {
        self.tx.send(response.into()).is_ok()
    }
}

impl ChannelAwaiter {
    /// `expected` of `None` waits for the timeout or for all senders to drop.
    pub fn new(expected: Option<usize>) -> (Self, ResponseSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx, expected }, ResponseSender { tx })
    }
}

impl Awaiter for ChannelAwaiter {
    fn gather(&mut self, timeout: Duration) -> Pin<Box<dyn Future<Output = Vec<Bytes>> + Send + '_>> {
        Box::pin(async move {
            let deadline = deadline_after(timeout);
            let mut responses = Vec::new();
            loop {
                if self.expected.is_some_and(|n| responses.len() >= n) {
                    break;
                }
                match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                    Ok(Some(response)) => responses.push(response),
                    Ok(None) => break,
                    Err(_) => {
                        tracing::debug!(
                            received = responses.len(),
                            expected = ?self.expected,
                            "gather timed out"
                        );
                        break;
                    }
                }
            }
            self.rx.close();
            responses
        })
    }
}

/// `now + timeout`, clamped to roughly thirty years ahead on overflow.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}
