//! Dispatch of inbound cluster requests to local handlers.

use parking_lot::RwLock;
use std::sync::Arc;

/// Answers named requests sent by peers.
pub trait RequestHandler: Send + Sync {
    /// Return the encoded response, or `None` if the request is not for this
    /// handler or could not be served.
    fn on_request(&self, name: &str, payload: &[u8]) -> Option<Vec<u8>>;
}

/// Registry of request handlers, tried in registration order.
#[derive(Default)]
pub struct RequestRouter {
    handlers: RwLock<Vec<Arc<dyn RequestHandler>>>,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn RequestHandler>) {
        self.handlers.write().push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// First handler response for `name`, if any.
    pub fn dispatch(&self, name: &str, payload: &[u8]) -> Option<Vec<u8>> {
        let handlers = self.handlers.read().clone();
        let response = handlers
            .iter()
            .find_map(|handler| handler.on_request(name, payload));
        if response.is_none() {
            tracing::trace!(name, len = payload.len(), "no handler answered request");
        }
        response
    }
}

impl RequestHandler for RequestRouter {
    fn on_request(&self, name: &str, payload: &[u8]) -> Option<Vec<u8>> {
        self.dispatch(name, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    impl RequestHandler for Echo {
        fn on_request(&self, name: &str, payload: &[u8]) -> Option<Vec<u8>> {
            (name == self.0).then(|| payload.to_vec())
        }
    }

    #[test]
    fn dispatches_by_name() {
        let router = RequestRouter::new();
        assert!(router.is_empty());
        router.register(Arc::new(Echo("a")));
        router.register(Arc::new(Echo("b")));
        assert_eq!(router.len(), 2);
        assert_eq!(router.dispatch("b", b"x"), Some(b"x".to_vec()));
        assert_eq!(router.dispatch("c", b"x"), None);
    }
}
