//! Process-wide peer registries (RFC 4271 Section 6.8 collision detection
//! relies on both directions being able to find each other).
//!
//! Two registries exist, one for outbound `Session`s and one for inbound
//! `Listener` handlers, both keyed by `(server id, peer host)`. Insertion is
//! unique-key: a duplicate register is a programming error in the driver,
//! surfaced as `Err` rather than silently overwriting the existing peer.

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::fsm::State;

/// Key identifying a peer within a server: the server's own identity plus
/// the peer's configured host. A process may run more than one `bgpd`
/// server instance, hence the first component.
pub type PeerKey = (u32, Ipv4Addr);

/// A handle another task can use to read this peer's current FSM state and
/// to deliver an `ErrorOpenCollisionDump` event into its event loop, without
/// taking ownership of the `Fsm` itself.
#[derive(Clone)]
pub struct PeerHandle {
    state: Arc<Mutex<State>>,
    collision_dump: mpsc::Sender<()>,
}

impl PeerHandle {
    #[must_use]
    pub fn new(state: Arc<Mutex<State>>, collision_dump: mpsc::Sender<()>) -> Self {
        Self {
            state,
            collision_dump,
        }
    }

    pub async fn current_state(&self) -> State {
        *self.state.lock().await
    }

    /// Deliver `ErrorOpenCollisionDump` to the owning driver's event loop.
    /// Returns `Err` if the driver has already shut down, which the caller
    /// treats as "no collision after all".
    pub async fn dump(&self) -> Result<(), mpsc::error::SendError<()>> {
        self.collision_dump.send(()).await
    }
}

/// A keyed registry with unique-insert semantics.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<Mutex<HashMap<PeerKey, PeerHandle>>>,
}

#[derive(Debug, thiserror::Error)]
#[error("peer already registered")]
pub struct AlreadyRegistered;

impl PeerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, key: PeerKey, handle: PeerHandle) -> Result<(), AlreadyRegistered> {
        let mut map = self.inner.lock().await;
        if map.contains_key(&key) {
            return Err(AlreadyRegistered);
        }
        map.insert(key, handle);
        Ok(())
    }

    pub async fn deregister(&self, key: &PeerKey) {
        self.inner.lock().await.remove(key);
    }

    pub async fn get(&self, key: &PeerKey) -> Option<PeerHandle> {
        self.inner.lock().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_register_fails() {
        let registry = PeerRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let handle = PeerHandle::new(Arc::new(Mutex::new(State::Idle)), tx);
        let key = (65000, "172.16.1.4".parse().unwrap());
        registry.register(key, handle.clone()).await.unwrap();
        assert!(registry.register(key, handle).await.is_err());
    }

    #[tokio::test]
    async fn test_deregister_then_lookup_misses() {
        let registry = PeerRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let handle = PeerHandle::new(Arc::new(Mutex::new(State::Idle)), tx);
        let key = (65000, "172.16.1.4".parse().unwrap());
        registry.register(key, handle).await.unwrap();
        registry.deregister(&key).await;
        assert!(registry.get(&key).await.is_none());
    }
}
