//! `Transport` collaborator — the control channel the core exchanges opaque
//! byte blobs over. Framing, reliability, and per-sender ordering (spec §5)
//! are the transport's responsibility; the core only needs send/recv.

use crate::error::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A 16-byte opaque participant identifier, re-exported here so transport
/// implementations don't need to depend on `acip-protocol`.
pub type PeerId = [u8; 16];

/// Control-channel transport consumed by every session context.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Send a message to `peer`. Messages to a single peer are delivered in
    /// order; delivery across different senders is unordered (spec §5).
    async fn send(&self, peer: PeerId, bytes: Vec<u8>) -> Result<()>;

    /// Receive the next inbound `(sender, bytes)` pair, suspending until one
    /// arrives.
    async fn recv(&self) -> Result<(PeerId, Vec<u8>)>;
}

/// An in-process transport backed by `mpsc` channels, used by integration
/// tests to exercise full multi-context scenarios without real sockets.
///
/// Mirrors the per-peer channel pattern the teacher's relay room manager
/// uses for fan-out (`tallow-relay::room::RoomManager`), generalized to a
/// full mesh of named peers instead of a single pairing.
pub struct InMemoryTransport {
    self_id: PeerId,
    peers: Arc<std::collections::HashMap<PeerId, mpsc::Sender<(PeerId, Vec<u8>)>>>,
    inbox: Mutex<mpsc::Receiver<(PeerId, Vec<u8>)>>,
}

impl InMemoryTransport {
    /// Build a fully-connected mesh of `InMemoryTransport`s, one per id in
    /// `ids`, each able to send to every other.
    pub fn mesh(ids: &[PeerId]) -> Vec<Arc<Self>> {
        let mut senders = std::collections::HashMap::new();
        let mut receivers = std::collections::HashMap::new();
        for &id in ids {
            let (tx, rx) = mpsc::channel(256);
            senders.insert(id, tx);
            receivers.insert(id, rx);
        }
        let senders = Arc::new(senders);
        ids.iter()
            .map(|&id| {
                let rx = receivers.remove(&id).expect("receiver present for every id");
                Arc::new(Self {
                    self_id: id,
                    peers: senders.clone(),
                    inbox: Mutex::new(rx),
                })
            })
            .collect()
    }

    /// This transport's own id, for convenience in tests.
    pub fn self_id(&self) -> PeerId {
        self.self_id
    }
}

impl Transport for InMemoryTransport {
    async fn send(&self, peer: PeerId, bytes: Vec<u8>) -> Result<()> {
        let sender = self
            .peers
            .get(&peer)
            .ok_or_else(|| crate::error::ErrorKind::InvalidParam("unknown peer".into()))?;
        sender
            .send((self.self_id, bytes))
            .await
            .map_err(|_| crate::error::ErrorKind::Io("peer channel closed".into()))
    }

    async fn recv(&self) -> Result<(PeerId, Vec<u8>)> {
        let mut inbox = self.inbox.lock().await;
        inbox
            .recv()
            .await
            .ok_or_else(|| crate::error::ErrorKind::Io("inbox closed".into()))
    }
}
