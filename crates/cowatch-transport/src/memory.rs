//! In-process channel pair backed by tokio unbounded channels.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, Mutex};

use crate::{ConnectionId, MessageChannel, TransportError};

/// One end of an in-memory [`MessageChannel`] pair.
///
/// Whatever one end sends, the other end receives, in order. Closing
/// either end makes the peer's `recv` return `Ok(None)` once the
/// already-queued messages are drained.
pub struct MemoryChannel {
    id: ConnectionId,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryChannel {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the next queued message without waiting.
    ///
    /// `None` means nothing is queued right now (or the peer is gone).
    pub async fn try_recv(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.try_recv().ok()
    }

    /// Returns `true` once [`close`](MessageChannel::close) was called on this end.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl MessageChannel for MemoryChannel {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("channel closed locally".into())
        })?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        // Dropping our sender ends the peer's receive stream.
        self.tx.lock().await.take();
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (a, b) = MemoryChannel::pair();
        a.send(b"one").await.unwrap();
        a.send(b"two").await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), b"one");
        assert_eq!(b.recv().await.unwrap().unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = MemoryChannel::pair();
        a.send(b"last").await.unwrap();
        a.close().await.unwrap();

        assert!(a.is_closed());
        assert_eq!(b.recv().await.unwrap().unwrap(), b"last");
        assert!(b.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = MemoryChannel::pair();
        a.close().await.unwrap();

        let result = a.send(b"late").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_try_recv_empty_returns_none() {
        let (_a, b) = MemoryChannel::pair();
        assert!(b.try_recv().await.is_none());
    }

    #[test]
    fn test_pair_ends_have_distinct_ids() {
        let (a, b) = MemoryChannel::pair();
        assert_ne!(a.id(), b.id());
    }
}
