//! The outbound messaging capability.
//!
//! The core never talks to a socket directly; it sends through the
//! [`Messenger`] trait. The gateway registers one mpsc sender per live
//! connection in a [`LineMessenger`]; tests and benches use
//! [`MemoryMessenger`] to record traffic.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::state::UserId;

/// Delivery failures. Non-fatal by contract: callers log and move on.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("recipient not connected: {0}")]
    Unreachable(UserId),

    #[error("send queue full or closed for: {0}")]
    QueueClosed(UserId),
}

/// Capability to deliver a text line to a user.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `text` to `user`. Errors are recoverable.
    async fn send(&self, user: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Routes sends through per-connection outbound queues.
///
/// Connections register a sender at handshake and unregister on
/// disconnect. Sends to an id with no live connection fail with
/// [`DeliveryError::Unreachable`].
#[derive(Debug, Default)]
pub struct LineMessenger {
    senders: DashMap<UserId, mpsc::Sender<String>>,
}

impl LineMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outbound queue for a user's connection.
    ///
    /// A reconnecting user replaces the previous sender; the newest
    /// connection wins.
    pub fn register(&self, user: &str, tx: mpsc::Sender<String>) {
        self.senders.insert(user.to_string(), tx);
    }

    /// Remove a user's outbound queue, but only if `tx` is still the
    /// registered one. Guards against a stale connection unregistering
    /// its replacement.
    pub fn unregister(&self, user: &str, tx: &mpsc::Sender<String>) {
        self.senders
            .remove_if(user, |_, current| current.same_channel(tx));
    }

    /// Whether a user currently has a live connection.
    pub fn is_connected(&self, user: &str) -> bool {
        self.senders.contains_key(user)
    }
}

#[async_trait]
impl Messenger for LineMessenger {
    async fn send(&self, user: &str, text: &str) -> Result<(), DeliveryError> {
        let tx = match self.senders.get(user) {
            Some(entry) => entry.value().clone(),
            None => return Err(DeliveryError::Unreachable(user.to_string())),
        };
        tx.send(text.to_string())
            .await
            .map_err(|_| DeliveryError::QueueClosed(user.to_string()))
    }
}

/// Records every send in memory. For unit tests and benchmarks.
#[derive(Debug, Default)]
pub struct MemoryMessenger {
    sent: parking_lot::Mutex<Vec<(UserId, String)>>,
}

impl MemoryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(recipient, text)` pairs sent so far, in order.
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().clone()
    }

    /// Texts sent to one recipient, in order.
    pub fn sent_to(&self, user: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == user)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Messenger for MemoryMessenger {
    async fn send(&self, user: &str, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().push((user.to_string(), text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn line_messenger_routes_to_registered_queue() {
        let messenger = LineMessenger::new();
        let (tx, mut rx) = mpsc::channel(4);
        messenger.register("alice", tx);

        messenger.send("alice", "hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_to_unknown_user_is_unreachable() {
        let messenger = LineMessenger::new();
        let err = messenger.send("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Unreachable(_)));
    }

    #[tokio::test]
    async fn stale_unregister_keeps_replacement() {
        let messenger = LineMessenger::new();
        let (old_tx, _old_rx) = mpsc::channel(4);
        let (new_tx, mut new_rx) = mpsc::channel(4);

        messenger.register("alice", old_tx.clone());
        messenger.register("alice", new_tx);
        messenger.unregister("alice", &old_tx);

        // The replacement connection must still be routable.
        messenger.send("alice", "still here").await.unwrap();
        assert_eq!(new_rx.recv().await.as_deref(), Some("still here"));
    }

    #[tokio::test]
    async fn memory_messenger_records_in_order() {
        let messenger = MemoryMessenger::new();
        messenger.send("a", "one").await.unwrap();
        messenger.send("b", "two").await.unwrap();
        messenger.send("a", "three").await.unwrap();

        assert_eq!(messenger.sent_to("a"), vec!["one", "three"]);
        assert_eq!(messenger.sent().len(), 3);
    }
}
