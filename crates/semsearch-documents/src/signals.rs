//! Entity mutation notifications.
//!
//! The application owns one [`EntitySignals`] per entity type and calls
//! [`EntitySignals::notify_saved`] / [`EntitySignals::notify_deleted`] after
//! each relational write becomes visible. Handlers run in connection order
//! on the notifying task; the first handler error is returned to the
//! notifier.
//!
//! Handlers are connected under a key. Connecting a key that is already
//! connected is a no-op, so repeated setup cannot double-deliver.

use async_trait::async_trait;
use semsearch_core::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::entity::Entity;

/// The mutation a handler listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// An entity was created or updated.
    Saved,
    /// An entity was deleted.
    Deleted,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved => f.write_str("saved"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// Receiver of entity mutations.
#[async_trait]
pub trait SignalHandler<E: Entity>: Send + Sync {
    /// React to a mutation of `entity`.
    async fn handle(&self, entity: &E) -> Result<()>;
}

type Receivers<E> = Vec<(String, Arc<dyn SignalHandler<E>>)>;

struct Channels<E: Entity> {
    saved: Receivers<E>,
    deleted: Receivers<E>,
}

impl<E: Entity> Channels<E> {
    fn get(&self, kind: SignalKind) -> &Receivers<E> {
        match kind {
            SignalKind::Saved => &self.saved,
            SignalKind::Deleted => &self.deleted,
        }
    }

    fn get_mut(&mut self, kind: SignalKind) -> &mut Receivers<E> {
        match kind {
            SignalKind::Saved => &mut self.saved,
            SignalKind::Deleted => &mut self.deleted,
        }
    }
}

/// Saved/deleted notification channels for one entity type.
///
/// Cloning is cheap; clones share the same receivers.
pub struct EntitySignals<E: Entity> {
    channels: Arc<RwLock<Channels<E>>>,
}

impl<E: Entity> EntitySignals<E> {
    /// Channels with no receivers.
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(Channels {
                saved: Vec::new(),
                deleted: Vec::new(),
            })),
        }
    }

    /// Connect `handler` under `key`.
    ///
    /// Returns `false`, leaving the existing receiver in place, when `key`
    /// is already connected for `kind`.
    pub fn connect(
        &self,
        kind: SignalKind,
        key: impl Into<String>,
        handler: Arc<dyn SignalHandler<E>>,
    ) -> bool {
        let key = key.into();
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let receivers = channels.get_mut(kind);

        if receivers.iter().any(|(k, _)| *k == key) {
            log::warn!("Handler '{key}' already connected to {kind} signal; ignoring");
            return false;
        }
        receivers.push((key, handler));
        true
    }

    /// Disconnect the receiver registered under `key`.
    pub fn disconnect(&self, kind: SignalKind, key: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let receivers = channels.get_mut(kind);
        let before = receivers.len();
        receivers.retain(|(k, _)| k != key);
        receivers.len() != before
    }

    /// Whether a receiver is connected under `key`.
    pub fn is_connected(&self, kind: SignalKind, key: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .iter()
            .any(|(k, _)| k == key)
    }

    /// Number of receivers for `kind`.
    pub fn receiver_count(&self, kind: SignalKind) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .len()
    }

    /// Whether any receiver is connected.
    pub fn has_listeners(&self) -> bool {
        self.receiver_count(SignalKind::Saved) + self.receiver_count(SignalKind::Deleted) > 0
    }

    /// Deliver a save of `entity` to every saved receiver.
    pub async fn notify_saved(&self, entity: &E) -> Result<()> {
        self.notify(SignalKind::Saved, entity).await
    }

    /// Deliver a deletion of `entity` to every deleted receiver.
    pub async fn notify_deleted(&self, entity: &E) -> Result<()> {
        self.notify(SignalKind::Deleted, entity).await
    }

    async fn notify(&self, kind: SignalKind, entity: &E) -> Result<()> {
        // Snapshot so handlers may connect or disconnect while running.
        let receivers: Vec<Arc<dyn SignalHandler<E>>> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in receivers {
            handler.handle(entity).await?;
        }
        Ok(())
    }
}

impl<E: Entity> Clone for EntitySignals<E> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

impl<E: Entity> Default for EntitySignals<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for EntitySignals<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySignals")
            .field("saved", &self.receiver_count(SignalKind::Saved))
            .field("deleted", &self.receiver_count(SignalKind::Deleted))
            .finish()
    }
}

/// Handle to a set of connected receivers.
///
/// Dropping the handle leaves the receivers connected; call
/// [`Subscription::disconnect`] to remove them.
pub struct Subscription<E: Entity> {
    signals: EntitySignals<E>,
    entries: Vec<(SignalKind, String)>,
    connected: AtomicBool,
}

impl<E: Entity> Subscription<E> {
    /// Track receivers already connected on `signals`.
    pub fn new(signals: EntitySignals<E>, entries: Vec<(SignalKind, String)>) -> Self {
        Self {
            signals,
            entries,
            connected: AtomicBool::new(true),
        }
    }

    /// The (kind, key) pairs this subscription owns.
    pub fn entries(&self) -> &[(SignalKind, String)] {
        &self.entries
    }

    /// Whether `disconnect` has not been called yet.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Remove every owned receiver. Returns how many were removed; later
    /// calls remove nothing.
    pub fn disconnect(&self) -> usize {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return 0;
        }
        self.entries
            .iter()
            .filter(|(kind, key)| self.signals.disconnect(*kind, key))
            .count()
    }
}

impl<E: Entity> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("entries", &self.entries)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySchema;
    use semsearch_core::Error;
    use semsearch_vector::{DocumentId, FieldValue};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Note {
        id: i64,
    }

    impl Entity for Note {
        fn schema() -> EntitySchema {
            EntitySchema::new("Note")
        }

        fn id(&self) -> Option<DocumentId> {
            Some(DocumentId::Int(self.id))
        }

        fn field(&self, _name: &str) -> Option<FieldValue> {
            None
        }
    }

    /// Records the ids it sees, tagged with its own label.
    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl SignalHandler<Note> for Recorder {
        async fn handle(&self, entity: &Note) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, entity.id));
            if self.fail {
                return Err(Error::backend("store unavailable"));
            }
            Ok(())
        }
    }

    fn recorder(label: &'static str, seen: &Arc<Mutex<Vec<String>>>) -> Arc<dyn SignalHandler<Note>> {
        Arc::new(Recorder {
            label,
            seen: seen.clone(),
            fail: false,
        })
    }

    #[tokio::test]
    async fn test_notify_reaches_matching_kind_only() {
        let signals = EntitySignals::<Note>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        signals.connect(SignalKind::Saved, "save", recorder("save", &seen));
        signals.connect(SignalKind::Deleted, "delete", recorder("delete", &seen));

        signals.notify_saved(&Note { id: 1 }).await.unwrap();
        signals.notify_deleted(&Note { id: 2 }).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["save:1", "delete:2"]);
    }

    #[tokio::test]
    async fn test_connect_same_key_is_noop() {
        let signals = EntitySignals::<Note>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        assert!(signals.connect(SignalKind::Saved, "k", recorder("a", &seen)));
        assert!(!signals.connect(SignalKind::Saved, "k", recorder("b", &seen)));
        assert_eq!(signals.receiver_count(SignalKind::Saved), 1);

        signals.notify_saved(&Note { id: 5 }).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a:5"]);
    }

    #[tokio::test]
    async fn test_handler_error_stops_delivery() {
        let signals = EntitySignals::<Note>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        signals.connect(
            SignalKind::Saved,
            "failing",
            Arc::new(Recorder {
                label: "failing",
                seen: seen.clone(),
                fail: true,
            }),
        );
        signals.connect(SignalKind::Saved, "after", recorder("after", &seen));

        let err = signals.notify_saved(&Note { id: 3 }).await.unwrap_err();
        assert!(err.is_backend());
        assert_eq!(*seen.lock().unwrap(), vec!["failing:3"]);
    }

    #[test]
    fn test_subscription_disconnect() {
        let signals = EntitySignals::<Note>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        signals.connect(SignalKind::Saved, "s", recorder("s", &seen));
        signals.connect(SignalKind::Deleted, "d", recorder("d", &seen));
        assert!(signals.has_listeners());

        let subscription = Subscription::new(
            signals.clone(),
            vec![
                (SignalKind::Saved, "s".to_string()),
                (SignalKind::Deleted, "d".to_string()),
            ],
        );
        assert!(subscription.is_connected());
        assert_eq!(subscription.disconnect(), 2);
        assert_eq!(subscription.disconnect(), 0);
        assert!(!subscription.is_connected());
        assert!(!signals.has_listeners());

        tokio_test::block_on(signals.notify_saved(&Note { id: 9 })).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clones_share_receivers() {
        let signals = EntitySignals::<Note>::new();
        let other = signals.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        other.connect(SignalKind::Saved, "s", recorder("s", &seen));

        assert!(signals.is_connected(SignalKind::Saved, "s"));
        assert!(!signals.is_connected(SignalKind::Deleted, "s"));
    }
}
