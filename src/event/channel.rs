//! Publish/subscribe primitive shared by every transport.
//!
//! Listeners are keyed by the event's tag and run synchronously on the
//! emitting thread, in registration order. A panicking listener is logged
//! and skipped; the rest still run.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// An event that can be routed by tag.
pub trait TaggedEvent {
    /// Subscription key.
    type Tag: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the key listeners subscribe to.
    fn tag(&self) -> Self::Tag;
}

/// Listener callback type.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A registered listener.
struct Entry<E> {
    id: ListenerId,
    listener: Listener<E>,
}

/// Listeners grouped by tag, in registration order.
type ListenerMap<E> = FxHashMap<<E as TaggedEvent>::Tag, Vec<Entry<E>>>;

// ============================================================================
// EventChannel
// ============================================================================

/// Tag-keyed event dispatcher.
///
/// `EventChannel` is `Send + Sync`. The listener table is only locked while
/// subscribing, unsubscribing, or taking the dispatch snapshot, so listeners
/// may themselves subscribe or unsubscribe.
///
/// # Example
///
/// ```
/// use overlay_transport::{EventChannel, EventTag, NormalizedEvent};
/// use serde_json::json;
///
/// let channel = EventChannel::<NormalizedEvent>::new();
/// let id = channel.subscribe(EventTag::Data, |event| println!("{event:?}"));
///
/// assert_eq!(channel.emit(&NormalizedEvent::Data(json!({"dps": 1}))), 1);
/// assert!(channel.unsubscribe(id));
/// ```
pub struct EventChannel<E: TaggedEvent> {
    listeners: RwLock<ListenerMap<E>>,
}

impl<E: TaggedEvent> Default for EventChannel<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<E: TaggedEvent> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.listeners.read();
        let total: usize = guard.values().map(Vec::len).sum();
        f.debug_struct("EventChannel")
            .field("tags", &guard.len())
            .field("listeners", &total)
            .finish()
    }
}

impl<E: TaggedEvent> EventChannel<E> {
    /// Creates a channel with no listeners.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `tag`.
    ///
    /// Returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, tag: E::Tag, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId::generate();
        self.listeners.write().entry(tag).or_default().push(Entry {
            id,
            listener: Arc::new(listener),
        });

        trace!(?tag, listener_id = %id, "Listener subscribed");
        id
    }

    /// Removes one listener.
    ///
    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.write();

        let mut removed = false;
        guard.retain(|_, entries| {
            if !removed
                && let Some(index) = entries.iter().position(|entry| entry.id == id)
            {
                entries.remove(index);
                removed = true;
            }
            !entries.is_empty()
        });

        if removed {
            trace!(listener_id = %id, "Listener unsubscribed");
        }
        removed
    }

    /// Invokes every listener registered for `event.tag()`.
    ///
    /// Returns the number of listeners that completed without panicking.
    pub fn emit(&self, event: &E) -> usize {
        let tag = event.tag();

        let snapshot: Vec<Listener<E>> = {
            let guard = self.listeners.read();
            match guard.get(&tag) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| Arc::clone(&entry.listener))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(?tag, panic = %panic_message(panic.as_ref()), "Event listener panicked");
                }
            }
        }

        delivered
    }

    /// Returns the number of listeners registered for `tag`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, tag: E::Tag) -> usize {
        self.listeners.read().get(&tag).map_or(0, Vec::len)
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Tag {
        A,
        B,
    }

    struct Ping(Tag, u32);

    impl TaggedEvent for Ping {
        type Tag = Tag;

        fn tag(&self) -> Tag {
            self.0
        }
    }

    fn recorder(channel: &EventChannel<Ping>, tag: Tag, label: u32) -> Arc<Mutex<Vec<(u32, u32)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.subscribe(tag, move |event: &Ping| sink.lock().push((label, event.1)));
        seen
    }

    #[test]
    fn test_emit_in_registration_order() {
        let channel = EventChannel::<Ping>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in 0..3 {
            let order = Arc::clone(&order);
            channel.subscribe(Tag::A, move |_: &Ping| order.lock().push(label));
        }

        assert_eq!(channel.emit(&Ping(Tag::A, 0)), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_emit_only_matching_tag() {
        let channel = EventChannel::<Ping>::new();
        let a = recorder(&channel, Tag::A, 1);
        let b = recorder(&channel, Tag::B, 2);

        channel.emit(&Ping(Tag::B, 7));

        assert!(a.lock().is_empty());
        assert_eq!(*b.lock(), vec![(2, 7)]);
    }

    #[test]
    fn test_emit_without_listeners() {
        let channel = EventChannel::<Ping>::new();
        assert_eq!(channel.emit(&Ping(Tag::A, 0)), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_listener() {
        let channel = EventChannel::<Ping>::new();
        let kept = recorder(&channel, Tag::A, 1);
        let dropped = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&dropped);
        let id = channel.subscribe(Tag::A, move |_: &Ping| *counter.lock() += 1);

        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));

        channel.emit(&Ping(Tag::A, 3));
        assert_eq!(*dropped.lock(), 0);
        assert_eq!(kept.lock().len(), 1);
        assert_eq!(channel.listener_count(Tag::A), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let channel = EventChannel::<Ping>::new();
        channel.subscribe(Tag::A, |_: &Ping| panic!("listener failure"));
        let after = recorder(&channel, Tag::A, 9);

        assert_eq!(channel.emit(&Ping(Tag::A, 1)), 1);
        assert_eq!(*after.lock(), vec![(9, 1)]);
    }

    #[test]
    fn test_listener_may_subscribe_during_emit() {
        let channel = Arc::new(EventChannel::<Ping>::new());
        let inner = Arc::clone(&channel);
        channel.subscribe(Tag::A, move |_: &Ping| {
            inner.subscribe(Tag::B, |_: &Ping| {});
        });

        channel.emit(&Ping(Tag::A, 0));
        assert_eq!(channel.listener_count(Tag::B), 1);
    }

    #[test]
    fn test_clear() {
        let channel = EventChannel::<Ping>::new();
        recorder(&channel, Tag::A, 1);
        recorder(&channel, Tag::B, 2);

        channel.clear();
        assert_eq!(channel.listener_count(Tag::A), 0);
        assert_eq!(channel.listener_count(Tag::B), 0);
    }
}
