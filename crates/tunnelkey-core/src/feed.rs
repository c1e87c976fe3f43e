// ── Push feeds and subscription handles ──
//
// In-process publish/subscribe used by the KeyManager to fan out key-status
// and tunnel-state changes. Subscriptions are value objects: dropping one
// unregisters it from the feed exactly once.

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

/// A push feed for a single value type.
///
/// Cheaply cloneable; all clones publish into the same subscriber set.
/// Subscribers receive every value published after they subscribed, in
/// publish order.
pub struct Feed<T> {
    inner: Arc<FeedInner<T>>,
}

struct FeedInner<T> {
    subscribers: DashMap<u64, mpsc::UnboundedSender<T>>,
    next_id: AtomicU64,
}

impl<T: Clone> Feed<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a new subscriber and hand back its handle.
    pub fn subscribe(&self) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.insert(id, tx);

        Subscription {
            id,
            rx,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `value` to every live subscriber.
    ///
    /// Subscribers whose receiving half has been dropped without
    /// unregistering are pruned here.
    pub fn publish(&self, value: &T) {
        let mut dead = Vec::new();
        for entry in self.inner.subscribers.iter() {
            if entry.value().send(value.clone()).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.inner.subscribers.remove(&id);
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T: Clone> Default for Feed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Feed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ── Subscription ────────────────────────────────────────────────────

/// Handle to a single feed registration.
///
/// Receives values via [`recv`](Self::recv). Unregisters from the feed
/// when dropped; [`cancel`](Self::cancel) consumes the handle to make the
/// unregistration explicit at the call site.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    feed: Weak<FeedInner<T>>,
}

impl<T> Subscription<T> {
    /// Wait for the next published value. Returns `None` once the feed has
    /// been dropped and the backlog is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Unregister from the feed, consuming the handle.
    pub fn cancel(self) {
        // Drop does the unregistration.
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.feed.upgrade() {
            inner.subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_values_in_order() {
        let feed: Feed<u32> = Feed::new();
        let mut sub = feed.subscribe();

        feed.publish(&1);
        feed.publish(&2);

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn values_published_before_subscribing_are_not_delivered() {
        let feed: Feed<u32> = Feed::new();
        feed.publish(&1);

        let mut sub = feed.subscribe();
        feed.publish(&2);
        assert_eq!(sub.recv().await, Some(2));
    }

    #[test]
    fn drop_unregisters_exactly_once() {
        let feed: Feed<u32> = Feed::new();
        let sub = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn cancel_consumes_and_unregisters() {
        let feed: Feed<u32> = Feed::new();
        let sub = feed.subscribe();
        sub.cancel();
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn multiple_subscribers_are_counted_independently() {
        let feed: Feed<u32> = Feed::new();
        let a = feed.subscribe();
        let b = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);

        drop(a);
        assert_eq!(feed.subscriber_count(), 1);
        drop(b);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn recv_returns_none_after_feed_is_dropped() {
        let feed: Feed<u32> = Feed::new();
        let mut sub = feed.subscribe();
        feed.publish(&9);
        drop(feed);

        assert_eq!(sub.recv().await, Some(9));
        assert_eq!(sub.recv().await, None);
    }
}
