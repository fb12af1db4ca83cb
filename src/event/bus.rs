//! Subscriber registry for link events.
//!
//! Every subscriber owns an unbounded channel of batches. A batch is sent as
//! one message, so a subscriber sees either none or all of it, and the
//! registry lock keeps two emitters from interleaving their batches.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;

use super::{EventKind, LinkEvent};

// ============================================================================
// Types
// ============================================================================

/// One emitted batch.
type Batch = Vec<LinkEvent>;

/// Map of subscription IDs to their delivery channels.
type SubscriberMap = FxHashMap<SubscriptionId, mpsc::UnboundedSender<Batch>>;

// ============================================================================
// EventBus
// ============================================================================

/// Fan-out point for the events of one link.
///
/// Thread-safe: the connection worker emits from its own thread while
/// property setters emit from the caller's thread.
#[derive(Debug, Default)]
pub struct EventBus {
    /// Active subscribers.
    subscribers: Mutex<SubscriberMap>,
    /// Next subscription ID to hand out.
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    ///
    /// The subscriber receives every event emitted from now on. Earlier
    /// events are not replayed.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        self.subscribers.lock().insert(id, tx);
        trace!(%id, "Subscriber registered");

        Subscription {
            id,
            rx,
            backlog: VecDeque::new(),
        }
    }

    /// Removes a subscriber.
    ///
    /// Returns `false` if the ID was not registered. Dropping a
    /// [`Subscription`] has the same effect on the next emission.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }

    /// Returns the number of registered subscribers.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Emits a single event.
    pub fn emit(&self, event: LinkEvent) {
        self.emit_batch([event]);
    }

    /// Emits events as one contiguous batch.
    pub fn emit_batch(&self, events: impl IntoIterator<Item = LinkEvent>) {
        let batch: Batch = events.into_iter().collect();
        if batch.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| {
            let delivered = tx.send(batch.clone()).is_ok();
            if !delivered {
                trace!(%id, "Pruned closed subscriber");
            }
            delivered
        });
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Receiving end of an [`EventBus`] subscription.
///
/// Also a [`Stream`] of events.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Batch>,
    /// Received but not yet returned events, oldest first.
    backlog: VecDeque<LinkEvent>,
}

impl Subscription {
    /// Returns the subscription ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the bus is gone and every queued event was read.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        while self.backlog.is_empty() {
            let batch = self.rx.recv().await?;
            self.backlog.extend(batch);
        }
        self.backlog.pop_front()
    }

    /// Receives the next event, waiting at most `duration`.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if nothing arrives in time
    /// - [`Error::WorkerGone`] if the bus is gone
    pub async fn recv_timeout(&mut self, duration: Duration) -> Result<LinkEvent> {
        timeout(duration, self.recv())
            .await
            .map_err(|_| Error::timeout("waiting for link event", duration.as_millis() as u64))?
            .ok_or(Error::WorkerGone)
    }

    /// Waits for the first event of `kind`.
    ///
    /// Events of other kinds, including the rest of the batch the match
    /// arrived in, are kept in order and returned by later
    /// `recv`/`try_recv`/`drain` calls.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no such event arrives in time
    /// - [`Error::WorkerGone`] if the bus is gone
    pub async fn wait_for(&mut self, kind: EventKind, duration: Duration) -> Result<LinkEvent> {
        let deadline = Instant::now() + duration;

        loop {
            if let Some(pos) = self.backlog.iter().position(|e| e.kind() == kind)
                && let Some(event) = self.backlog.remove(pos)
            {
                return Ok(event);
            }

            let batch = timeout_at(deadline, self.rx.recv())
                .await
                .map_err(|_| {
                    Error::timeout(format!("waiting for {kind}"), duration.as_millis() as u64)
                })?
                .ok_or(Error::WorkerGone)?;
            self.backlog.extend(batch);
        }
    }

    /// Returns the next already-queued event, if any.
    pub fn try_recv(&mut self) -> Option<LinkEvent> {
        while self.backlog.is_empty() {
            let batch = self.rx.try_recv().ok()?;
            self.backlog.extend(batch);
        }
        self.backlog.pop_front()
    }

    /// Returns every already-queued event.
    pub fn drain(&mut self) -> Vec<LinkEvent> {
        while let Ok(batch) = self.rx.try_recv() {
            self.backlog.extend(batch);
        }
        self.backlog.drain(..).collect()
    }
}

impl Stream for Subscription {
    type Item = LinkEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        while this.backlog.is_empty() {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(batch)) => this.backlog.extend(batch),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(this.backlog.pop_front())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use futures_util::StreamExt;

    use crate::identifiers::LinkId;

    #[test]
    fn test_subscribe_assigns_distinct_ids() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        assert_ne!(a.id(), b.id());
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        bus.emit(LinkEvent::Connected);

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_batch_delivered_in_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.emit_batch([LinkEvent::Connected, LinkEvent::ConnectedStateChanged(true)]);

        assert_eq!(
            sub.drain(),
            vec![LinkEvent::Connected, LinkEvent::ConnectedStateChanged(true)]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let sub = bus.subscribe();

        assert!(bus.unsubscribe(sub.id()));
        assert!(!bus.unsubscribe(sub.id()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(LinkEvent::Disconnected);

        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
    }

    #[test]
    fn test_concurrent_batches_never_interleave() {
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let up = i % 2 == 0;
                        let first = if up {
                            LinkEvent::Connected
                        } else {
                            LinkEvent::Disconnected
                        };
                        bus.emit_batch([first, LinkEvent::ConnectedStateChanged(up)]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = sub.drain();
        assert_eq!(events.len(), 800);
        for pair in events.chunks(2) {
            match pair {
                [LinkEvent::Connected, LinkEvent::ConnectedStateChanged(true)]
                | [LinkEvent::Disconnected, LinkEvent::ConnectedStateChanged(false)] => {}
                other => panic!("interleaved batch: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_wait_for_keeps_other_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.emit(LinkEvent::NameChanged("10.0.0.1:5760".into()));
        bus.emit(LinkEvent::Connected);

        let event = sub
            .wait_for(EventKind::Connected, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(event, LinkEvent::Connected);
        assert_eq!(
            sub.try_recv(),
            Some(LinkEvent::NameChanged("10.0.0.1:5760".into()))
        );
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(LinkEvent::Disconnected);

        let err = sub
            .wait_for(EventKind::Connected, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(sub.drain(), vec![LinkEvent::Disconnected]);
    }

    #[tokio::test]
    async fn test_recv_after_bus_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(LinkEvent::Connected);
        drop(bus);

        assert_eq!(sub.recv().await, Some(LinkEvent::Connected));
        let err = sub.recv_timeout(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, Error::WorkerGone));
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let link = LinkId::generate();

        bus.emit(LinkEvent::BytesReceived {
            link,
            data: b"abc".to_vec(),
        });
        bus.emit(LinkEvent::Disconnected);
        drop(bus);

        let events: Vec<LinkEvent> = sub.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], LinkEvent::Disconnected);
    }
}
