//! Broadcast Hub - the single entry point for publish, subscribe and snapshot
//!
//! The hub owns the history ring, the subscriber registry and the external
//! state value behind one lock. Every operation is synchronous and finishes
//! before the lock is released, so publishes are totally ordered, ids are
//! allocated without races and snapshots never observe a half-applied publish.
//! Detach hooks run after the lock is released so they may call back into the
//! hub.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use super::registry::{Frame, Subscriber, SubscriberHandle, SubscriberRegistry};
use super::ring::{DEFAULT_HISTORY_CAPACITY, HistoryRing};
use super::types::{EventRecord, Role, Snapshot};
use crate::config::HubConfig;

/// Default number of frames buffered per subscriber before it is dropped
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// State guarded by the hub lock
struct HubState {
    history: HistoryRing,
    subscribers: SubscriberRegistry,
    external_state: String,
    last_id: u64,
}

/// Coordinates publish, subscribe and snapshot for one process
pub struct BroadcastHub {
    state: Mutex<HubState>,
    subscriber_buffer: usize,
}

impl BroadcastHub {
    /// Create a hub retaining `history_capacity` events
    pub fn new(history_capacity: usize, subscriber_buffer: usize) -> Self {
        debug!(history_capacity, subscriber_buffer, "BroadcastHub::new: called");
        Self {
            state: Mutex::new(HubState {
                history: HistoryRing::new(history_capacity),
                subscribers: SubscriberRegistry::new(),
                external_state: String::new(),
                last_id: 0,
            }),
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    /// Create a hub from the `hub` section of the config
    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.history_capacity, config.subscriber_buffer)
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event and push it to every current subscriber
    ///
    /// Delivery never waits: a subscriber whose channel is closed or full is
    /// detached. Empty text is allowed.
    pub fn publish(&self, role: Role, text: impl Into<String>) -> EventRecord {
        let (record, fan_out) = {
            let mut state = self.lock();
            state.last_id += 1;
            let record = EventRecord {
                id: state.last_id,
                timestamp: Utc::now(),
                role,
                text: text.into(),
            };
            state.history.append(record.clone());

            let fan_out = if state.subscribers.is_empty() {
                None
            } else {
                match serde_json::to_string(&record) {
                    Ok(json) => {
                        let frame: Frame = Arc::from(json);
                        Some(state.subscribers.for_each(|_, subscriber| subscriber.deliver(&frame)))
                    }
                    Err(e) => {
                        warn!(id = record.id, error = %e, "BroadcastHub::publish: failed to serialize event");
                        None
                    }
                }
            };
            (record, fan_out)
        };

        debug!(id = record.id, role = %record.role, "BroadcastHub::publish");
        if let Some(fan_out) = fan_out {
            debug!(delivered = fan_out.delivered, dropped = fan_out.dropped.len(), "BroadcastHub::publish: fan-out");
            for (handle, subscriber, reason) in fan_out.dropped {
                warn!(%handle, %reason, "BroadcastHub::publish: dropping subscriber");
                subscriber.cancel();
            }
        }
        record
    }

    /// Register an existing channel as a subscriber
    ///
    /// The new subscriber only sees events published after this call; history
    /// is available through [`BroadcastHub::snapshot`].
    pub fn attach(&self, subscriber: Subscriber) -> SubscriberHandle {
        let handle = self.lock().subscribers.register(subscriber);
        debug!(%handle, "BroadcastHub::attach");
        handle
    }

    /// Create a channel, attach it and return a subscription that detaches on drop
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        self.subscribe_with_buffer(self.subscriber_buffer)
    }

    /// Like [`BroadcastHub::subscribe`] with an explicit channel buffer
    pub fn subscribe_with_buffer(self: &Arc<Self>, buffer: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = self.attach(Subscriber::new(tx));
        Subscription {
            hub: Arc::clone(self),
            handle,
            rx,
        }
    }

    /// Deregister a subscriber; returns false when it was already gone
    pub fn detach(&self, handle: SubscriberHandle) -> bool {
        let removed = self.lock().subscribers.deregister(handle);
        debug!(%handle, removed = removed.is_some(), "BroadcastHub::detach");
        match removed {
            Some(subscriber) => {
                subscriber.cancel();
                true
            }
            None => false,
        }
    }

    /// Detach every subscriber, closing their channels
    ///
    /// Used on server shutdown. Returns how many were detached.
    pub fn close_all(&self) -> usize {
        let drained = self.lock().subscribers.drain();
        let count = drained.len();
        for (_, subscriber) in drained {
            subscriber.cancel();
        }
        info!(count, "BroadcastHub::close_all: detached all subscribers");
        count
    }

    /// Overwrite the last known external state
    pub fn set_external_state(&self, value: impl Into<String>) {
        let value = value.into();
        debug!(len = value.len(), "BroadcastHub::set_external_state");
        self.lock().external_state = value;
    }

    /// Last known external state (empty when never set)
    pub fn external_state(&self) -> String {
        self.lock().external_state.clone()
    }

    /// Retained history plus external state, read atomically
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            host_info: state.external_state.clone(),
            history: state.history.snapshot(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn is_attached(&self, handle: SubscriberHandle) -> bool {
        self.lock().subscribers.contains(handle)
    }

    pub fn history_capacity(&self) -> usize {
        self.lock().history.capacity()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Create a default hub wrapped in an Arc for shared ownership
pub fn create_hub() -> Arc<BroadcastHub> {
    Arc::new(BroadcastHub::default())
}

/// Receiving side of an attached channel
///
/// Dropping the subscription detaches it from the hub.
pub struct Subscription {
    hub: Arc<BroadcastHub>,
    handle: SubscriberHandle,
    rx: mpsc::Receiver<Frame>,
}

impl Subscription {
    pub fn handle(&self) -> SubscriberHandle {
        self.handle
    }

    /// Wait for the next frame; `None` once the hub has detached this subscriber
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Take a frame if one is buffered
    pub fn try_recv(&mut self) -> Result<Frame, TryRecvError> {
        self.rx.try_recv()
    }

    /// Drain buffered frames and decode them into records
    pub fn drain_records(&mut self) -> Vec<EventRecord> {
        let mut records = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            match serde_json::from_str(&frame) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Subscription::drain_records: undecodable frame"),
            }
        }
        records
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.detach(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn decode(frame: &Frame) -> EventRecord {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn test_publish_allocates_increasing_ids() {
        let hub = BroadcastHub::default();
        let a = hub.publish(Role::User, "a");
        let b = hub.publish(Role::AssistantReply, "b");
        let c = hub.publish(Role::SystemNotice, "");

        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert!(a.timestamp <= b.timestamp && b.timestamp <= c.timestamp);
        assert_eq!(c.text, "");
    }

    #[test]
    fn test_capacity_two_scenario() {
        let hub = BroadcastHub::new(2, DEFAULT_SUBSCRIBER_BUFFER);
        hub.publish(Role::User, "A");
        hub.publish(Role::User, "B");
        hub.publish(Role::User, "C");

        let snapshot = hub.snapshot();
        let ids: Vec<u64> = snapshot.history.iter().map(|r| r.id).collect();
        let texts: Vec<&str> = snapshot.history.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(texts, vec!["C", "B"]);
    }

    #[test]
    fn test_two_subscribers_attached_at_different_times() {
        let hub = Arc::new(BroadcastHub::new(2, DEFAULT_SUBSCRIBER_BUFFER));
        for text in ["A", "B", "C"] {
            hub.publish(Role::User, text);
        }

        let mut s1 = hub.subscribe();
        let d = hub.publish(Role::User, "D");
        assert_eq!(d.id, 4);

        let mut s2 = hub.subscribe();
        let e = hub.publish(Role::User, "E");
        assert_eq!(e.id, 5);

        let s1_ids: Vec<u64> = s1.drain_records().iter().map(|r| r.id).collect();
        let s2_ids: Vec<u64> = s2.drain_records().iter().map(|r| r.id).collect();
        assert_eq!(s1_ids, vec![4, 5]);
        assert_eq!(s2_ids, vec![5]);
    }

    #[test]
    fn test_subscribe_is_prospective_only() {
        let hub = create_hub();
        hub.publish(Role::User, "before");

        let mut sub = hub.subscribe();
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(hub.snapshot().history.len(), 1);
    }

    #[test]
    fn test_detached_subscriber_receives_nothing() {
        let hub = create_hub();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = hub.attach(Subscriber::new(tx));

        hub.publish(Role::User, "seen");
        assert!(hub.detach(handle));
        hub.publish(Role::User, "unseen");

        let frame = rx.try_recv().unwrap();
        assert_eq!(decode(&frame).text, "seen");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_detach_twice_is_harmless() {
        let hub = create_hub();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (tx, _rx) = mpsc::channel(8);
        let handle = hub.attach(Subscriber::new(tx).with_detach_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let mut other = hub.subscribe();

        assert!(hub.detach(handle));
        assert!(!hub.detach(handle));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 1);
        hub.publish(Role::SystemNotice, "still here");
        assert_eq!(other.drain_records().len(), 1);
    }

    #[test]
    fn test_lagging_subscriber_is_dropped_without_affecting_others() {
        let hub = Arc::new(BroadcastHub::new(50, 1));
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe_with_buffer(16);

        hub.publish(Role::User, "one");
        hub.publish(Role::User, "two");

        assert_eq!(hub.subscriber_count(), 1);
        assert!(!hub.is_attached(slow.handle()));
        assert_eq!(slow.drain_records().len(), 1);
        assert_eq!(fast.drain_records().len(), 2);

        let next = hub.publish(Role::User, "three");
        assert_eq!(next.id, 3);
        assert_eq!(hub.snapshot().history.len(), 3);
    }

    #[test]
    fn test_closed_receiver_is_detached_on_next_publish() {
        let hub = create_hub();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (tx, rx) = mpsc::channel(8);
        let handle = hub.attach(Subscriber::new(tx).with_detach_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        drop(rx);

        hub.publish(Role::User, "nobody listening");

        assert!(!hub.is_attached(handle));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_drop_detaches() {
        let hub = create_hub();
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_hook_may_reenter_hub() {
        let hub = create_hub();
        let inner = hub.clone();
        let (tx, _rx) = mpsc::channel(8);
        let handle = hub.attach(Subscriber::new(tx).with_detach_hook(move || {
            inner.publish(Role::SystemNotice, "subscriber left");
        }));

        hub.detach(handle);
        assert_eq!(hub.snapshot().history[0].text, "subscriber left");
    }

    #[tokio::test]
    async fn test_close_all_ends_subscriptions() {
        let hub = create_hub();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.close_all(), 2);
        assert!(a.recv().await.is_none());
        assert!(b.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_external_state_overwrites() {
        let hub = create_hub();
        assert_eq!(hub.snapshot().host_info, "");

        hub.set_external_state("first");
        hub.set_external_state("second");

        assert_eq!(hub.external_state(), "second");
        assert_eq!(hub.snapshot().host_info, "second");
    }

    #[test]
    fn test_snapshot_interleaved_with_publish_keeps_invariants() {
        let hub = BroadcastHub::new(5, DEFAULT_SUBSCRIBER_BUFFER);
        for n in 1..=20u64 {
            hub.publish(Role::User, n.to_string());
            let snapshot = hub.snapshot();
            let ids: Vec<u64> = snapshot.history.iter().map(|r| r.id).collect();
            assert_eq!(ids.len(), (n as usize).min(5));
            assert_eq!(ids[0], n);
            assert!(ids.windows(2).all(|w| w[0] == w[1] + 1));
        }
    }

    #[test]
    fn test_concurrent_publishers_deliver_identical_order() {
        let hub = Arc::new(BroadcastHub::new(1000, 1000));
        let mut s1 = hub.subscribe_with_buffer(1000);
        let mut s2 = hub.subscribe_with_buffer(1000);

        let workers: Vec<_> = (0..4)
            .map(|w| {
                let hub = hub.clone();
                std::thread::spawn(move || {
                    for n in 0..50 {
                        hub.publish(Role::User, format!("{}-{}", w, n));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let r1: Vec<u64> = s1.drain_records().iter().map(|r| r.id).collect();
        let r2: Vec<u64> = s2.drain_records().iter().map(|r| r.id).collect();
        assert_eq!(r1.len(), 200);
        assert_eq!(r1, r2);
        assert!(r1.windows(2).all(|w| w[0] < w[1]));
    }
}
