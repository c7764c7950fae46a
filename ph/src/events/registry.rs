//! Subscriber Registry - live push-channel endpoints and their lifecycle

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Serialized event frame shared by every subscriber of one publish
pub type Frame = Arc<str>;

/// Hook invoked once when a subscriber is detached
pub type DetachHook = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle returned by registration, used for removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberHandle(u64);

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a frame could not be handed to a subscriber
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber channel is closed")]
    Closed,

    #[error("subscriber cannot accept more data")]
    Lagging,
}

/// A live outbound channel plus an optional detach hook
pub struct Subscriber {
    tx: mpsc::Sender<Frame>,
    on_detach: Option<DetachHook>,
}

impl Subscriber {
    /// Wrap the sending half of a channel
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx, on_detach: None }
    }

    /// Attach a hook that runs when this subscriber is detached
    pub fn with_detach_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_detach = Some(Box::new(hook));
        self
    }

    /// Hand a frame to the channel without waiting
    pub fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagging,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Consume the subscriber, closing its channel and running the detach hook
    pub fn cancel(mut self) {
        if let Some(hook) = self.on_detach.take() {
            hook();
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("closed", &self.tx.is_closed())
            .field("has_detach_hook", &self.on_detach.is_some())
            .finish()
    }
}

/// Outcome of one fan-out pass
#[derive(Debug, Default)]
pub struct FanOut {
    /// Subscribers that accepted the frame
    pub delivered: usize,
    /// Subscribers removed because delivery failed
    pub dropped: Vec<(SubscriberHandle, Subscriber, DeliveryError)>,
}

/// Registry of currently attached subscribers, in registration order
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: BTreeMap<SubscriberHandle, Subscriber>,
    next_handle: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; never fails
    pub fn register(&mut self, subscriber: Subscriber) -> SubscriberHandle {
        self.next_handle += 1;
        let handle = SubscriberHandle(self.next_handle);
        debug!(%handle, "SubscriberRegistry::register: called");
        self.subscribers.insert(handle, subscriber);
        handle
    }

    /// Remove a subscriber; `None` when it was already removed
    ///
    /// The caller decides when to [`Subscriber::cancel`] the returned value.
    pub fn deregister(&mut self, handle: SubscriberHandle) -> Option<Subscriber> {
        let removed = self.subscribers.remove(&handle);
        debug!(%handle, removed = removed.is_some(), "SubscriberRegistry::deregister: called");
        removed
    }

    /// Call `f` once per subscriber in registration order
    ///
    /// A failing subscriber never stops delivery to the rest. Failed
    /// subscribers are removed after the pass and handed back in [`FanOut`].
    pub fn for_each<F>(&mut self, mut f: F) -> FanOut
    where
        F: FnMut(SubscriberHandle, &Subscriber) -> Result<(), DeliveryError>,
    {
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (handle, subscriber) in &self.subscribers {
            match f(*handle, subscriber) {
                Ok(()) => delivered += 1,
                Err(e) => failed.push((*handle, e)),
            }
        }

        let dropped = failed
            .into_iter()
            .filter_map(|(handle, e)| self.subscribers.remove(&handle).map(|s| (handle, s, e)))
            .collect();

        FanOut { delivered, dropped }
    }

    /// Remove every subscriber, in registration order
    pub fn drain(&mut self) -> Vec<(SubscriberHandle, Subscriber)> {
        debug!(count = self.subscribers.len(), "SubscriberRegistry::drain: called");
        std::mem::take(&mut self.subscribers).into_iter().collect()
    }

    pub fn contains(&self, handle: SubscriberHandle) -> bool {
        self.subscribers.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
