//! Event broadcast hub
//!
//! Everything the panel shows the user is also published here, so external
//! tools can follow along live.
//!
//! # Architecture
//!
//! ```text
//!   Panel / CLI                      Transport endpoint
//!   publish(role, text)              GET /sse       GET /snapshot
//!        │                              │ attach         │
//!        ▼                              ▼                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       BROADCAST HUB                           │
//! │   ┌──────────────┐  ┌─────────────────────┐  ┌─────────────┐  │
//! │   │ HistoryRing  │  │ SubscriberRegistry  │  │ host info   │  │
//! │   │ (newest 50)  │  │ (mpsc per client)   │  │ (last value)│  │
//! │   └──────────────┘  └─────────────────────┘  └─────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │ data: {json}\n\n
//!                              ▼
//!                   external listeners (SSE)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use panelhub::events::{Role, create_hub};
//!
//! let hub = create_hub();
//! let mut sub = hub.subscribe();
//!
//! let record = hub.publish(Role::User, "Add a marker at the playhead");
//! assert_eq!(record.id, 1);
//!
//! let frame = sub.recv().await.unwrap();
//! ```

mod hub;
mod registry;
mod ring;
mod types;

pub use hub::{BroadcastHub, DEFAULT_SUBSCRIBER_BUFFER, Subscription, create_hub};
pub use registry::{DeliveryError, DetachHook, FanOut, Frame, Subscriber, SubscriberHandle, SubscriberRegistry};
pub use ring::{DEFAULT_HISTORY_CAPACITY, HistoryRing};
pub use types::{EventRecord, Role, Snapshot};
