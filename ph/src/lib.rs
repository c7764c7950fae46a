//! PanelHub - assistant panel with a live event broadcast
//!
//! A panel that lets a user ask a chat assistant questions and drive a host
//! application through its scripting bridge. Every message the panel shows
//! is also published to an in-process broadcast hub, which external tools
//! follow over a local Server-Sent Events endpoint.
//!
//! # Core Concepts
//!
//! - **Bounded history**: the hub keeps the newest N events (default 50) for snapshots
//! - **Strict ordering**: event ids are assigned under one lock, so every
//!   subscriber sees the same order
//! - **Isolated subscribers**: a broken or lagging listener is dropped without
//!   affecting the publisher or anyone else
//!
//! # Modules
//!
//! - [`events`] - Broadcast hub, history ring and subscriber registry
//! - [`server`] - `/sse` and `/snapshot` transport endpoint
//! - [`connector`] - Client for following a remote endpoint
//! - [`llm`] - Chat-completion client
//! - [`host`] - Host scripting bridge
//! - [`panel`] - Panel controller tying the pieces together
//! - [`prefs`] - Local preference store
//! - [`config`] - Configuration types and loading
//! - [`repl`] - Interactive terminal panel
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod connector;
pub mod events;
pub mod host;
pub mod llm;
pub mod panel;
pub mod prefs;
pub mod repl;
pub mod server;

pub use config::Config;
pub use events::{BroadcastHub, EventRecord, Role, Snapshot, Subscription, create_hub};
pub use panel::Panel;
pub use server::EndpointServer;
