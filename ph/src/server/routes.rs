//! Endpoint handlers and per-connection lifecycle

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{BroadcastHub, Frame, Snapshot, Subscription};

/// Shared state handed to every handler
#[derive(Clone)]
pub(super) struct ServerState {
    pub hub: Arc<BroadcastHub>,
    pub keep_alive: Duration,
}

/// Lifecycle of one push-channel connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// One live SSE connection and its hub subscription
///
/// `Closed` is terminal. Dropping the connection closes it, which detaches
/// the subscription, so no subscriber outlives its transport.
pub struct SseConnection {
    id: Uuid,
    state: ConnectionState,
    subscription: Option<Subscription>,
}

impl SseConnection {
    pub fn new() -> Self {
        let id = Uuid::now_v7();
        debug!(%id, "SseConnection::new");
        Self {
            id,
            state: ConnectionState::Connecting,
            subscription: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Register with the hub once the handshake is done
    ///
    /// Only valid from `Connecting`; returns whether the transition happened.
    pub fn open(&mut self, hub: &Arc<BroadcastHub>) -> bool {
        if self.state != ConnectionState::Connecting {
            debug!(id = %self.id, state = %self.state, "SseConnection::open: ignored");
            return false;
        }
        let subscription = hub.subscribe();
        info!(id = %self.id, handle = %subscription.handle(), "SSE client connected");
        self.subscription = Some(subscription);
        self.state = ConnectionState::Open;
        true
    }

    /// Next frame for this client; `None` once the connection is closed
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => None,
        }
    }

    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            info!(id = %self.id, handle = %subscription.handle(), "SSE client disconnected");
        }
        self.state = ConnectionState::Closed;
    }
}

impl Default for SseConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// GET /sse - live event stream, one `data:` frame per published event
pub(super) async fn sse_stream(State(state): State<ServerState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut connection = SseConnection::new();
    connection.open(&state.hub);

    let stream = async_stream::stream! {
        while let Some(frame) = connection.next_frame().await {
            yield Ok(Event::default().data(&*frame));
        }
        connection.close();
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

/// GET /snapshot - retained history plus last host info
pub(super) async fn snapshot(State(state): State<ServerState>) -> Json<Snapshot> {
    debug!("snapshot: called");
    Json(state.hub.snapshot())
}

pub(super) async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
