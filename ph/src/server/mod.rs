//! Push-channel transport endpoint
//!
//! Serves the hub over plain HTTP on a local port:
//!
//! - `GET /sse` - long-lived `text/event-stream`, one `data: <json>` frame per
//!   event published after the client connected
//! - `GET /snapshot` - `{"hostInfo": ..., "history": [...]}`, newest first
//! - anything else - 404 `Not Found`

mod routes;

pub use routes::{ConnectionState, SseConnection};

use axum::Router;
use axum::routing::get;
use eyre::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::events::BroadcastHub;

use routes::ServerState;

/// How long shutdown waits for in-flight connections before aborting
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the endpoint router over a hub
pub fn build_router(hub: Arc<BroadcastHub>, keep_alive: Duration) -> Router {
    let state = ServerState { hub, keep_alive };
    Router::new()
        .route("/sse", get(routes::sse_stream))
        .route("/snapshot", get(routes::snapshot))
        .fallback(routes::not_found)
        .with_state(state)
}

/// A running endpoint bound to a local address
pub struct EndpointServer {
    hub: Arc<BroadcastHub>,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl EndpointServer {
    /// Bind the configured address and start serving in the background
    pub async fn start(hub: Arc<BroadcastHub>, config: &ServerConfig) -> Result<Self> {
        debug!(bind = %config.bind, "EndpointServer::start: called");
        let listener = tokio::net::TcpListener::bind(&config.bind)
            .await
            .context(format!("Failed to bind {}", config.bind))?;
        let local_addr = listener.local_addr().context("Failed to get local address")?;

        let app = build_router(hub.clone(), Duration::from_secs(config.keep_alive_secs.max(1)));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "endpoint server error");
            }
        });

        info!(%local_addr, "Broadcast endpoint listening");
        Ok(Self {
            hub,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://<addr>`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// `http://<addr>/sse`, the address external listeners connect to
    pub fn stream_url(&self) -> String {
        format!("{}/sse", self.base_url())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop accepting connections and close every open stream
    pub async fn stop(mut self) {
        debug!(addr = %self.local_addr, "EndpointServer::stop: called");
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!(addr = %self.local_addr, "EndpointServer::stop: graceful shutdown timed out, aborting");
                abort.abort();
            }
        }
        info!(addr = %self.local_addr, "Broadcast endpoint stopped");
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            // Open SSE streams only end once their subscriptions are gone
            self.hub.close_all();
        }
    }
}

impl Drop for EndpointServer {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Role;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn test_router(hub: &Arc<BroadcastHub>) -> Router {
        build_router(hub.clone(), Duration::from_secs(15))
    }

    #[tokio::test]
    async fn test_snapshot_json() {
        let hub = Arc::new(BroadcastHub::new(2, 8));
        hub.publish(Role::User, "one");
        hub.publish(Role::AssistantReply, "two");
        hub.publish(Role::SystemNotice, "three");
        hub.set_external_state("Sequence 01, 3 clips");

        let resp = test_router(&hub)
            .oneshot(Request::get("/snapshot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["hostInfo"], "Sequence 01, 3 clips");
        let history = json["history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["id"], 3);
        assert_eq!(history[0]["role"], "system-notice");
        assert_eq!(history[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_snapshot_empty_hub() {
        let hub = Arc::new(BroadcastHub::default());
        let resp = test_router(&hub)
            .oneshot(Request::get("/snapshot").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "hostInfo": "", "history": [] }));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let hub = Arc::new(BroadcastHub::default());
        let resp = test_router(&hub)
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Not Found");
    }

    #[tokio::test]
    async fn test_sse_handshake_attaches_and_drop_detaches() {
        let hub = Arc::new(BroadcastHub::default());
        let resp = test_router(&hub)
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(hub.subscriber_count(), 1);

        drop(resp);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_sse_streams_published_frames() {
        use futures::StreamExt;

        let hub = Arc::new(BroadcastHub::default());
        hub.publish(Role::User, "before connect");

        let resp = test_router(&hub)
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mut body = resp.into_body().into_data_stream();

        let record = hub.publish(Role::AssistantReply, "after connect");
        let frame = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(text, format!("data: {}\n\n", json));
        assert!(!text.contains("before connect"));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let hub = Arc::new(BroadcastHub::default());
        let server = EndpointServer::start(hub.clone(), &ServerConfig::default()).await.unwrap();

        assert!(server.local_addr().ip().is_loopback());
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.stream_url().starts_with("http://127.0.0.1:"));
        assert!(server.stream_url().ends_with("/sse"));
        assert!(server.is_running());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_start_bad_address_is_error() {
        let hub = Arc::new(BroadcastHub::default());
        let config = ServerConfig {
            bind: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(EndpointServer::start(hub, &config).await.is_err());
    }
}
