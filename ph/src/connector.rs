//! Push-channel client
//!
//! Follows a remote endpoint's `/sse` stream and reads its `/snapshot`.

use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Url;
use reqwest_eventsource::{Event, EventSource};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventRecord, Snapshot};

/// Errors from following a remote endpoint
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("No endpoint URL given")]
    MissingUrl,

    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to open event stream: {0}")]
    Open(String),

    #[error("Event stream error: {0}")]
    Stream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where to connect and which credentials to pass along
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Endpoint URL with the non-empty credentials appended as query params
    pub fn stream_url(&self) -> Result<Url, ConnectorError> {
        let mut url = parse_url(&self.url)?;
        let params = [
            ("mcp_api_key", &self.api_key),
            ("access_token", &self.access_token),
            ("client_id", &self.client_id),
        ];
        let present: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (*name, v))
            })
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }
        Ok(url)
    }
}

fn parse_url(raw: &str) -> Result<Url, ConnectorError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConnectorError::MissingUrl);
    }
    Url::parse(raw).map_err(|e| ConnectorError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Open the event stream and yield each received record
///
/// Undecodable frames are skipped. The stream ends when the server closes it;
/// any other transport error is yielded once and then ends the stream.
pub fn connect(options: &ConnectOptions) -> Result<BoxStream<'static, Result<EventRecord, ConnectorError>>, ConnectorError> {
    let url = options.stream_url()?;
    debug!(host = ?url.host_str(), path = %url.path(), "connect: called");

    let request = reqwest::Client::new().get(url);
    let mut es = EventSource::new(request).map_err(|e| ConnectorError::Open(e.to_string()))?;

    let stream = async_stream::stream! {
        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    info!("connect: event stream open");
                }
                Ok(Event::Message(msg)) => match serde_json::from_str::<EventRecord>(&msg.data) {
                    Ok(record) => yield Ok(record),
                    Err(e) => warn!(error = %e, "connect: skipping undecodable frame"),
                },
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    debug!("connect: stream ended");
                    break;
                }
                Err(e) => {
                    debug!(%e, "connect: event error");
                    es.close();
                    yield Err(ConnectorError::Stream(e.to_string()));
                    break;
                }
            }
        }
        es.close();
    };

    Ok(stream.boxed())
}

/// Fetch `/snapshot` from the endpoint that serves `base_url`
///
/// Accepts either the base address or the `/sse` URL.
pub async fn fetch_snapshot(base_url: &str) -> Result<Snapshot, ConnectorError> {
    let mut url = parse_url(base_url)?;
    url.set_path("/snapshot");
    debug!(%url, "fetch_snapshot: called");

    let snapshot = reqwest::get(url).await?.error_for_status()?.json::<Snapshot>().await?;
    debug!(history_len = snapshot.history.len(), "fetch_snapshot: received");
    Ok(snapshot)
}
