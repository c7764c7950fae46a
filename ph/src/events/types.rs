//! Event record types shared by the hub, the transport and the connector
//!
//! An [`EventRecord`] is the unit that is retained in history and pushed to
//! subscribers. Its wire form is a flat JSON object:
//!
//! ```json
//! {"id":4,"timestamp":"2026-01-01T12:00:00Z","role":"assistant-reply","text":"..."}
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin/category of a published event
///
/// Clients are expected to ignore roles they do not recognise, so new variants
/// can be added without breaking existing listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// A prompt typed by the user
    User,
    /// The chat model's reply
    AssistantReply,
    /// Status and error notices produced by the panel itself
    SystemNotice,
    /// A refreshed summary of the host application's project state
    HostState,
}

impl Role {
    /// All known roles, in declaration order
    pub const ALL: [Role; 4] = [Role::User, Role::AssistantReply, Role::SystemNotice, Role::HostState];

    /// Wire tag for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::AssistantReply => "assistant-reply",
            Role::SystemNotice => "system-notice",
            Role::HostState => "host-state",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: '{}'", s))
    }
}

/// One immutable unit of broadcast information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing within one hub
    pub id: u64,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    /// Opaque payload, never inspected by the hub
    pub text: String,
}

/// Point-in-time view served by the snapshot endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Last known host project summary (empty when none)
    #[serde(rename = "hostInfo", default)]
    pub host_info: String,
    /// Retained history, most recent first
    #[serde(default)]
    pub history: Vec<EventRecord>,
}
