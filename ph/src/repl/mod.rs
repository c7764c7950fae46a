//! Interactive panel
//!
//! A terminal rendition of the panel: prompts go to the assistant, slash
//! commands drive the host and the broadcast endpoint.

mod session;

pub use session::{ReplSession, SlashCommand};

use eyre::Result;

use crate::config::Config;
use crate::panel::Panel;

/// Run the interactive panel
///
/// This is the main entry point for `ph` and `ph panel`.
pub async fn run_interactive(config: &Config) -> Result<()> {
    let panel = Panel::from_config(config)?;
    let mut session = ReplSession::new(panel);
    session.run(config.server.autostart).await
}
