//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// PanelHub - assistant panel with a live event broadcast
#[derive(Parser)]
#[command(
    name = "ph",
    about = "Assistant panel that broadcasts every message to external listeners",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (default: panel)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive panel
    Panel,

    /// Ask the assistant once and print the reply
    Ask {
        /// Prompt text
        prompt: String,

        /// Model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Follow a broadcast endpoint and print each event
    Watch {
        /// Stream URL, e.g. http://127.0.0.1:PORT/sse
        url: String,

        /// Sent as the mcp_api_key query parameter
        #[arg(long)]
        api_key: Option<String>,

        /// Sent as the access_token query parameter
        #[arg(long)]
        access_token: Option<String>,

        /// Sent as the client_id query parameter
        #[arg(long)]
        client_id: Option<String>,
    },

    /// Print the retained history and host info of an endpoint
    Snapshot {
        /// Endpoint address, e.g. http://127.0.0.1:PORT
        base_url: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Where log output goes
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panelhub")
        .join("logs")
        .join("panelhub.log")
}

/// Output format for snapshot output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: '{}'. Valid: text, json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_panel() {
        let cli = Cli::try_parse_from(["ph"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_ask_with_model() {
        let cli = Cli::try_parse_from(["ph", "--log-level", "debug", "ask", "hello there", "-m", "gpt-4o"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Command::Ask { prompt, model }) => {
                assert_eq!(prompt, "hello there");
                assert_eq!(model.as_deref(), Some("gpt-4o"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_watch_credentials() {
        let cli = Cli::try_parse_from([
            "ph",
            "watch",
            "http://127.0.0.1:4000/sse",
            "--api-key",
            "k",
            "--client-id",
            "c",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Watch {
                url,
                api_key,
                access_token,
                client_id,
            }) => {
                assert_eq!(url, "http://127.0.0.1:4000/sse");
                assert_eq!(api_key.as_deref(), Some("k"));
                assert!(access_token.is_none());
                assert_eq!(client_id.as_deref(), Some("c"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_log_path_is_under_panelhub_logs() {
        let path = get_log_path();
        assert!(path.ends_with("panelhub/logs/panelhub.log"));
    }
}
