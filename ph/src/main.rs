//! PanelHub - assistant panel with a live event broadcast
//!
//! CLI entry point.

use std::fs;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use futures::StreamExt;
use tracing::{debug, info};

use panelhub::cli::{Cli, Command, OutputFormat, get_log_path};
use panelhub::config::Config;
use panelhub::connector::{self, ConnectOptions};
use panelhub::events::{EventRecord, Role, Snapshot};
use panelhub::llm::{ChatRequest, LlmError, create_client};
use panelhub::prefs::Preferences;
use panelhub::repl;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can be traced
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(model = %config.llm.model, "PanelHub loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Panel) => {
            debug!("main: matched Panel command");
            repl::run_interactive(&config).await
        }
        Some(Command::Ask { prompt, model }) => {
            debug!(?model, "main: matched Ask command");
            cmd_ask(&config, &prompt, model).await
        }
        Some(Command::Watch {
            url,
            api_key,
            access_token,
            client_id,
        }) => {
            debug!(%url, "main: matched Watch command");
            let options = ConnectOptions {
                url,
                api_key,
                access_token,
                client_id,
            };
            cmd_watch(&options).await
        }
        Some(Command::Snapshot { base_url, format }) => {
            debug!(%base_url, ?format, "main: matched Snapshot command");
            cmd_snapshot(&base_url, format).await
        }
    }
}

/// One-shot prompt: print the reply to stdout
async fn cmd_ask(config: &Config, prompt: &str, model: Option<String>) -> Result<()> {
    debug!("cmd_ask: called");
    let prefs = Preferences::load(config.prefs_path())?;
    let api_key = prefs.resolve_api_key(&config.llm.api_key_env).ok_or(LlmError::MissingApiKey)?;

    let client = create_client(&config.llm)?;
    let mut request = ChatRequest::new(api_key, prompt);
    if let Some(model) = model {
        request = request.with_model(model);
    }

    let reply = client.chat(request).await?;
    println!("{}", reply);
    Ok(())
}

/// Print events from a remote endpoint until its stream ends
async fn cmd_watch(options: &ConnectOptions) -> Result<()> {
    debug!("cmd_watch: called");
    let mut stream = connector::connect(options)?;
    eprintln!("{} {}", "Watching".bright_cyan(), options.url);

    while let Some(item) = stream.next().await {
        let record = item?;
        println!("{}", format_record(&record));
    }

    eprintln!("{}", "Stream ended.".dimmed());
    Ok(())
}

/// Print what a remote endpoint currently retains
async fn cmd_snapshot(base_url: &str, format: OutputFormat) -> Result<()> {
    debug!("cmd_snapshot: called");
    let snapshot = connector::fetch_snapshot(base_url)
        .await
        .context(format!("Failed to fetch snapshot from {}", base_url))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => print_snapshot_text(&snapshot),
    }
    Ok(())
}

fn print_snapshot_text(snapshot: &Snapshot) {
    if snapshot.host_info.is_empty() {
        println!("{}", "Host info: (none)".dimmed());
    } else {
        println!("{}", "Host info:".bright_cyan());
        println!("{}", snapshot.host_info);
    }
    println!();

    if snapshot.history.is_empty() {
        println!("{}", "No events retained.".dimmed());
        return;
    }
    println!("{} ({}, newest first)", "History".bright_cyan(), snapshot.history.len());
    for record in &snapshot.history {
        println!("{}", format_record(record));
    }
}

fn format_record(record: &EventRecord) -> String {
    let role = match record.role {
        Role::User => record.role.as_str().bright_green(),
        Role::AssistantReply => record.role.as_str().bright_blue(),
        Role::SystemNotice => record.role.as_str().yellow(),
        Role::HostState => record.role.as_str().bright_magenta(),
    };
    format!(
        "{} {} {} {}",
        format!("#{}", record.id).dimmed(),
        record.timestamp.format("%H:%M:%S").to_string().dimmed(),
        role,
        record.text
    )
}
