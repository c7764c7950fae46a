//! REPL session management

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::events::{EventRecord, Role, Subscription};
use crate::panel::Panel;

/// Frames the session buffers between two actions
const SESSION_BUFFER: usize = 1024;

/// Interactive panel session
///
/// Output comes from the hub: the session holds its own subscription and
/// after every action prints the events published since the previous one,
/// which is exactly what external listeners receive.
pub struct ReplSession {
    panel: Panel,
    events: Subscription,
}

impl ReplSession {
    pub fn new(panel: Panel) -> Self {
        let events = panel.hub().subscribe_with_buffer(SESSION_BUFFER);
        Self { panel, events }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, autostart: bool) -> Result<()> {
        self.print_welcome();

        if autostart {
            // Failure is already reported through the hub
            let _ = self.panel.start_endpoint().await;
            self.print_new_events();
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    let result = if input.starts_with('/') {
                        match SlashCommand::parse(input) {
                            SlashCommand::Quit => break,
                            command => self.handle_slash_command(command).await,
                        }
                    } else {
                        self.panel.ask(input).await.map(|_| ())
                    };

                    let printed = self.print_new_events();
                    if let Err(e) = result {
                        debug!(error = %e, "ReplSession::run: command failed");
                        // Rejected before anything was published
                        if printed == 0 {
                            println!("{} {}", "Error:".red(), e);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        self.panel.stop_endpoint().await;
        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "PanelHub".bright_cyan().bold());
        println!(
            "API key: {}  Host info in prompts: {}",
            self.panel.prefs().api_key_status(),
            if self.panel.prefs().include_host_info { "on" } else { "off" }
        );
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, command: SlashCommand) -> Result<()> {
        match command {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Host => {
                self.panel.refresh_host_info().await?;
            }
            SlashCommand::Marker => {
                self.panel.add_marker().await?;
            }
            SlashCommand::Code => {
                let code = self.panel.last_code();
                if code.is_empty() {
                    println!("{}", "No code block in the last reply.".dimmed());
                } else {
                    println!("{}", code);
                }
            }
            SlashCommand::Run(code) => {
                self.panel.run_code(&code).await?;
            }
            SlashCommand::RunLast => {
                let code = self.panel.last_code();
                if code.is_empty() {
                    println!("{}", "No code block in the last reply.".dimmed());
                } else {
                    self.panel.run_code(&code).await?;
                }
            }
            SlashCommand::Include(Some(include)) => {
                self.panel.set_include_host_info(include)?;
                println!(
                    "{} {}",
                    "Host info in prompts:".dimmed(),
                    if include { "on" } else { "off" }
                );
            }
            SlashCommand::Include(None) => {
                println!("Usage: {}", "/include on|off".yellow());
            }
            SlashCommand::Key(key) => {
                let status = self.panel.set_api_key(&key)?;
                println!("{} {}", "API key:".dimmed(), status);
            }
            SlashCommand::Url => match self.panel.endpoint_url() {
                Some(url) => println!("{}", url),
                None => println!("{}", "Broadcast endpoint is not running.".dimmed()),
            },
            SlashCommand::History => self.print_history(),
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
            SlashCommand::Quit => {}
        }
        Ok(())
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:16} Show this help", "/help".yellow());
        println!("  {:16} Load project info from the host", "/host".yellow());
        println!("  {:16} Add a marker at the playhead", "/marker".yellow());
        println!("  {:16} Show the code block from the last reply", "/code".yellow());
        println!("  {:16} Run code in the host", "/run <code>".yellow());
        println!("  {:16} Run the code block from the last reply", "/runlast".yellow());
        println!("  {:16} Send project info with prompts", "/include on|off".yellow());
        println!("  {:16} Save the API key", "/key <value>".yellow());
        println!("  {:16} Show the broadcast endpoint URL", "/url".yellow());
        println!("  {:16} Show retained events", "/history".yellow());
        println!("  {:16} Exit", "/quit".yellow());
        println!();
        println!("Anything else is sent to the assistant.");
        println!();
    }

    fn print_history(&self) {
        let snapshot = self.panel.hub().snapshot();
        if snapshot.history.is_empty() {
            println!("{}", "No events yet.".dimmed());
            return;
        }

        println!();
        println!("{}", "Event History (oldest first):".bright_cyan());
        for record in snapshot.history.iter().rev() {
            let preview: String = record.text.chars().take(60).collect();
            let preview = if record.text.chars().count() > 60 {
                format!("{}...", preview)
            } else {
                preview
            };
            println!("  {:>4}. {}: {}", record.id, role_label(record.role), preview.replace('\n', " "));
        }
        if !snapshot.host_info.is_empty() {
            println!("{} {}", "Host info:".dimmed(), snapshot.host_info.replace('\n', " "));
        }
        println!();
    }

    /// Print records published since the last call, oldest first
    fn print_new_events(&mut self) -> usize {
        let records = self.events.drain_records();
        for record in &records {
            print_record(record);
        }

        // Stopping the endpoint detaches every subscriber, this one included
        let hub = self.panel.hub().clone();
        if !hub.is_attached(self.events.handle()) {
            debug!("ReplSession::print_new_events: resubscribing");
            self.events = hub.subscribe_with_buffer(SESSION_BUFFER);
        }
        records.len()
    }
}

fn role_label(role: Role) -> colored::ColoredString {
    match role {
        Role::User => "You".bright_green(),
        Role::AssistantReply => "Assistant".bright_blue(),
        Role::SystemNotice => "System".yellow(),
        Role::HostState => "Host".bright_magenta(),
    }
}

fn print_record(record: &EventRecord) {
    match record.role {
        // The prompt is already on screen
        Role::User => {}
        Role::AssistantReply => {
            println!();
            println!("{}", record.text);
            println!();
        }
        Role::SystemNotice => println!("{}", record.text.dimmed()),
        Role::HostState => {}
    }
}

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Host,
    Marker,
    Code,
    Run(String),
    RunLast,
    Include(Option<bool>),
    Key(String),
    Url,
    History,
    Quit,
    Unknown(String),
}

impl SlashCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        match cmd {
            "/help" | "/h" => SlashCommand::Help,
            "/host" => SlashCommand::Host,
            "/marker" => SlashCommand::Marker,
            "/code" => SlashCommand::Code,
            "/run" => SlashCommand::Run(rest.to_string()),
            "/runlast" => SlashCommand::RunLast,
            "/include" => SlashCommand::Include(match rest {
                "on" | "true" | "yes" => Some(true),
                "off" | "false" | "no" => Some(false),
                _ => None,
            }),
            "/key" => SlashCommand::Key(rest.to_string()),
            "/url" => SlashCommand::Url,
            "/history" => SlashCommand::History,
            "/quit" | "/q" | "/exit" => SlashCommand::Quit,
            other => SlashCommand::Unknown(other.to_string()),
        }
    }
}
