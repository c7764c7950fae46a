//! Panel controller
//!
//! Handles the panel's actions: asking the assistant, talking to the host,
//! and running the broadcast endpoint. Everything it tells the user is
//! published to the hub, so external listeners see the same conversation.

use eyre::{Context, Result, eyre};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Config, ServerConfig};
use crate::events::{BroadcastHub, Role};
use crate::host::{self, HostBridge};
use crate::llm::{self, ChatClient, ChatRequest, LlmError};
use crate::prefs::Preferences;
use crate::server::EndpointServer;

/// Notice published when the host info is added to a prompt
pub const CONTEXT_INCLUDED_NOTICE: &str = "Included project info in the prompt.";

/// Notice published when the host reports no project
pub const NO_PROJECT_INFO_NOTICE: &str = "No project info available.";

/// Prompt suffix carrying the last known host info
pub fn context_block(host_info: &str) -> String {
    format!("\n\n[Host project info]\n{}", host_info)
}

pub struct Panel {
    hub: Arc<BroadcastHub>,
    chat: Arc<dyn ChatClient>,
    bridge: Arc<dyn HostBridge>,
    prefs: Preferences,
    api_key_env: String,
    server_config: ServerConfig,
    endpoint: Option<EndpointServer>,
    model: Option<String>,
    last_reply: String,
    host_info: String,
}

impl Panel {
    pub fn new(
        hub: Arc<BroadcastHub>,
        chat: Arc<dyn ChatClient>,
        bridge: Arc<dyn HostBridge>,
        prefs: Preferences,
        config: &Config,
    ) -> Self {
        Self {
            hub,
            chat,
            bridge,
            prefs,
            api_key_env: config.llm.api_key_env.clone(),
            server_config: config.server.clone(),
            endpoint: None,
            model: None,
            last_reply: String::new(),
            host_info: String::new(),
        }
    }

    /// Build the hub, chat client, host bridge and preferences from config
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("Panel::from_config: called");
        let hub = Arc::new(BroadcastHub::from_config(&config.hub));
        let chat = llm::create_client(&config.llm).context("Failed to create chat client")?;
        let bridge = host::create_bridge(&config.host);
        let prefs = Preferences::load(config.prefs_path())?;
        Ok(Self::new(hub, chat, bridge, prefs, config))
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn last_reply(&self) -> &str {
        &self.last_reply
    }

    pub fn host_info(&self) -> &str {
        &self.host_info
    }

    /// Model used for the next prompts; `None` means the configured default
    pub fn set_model(&mut self, model: Option<String>) {
        self.model = model.filter(|m| !m.trim().is_empty());
    }

    /// Store a new credential and save it
    pub fn set_api_key(&mut self, key: &str) -> Result<&'static str> {
        debug!("Panel::set_api_key: called");
        self.prefs.api_key = key.trim().to_string();
        self.prefs.save()?;
        Ok(self.prefs.api_key_status())
    }

    /// Toggle sending host info along with prompts and save it
    pub fn set_include_host_info(&mut self, include: bool) -> Result<()> {
        debug!(include, "Panel::set_include_host_info: called");
        self.prefs.include_host_info = include;
        self.prefs.save()
    }

    fn notice(&self, text: impl Into<String>) {
        self.hub.publish(Role::SystemNotice, text);
    }

    /// URL of the running endpoint's stream, if any
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint.as_ref().map(|e| e.stream_url())
    }

    /// Start the broadcast endpoint; returns the stream URL
    ///
    /// Starting twice is harmless and returns the existing URL. A failure is
    /// reported to the user and returned; the panel keeps working without it.
    pub async fn start_endpoint(&mut self) -> Result<String> {
        debug!("Panel::start_endpoint: called");
        if let Some(url) = self.endpoint_url() {
            debug!(%url, "Panel::start_endpoint: already running");
            return Ok(url);
        }

        match EndpointServer::start(self.hub.clone(), &self.server_config).await {
            Ok(server) => {
                let url = server.stream_url();
                self.endpoint = Some(server);
                self.notice(format!("Broadcast endpoint started: {}", url));
                Ok(url)
            }
            Err(e) => {
                warn!(error = %e, "Panel::start_endpoint: failed");
                self.notice(format!("Broadcast endpoint error: {:#}", e));
                Err(e)
            }
        }
    }

    /// Shut the endpoint down, detaching every subscriber
    pub async fn stop_endpoint(&mut self) -> bool {
        debug!("Panel::stop_endpoint: called");
        match self.endpoint.take() {
            Some(server) => {
                server.stop().await;
                true
            }
            None => false,
        }
    }

    /// Send a prompt to the assistant and publish the exchange
    pub async fn ask(&mut self, prompt: &str) -> Result<String> {
        let prompt = prompt.trim();
        debug!(prompt_len = prompt.len(), "Panel::ask: called");
        if prompt.is_empty() {
            return Err(LlmError::EmptyPrompt.into());
        }
        let api_key = self.prefs.resolve_api_key(&self.api_key_env).ok_or(LlmError::MissingApiKey)?;

        let context = if self.prefs.include_host_info && !self.host_info.is_empty() {
            context_block(&self.host_info)
        } else {
            String::new()
        };

        self.hub.publish(Role::User, prompt);
        if !context.is_empty() {
            self.notice(CONTEXT_INCLUDED_NOTICE);
        }

        let mut request = ChatRequest::new(api_key, format!("{}{}", prompt, context));
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        match self.chat.chat(request).await {
            Ok(reply) => {
                info!(reply_len = reply.len(), "Panel::ask: reply received");
                self.last_reply = reply.clone();
                self.hub.publish(Role::AssistantReply, reply.as_str());
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "Panel::ask: chat call failed");
                self.notice(format!("Error: {}", e));
                Err(e.into())
            }
        }
    }

    /// Evaluate a host script, publishing failures
    async fn eval(&self, script: &str) -> Result<String> {
        match self.bridge.eval(script).await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                warn!(error = %e, "Panel::eval: host call failed");
                self.notice(format!("Error: {}", e));
                Err(e.into())
            }
        }
    }

    /// Ask the host for a project summary and share it
    pub async fn refresh_host_info(&mut self) -> Result<Option<String>> {
        debug!("Panel::refresh_host_info: called");
        let raw = self.eval(host::PROJECT_SUMMARY).await?;

        match host::normalize_result(&raw) {
            Some(info) => {
                self.host_info = info.clone();
                self.hub.set_external_state(info.as_str());
                self.notice(format!("Project info loaded.\n{}", info));
                self.hub.publish(Role::HostState, info.as_str());
                Ok(Some(info))
            }
            None => {
                self.host_info.clear();
                self.hub.set_external_state("");
                self.notice(NO_PROJECT_INFO_NOTICE);
                Ok(None)
            }
        }
    }

    /// Drop a marker at the host's playhead
    pub async fn add_marker(&mut self) -> Result<Option<String>> {
        debug!("Panel::add_marker: called");
        let raw = self.eval(host::ADD_MARKER).await?;
        Ok(self.publish_result(&raw))
    }

    /// Evaluate user code in the host
    pub async fn run_code(&mut self, code: &str) -> Result<Option<String>> {
        let code = code.trim();
        debug!(code_len = code.len(), "Panel::run_code: called");
        if code.is_empty() {
            return Err(eyre!("Enter code to run first."));
        }
        let raw = self.eval(&host::run_dynamic_call(code)).await?;
        Ok(self.publish_result(&raw))
    }

    /// Code block from the last assistant reply; empty when there is none
    pub fn last_code(&self) -> String {
        host::extract_code_block(&self.last_reply)
    }

    fn publish_result(&self, raw: &str) -> Option<String> {
        let result = host::normalize_result(raw);
        if let Some(text) = &result {
            self.notice(text.as_str());
        }
        result
    }
}
