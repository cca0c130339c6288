use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

// ── Conversation message types ────────────────────────────────────────────────

// Discussion history travels inside the prompt text, so a turn is at
// most one system message plus one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ── Turn request ──────────────────────────────────────────────────────────────

/// Everything a participant needs for one turn. The adapter folds the
/// persona into a system message and the rest into the user prompt.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub prompt: String,
    pub persona: Option<String>,
}

impl TurnRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            persona: None,
        }
    }

    pub fn with_persona(mut self, persona: Option<&str>) -> Self {
        self.persona = persona.map(str::to_string);
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(persona) = &self.persona {
            messages.push(Message::system(format!(
                "You are a {persona}. Stay in this role for the whole debate."
            )));
        }
        messages.push(Message::user(self.prompt.clone()));
        messages
    }
}

// ── Participant capability ────────────────────────────────────────────────────

/// One debate participant. Implementations fail with a provider error on
/// HTTP failure, timeout, or empty content; the controller decides how to
/// degrade.
#[async_trait]
pub trait Participant: Send + Sync {
    fn name(&self) -> &str;
    async fn respond(&self, request: &TurnRequest) -> Result<String>;
}

// ── HTTP client builder ───────────────────────────────────────────────────────

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10));

    if let Ok(proxy_url) = std::env::var("HTTP_PROXY") {
        builder = builder.proxy(reqwest::Proxy::all(&proxy_url)?);
    }

    builder.build().map_err(Into::into)
}
