use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ParticipantSettings;
use crate::participant::adapter::{Participant, Role, TurnRequest};

/// Anthropic messages-API participant.
pub struct AnthropicParticipant {
    name: String,
    client: reqwest::Client,
    settings: ParticipantSettings,
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

// ── Implementation ────────────────────────────────────────────────────────────

impl AnthropicParticipant {
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        settings: ParticipantSettings,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            settings,
        }
    }

    fn build_body(&self, request: &TurnRequest) -> ApiRequest {
        let messages = request.messages();
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());
        let api_messages = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: "user",
                content: m.content.clone(),
            })
            .collect();
        ApiRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system,
            messages: api_messages,
        }
    }
}

#[async_trait]
impl Participant for AnthropicParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, request: &TurnRequest) -> Result<String> {
        let body = self.build_body(request);
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.settings.base_url))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("HTTP request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error {status}: {text}"));
        }

        let parsed: ApiResponse = resp.json().await.context("failed to parse API response")?;
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(anyhow!("API returned empty content"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant() -> AnthropicParticipant {
        AnthropicParticipant::new(
            "Claude",
            reqwest::Client::new(),
            ParticipantSettings {
                api_key: "k".to_string(),
                base_url: "http://localhost".to_string(),
                model: "claude-sonnet-4-5-20250929".to_string(),
                temperature: 0.7,
                max_tokens: 1024,
            },
        )
    }

    #[test]
    fn persona_lands_in_system_field() {
        let req = TurnRequest::new("go").with_persona(Some("security auditor"));
        let body = participant().build_body(&req);
        assert!(body.system.as_deref().unwrap().contains("security auditor"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
    }

    #[test]
    fn persona_free_body_omits_system_field() {
        let body = participant().build_body(&TurnRequest::new("go"));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["model"], "claude-sonnet-4-5-20250929");
    }

    #[test]
    fn response_text_blocks_are_joined() {
        let raw = r#"{"content":[{"type":"text","text":"a"},{"type":"tool_use"},{"type":"text","text":"b"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        assert_eq!(text, "ab");
    }
}
