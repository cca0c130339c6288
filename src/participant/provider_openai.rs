use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ParticipantSettings;
use crate::participant::adapter::{Participant, Role, TurnRequest};

/// OpenAI-compatible chat-completions participant. Used for the arbiter
/// (Perplexity speaks this protocol) but works against any compatible
/// endpoint.
pub struct OpenAiParticipant {
    name: String,
    client: reqwest::Client,
    settings: ParticipantSettings,
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

// ── Implementation ────────────────────────────────────────────────────────────

impl OpenAiParticipant {
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
        let messages = request
            .messages()
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                },
                content: m.content.clone(),
            })
            .collect();
        ApiRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[async_trait]
impl Participant for OpenAiParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, request: &TurnRequest) -> Result<String> {
        let body = self.build_body(request);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.settings.api_key),
            )
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
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(anyhow!("API returned empty content"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_model_and_roles() {
        let p = OpenAiParticipant::new(
            "Arbiter",
            reqwest::Client::new(),
            ParticipantSettings {
                api_key: "k".to_string(),
                base_url: "http://localhost".to_string(),
                model: "sonar-pro".to_string(),
                temperature: 0.2,
                max_tokens: 512,
            },
        );
        let req = TurnRequest::new("decide").with_persona(Some("neutral arbiter"));
        let json = serde_json::to_value(p.build_body(&req)).unwrap();
        assert_eq!(json["model"], "sonar-pro");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 512);
    }

    #[test]
    fn first_choice_content_wins() {
        let raw = r#"{"choices":[{"message":{"content":"DECISION: APPROVE"}},{"message":{"content":"ignored"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap();
        assert_eq!(text, "DECISION: APPROVE");
    }
}
