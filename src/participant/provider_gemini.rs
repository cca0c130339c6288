use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ParticipantSettings;
use crate::participant::adapter::{Participant, Role, TurnRequest};

/// Gemini generateContent participant.
pub struct GeminiParticipant {
    name: String,
    client: reqwest::Client,
    settings: ParticipantSettings,
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct ApiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ── Implementation ────────────────────────────────────────────────────────────

impl GeminiParticipant {
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
        let system_instruction = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| Content {
                role: None,
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            });
        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some("user"),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();
        ApiRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
            },
        }
    }
}

#[async_trait]
impl Participant for GeminiParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, request: &TurnRequest) -> Result<String> {
        let body = self.build_body(request);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.settings.base_url, self.settings.model, self.settings.api_key,
        );
        let resp = self
            .client
            .post(&url)
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
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(anyhow!("API returned empty content"));
        }
        Ok(text)
    }
}
