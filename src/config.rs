use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::types::DebateMode;

pub const CONFIG_FILE_NAME: &str = "debate.toml";

const DEFAULT_MAX_ROUNDS: usize = 4;
const DEFAULT_OPENING_ROUNDS: usize = 2;
const DEFAULT_MAX_CYCLES: usize = 3;
const DEFAULT_ROUNDS_PER_CYCLE: usize = 3;
const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.85;
const DEFAULT_EXPERT_THRESHOLD: f64 = 0.50;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

const DEFAULT_PRIMARY_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_SECONDARY_MODEL: &str = "gemini-2.0-flash-exp";
const DEFAULT_ARBITER_MODEL: &str = "sonar-pro";

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

pub const DEFAULT_FIRST_PERSONA: &str =
    "technical expert focused on implementation pragmatics";
pub const DEFAULT_SECOND_PERSONA: &str =
    "systems architect focused on long-term design integrity";

/// Connection and generation settings for one remote participant.
#[derive(Debug, Clone)]
pub struct ParticipantSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Everything the controller and adapters need, resolved once at startup.
/// Precedence: built-in defaults < `debate.toml` < environment < CLI flags.
/// After construction nothing reads the process environment again.
#[derive(Debug, Clone)]
pub struct DebateConfig {
    pub mode: DebateMode,
    pub max_rounds: usize,
    pub opening_rounds: usize,
    pub max_cycles: usize,
    pub rounds_per_cycle: usize,
    /// How many arbiter advisory calls free-discussion mode may spend
    /// before the ceiling forces the final one.
    pub arbitration_budget: usize,
    pub consensus_threshold: f64,
    pub expert_threshold: f64,
    pub expert_mode: bool,
    pub use_personas: bool,
    /// Ask the primary participant to propose both personas instead of
    /// using the fixed strings below.
    pub dynamic_personas: bool,
    pub first_persona: String,
    pub second_persona: String,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub primary: ParticipantSettings,
    pub secondary: ParticipantSettings,
    /// None when no arbiter credential is configured; arbitration is then
    /// skipped and never treated as approval.
    pub arbiter: Option<ParticipantSettings>,
}

// ── debate.toml shape ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    debate: FileDebateSection,
    #[serde(default)]
    participants: FileParticipantsSection,
}

#[derive(Debug, Default, Deserialize)]
struct FileDebateSection {
    mode: Option<String>,
    max_rounds: Option<usize>,
    opening_rounds: Option<usize>,
    max_cycles: Option<usize>,
    rounds_per_cycle: Option<usize>,
    consensus_threshold: Option<f64>,
    expert_threshold: Option<f64>,
    use_personas: Option<bool>,
    dynamic_personas: Option<bool>,
    first_persona: Option<String>,
    second_persona: Option<String>,
    output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileParticipantsSection {
    #[serde(default)]
    primary: FileParticipant,
    #[serde(default)]
    secondary: FileParticipant,
    #[serde(default)]
    arbiter: FileParticipant,
}

#[derive(Debug, Default, Deserialize)]
struct FileParticipant {
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl DebateConfig {
    /// Resolve the full configuration. `dotenvy::dotenv()` must already
    /// have run so `.env` entries are visible as process env.
    pub fn load(cwd: &Path) -> Result<Self> {
        let file = load_file_config(&cwd.join(CONFIG_FILE_NAME))?;

        let primary_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY env var not set (required for the primary participant)")?;
        let secondary_key = env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY env var not set (required for the secondary participant)")?;
        // Arbiter credential is optional; without it arbitration is skipped.
        let arbiter_key = env::var("PERPLEXITY_API_KEY").ok().filter(|k| !k.is_empty());

        let primary = ParticipantSettings {
            api_key: primary_key,
            base_url: env_or("ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL),
            model: file
                .participants
                .primary
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            temperature: file.participants.primary.temperature.unwrap_or(0.7),
            max_tokens: file.participants.primary.max_tokens.unwrap_or(1024),
        };
        let secondary = ParticipantSettings {
            api_key: secondary_key,
            base_url: env_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            model: file
                .participants
                .secondary
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_SECONDARY_MODEL.to_string()),
            temperature: file.participants.secondary.temperature.unwrap_or(0.7),
            max_tokens: file.participants.secondary.max_tokens.unwrap_or(1024),
        };
        let arbiter = arbiter_key.map(|api_key| ParticipantSettings {
            api_key,
            base_url: env_or("PERPLEXITY_BASE_URL", DEFAULT_PERPLEXITY_BASE_URL),
            model: file
                .participants
                .arbiter
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ARBITER_MODEL.to_string()),
            temperature: file.participants.arbiter.temperature.unwrap_or(0.2),
            max_tokens: file.participants.arbiter.max_tokens.unwrap_or(1024),
        });

        let mode = match &file.debate.mode {
            Some(raw) => DebateMode::from_str(raw)
                .with_context(|| format!("invalid debate mode `{raw}` in {CONFIG_FILE_NAME}"))?,
            None => DebateMode::CyclicApproval,
        };

        let timeout_ms = env::var("API_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

        let config = Self {
            mode,
            max_rounds: file.debate.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
            opening_rounds: file.debate.opening_rounds.unwrap_or(DEFAULT_OPENING_ROUNDS),
            max_cycles: file.debate.max_cycles.unwrap_or(DEFAULT_MAX_CYCLES),
            rounds_per_cycle: file
                .debate
                .rounds_per_cycle
                .unwrap_or(DEFAULT_ROUNDS_PER_CYCLE),
            arbitration_budget: 1,
            consensus_threshold: file
                .debate
                .consensus_threshold
                .unwrap_or(DEFAULT_CONSENSUS_THRESHOLD),
            expert_threshold: file
                .debate
                .expert_threshold
                .unwrap_or(DEFAULT_EXPERT_THRESHOLD),
            expert_mode: false,
            use_personas: file.debate.use_personas.unwrap_or(true),
            dynamic_personas: file.debate.dynamic_personas.unwrap_or(true),
            first_persona: file
                .debate
                .first_persona
                .clone()
                .unwrap_or_else(|| DEFAULT_FIRST_PERSONA.to_string()),
            second_persona: file
                .debate
                .second_persona
                .clone()
                .unwrap_or_else(|| DEFAULT_SECOND_PERSONA.to_string()),
            request_timeout: Duration::from_millis(timeout_ms),
            output_dir: file
                .debate
                .output_dir
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.join("docs").join("brain")),
            primary,
            secondary,
            arbiter,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            bail!("max_rounds must be at least 1");
        }
        if self.max_cycles == 0 || self.rounds_per_cycle == 0 {
            bail!("max_cycles and rounds_per_cycle must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.consensus_threshold) {
            bail!(
                "consensus_threshold must be within [0, 1], got {}",
                self.consensus_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.expert_threshold) {
            bail!(
                "expert_threshold must be within [0, 1], got {}",
                self.expert_threshold
            );
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let settings = ParticipantSettings {
            api_key: "test-key".to_string(),
            base_url: "http://localhost".to_string(),
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: 256,
        };
        Self {
            mode: DebateMode::Threshold,
            max_rounds: DEFAULT_MAX_ROUNDS,
            opening_rounds: DEFAULT_OPENING_ROUNDS,
            max_cycles: DEFAULT_MAX_CYCLES,
            rounds_per_cycle: DEFAULT_ROUNDS_PER_CYCLE,
            arbitration_budget: 1,
            consensus_threshold: DEFAULT_CONSENSUS_THRESHOLD,
            expert_threshold: DEFAULT_EXPERT_THRESHOLD,
            expert_mode: false,
            use_personas: false,
            dynamic_personas: false,
            first_persona: DEFAULT_FIRST_PERSONA.to_string(),
            second_persona: DEFAULT_SECOND_PERSONA.to_string(),
            request_timeout: Duration::from_secs(5),
            output_dir: std::env::temp_dir(),
            primary: settings.clone(),
            secondary: settings.clone(),
            arbiter: Some(settings),
        }
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse `{}`", path.display()))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_parses_partial_toml() {
        let raw = r#"
            [debate]
            mode = "threshold"
            max_rounds = 6
            consensus_threshold = 0.9

            [participants.primary]
            model = "claude-opus-4"
            temperature = 0.3
        "#;
        let parsed: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(parsed.debate.mode.as_deref(), Some("threshold"));
        assert_eq!(parsed.debate.max_rounds, Some(6));
        assert_eq!(parsed.debate.consensus_threshold, Some(0.9));
        assert_eq!(
            parsed.participants.primary.model.as_deref(),
            Some("claude-opus-4")
        );
        assert_eq!(parsed.participants.primary.temperature, Some(0.3));
        assert!(parsed.participants.arbiter.model.is_none());
    }

    #[test]
    fn file_config_empty_is_all_defaults() {
        let parsed: FileConfig = toml::from_str("").unwrap();
        assert!(parsed.debate.max_rounds.is_none());
        assert!(parsed.participants.secondary.max_tokens.is_none());
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut config = DebateConfig::for_tests();
        config.consensus_threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_ceiling() {
        let mut config = DebateConfig::for_tests();
        config.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_passes_validation() {
        assert!(DebateConfig::for_tests().validate().is_ok());
    }
}
