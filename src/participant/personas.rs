use std::sync::LazyLock;

use regex::Regex;

use crate::config::DebateConfig;
use crate::debate::prompts::build_persona_assignment_prompt;
use crate::participant::adapter::{Participant, TurnRequest};

// `[ \t]*` rather than `\s*` after the colon: `\s` matches newlines, and
// a blank EXPERT_A: line must not capture the EXPERT_B: line below it.
static EXPERT_A_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*EXPERT_A:[ \t]*(.+)$").unwrap());
static EXPERT_B_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*EXPERT_B:[ \t]*(.+)$").unwrap());

/// Expert roles for the two debaters. `dynamic` records whether the pair
/// came from a model proposal or from configuration.
#[derive(Debug, Clone)]
pub struct PersonaPair {
    pub first: String,
    pub second: String,
    pub dynamic: bool,
}

impl PersonaPair {
    pub fn fixed(config: &DebateConfig) -> Self {
        Self {
            first: config.first_persona.clone(),
            second: config.second_persona.clone(),
            dynamic: false,
        }
    }
}

/// Choose personas for the debate. Dynamic assignment asks the primary
/// participant once and falls back to the configured pair on any failure,
/// so persona selection can never abort a debate.
pub async fn assign_personas(
    config: &DebateConfig,
    primary: &dyn Participant,
    topic: &str,
) -> PersonaPair {
    if !config.dynamic_personas {
        return PersonaPair::fixed(config);
    }
    let request = TurnRequest::new(build_persona_assignment_prompt(topic));
    match primary.respond(&request).await {
        Ok(text) => parse_persona_pair(&text).unwrap_or_else(|| PersonaPair::fixed(config)),
        Err(_) => PersonaPair::fixed(config),
    }
}

fn parse_persona_pair(text: &str) -> Option<PersonaPair> {
    let first = capture_role(&EXPERT_A_LINE, text)?;
    let second = capture_role(&EXPERT_B_LINE, text)?;
    Some(PersonaPair {
        first,
        second,
        dynamic: true,
    })
}

fn capture_role(re: &Regex, text: &str) -> Option<String> {
    let role = re.captures(text)?[1].trim().to_string();
    if role.is_empty() { None } else { Some(role) }
}
