use crossterm::style::Stylize;
use serde::Serialize;

use crate::debate::transcript::Transcript;
use crate::types::{DebateMode, DebateStatus};

/// Terminal arbiter verdict carried in the result when arbitration ran.
#[derive(Debug, Clone, Serialize)]
pub struct ArbiterVerdict {
    pub approved: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerSummary {
    pub name: String,
    pub persona: Option<String>,
    pub final_position: String,
}

/// Immutable record of a finished debate, built once at termination.
#[derive(Debug, Clone, Serialize)]
pub struct DebateResult {
    pub topic: String,
    pub timestamp: String,
    pub mode: DebateMode,
    pub rounds: usize,
    pub cycles: usize,
    pub status: DebateStatus,
    /// Final similarity score where the mode computed one.
    pub score: Option<f64>,
    pub first: SpeakerSummary,
    pub second: SpeakerSummary,
    pub arbiter_verdict: Option<ArbiterVerdict>,
    pub transcript: Transcript,
}

impl DebateResult {
    /// Colored console report printed at the end of a run.
    pub fn render_report(&self) -> String {
        let status = match self.status {
            DebateStatus::Consensus | DebateStatus::Arbitrated => {
                self.status.as_str().green().bold().to_string()
            }
            DebateStatus::PartialConsensus => self.status.as_str().yellow().bold().to_string(),
            DebateStatus::Disagreement | DebateStatus::MaxRoundsReached => {
                self.status.as_str().red().bold().to_string()
            }
        };
        let mut out = String::new();
        out.push_str(&format!("\n{}\n", "═".repeat(60)));
        out.push_str(&format!("  {} {}\n", "Topic:".bold(), self.topic));
        out.push_str(&format!(
            "  {} {}   {} {}   {} {}\n",
            "Mode:".bold(),
            self.mode.as_str(),
            "Rounds:".bold(),
            self.rounds,
            "Status:".bold(),
            status,
        ));
        if let Some(score) = self.score {
            out.push_str(&format!("  {} {score:.3}\n", "Score:".bold()));
        }
        if let Some(verdict) = &self.arbiter_verdict {
            let tag = if verdict.approved {
                "approved".green().to_string()
            } else {
                "rejected".red().to_string()
            };
            out.push_str(&format!("  {} {tag}: {}\n", "Arbiter:".bold(), verdict.feedback));
        }
        for speaker in [&self.first, &self.second] {
            out.push_str(&format!("\n  {}", speaker.name.as_str().bold()));
            if let Some(persona) = &speaker.persona {
                out.push_str(&format!(" ({persona})"));
            }
            out.push_str(&format!("\n  {}\n", summarize(&speaker.final_position, 400)));
        }
        out.push_str(&format!("{}\n", "═".repeat(60)));
        out
    }
}

fn summarize(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::transcript::Transcript;

    fn sample() -> DebateResult {
        DebateResult {
            topic: "adopt a monorepo".to_string(),
            timestamp: "2026-08-23 10:00:00".to_string(),
            mode: DebateMode::Threshold,
            rounds: 2,
            cycles: 0,
            status: DebateStatus::Consensus,
            score: Some(0.91),
            first: SpeakerSummary {
                name: "Claude".to_string(),
                persona: None,
                final_position: "yes".to_string(),
            },
            second: SpeakerSummary {
                name: "Gemini".to_string(),
                persona: Some("release engineer".to_string()),
                final_position: "yes".to_string(),
            },
            arbiter_verdict: None,
            transcript: Transcript::new(),
        }
    }

    #[test]
    fn serializes_with_snake_case_status() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "consensus");
        assert_eq!(json["mode"], "threshold");
        assert_eq!(json["second"]["persona"], "release engineer");
    }

    #[test]
    fn report_mentions_topic_score_and_personas() {
        let rendered = sample().render_report();
        assert!(rendered.contains("adopt a monorepo"));
        assert!(rendered.contains("0.910"));
        assert!(rendered.contains("release engineer"));
    }

    #[test]
    fn summarize_truncates_long_positions() {
        let long = "x".repeat(500);
        let short = summarize(&long, 400);
        assert!(short.chars().count() == 401 && short.ends_with('…'));
    }
}
