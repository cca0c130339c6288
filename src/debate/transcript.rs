use chrono::Local;
use serde::Serialize;

/// One recorded exchange: what a participant was asked and what it said.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub round: usize,
    pub speaker: String,
    pub prompt: String,
    pub response: String,
    pub timestamp: String,
}

/// Append-only record of the whole debate. Turns are never edited or
/// removed after insertion; context rendering always reads the full list
/// in chronological order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, round: usize, speaker: &str, prompt: &str, response: &str) {
        self.turns.push(Turn {
            round,
            speaker: speaker.to_string(),
            prompt: prompt.to_string(),
            response: response.to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Conversation so far, rendered the way later round prompts consume it.
    pub fn running_context(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(&format!(
                "\n\n{} (Round {}):\n{}",
                turn.speaker, turn.round, turn.response
            ));
        }
        out
    }

    /// Most recent response from the given speaker, empty if it has not
    /// spoken yet.
    pub fn final_position(&self, speaker: &str) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|t| t.speaker == speaker)
            .map(|t| t.response.as_str())
            .unwrap_or("")
    }
}
