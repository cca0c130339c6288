use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::json;

use crate::types::{DebateMode, LedgerEventKind};

const SUMMARY_LIMIT_CHARS: usize = 600;

/// Append-only JSONL run ledger. One line per controller event, tagged
/// with a run id so interleaved runs stay distinguishable.
#[derive(Debug, Clone)]
pub struct DebateLedger {
    path: PathBuf,
    run_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerRecord<'a> {
    pub round: Option<usize>,
    pub cycle: Option<usize>,
    pub speaker: Option<&'a str>,
    pub score: Option<f64>,
    pub status: Option<&'a str>,
    pub summary: Option<&'a str>,
}

impl DebateLedger {
    pub fn new(output_dir: &Path, mode: DebateMode) -> Self {
        let path = output_dir.join("DEBATE_LOG.jsonl");
        let run_id = format!("{}-{}", mode.as_str(), Local::now().format("%Y%m%d-%H%M%S"));
        Self { path, run_id }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, event: LedgerEventKind, rec: LedgerRecord<'_>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open `{}`", self.path.display()))?;

        let line = json!({
            "ts": Local::now().to_rfc3339(),
            "run_id": self.run_id,
            "event": event.as_str(),
            "round": rec.round,
            "cycle": rec.cycle,
            "speaker": rec.speaker,
            "score": rec.score,
            "status": rec.status,
            "summary": rec.summary.map(|s| truncate_chars(s, SUMMARY_LIMIT_CHARS)),
        });

        writeln!(file, "{}", line)?;
        Ok(())
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if s.chars().count() <= max {
        return s.to_string();
    }
    // The marker is 12 chars; below that budget there is no room for
    // any content at all.
    if max <= 12 {
        return "…(truncated)".chars().take(max).collect();
    }
    let keep = max - 12;
    let mut out = String::new();
    for (idx, ch) in s.chars().enumerate() {
        if idx >= keep {
            break;
        }
        out.push(ch);
    }
    out.push_str("…(truncated)");
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate_chars("short", 600), "short");
    }

    #[test]
    fn truncate_appends_marker() {
        let long = "y".repeat(700);
        let out = truncate_chars(&long, 600);
        assert_eq!(out.chars().count(), 600);
        assert!(out.ends_with("…(truncated)"));
    }

    #[test]
    fn truncate_smallest_budget_with_content() {
        let out = truncate_chars("abcdefghijklmnop", 13);
        assert_eq!(out, "a…(truncated)");
        assert_eq!(out.chars().count(), 13);
    }

    #[test]
    fn truncate_tiny_budget() {
        assert_eq!(truncate_chars("whatever else", 3), "…(t");
    }
}
