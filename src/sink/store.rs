use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;

use crate::debate::result::DebateResult;

/// Write the full structured result as `debate_<timestamp>.json` and
/// return the path. Callers treat failure as non-fatal: the debate
/// outcome stands even when the disk does not cooperate.
pub fn save_result(output_dir: &Path, result: &DebateResult) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create `{}`", output_dir.display()))?;
    let path = output_dir.join(format!(
        "debate_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
    fs::write(&path, json).with_context(|| format!("failed to write `{}`", path.display()))?;
    Ok(path)
}

/// Append a human-readable summary block to DECISIONS.md.
pub fn append_decision_log(output_dir: &Path, result: &DebateResult) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create `{}`", output_dir.display()))?;
    let path = output_dir.join("DECISIONS.md");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open `{}`", path.display()))?;
    write!(file, "{}", render_decision_block(result))
        .with_context(|| format!("failed to append to `{}`", path.display()))?;
    Ok(path)
}

fn render_decision_block(result: &DebateResult) -> String {
    let mut block = String::new();
    block.push_str(&format!("\n## Decision: {}\n\n", result.topic));
    block.push_str(&format!("- Date: {}\n", result.timestamp));
    block.push_str(&format!("- Mode: {}\n", result.mode.as_str()));
    block.push_str(&format!("- Status: {}\n", result.status.as_str()));
    block.push_str(&format!("- Rounds: {}\n", result.rounds));
    if result.cycles > 0 {
        block.push_str(&format!("- Cycles: {}\n", result.cycles));
    }
    if let Some(score) = result.score {
        block.push_str(&format!("- Score: {score:.3}\n"));
    }
    if let Some(verdict) = &result.arbiter_verdict {
        block.push_str(&format!(
            "- Arbiter: {} ({})\n",
            if verdict.approved { "approved" } else { "rejected" },
            verdict.feedback.lines().next().unwrap_or(""),
        ));
    }
    for speaker in [&result.first, &result.second] {
        block.push_str(&format!("\n### {}", speaker.name));
        if let Some(persona) = &speaker.persona {
            block.push_str(&format!(" ({persona})"));
        }
        block.push_str(&format!("\n\n{}\n", speaker.final_position.trim()));
    }
    block.push('\n');
    block
}
