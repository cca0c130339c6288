mod config;
mod debate;
mod participant;
mod sink;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use crossterm::style::Stylize;

use config::DebateConfig;
use debate::controller::DebateController;
use participant::adapter::{Participant, build_http_client};
use participant::provider_anthropic::AnthropicParticipant;
use participant::provider_gemini::GeminiParticipant;
use participant::provider_openai::OpenAiParticipant;
use sink::audit::{DebateLedger, LedgerRecord};
use sink::store::{append_decision_log, save_result};
use types::{DebateMode, LedgerEventKind};

const USAGE: &str = "usage: debatebot <topic> [--mode free|cyclic|threshold] \
[--max-rounds N] [--max-cycles N] [--expert] [--quick] [--no-personas] [--output PATH]";

// ── CLI arguments ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    topic: String,
    mode: Option<DebateMode>,
    max_rounds: Option<usize>,
    max_cycles: Option<usize>,
    expert: bool,
    quick: bool,
    no_personas: bool,
    output: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mode" => {
                let raw = iter.next().ok_or_else(|| anyhow::anyhow!("--mode needs a value"))?;
                parsed.mode = Some(
                    DebateMode::from_str(raw)
                        .ok_or_else(|| anyhow::anyhow!("unknown mode `{raw}`"))?,
                );
            }
            "--max-rounds" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--max-rounds needs a value"))?;
                parsed.max_rounds = Some(raw.parse()?);
            }
            "--max-cycles" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--max-cycles needs a value"))?;
                parsed.max_cycles = Some(raw.parse()?);
            }
            "--expert" => parsed.expert = true,
            "--quick" => parsed.quick = true,
            "--no-personas" => parsed.no_personas = true,
            "--output" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--output needs a value"))?;
                parsed.output = Some(PathBuf::from(raw));
            }
            flag if flag.starts_with("--") => bail!("unknown flag `{flag}`"),
            topic if parsed.topic.is_empty() => parsed.topic = topic.to_string(),
            extra => bail!("unexpected argument `{extra}`"),
        }
    }
    if parsed.topic.trim().is_empty() {
        bail!("missing debate topic");
    }
    Ok(parsed)
}

fn apply_overrides(config: &mut DebateConfig, args: &CliArgs) {
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(max_cycles) = args.max_cycles {
        config.max_cycles = max_cycles;
    }
    if args.expert {
        config.expert_mode = true;
    }
    if args.quick {
        config.max_rounds = 2;
    }
    if args.no_personas {
        config.use_personas = false;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };
    match run(args).await {
        Ok(adopted) => {
            if adopted {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

async fn run(args: CliArgs) -> Result<bool> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = DebateConfig::load(&cwd)?;
    apply_overrides(&mut config, &args);

    let client = build_http_client(config.request_timeout)?;
    let first: Box<dyn Participant> = Box::new(AnthropicParticipant::new(
        "Claude",
        client.clone(),
        config.primary.clone(),
    ));
    let second: Box<dyn Participant> = Box::new(GeminiParticipant::new(
        "Gemini",
        client.clone(),
        config.secondary.clone(),
    ));
    let arbiter: Option<Box<dyn Participant>> = config.arbiter.clone().map(|settings| {
        Box::new(OpenAiParticipant::new("Perplexity", client.clone(), settings))
            as Box<dyn Participant>
    });
    if arbiter.is_none() {
        eprintln!(
            "{}",
            "no arbiter configured (PERPLEXITY_API_KEY unset); arbitration disabled".dark_yellow()
        );
    }

    let ledger = DebateLedger::new(&config.output_dir, config.mode);
    println!(
        "{} {} ({} mode, ledger at {})",
        "Debating:".bold(),
        args.topic,
        config.mode.as_str(),
        ledger.path().display(),
    );

    let output_dir = config.output_dir.clone();
    let controller = DebateController::new(
        config,
        args.topic,
        first,
        second,
        arbiter,
        Some(ledger.clone()),
    );
    let result = controller.run().await;

    print!("{}", result.render_report());

    // The debate outcome stands even when persistence fails.
    match save_result(&output_dir, &result) {
        Ok(path) => println!("{} {}", "Saved:".bold(), path.display()),
        Err(e) => {
            eprintln!("{} {e:#}", "failed to save result:".dark_yellow());
            let _ = ledger.write(
                LedgerEventKind::PersistenceError,
                LedgerRecord {
                    summary: Some(&format!("{e:#}")),
                    ..Default::default()
                },
            );
        }
    }
    match append_decision_log(&output_dir, &result) {
        Ok(path) => println!("{} {}", "Logged:".bold(), path.display()),
        Err(e) => {
            eprintln!("{} {e:#}", "failed to update DECISIONS.md:".dark_yellow());
            let _ = ledger.write(
                LedgerEventKind::PersistenceError,
                LedgerRecord {
                    summary: Some(&format!("{e:#}")),
                    ..Default::default()
                },
            );
        }
    }

    Ok(result.status.is_adopted())
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, apply_overrides, parse_args};
    use crate::config::DebateConfig;
    use crate::types::DebateMode;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn topic_and_flags_parse() {
        let parsed = parse_args(&args(&[
            "should we shard",
            "--mode",
            "cyclic",
            "--max-cycles",
            "2",
            "--expert",
            "--no-personas",
        ]))
        .unwrap();
        assert_eq!(parsed.topic, "should we shard");
        assert_eq!(parsed.mode, Some(DebateMode::CyclicApproval));
        assert_eq!(parsed.max_cycles, Some(2));
        assert!(parsed.expert);
        assert!(parsed.no_personas);
        assert!(!parsed.quick);
    }

    #[test]
    fn missing_topic_is_an_error() {
        assert!(parse_args(&args(&["--quick"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse_args(&args(&["topic", "--loud"])).is_err());
        assert!(parse_args(&args(&["topic", "extra topic"])).is_err());
    }

    #[test]
    fn mode_value_is_validated() {
        assert!(parse_args(&args(&["topic", "--mode", "chaotic"])).is_err());
    }

    #[test]
    fn quick_lowers_the_ceiling_to_two() {
        let mut config = DebateConfig::for_tests();
        let parsed = CliArgs {
            topic: "t".to_string(),
            quick: true,
            ..Default::default()
        };
        apply_overrides(&mut config, &parsed);
        assert_eq!(config.max_rounds, 2);
    }

    #[test]
    fn overrides_apply_in_place() {
        let mut config = DebateConfig::for_tests();
        let parsed = parse_args(&args(&[
            "t",
            "--mode",
            "free",
            "--max-rounds",
            "7",
            "--output",
            "/tmp/debates",
        ]))
        .unwrap();
        apply_overrides(&mut config, &parsed);
        assert_eq!(config.mode, DebateMode::FreeDiscussion);
        assert_eq!(config.max_rounds, 7);
        assert_eq!(config.output_dir.to_str().unwrap(), "/tmp/debates");
    }
}
