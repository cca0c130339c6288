use std::time::Duration;

use chrono::Local;

use crate::config::DebateConfig;
use crate::debate::prompts;
use crate::debate::result::{ArbiterVerdict, DebateResult, SpeakerSummary};
use crate::debate::signals::{ArbiterDecision, parse_agreement, parse_arbiter_decision};
use crate::debate::similarity::consensus_score;
use crate::debate::transcript::Transcript;
use crate::participant::adapter::{Participant, TurnRequest};
use crate::participant::personas::{PersonaPair, assign_personas};
use crate::sink::audit::{DebateLedger, LedgerRecord};
use crate::types::{AgreementKind, DebateMode, DebateStatus, LedgerEventKind};

const RETRY_BACKOFF: Duration = Duration::from_millis(300);

/// Drives one debate to termination. All three modes share the same
/// degradation rules: a provider failure after one retry becomes an
/// inline sentinel turn, the transcript is append-only, and the round
/// or cycle ceiling always ends the debate.
pub struct DebateController {
    config: DebateConfig,
    topic: String,
    first: Box<dyn Participant>,
    second: Box<dyn Participant>,
    arbiter: Option<Box<dyn Participant>>,
    ledger: Option<DebateLedger>,
    transcript: Transcript,
    personas: Option<PersonaPair>,
    rounds: usize,
    cycles: usize,
    score: Option<f64>,
    verdict: Option<ArbiterVerdict>,
    arbitrations: usize,
}

struct ArbiterExchange {
    name: String,
    prompt: String,
    response: String,
}

impl DebateController {
    pub fn new(
        config: DebateConfig,
        topic: impl Into<String>,
        first: Box<dyn Participant>,
        second: Box<dyn Participant>,
        arbiter: Option<Box<dyn Participant>>,
        ledger: Option<DebateLedger>,
    ) -> Self {
        Self {
            config,
            topic: topic.into(),
            first,
            second,
            arbiter,
            ledger,
            transcript: Transcript::new(),
            personas: None,
            rounds: 0,
            cycles: 0,
            score: None,
            verdict: None,
            arbitrations: 0,
        }
    }

    pub async fn run(mut self) -> DebateResult {
        self.log(
            LedgerEventKind::DebateStarted,
            LedgerRecord {
                status: Some(self.config.mode.as_str()),
                summary: Some(self.topic.as_str()),
                ..Default::default()
            },
        );

        if self.config.use_personas {
            let pair = assign_personas(&self.config, self.first.as_ref(), &self.topic).await;
            self.log(
                LedgerEventKind::PersonasAssigned,
                LedgerRecord {
                    status: Some(if pair.dynamic { "dynamic" } else { "fixed" }),
                    summary: Some(&format!("{} / {}", pair.first, pair.second)),
                    ..Default::default()
                },
            );
            self.personas = Some(pair);
        }

        let status = match self.config.mode {
            DebateMode::FreeDiscussion => self.run_free_discussion().await,
            DebateMode::CyclicApproval => self.run_cyclic_approval().await,
            DebateMode::Threshold => self.run_threshold().await,
        };

        // Modes that terminate on tags or verdicts still report a final
        // similarity score as a reference value.
        if self.score.is_none() && !self.transcript.is_empty() {
            let score = consensus_score(
                self.transcript.final_position(self.first.name()),
                self.transcript.final_position(self.second.name()),
            );
            self.score = Some(score);
            self.log(
                LedgerEventKind::SimilarityScored,
                LedgerRecord {
                    round: Some(self.rounds),
                    score: Some(score),
                    ..Default::default()
                },
            );
        }

        self.log(
            LedgerEventKind::DebateFinished,
            LedgerRecord {
                round: Some(self.rounds),
                cycle: Some(self.cycles),
                score: self.score,
                status: Some(status.as_str()),
                summary: Some(&format!("{} turns", self.transcript.len())),
                ..Default::default()
            },
        );
        self.into_result(status)
    }

    // ── Free-discussion mode ──────────────────────────────────────────────────

    async fn run_free_discussion(&mut self) -> DebateStatus {
        let mut budget = self.config.arbitration_budget;
        for round in 1..=self.config.max_rounds {
            self.start_round(round);
            let tagged = round > self.config.opening_rounds;
            let first_text = self.speaker_turn(round, 0, tagged).await;
            let second_text = self.speaker_turn(round, 1, tagged).await;
            if !tagged {
                continue;
            }

            let first_signal = parse_agreement(&first_text);
            let second_signal = parse_agreement(&second_text);
            for (idx, signal) in [(0usize, first_signal), (1, second_signal)] {
                self.log(
                    LedgerEventKind::SignalParsed,
                    LedgerRecord {
                        round: Some(round),
                        speaker: Some(self.speaker_name(idx)),
                        status: Some(signal.kind.as_str()),
                        summary: Some(&format!(
                            "needs_arbitration={}",
                            signal.needs_arbitration
                        )),
                        ..Default::default()
                    },
                );
            }

            let kinds = (first_signal.kind, second_signal.kind);
            if kinds == (AgreementKind::Agree, AgreementKind::Agree) {
                return DebateStatus::Consensus;
            }
            if kinds.0 == AgreementKind::Disagree || kinds.1 == AgreementKind::Disagree {
                return DebateStatus::Disagreement;
            }
            let settled =
                |k: AgreementKind| matches!(k, AgreementKind::Agree | AgreementKind::Partial);
            if settled(kinds.0) && settled(kinds.1) {
                return DebateStatus::PartialConsensus;
            }
            if first_signal.needs_arbitration && second_signal.needs_arbitration && budget > 0 {
                budget -= 1;
                self.arbiter_advisory(round).await;
            }
        }

        // Ceiling crossed without any arbitration: one verdict call decides
        // between adoption and review.
        if self.arbitrations == 0 {
            if let Some(decision) = self.arbiter_decision_turn(self.config.max_rounds).await {
                if decision.approved {
                    return DebateStatus::Arbitrated;
                }
            }
        }
        DebateStatus::MaxRoundsReached
    }

    // ── Cyclic-approval mode ──────────────────────────────────────────────────

    async fn run_cyclic_approval(&mut self) -> DebateStatus {
        let mut feedback: Option<String> = None;
        let mut round = 0;
        for cycle in 1..=self.config.max_cycles {
            self.cycles = cycle;
            self.log(
                LedgerEventKind::CycleStarted,
                LedgerRecord {
                    cycle: Some(cycle),
                    summary: feedback.as_deref(),
                    ..Default::default()
                },
            );
            for _ in 0..self.config.rounds_per_cycle {
                round += 1;
                self.start_round(round);
                self.convergence_turn(round, 0, feedback.as_deref()).await;
                self.convergence_turn(round, 1, feedback.as_deref()).await;
            }
            match self.arbiter_decision_turn(round).await {
                Some(decision) if decision.approved => return DebateStatus::Arbitrated,
                Some(decision) => feedback = Some(decision.feedback),
                // A missing or failing arbiter never approves; keep cycling.
                None => feedback = None,
            }
        }
        DebateStatus::MaxRoundsReached
    }

    // ── Threshold mode ────────────────────────────────────────────────────────

    async fn run_threshold(&mut self) -> DebateStatus {
        for round in 1..=self.config.max_rounds {
            self.start_round(round);
            self.speaker_turn(round, 0, false).await;
            self.speaker_turn(round, 1, false).await;

            let score = consensus_score(
                self.transcript.final_position(self.first.name()),
                self.transcript.final_position(self.second.name()),
            );
            self.score = Some(score);
            self.log(
                LedgerEventKind::SimilarityScored,
                LedgerRecord {
                    round: Some(round),
                    score: Some(score),
                    ..Default::default()
                },
            );
            if score >= self.config.consensus_threshold {
                return DebateStatus::Consensus;
            }
        }

        let below_expert = self.score.is_some_and(|s| s < self.config.expert_threshold);
        if self.config.expert_mode || below_expert {
            self.arbiter_advisory(self.config.max_rounds).await;
        }
        DebateStatus::MaxRoundsReached
    }

    // ── Turn plumbing ─────────────────────────────────────────────────────────

    fn start_round(&mut self, round: usize) {
        self.rounds = round;
        self.log(
            LedgerEventKind::RoundStarted,
            LedgerRecord {
                round: Some(round),
                ..Default::default()
            },
        );
    }

    fn speaker_name(&self, idx: usize) -> &str {
        if idx == 0 {
            self.first.name()
        } else {
            self.second.name()
        }
    }

    fn persona_for(&self, idx: usize) -> Option<String> {
        self.personas.as_ref().map(|p| {
            if idx == 0 {
                p.first.clone()
            } else {
                p.second.clone()
            }
        })
    }

    async fn speaker_turn(&mut self, round: usize, idx: usize, tagged: bool) -> String {
        let persona = self.persona_for(idx);
        let context = self.transcript.running_context();
        let prompt = if tagged {
            prompts::build_tagged_round_prompt(&self.topic, &context, persona.as_deref())
        } else if round == 1 {
            prompts::build_opening_prompt(&self.topic, persona.as_deref())
        } else {
            prompts::build_convergence_prompt(&self.topic, &context, persona.as_deref(), None)
        };
        self.take_turn(round, idx, &prompt).await
    }

    async fn convergence_turn(
        &mut self,
        round: usize,
        idx: usize,
        feedback: Option<&str>,
    ) -> String {
        let persona = self.persona_for(idx);
        let context = self.transcript.running_context();
        let prompt = if round == 1 {
            prompts::build_opening_prompt(&self.topic, persona.as_deref())
        } else {
            prompts::build_convergence_prompt(&self.topic, &context, persona.as_deref(), feedback)
        };
        self.take_turn(round, idx, &prompt).await
    }

    /// One participant call with a single retry. The transcript always
    /// gains a turn, sentinel text standing in for a dead provider.
    async fn take_turn(&mut self, round: usize, idx: usize, prompt: &str) -> String {
        let persona = self.persona_for(idx);
        let request = TurnRequest::new(prompt).with_persona(persona.as_deref());
        let participant = if idx == 0 {
            self.first.as_ref()
        } else {
            self.second.as_ref()
        };
        let name = participant.name().to_string();
        let outcome = call_with_retry(participant, &request).await;
        let response = match outcome {
            Ok(text) => text,
            Err(e) => {
                self.log(
                    LedgerEventKind::ProviderError,
                    LedgerRecord {
                        round: Some(round),
                        speaker: Some(&name),
                        summary: Some(&e.to_string()),
                        ..Default::default()
                    },
                );
                format!("Error getting {name} response: {e}")
            }
        };
        self.transcript.record(round, &name, prompt, &response);
        self.log(
            LedgerEventKind::TurnRecorded,
            LedgerRecord {
                round: Some(round),
                speaker: Some(&name),
                summary: Some(&response),
                ..Default::default()
            },
        );
        response
    }

    // ── Arbitration ───────────────────────────────────────────────────────────

    /// Advisory opinion appended to the running context. No verdict.
    async fn arbiter_advisory(&mut self, round: usize) {
        let Some(exchange) = self.call_arbiter(round, false).await else {
            return;
        };
        self.transcript
            .record(round, &exchange.name, &exchange.prompt, &exchange.response);
        self.log(
            LedgerEventKind::TurnRecorded,
            LedgerRecord {
                round: Some(round),
                speaker: Some(&exchange.name),
                summary: Some(&exchange.response),
                ..Default::default()
            },
        );
    }

    /// Binding APPROVE/REJECT verdict used by cyclic mode and the
    /// free-discussion ceiling. Returns None when no arbiter is
    /// configured or the call fails; that is never treated as approval.
    async fn arbiter_decision_turn(&mut self, round: usize) -> Option<ArbiterDecision> {
        let exchange = self.call_arbiter(round, true).await?;
        self.transcript
            .record(round, &exchange.name, &exchange.prompt, &exchange.response);
        let decision = parse_arbiter_decision(&exchange.response);
        self.verdict = Some(ArbiterVerdict {
            approved: decision.approved,
            feedback: decision.feedback.clone(),
        });
        self.log(
            LedgerEventKind::ArbiterVerdict,
            LedgerRecord {
                round: Some(round),
                speaker: Some(&exchange.name),
                status: Some(if decision.approved { "approved" } else { "rejected" }),
                summary: Some(&decision.feedback),
                ..Default::default()
            },
        );
        Some(decision)
    }

    async fn call_arbiter(&mut self, round: usize, approval: bool) -> Option<ArbiterExchange> {
        let name = match &self.arbiter {
            Some(a) => a.name().to_string(),
            None => return None,
        };
        self.arbitrations += 1;
        self.log(
            LedgerEventKind::ArbitrationRequested,
            LedgerRecord {
                round: Some(round),
                speaker: Some(&name),
                status: Some(if approval { "approval" } else { "advisory" }),
                ..Default::default()
            },
        );
        let context = self.transcript.running_context();
        let prompt = if approval {
            prompts::build_arbiter_approval_prompt(&self.topic, &context)
        } else {
            prompts::build_arbiter_advisory_prompt(&self.topic, &context)
        };
        let request = TurnRequest::new(prompt.as_str());
        let arbiter = self.arbiter.as_ref()?;
        match call_with_retry(arbiter.as_ref(), &request).await {
            Ok(response) => Some(ArbiterExchange {
                name,
                prompt,
                response,
            }),
            Err(e) => {
                self.log(
                    LedgerEventKind::ProviderError,
                    LedgerRecord {
                        round: Some(round),
                        speaker: Some(&name),
                        summary: Some(&e.to_string()),
                        ..Default::default()
                    },
                );
                None
            }
        }
    }

    // ── Result assembly ───────────────────────────────────────────────────────

    fn into_result(self, status: DebateStatus) -> DebateResult {
        let (first_persona, second_persona) = match &self.personas {
            Some(p) => (Some(p.first.clone()), Some(p.second.clone())),
            None => (None, None),
        };
        DebateResult {
            topic: self.topic,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            mode: self.config.mode,
            rounds: self.rounds,
            cycles: self.cycles,
            status,
            score: self.score,
            first: SpeakerSummary {
                name: self.first.name().to_string(),
                persona: first_persona,
                final_position: self
                    .transcript
                    .final_position(self.first.name())
                    .to_string(),
            },
            second: SpeakerSummary {
                name: self.second.name().to_string(),
                persona: second_persona,
                final_position: self
                    .transcript
                    .final_position(self.second.name())
                    .to_string(),
            },
            arbiter_verdict: self.verdict,
            transcript: self.transcript,
        }
    }

    fn log(&self, event: LedgerEventKind, rec: LedgerRecord<'_>) {
        if let Some(ledger) = &self.ledger {
            // Ledger trouble never interrupts a debate.
            let _ = ledger.write(event, rec);
        }
    }
}

async fn call_with_retry(
    participant: &dyn Participant,
    request: &TurnRequest,
) -> anyhow::Result<String> {
    match participant.respond(request).await {
        Ok(text) => Ok(text),
        Err(_) => {
            tokio::time::sleep(RETRY_BACKOFF).await;
            participant.respond(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::DebateController;
    use crate::config::DebateConfig;
    use crate::participant::adapter::{Participant, TurnRequest};
    use crate::types::{DebateMode, DebateStatus};

    /// Replays a fixed list of responses, then repeats the last one.
    struct Scripted {
        name: &'static str,
        responses: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(name: &'static str, responses: &[&str]) -> Box<Self> {
            Box::new(Self {
                name,
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl Participant for Scripted {
        fn name(&self) -> &str {
            self.name
        }
        async fn respond(&self, _request: &TurnRequest) -> anyhow::Result<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.remove(0))
            } else {
                Ok(responses[0].clone())
            }
        }
    }

    struct AlwaysFails(&'static str);

    #[async_trait]
    impl Participant for AlwaysFails {
        fn name(&self) -> &str {
            self.0
        }
        async fn respond(&self, _request: &TurnRequest) -> anyhow::Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn config(mode: DebateMode) -> DebateConfig {
        let mut config = DebateConfig::for_tests();
        config.mode = mode;
        config
    }

    #[tokio::test]
    async fn identical_positions_converge_in_round_one() {
        let text = "Adopt the write-ahead log with fsync batching for durability.";
        let controller = DebateController::new(
            config(DebateMode::Threshold),
            "durability strategy",
            Scripted::new("Claude", &[text]),
            Scripted::new("Gemini", &[text]),
            None,
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::Consensus);
        assert_eq!(result.rounds, 1);
        assert!((result.score.unwrap() - 1.0).abs() < 1e-9);
        assert!(result.status.is_adopted());
    }

    #[tokio::test]
    async fn disjoint_positions_hit_ceiling_without_arbiter() {
        let mut cfg = config(DebateMode::Threshold);
        cfg.expert_mode = true;
        let controller = DebateController::new(
            cfg,
            "anything",
            Scripted::new("Claude", &["kubernetes cluster autoscaling policies"]),
            Scripted::new("Gemini", &["sourdough fermentation hydration ratios"]),
            None,
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::MaxRoundsReached);
        assert_eq!(result.rounds, 4);
        assert!(result.score.unwrap() < 0.01);
        assert!(!result.status.is_adopted());
        assert!(result.arbiter_verdict.is_none());
    }

    #[tokio::test]
    async fn simultaneous_flags_trigger_exactly_one_advisory_call() {
        let mut cfg = config(DebateMode::FreeDiscussion);
        cfg.opening_rounds = 1;
        cfg.max_rounds = 3;
        let undecided = "Still weighing options.\nEXPERT_NEEDED: YES";
        let agree = "Settled.\nAGREEMENT: I AGREE\nEXPERT_NEEDED: NO";
        let first = Scripted::new("Claude", &["opening", undecided, agree]);
        let second = Scripted::new("Gemini", &["opening", undecided, agree]);
        let arbiter: Box<dyn Participant> =
            Scripted::new("Arbiter", &["lean toward the compromise"]);
        let controller = DebateController::new(cfg, "t", first, second, Some(arbiter), None);
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::Consensus);
        let arbiter_turns = result
            .transcript
            .turns()
            .iter()
            .filter(|t| t.speaker == "Arbiter")
            .count();
        assert_eq!(arbiter_turns, 1);
        // Advisory opinion lands in the context before round 3.
        let turns = result.transcript.turns();
        let arbiter_pos = turns.iter().position(|t| t.speaker == "Arbiter").unwrap();
        assert!(turns[arbiter_pos..].iter().any(|t| t.round == 3));
    }

    #[tokio::test]
    async fn either_disagree_ends_free_discussion() {
        let mut cfg = config(DebateMode::FreeDiscussion);
        cfg.opening_rounds = 0;
        let controller = DebateController::new(
            cfg,
            "t",
            Scripted::new("Claude", &["AGREEMENT: I AGREE"]),
            Scripted::new("Gemini", &["AGREEMENT: I DISAGREE"]),
            None,
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::Disagreement);
        assert_eq!(result.rounds, 1);
    }

    #[tokio::test]
    async fn cyclic_approval_ends_on_arbiter_approve() {
        let mut cfg = config(DebateMode::CyclicApproval);
        cfg.max_cycles = 3;
        cfg.rounds_per_cycle = 2;
        let controller = DebateController::new(
            cfg,
            "t",
            Scripted::new("Claude", &["position a"]),
            Scripted::new("Gemini", &["position b"]),
            Some(Scripted::new(
                "Arbiter",
                &[
                    "DECISION: REJECT\nREASON: no shared terms yet",
                    "DECISION: APPROVE\nREASON: converged",
                ],
            ) as Box<dyn Participant>),
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::Arbitrated);
        assert_eq!(result.cycles, 2);
        assert_eq!(result.rounds, 4);
        let verdict = result.arbiter_verdict.unwrap();
        assert!(verdict.approved);
        assert_eq!(verdict.feedback, "converged");
    }

    #[tokio::test]
    async fn cyclic_without_arbiter_runs_to_ceiling() {
        let mut cfg = config(DebateMode::CyclicApproval);
        cfg.max_cycles = 2;
        cfg.rounds_per_cycle = 2;
        let controller = DebateController::new(
            cfg,
            "t",
            Scripted::new("Claude", &["a"]),
            Scripted::new("Gemini", &["b"]),
            None,
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::MaxRoundsReached);
        assert_eq!(result.cycles, 2);
        assert_eq!(result.rounds, 4);
        assert!(!result.status.is_adopted());
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_sentinel_turn() {
        let mut cfg = config(DebateMode::Threshold);
        cfg.max_rounds = 1;
        let controller = DebateController::new(
            cfg,
            "t",
            Box::new(AlwaysFails("Claude")),
            Scripted::new("Gemini", &["fine on my own"]),
            None,
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::MaxRoundsReached);
        assert!(
            result
                .first
                .final_position
                .starts_with("Error getting Claude response:")
        );
        assert_eq!(result.transcript.len(), 2);
    }

    #[tokio::test]
    async fn free_discussion_ceiling_auto_arbitrates_once() {
        let mut cfg = config(DebateMode::FreeDiscussion);
        cfg.opening_rounds = 0;
        cfg.max_rounds = 2;
        let controller = DebateController::new(
            cfg,
            "t",
            Scripted::new("Claude", &["no marker here"]),
            Scripted::new("Gemini", &["none here either"]),
            Some(Scripted::new(
                "Arbiter",
                &["DECISION: APPROVE\nREASON: close enough"],
            ) as Box<dyn Participant>),
            None,
        );
        let result = controller.run().await;
        assert_eq!(result.status, DebateStatus::Arbitrated);
        assert!(result.arbiter_verdict.unwrap().approved);
    }
}
