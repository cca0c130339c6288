use serde::Serialize;

/// Which debate protocol the controller runs. All three are bounded by a
/// hard round/cycle ceiling regardless of what the participants produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateMode {
    FreeDiscussion,
    CyclicApproval,
    Threshold,
}

impl DebateMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "free-discussion" | "discussion" => Some(Self::FreeDiscussion),
            "cyclic" | "cyclic-approval" | "approval" => Some(Self::CyclicApproval),
            "threshold" | "score" => Some(Self::Threshold),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreeDiscussion => "free_discussion",
            Self::CyclicApproval => "cyclic_approval",
            Self::Threshold => "threshold",
        }
    }
}

/// Terminal status of a finished debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    Consensus,
    PartialConsensus,
    Disagreement,
    MaxRoundsReached,
    Arbitrated,
}

impl DebateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::PartialConsensus => "partial_consensus",
            Self::Disagreement => "disagreement",
            Self::MaxRoundsReached => "max_rounds_reached",
            Self::Arbitrated => "arbitrated",
        }
    }

    /// Adopted outcomes exit 0; everything else needs manual review.
    pub fn is_adopted(self) -> bool {
        matches!(
            self,
            Self::Consensus | Self::PartialConsensus | Self::Arbitrated
        )
    }
}

/// Classified agreement stance extracted from one participant response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementKind {
    Agree,
    Partial,
    Disagree,
    Unknown,
}

impl AgreementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agree => "agree",
            Self::Partial => "partial",
            Self::Disagree => "disagree",
            Self::Unknown => "unknown",
        }
    }
}

/// Full signal parsed from one tagged response: stance plus the
/// explicit "bring in the arbiter" escalation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgreementSignal {
    pub kind: AgreementKind,
    pub needs_arbitration: bool,
}

/// Events recorded in the JSONL run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEventKind {
    DebateStarted,
    PersonasAssigned,
    RoundStarted,
    CycleStarted,
    TurnRecorded,
    SignalParsed,
    SimilarityScored,
    ArbitrationRequested,
    ArbiterVerdict,
    ProviderError,
    PersistenceError,
    DebateFinished,
}

impl LedgerEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DebateStarted => "debate_started",
            Self::PersonasAssigned => "personas_assigned",
            Self::RoundStarted => "round_started",
            Self::CycleStarted => "cycle_started",
            Self::TurnRecorded => "turn_recorded",
            Self::SignalParsed => "signal_parsed",
            Self::SimilarityScored => "similarity_scored",
            Self::ArbitrationRequested => "arbitration_requested",
            Self::ArbiterVerdict => "arbiter_verdict",
            Self::ProviderError => "provider_error",
            Self::PersistenceError => "persistence_error",
            Self::DebateFinished => "debate_finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DebateMode, DebateStatus};

    #[test]
    fn mode_from_str_accepts_aliases() {
        assert_eq!(
            DebateMode::from_str("free"),
            Some(DebateMode::FreeDiscussion)
        );
        assert_eq!(
            DebateMode::from_str("CYCLIC"),
            Some(DebateMode::CyclicApproval)
        );
        assert_eq!(DebateMode::from_str("threshold"), Some(DebateMode::Threshold));
        assert_eq!(DebateMode::from_str("nope"), None);
    }

    #[test]
    fn adopted_statuses_exit_zero() {
        assert!(DebateStatus::Consensus.is_adopted());
        assert!(DebateStatus::PartialConsensus.is_adopted());
        assert!(DebateStatus::Arbitrated.is_adopted());
        assert!(!DebateStatus::Disagreement.is_adopted());
        assert!(!DebateStatus::MaxRoundsReached.is_adopted());
    }
}
