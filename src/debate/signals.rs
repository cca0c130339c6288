use std::sync::LazyLock;

use regex::Regex;

use crate::types::{AgreementKind, AgreementSignal};

// `[ \t]*` rather than `\s*` after the colon: `\s` matches newlines, and
// a marker line with blank content must not swallow the following line.
static AGREEMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*AGREEMENT:[ \t]*(.+)$").unwrap());
static EXPERT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*EXPERT_NEEDED:[ \t]*(.+)$").unwrap());
static DECISION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*DECISION:[ \t]*(.+)$").unwrap());
static REASON_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*REASON:[ \t]*(.+)$").unwrap());

/// Arbiter verdict extracted from a DECISION:/REASON: response.
#[derive(Debug, Clone)]
pub struct ArbiterDecision {
    pub approved: bool,
    pub feedback: String,
}

/// Extract the stance and escalation flag from one tagged response.
///
/// Stance comes from the last AGREEMENT: line. PARTIAL outranks the other
/// readings because "PARTIALLY AGREE" contains "AGREE", and DISAGREE is
/// checked before AGREE for the same substring reason. An AGREE that is
/// hedged on the same line ("but", "however") counts as PARTIAL only.
/// Responses with no AGREEMENT: line are UNKNOWN, never a guessed stance.
pub fn parse_agreement(text: &str) -> AgreementSignal {
    let kind = match last_capture(&AGREEMENT_LINE, text) {
        Some(line) => classify_stance(&line),
        None => AgreementKind::Unknown,
    };
    let needs_arbitration = match last_capture(&EXPERT_LINE, text) {
        Some(line) => {
            let words = word_set(&line);
            if words.contains("NO") {
                false
            } else {
                words.contains("YES")
            }
        }
        None => false,
    };
    AgreementSignal {
        kind,
        needs_arbitration,
    }
}

/// Parse an arbiter APPROVE/REJECT response. Approval requires an
/// unqualified APPROVE on the DECISION: line; "PARTIAL APPROVE",
/// "NOT APPROVE" and anything else all count as rejection. Feedback is
/// the REASON: line when present, otherwise the whole response.
pub fn parse_arbiter_decision(text: &str) -> ArbiterDecision {
    let approved = match last_capture(&DECISION_LINE, text) {
        Some(line) => {
            let upper = line.to_uppercase();
            upper.contains("APPROVE")
                && !upper.contains("PARTIAL")
                && !upper.contains("NOT")
                && !upper.contains("REJECT")
        }
        None => false,
    };
    let feedback = last_capture(&REASON_LINE, text)
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());
    ArbiterDecision { approved, feedback }
}

fn classify_stance(line: &str) -> AgreementKind {
    let upper = line.to_uppercase();
    if upper.contains("PARTIAL") || upper.contains("MOSTLY") {
        return AgreementKind::Partial;
    }
    if upper.contains("DISAGREE") {
        return AgreementKind::Disagree;
    }
    if upper.contains("AGREE") {
        if is_hedged(&upper) {
            return AgreementKind::Partial;
        }
        return AgreementKind::Agree;
    }
    AgreementKind::Unknown
}

/// Agreement immediately walked back on the same line is not agreement.
fn is_hedged(upper_line: &str) -> bool {
    if let Some(pos) = upper_line.find("AGREE") {
        let tail = &upper_line[pos..];
        return word_set(tail).contains("BUT") || tail.contains("HOWEVER");
    }
    false
}

fn last_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .last()
        .map(|c| c[1].trim().to_string())
}

fn word_set(line: &str) -> std::collections::BTreeSet<String> {
    line.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_uppercase())
        .collect()
}
