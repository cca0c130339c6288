//! Prompt builders for every controller request. Keeping these in one
//! place makes the wire traffic auditable without reading the state
//! machine.

fn persona_preamble(persona: Option<&str>) -> String {
    match persona {
        Some(p) => format!("You are debating as a {p}.\n\n"),
        None => String::new(),
    }
}

/// First round: state a position, no convergence pressure yet.
pub fn build_opening_prompt(topic: &str, persona: Option<&str>) -> String {
    format!(
        "{preamble}Debate topic: {topic}\n\n\
         Present your opinion on this topic from your own expertise. \
         Be concrete and commit to a position.",
        preamble = persona_preamble(persona),
    )
}

/// Later untagged rounds: respond to the other side and move toward
/// terms both could accept. `feedback` carries an arbiter rejection
/// reason in cyclic mode.
pub fn build_convergence_prompt(
    topic: &str,
    context: &str,
    persona: Option<&str>,
    feedback: Option<&str>,
) -> String {
    let feedback_block = match feedback {
        Some(f) if !f.is_empty() => format!("\n\nArbiter feedback to address:\n{f}"),
        _ => String::new(),
    };
    format!(
        "{preamble}Debate topic: {topic}\n\n\
         Discussion so far:{context}{feedback_block}\n\n\
         Considering the other expert's position, refine your own and \
         propose terms you could both agree on.",
        preamble = persona_preamble(persona),
    )
}

/// Tagged rounds additionally demand machine-readable stance lines.
pub fn build_tagged_round_prompt(topic: &str, context: &str, persona: Option<&str>) -> String {
    format!(
        "{preamble}Debate topic: {topic}\n\n\
         Discussion so far:{context}\n\n\
         Considering the other expert's position, state where you now stand. \
         End your response with exactly these two lines:\n\
         AGREEMENT: <I AGREE | I PARTIALLY AGREE | I DISAGREE>\n\
         EXPERT_NEEDED: <YES | NO>",
        preamble = persona_preamble(persona),
    )
}

/// Cyclic mode: binary verdict on whether the positions have converged.
pub fn build_arbiter_approval_prompt(topic: &str, context: &str) -> String {
    format!(
        "You are the neutral arbiter of a debate between two AI experts.\n\n\
         Debate topic: {topic}\n\n\
         Full discussion:{context}\n\n\
         Decide whether the experts have reached a workable agreement. \
         Respond with exactly these two lines:\n\
         DECISION: <APPROVE | REJECT>\n\
         REASON: <one sentence>",
    )
}

/// Advisory call: no verdict required, the opinion is appended to the
/// running context for the participants to react to.
pub fn build_arbiter_advisory_prompt(topic: &str, context: &str) -> String {
    format!(
        "You are a neutral third expert consulted mid-debate.\n\n\
         Debate topic: {topic}\n\n\
         Discussion so far:{context}\n\n\
         Give a short independent assessment: where the experts actually \
         agree, where they genuinely differ, and what compromise looks \
         most defensible.",
    )
}

/// Dynamic persona assignment, parsed for EXPERT_A:/EXPERT_B: lines.
pub fn build_persona_assignment_prompt(topic: &str) -> String {
    format!(
        "Two AI experts will debate the following topic:\n\n{topic}\n\n\
         Propose the two most useful expert roles for this debate. \
         Respond with exactly these two lines:\n\
         EXPERT_A: <role description>\n\
         EXPERT_B: <role description>",
    )
}
