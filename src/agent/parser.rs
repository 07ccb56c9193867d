//! ReAct-style output parsing.
//!
//! Recognised forms, keywords matched case-insensitively:
//!
//! ```text
//! Final Answer: <answer>
//! Action: <tool>
//! Action Input: <input>
//! Action: <tool> Input: <input>
//! ```
//!
//! When both a final answer and an action are present, the earlier one
//! wins. Anything unrecognised is treated as a final answer equal to the
//! trimmed text so the loop always terminates.

use regex::Regex;
use std::sync::OnceLock;

/// A request to run one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAction {
    pub tool: String,
    pub input: String,
    /// Model output up to and including the action input
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    Action(AgentAction),
    Finish { answer: String },
}

fn final_answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)final\s+answer\s*:\s*(.*)").expect("valid regex"))
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // tool name stays on one line; input follows on it or the next
        Regex::new(
            r"(?i)\baction\s*:[ \t]*([^\r\n]*?)[ \t]*(?:\r?\n\s*action\s+|[ \t]+)input\s*:[ \t]*((?s:.*))",
        )
        .expect("valid regex")
    })
}

/// Start of a hallucinated continuation after the action input
fn continuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:observation|thought|final\s+answer)\s*:").expect("valid regex")
    })
}

fn strip_wrapping(text: &str) -> &str {
    let text = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('`', '`'), ('[', ']')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            return text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }
    text
}

pub fn parse(text: &str) -> AgentOutput {
    let final_match = final_answer_re().captures(text);
    let action_match = action_re().captures(text);

    let final_start = final_match
        .as_ref()
        .and_then(|c| c.get(0))
        .map(|m| m.start());
    let action_start = action_match
        .as_ref()
        .and_then(|c| c.get(0))
        .map(|m| m.start());

    let action_first = match (action_start, final_start) {
        (Some(action), Some(finish)) => action < finish,
        (Some(_), None) => true,
        _ => false,
    };

    if action_first {
        if let Some(action) = action_match.as_ref().and_then(|c| to_action(text, c)) {
            return AgentOutput::Action(action);
        }
    }

    if let Some(answer) = final_match.as_ref().and_then(|c| c.get(1)) {
        return AgentOutput::Finish {
            answer: answer.as_str().trim().to_string(),
        };
    }

    AgentOutput::Finish {
        answer: text.trim().to_string(),
    }
}

fn to_action(text: &str, captures: &regex::Captures<'_>) -> Option<AgentAction> {
    let tool = strip_wrapping(captures.get(1)?.as_str());
    if tool.is_empty() {
        return None;
    }

    let input_match = captures.get(2)?;
    let rest = input_match.as_str();
    let input_len = continuation_re()
        .find(rest)
        .map(|m| m.start())
        .unwrap_or(rest.len());
    let raw_input = &rest[..input_len];

    Some(AgentAction {
        tool: tool.to_string(),
        input: strip_wrapping(raw_input).to_string(),
        log: text[..input_match.start() + input_len].trim_end().to_string(),
    })
}
