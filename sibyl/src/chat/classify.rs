//! Best-effort question classification
//!
//! Derived deterministically from the message text via keyword match.
//! Purely advisory: it only changes prompt phrasing and cache TTL
//! selection, never control-flow correctness.

use std::time::Duration;

/// Category of a user question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionCategory {
    Factual,
    Opinion,
    Procedural,
    Comparison,
    /// General knowledge, the default
    Knowledge,
}

const FACTUAL_PATTERNS: &[&str] = &["what is", "who is", "when did", "where is", "how many", "define"];
const OPINION_PATTERNS: &[&str] = &["what do you think", "opinion", "believe", "feel about"];
const PROCEDURAL_PATTERNS: &[&str] = &["how to", "how do i", "steps", "process", "procedure"];
const COMPARISON_PATTERNS: &[&str] = &["difference between", "compare", "better", "versus", "vs"];

impl QuestionCategory {
    /// Classify a message by scanning for category keywords, first match
    /// wins in the order factual, opinion, procedural, comparison.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();

        if FACTUAL_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return QuestionCategory::Factual;
        }
        if OPINION_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return QuestionCategory::Opinion;
        }
        if PROCEDURAL_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return QuestionCategory::Procedural;
        }
        if COMPARISON_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return QuestionCategory::Comparison;
        }

        QuestionCategory::Knowledge
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Factual => "factual",
            QuestionCategory::Opinion => "opinion",
            QuestionCategory::Procedural => "procedural",
            QuestionCategory::Comparison => "comparison",
            QuestionCategory::Knowledge => "knowledge",
        }
    }

    /// Category-specific guidance spliced into the generation preamble
    pub fn guidance(&self) -> &'static str {
        match self {
            QuestionCategory::Factual => {
                "Provide accurate factual information. Be precise and cite sources when possible."
            }
            QuestionCategory::Opinion => {
                "Provide a balanced perspective. Consider different viewpoints and explain your reasoning."
            }
            QuestionCategory::Procedural => {
                "Provide clear step-by-step instructions. Be thorough but concise."
            }
            QuestionCategory::Comparison => {
                "Compare the items carefully, highlighting similarities and differences. Consider multiple aspects."
            }
            QuestionCategory::Knowledge => {
                "Provide comprehensive information on the topic. Cover key points and be educational."
            }
        }
    }

    /// How long a finished answer stays in the session response cache.
    /// Factual answers are stable; opinions and procedures less so.
    pub fn response_ttl(&self) -> Duration {
        match self {
            QuestionCategory::Factual | QuestionCategory::Knowledge => {
                Duration::from_secs(24 * 3600)
            }
            _ => Duration::from_secs(3600),
        }
    }
}
