//! Token budget calculation.
//!
//! Uses a length-based heuristic: ~4 UTF-16 code units per token, rounded up.
//! The rule is fixed rather than tokenizer-exact so that every surface
//! showing a count agrees with every other one.

use inklink_core::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::limits::{FALLBACK_CONTEXT_LIMIT, ModelLimits, ModelSelection};

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 UTF-16 code units. Rounds up.
///
/// Code units rather than chars, so characters outside the BMP (emoji)
/// count twice, matching editor string lengths.
pub fn estimate_tokens(text: &str) -> usize {
    text.encode_utf16().count().div_ceil(4)
}

/// Estimate tokens for a slice of messages, one estimate per message.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Everything that travels with one AI request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageInput<'a> {
    pub history: &'a [Message],
    pub attachments: &'a [String],
    pub current_input: &'a str,
    pub recent_response: &'a str,
}

/// Per-category token estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBreakdown {
    pub conversation_history: usize,
    pub file_attachments: usize,
    pub current_input: usize,
    pub recent_response: usize,
}

impl UsageBreakdown {
    pub fn total(&self) -> usize {
        self.conversation_history + self.file_attachments + self.current_input + self.recent_response
    }
}

/// How much of the model's context window a request consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsage {
    pub total_tokens: usize,
    pub context_limit: usize,
    /// Uncapped; may exceed 100.
    pub usage_percentage: f64,
    pub breakdown: UsageBreakdown,
}

impl ContextUsage {
    /// The "no provider configured" result.
    pub fn unconfigured() -> Self {
        Self {
            total_tokens: 0,
            context_limit: FALLBACK_CONTEXT_LIMIT,
            usage_percentage: 0.0,
            breakdown: UsageBreakdown::default(),
        }
    }

    /// Percentage for display, clamped to 100.
    pub fn display_percentage(&self) -> f64 {
        self.usage_percentage.min(100.0)
    }

    pub fn warning_level(&self) -> WarningLevel {
        WarningLevel::from_percentage(self.usage_percentage)
    }
}

/// Compute usage against a known window, or the zero-usage result when
/// `context_limit` is `None`.
pub fn calculate_usage(input: &UsageInput<'_>, context_limit: Option<usize>) -> ContextUsage {
    let Some(context_limit) = context_limit else {
        return ContextUsage::unconfigured();
    };

    let breakdown = UsageBreakdown {
        conversation_history: estimate_messages_tokens(input.history),
        file_attachments: input.attachments.iter().map(|a| estimate_tokens(a)).sum(),
        current_input: estimate_tokens(input.current_input),
        recent_response: estimate_tokens(input.recent_response),
    };
    let total_tokens = breakdown.total();
    let usage_percentage = if context_limit == 0 {
        0.0
    } else {
        total_tokens as f64 / context_limit as f64 * 100.0
    };

    ContextUsage {
        total_tokens,
        context_limit,
        usage_percentage,
        breakdown,
    }
}

/// Resolves the context window for the active model and aggregates usage.
#[derive(Debug, Clone, Default)]
pub struct TokenBudget {
    limits: ModelLimits,
}

impl TokenBudget {
    pub fn new(limits: ModelLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ModelLimits {
        &self.limits
    }

    pub fn usage(&self, selection: &ModelSelection, input: &UsageInput<'_>) -> ContextUsage {
        calculate_usage(input, self.limits.resolve(selection))
    }
}

/// Usage band used for user-facing warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Safe,
    Warning,
    Critical,
}

impl WarningLevel {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Self::Critical
        } else if percentage >= 75.0 {
            Self::Warning
        } else {
            Self::Safe
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remembers which warning thresholds were already announced this session.
#[derive(Debug, Default)]
pub struct UsageMonitor {
    announced: BTreeSet<WarningLevel>,
}

impl UsageMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the level to announce, if `usage` sits in a band that has not
    /// been announced yet. `Safe` is never announced.
    pub fn observe(&mut self, usage: &ContextUsage) -> Option<WarningLevel> {
        let level = usage.warning_level();
        if level == WarningLevel::Safe || !self.announced.insert(level) {
            return None;
        }
        Some(level)
    }

    /// Start a new session.
    pub fn reset(&mut self) {
        self.announced.clear();
    }
}

/// User-facing text for a threshold notice.
pub fn usage_notice(usage: &ContextUsage) -> String {
    let percent = usage.display_percentage().round() as u64;
    match usage.warning_level() {
        WarningLevel::Critical => format!(
            "Context nearly full: {percent}% of {} tokens used",
            usage.context_limit
        ),
        _ => format!(
            "Context usage at {percent}% of {} tokens",
            usage.context_limit
        ),
    }
}
