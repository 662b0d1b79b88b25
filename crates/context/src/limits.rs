//! Built-in context-window table for common provider/model pairings.
//!
//! Keys are `provider/model`. Lookups fall back from an exact key, to the
//! longest model prefix under the same provider (dated snapshots such as
//! `claude-sonnet-4-20250514`), to the provider default, to a generic
//! 32k window. Custom limits can be added from TOML config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Window used when a model is configured but nothing in the table matches,
/// and reported alongside zero usage when no model is configured at all.
pub const FALLBACK_CONTEXT_LIMIT: usize = 32_000;

/// The active provider/model pairing. Both empty means "no provider".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ModelSelection {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            model: Some(model.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some() || self.model.is_some()
    }

    /// Split into `(provider, model)`, accepting `provider/model` in the
    /// model field when no provider is set.
    fn parts(&self) -> (Option<String>, Option<String>) {
        let provider = self.provider.as_deref().map(str::to_lowercase);
        let model = self.model.as_deref().map(str::to_lowercase);
        match (provider, model) {
            (None, Some(model)) => match model.split_once('/') {
                Some((p, m)) => (Some(p.to_string()), Some(m.to_string())),
                None => (None, Some(model)),
            },
            other => other,
        }
    }
}

/// Context-window sizes keyed by `provider/model`.
#[derive(Debug, Clone)]
pub struct ModelLimits {
    limits: HashMap<String, usize>,
    provider_defaults: HashMap<String, usize>,
}

impl ModelLimits {
    /// Create a table with built-in windows.
    pub fn with_defaults() -> Self {
        let mut limits = HashMap::new();

        // ── Anthropic ──────────────────────────────────────────────
        limits.insert("anthropic/claude-opus-4".into(), 200_000);
        limits.insert("anthropic/claude-sonnet-4".into(), 200_000);
        limits.insert("anthropic/claude-3-5-sonnet".into(), 200_000);
        limits.insert("anthropic/claude-3-5-haiku".into(), 200_000);
        limits.insert("anthropic/claude-3-haiku".into(), 200_000);

        // ── OpenAI ─────────────────────────────────────────────────
        limits.insert("openai/gpt-4o".into(), 128_000);
        limits.insert("openai/gpt-4o-mini".into(), 128_000);
        limits.insert("openai/gpt-4-turbo".into(), 128_000);
        limits.insert("openai/gpt-4".into(), 8_192);
        limits.insert("openai/gpt-4.1".into(), 1_047_576);
        limits.insert("openai/gpt-3.5-turbo".into(), 16_385);
        limits.insert("openai/o1".into(), 200_000);
        limits.insert("openai/o3-mini".into(), 200_000);

        // ── Google ─────────────────────────────────────────────────
        limits.insert("google/gemini-2.0-flash".into(), 1_048_576);
        limits.insert("google/gemini-1.5-pro".into(), 2_097_152);
        limits.insert("google/gemini-1.5-flash".into(), 1_048_576);

        // ── Mistral ────────────────────────────────────────────────
        limits.insert("mistral/mistral-large".into(), 128_000);
        limits.insert("mistral/mistral-small".into(), 32_000);
        limits.insert("mistral/codestral".into(), 256_000);

        // ── DeepSeek ───────────────────────────────────────────────
        limits.insert("deepseek/deepseek-chat".into(), 64_000);
        limits.insert("deepseek/deepseek-reasoner".into(), 64_000);

        // ── Local (Ollama) ─────────────────────────────────────────
        limits.insert("ollama/llama3.1".into(), 128_000);
        limits.insert("ollama/llama3".into(), 8_192);
        limits.insert("ollama/mistral".into(), 32_768);

        let provider_defaults = HashMap::from([
            ("anthropic".to_string(), 200_000),
            ("openai".to_string(), 128_000),
            ("google".to_string(), 1_000_000),
            ("mistral".to_string(), 128_000),
            ("deepseek".to_string(), 64_000),
            ("ollama".to_string(), 8_192),
            ("openrouter".to_string(), 128_000),
        ]);

        Self {
            limits,
            provider_defaults,
        }
    }

    /// Create an empty table: every configured model gets the fallback.
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
            provider_defaults: HashMap::new(),
        }
    }

    /// Add or replace a window for `provider/model`.
    pub fn set(&mut self, key: impl Into<String>, limit: usize) {
        self.limits.insert(key.into().to_lowercase(), limit);
    }

    /// Built-in table plus overrides (e.g. from `[model_limits]`).
    pub fn with_overrides<I, K>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<String>,
    {
        let mut table = Self::with_defaults();
        for (key, limit) in overrides {
            table.set(key, limit);
        }
        table
    }

    /// Context window for a selection, or `None` when nothing is configured.
    pub fn resolve(&self, selection: &ModelSelection) -> Option<usize> {
        if !selection.is_configured() {
            return None;
        }
        let (provider, model) = selection.parts();

        if let (Some(provider), Some(model)) = (&provider, &model) {
            if let Some(limit) = self.limits.get(&format!("{provider}/{model}")) {
                return Some(*limit);
            }
            let prefix_match = self
                .limits
                .iter()
                .filter_map(|(key, limit)| {
                    let (p, m) = key.split_once('/')?;
                    (p == provider && model.starts_with(m)).then_some((m.len(), *limit))
                })
                .max_by_key(|(len, _)| *len);
            if let Some((_, limit)) = prefix_match {
                return Some(limit);
            }
        }

        if let (None, Some(model)) = (&provider, &model) {
            let by_model = self
                .limits
                .iter()
                .filter_map(|(key, limit)| {
                    let (_, m) = key.split_once('/')?;
                    (m == model).then_some(*limit)
                })
                .max();
            if let Some(limit) = by_model {
                return Some(limit);
            }
        }

        provider
            .and_then(|p| self.provider_defaults.get(&p).copied())
            .or(Some(FALLBACK_CONTEXT_LIMIT))
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl Default for ModelLimits {
    fn default() -> Self {
        Self::with_defaults()
    }
}
