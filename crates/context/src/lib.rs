//! Context assembly for inklink: decides which notes travel alongside an
//! AI request and how much of the model's window they use.
//!
//! Components, leaves first:
//!
//! - [`parser`]: `[[reference]]` extraction from chat messages
//! - [`validator`]: staleness partitioning and the "no longer available" notice
//! - [`token`] / [`limits`]: token estimates and model context windows
//! - [`auto_context`]: outgoing-link and backlink references
//! - [`persistent`]: per-conversation reference lists over durable storage
//! - [`assembler`]: the orchestrator, guarding against overlapping rebuilds

pub mod assembler;
pub mod auto_context;
pub mod frontmatter;
pub mod limits;
pub mod parser;
pub mod persistent;
pub mod render;
pub mod token;
pub mod validator;

#[cfg(test)]
mod testing;

pub use assembler::{AssemblerSettings, ContextAssembler, ConversationContextState, OperationToken};
pub use auto_context::AutoContextService;
pub use limits::{FALLBACK_CONTEXT_LIMIT, ModelLimits, ModelSelection};
pub use parser::{ParsedMessage, ParsedReference, parse_references, resolve_references};
pub use persistent::PersistentContextStore;
pub use token::{
    ContextUsage, TokenBudget, UsageBreakdown, UsageInput, UsageMonitor, WarningLevel,
    calculate_usage, estimate_tokens,
};
pub use validator::{StaleReporter, Validation, missing_notice, validate};
