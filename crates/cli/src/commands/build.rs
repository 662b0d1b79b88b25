//! `inklink build`: assemble the context for a working document.

use inklink_context::{ConversationContextState, WarningLevel};
use std::path::PathBuf;

use super::runtime::Runtime;

pub async fn run(
    vault: Option<PathBuf>,
    file: &str,
    message: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::open(vault).await?;
    let working = rt.resolve(file).await?;

    let Some(state) = rt.assembler.build_context(message, Some(&working)).await else {
        return Err(format!("Context for {working} was superseded").into());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state(&state);
    }
    Ok(())
}

fn print_state(state: &ConversationContextState) {
    println!("{}", state.context_string);
    println!();
    println!("📎 Context for {}", state.conversation_id);
    println!("─────────────────────────────────────");
    if state.references.is_empty() {
        println!("  (no context documents)");
    }
    for reference in &state.references {
        let property = reference
            .property
            .as_deref()
            .map(|p| format!("#{p}"))
            .unwrap_or_default();
        let truncated = match reference.full_token_count {
            Some(full) if reference.is_truncated => format!(" (truncated from {full})"),
            _ => String::new(),
        };
        println!(
            "  {:<40} {:>14} {:>7} tokens{}",
            format!("{}{property}", reference.document_id),
            reference.source.to_string(),
            reference.token_count,
            truncated
        );
    }

    let usage = &state.total_context_usage;
    let marker = match usage.warning_level() {
        WarningLevel::Safe => "✅",
        WarningLevel::Warning => "⚠️",
        WarningLevel::Critical => "⛔",
    };
    println!();
    println!(
        "📊 Usage: {} / {} tokens ({:.1}%) {marker}",
        usage.total_tokens,
        usage.context_limit,
        usage.display_percentage()
    );
    println!("  History:     {}", usage.breakdown.conversation_history);
    println!("  Attachments: {}", usage.breakdown.file_attachments);
    println!("  Input:       {}", usage.breakdown.current_input);
    println!("  Response:    {}", usage.breakdown.recent_response);
}
