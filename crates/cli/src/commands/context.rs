//! `inklink context`: list and edit a conversation's context documents.

use std::path::PathBuf;

use super::runtime::Runtime;

pub async fn list(vault: Option<PathBuf>, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::open(vault).await?;
    let working = rt.resolve(file).await?;
    rt.assembler.set_current_file(Some(&working));

    let references = rt.assembler.persistent_context(&working).await;
    if references.is_empty() {
        println!("No context documents for {working}.");
        return Ok(());
    }

    println!("📎 Context documents for {working}");
    println!("─────────────────────────────────────");
    for reference in &references {
        let property = reference
            .property
            .as_deref()
            .map(|p| format!("#{p}"))
            .unwrap_or_default();
        println!(
            "  {:<40} {:>14}  added {}",
            format!("{}{property}", reference.document_id),
            reference.source.to_string(),
            reference.added_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("  {} documents", references.len());
    Ok(())
}

pub async fn add(
    vault: Option<PathBuf>,
    file: &str,
    document: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::open(vault).await?;
    let working = rt.resolve(file).await?;
    let target = rt.resolve(document).await?;
    rt.assembler.set_current_file(Some(&working));

    if rt.assembler.add_document(&target).await {
        println!("✅ Added {target} to {working}");
    } else if target == working {
        println!("ℹ️  {working} is the working document; it is always in context");
    } else {
        println!("ℹ️  {target} is already in context for {working}");
    }
    Ok(())
}

pub async fn remove(
    vault: Option<PathBuf>,
    file: &str,
    document: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::open(vault).await?;
    let working = rt.resolve(file).await?;
    // A stale reference no longer resolves; accept its raw id.
    let target = rt.resolve(document).await.unwrap_or_else(|_| document.to_string());
    rt.assembler.set_current_file(Some(&working));

    if rt.assembler.remove_document(&target).await {
        println!("🗑️  Removed {target} from {working}");
    } else {
        println!("ℹ️  {target} is not in context for {working}");
    }
    Ok(())
}

pub async fn clear(vault: Option<PathBuf>, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::open(vault).await?;
    let working = rt.resolve(file).await?;
    rt.assembler.clear_persistent_context(&working).await;
    println!("🧹 Cleared context documents for {working}");
    Ok(())
}
