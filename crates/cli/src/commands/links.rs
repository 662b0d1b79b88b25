//! `inklink links`: show a document's place in the link graph.

use inklink_core::LinkGraph;
use std::path::PathBuf;

use super::runtime::Runtime;

pub async fn run(vault: Option<PathBuf>, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::open(vault).await?;
    let id = rt.resolve(file).await?;

    let outgoing = rt.vault.outgoing_links(&id).await;
    let backlinks = rt.vault.backlinks(&id).await;

    println!("🔗 {id}");
    println!("─────────────────────────────────────");
    println!("  Outgoing ({}):", outgoing.len());
    for target in &outgoing {
        println!("    → {target}");
    }
    println!("  Backlinks ({}):", backlinks.len());
    for source in &backlinks {
        println!("    ← {source}");
    }

    let options = rt.config.context.auto_context_options();
    println!();
    println!(
        "  Auto-context: outgoing {}, backlinks {}",
        if options.include_outgoing { "on" } else { "off" },
        if options.include_backlinks { "on" } else { "off" }
    );
    Ok(())
}
