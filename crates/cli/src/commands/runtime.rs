//! Wiring shared by every command: config, vault, persistence, assembler.

use inklink_config::{AppConfig, PersistenceConfig};
use inklink_context::{AssemblerSettings, ContextAssembler, ModelLimits, ModelSelection};
use inklink_core::{ConversationPersistence, DocumentStore, NotificationSink};
use inklink_store::{FilePersistence, InMemoryPersistence, NoopPersistence, SqlitePersistence};
use inklink_vault::FsVault;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Prints notices to stderr so they never mix with command output.
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, message: &str, _duration: Duration) {
        eprintln!("   ⚠️  {message}");
    }
}

pub struct Runtime {
    pub config: AppConfig,
    pub vault: Arc<FsVault>,
    pub assembler: ContextAssembler,
}

impl Runtime {
    pub async fn open(vault_override: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load()?;

        let root = match vault_override.or_else(|| config.vault.path.clone()) {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let vault = Arc::new(FsVault::open(&root).await?);
        debug!(root = %root.display(), "Vault opened");

        let persistence = open_persistence(&config.persistence).await?;
        debug!(backend = persistence.name(), "Persistence ready");

        let model = ModelSelection {
            provider: config.ai.provider.clone(),
            model: config.ai.model.clone(),
        };
        let assembler = ContextAssembler::new(
            vault.clone(),
            vault.clone(),
            persistence,
            Arc::new(ConsoleNotifier),
        )
        .with_settings(AssemblerSettings::from(&config.context))
        .with_limits(ModelLimits::with_overrides(config.model_limits.clone()))
        .with_model(model)
        .with_auto_context(config.context.auto_context_options());

        Ok(Self {
            config,
            vault,
            assembler,
        })
    }

    /// Resolve a user-typed name to a document id.
    pub async fn resolve(&self, name: &str) -> Result<String, Box<dyn std::error::Error>> {
        self.vault
            .resolve_by_name(name)
            .await
            .ok_or_else(|| format!("No document named '{name}' in {}", self.vault.root().display()).into())
    }
}

async fn open_persistence(
    config: &PersistenceConfig,
) -> Result<Arc<dyn ConversationPersistence>, Box<dyn std::error::Error>> {
    let persistence: Arc<dyn ConversationPersistence> = match config.backend.as_str() {
        "memory" => Arc::new(InMemoryPersistence::new()),
        "file" => Arc::new(FilePersistence::new(config.resolved_path())),
        "sqlite" => {
            let path = config.resolved_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqlitePersistence::new(&format!("sqlite://{}", path.display())).await?)
        }
        _ => Arc::new(NoopPersistence),
    };
    Ok(persistence)
}
