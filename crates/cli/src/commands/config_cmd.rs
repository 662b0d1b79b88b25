//! `inklink config`: Configuration management commands.

use inklink_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_model() {
                warnings.push("No provider/model set; usage will be reported as 0".to_string());
            }

            if config.vault.path.is_none() {
                warnings.push("No vault path set; the current directory will be used".to_string());
            }

            if let Some(path) = &config.vault.path {
                if !path.is_dir() {
                    warnings.push(format!("Vault path {} is not a directory", path.display()));
                }
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            let options = config.context.auto_context_options();
            println!();
            println!(
                "   Provider:     {}",
                config.ai.provider.as_deref().unwrap_or("(none)")
            );
            println!(
                "   Model:        {}",
                config.ai.model.as_deref().unwrap_or("(none)")
            );
            println!("   Persistence:  {}", config.persistence.backend);
            println!(
                "   Auto-context: outgoing={} backlinks={}",
                options.include_outgoing, options.include_backlinks
            );
            println!("   Limits:       {} overrides", config.model_limits.len());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() && !force {
        println!("ℹ️  {} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = inklink_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn default_toml_round_trips() {
        let parsed: inklink_config::AppConfig =
            toml::from_str(&inklink_config::AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.context.excerpt_lines, 100);
        assert_eq!(parsed.persistence.backend, "file");
    }
}
