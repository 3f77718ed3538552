use anyhow::{Context, Result};
use colored::Colorize;

use aiimg_types::{Credential, EngineConfig};

use crate::cli::ConfigCommands;
use crate::commands::ConfigSource;

pub fn handle_config_command(source: &ConfigSource, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show { json } => show_config(source, json),
        ConfigCommands::Path => {
            println!("{}", source.path.display());
            Ok(())
        },
    }
}

fn mask(key: &str) -> String {
    Credential::new(0, key).masked()
}

/// Copy of `config` with every key replaced by its masked form.
fn masked(config: &EngineConfig) -> EngineConfig {
    let mut config = config.clone();
    config.api_keys = config.api_keys.iter().map(|k| mask(k)).collect();
    config.api_key = config.api_key.as_deref().map(mask);
    config
}

pub fn show_config(source: &ConfigSource, json: bool) -> Result<()> {
    let config = source.load().context("Failed to load configuration")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&masked(&config))?);
        return Ok(());
    }

    let pool = config.credential_pool();
    println!("{}", "aiimg Configuration:".cyan().bold());
    println!("  File: {}", source.path.display());
    println!("  Endpoint: {}", config.endpoint());
    println!("  Model: {}", config.model_name);
    println!("  API Keys: {}", pool.len());
    for credential in pool.iter() {
        println!("    #{} {}", credential.ordinal(), credential.masked());
    }
    println!("  Retries per key: {}", config.max_retry_attempts);
    println!("  Request timeout: {}s", config.request_timeout_secs);
    match config.calls_per_minute_per_group {
        0 => println!("  Rate limit: {}", "disabled".yellow()),
        n => println!("  Rate limit: {}/min per group", n),
    }
    match (&config.delivery.host, config.delivery.port) {
        (Some(host), Some(port)) => println!("  Delivery: push to {}:{}", host, port),
        (Some(host), None) => println!("  Delivery: {} (no port)", host),
        _ => println!("  Delivery: local"),
    }
    match &config.artifacts.dir {
        Some(dir) => println!("  Artifacts: {}", dir.display()),
        None => println!("  Artifacts: <data dir>/images"),
    }
    println!("  Retention: {}s", config.artifacts.retention_secs);
    Ok(())
}
