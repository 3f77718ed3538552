use anyhow::{Context, Result};
use colored::Colorize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::info;

use aiimg_core::artifact::ArtifactStore;
use aiimg_core::delivery::{DeliveredReference, PushReceiver};
use aiimg_core::modules::config::{load_config, load_existing_config};
use aiimg_core::utils::paths::default_config_path;
use aiimg_core::{GenerationOutcome, ImageEngine};
use aiimg_types::{ConfigError, EngineConfig, GroupKey, ReferenceImage, TypedError};

const DEFAULT_RECEIVER_PORT: u16 = 8765;

/// Config file location. A path named with `--config` or `AIIMG_CONFIG`
/// must exist; the default location falls back to built-in defaults.
pub struct ConfigSource {
    pub path: PathBuf,
    explicit: bool,
}

impl ConfigSource {
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        match explicit {
            Some(path) => Ok(Self { path, explicit: true }),
            None => default_config_path()
                .map(|path| Self { path, explicit: false })
                .map_err(|e| anyhow::anyhow!("Failed to locate config: {}", e)),
        }
    }

    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        if self.explicit {
            load_existing_config(&self.path)
        } else {
            load_config(&self.path)
        }
    }
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling");
            token.cancel();
        }
    });
}

fn failure_json(err: &TypedError) -> serde_json::Value {
    serde_json::json!({ "ok": false, "error": err })
}

fn outcome_json(outcome: &GenerationOutcome) -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "artifact": outcome.artifact.id,
        "reference": outcome.reference.to_string(),
        "remote": outcome.reference.is_remote(),
        "degraded": outcome.degraded,
        "attempts": outcome.report.total_attempts(),
        "credentials": outcome.report.credentials,
        "elapsed_ms": outcome.report.elapsed.as_millis() as u64,
    })
}

/// Print `err` for the user (or as JSON) and turn it into the exit error.
fn report_failure(err: TypedError, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&failure_json(&err))?);
    } else {
        let message = match &err {
            TypedError::Generation(e) => e.user_message(),
            other => other.to_string(),
        };
        eprintln!("{} {}", "✗".red(), message);
    }
    Err(err.into())
}

pub struct GenerateArgs {
    pub group: Option<String>,
    pub session: Option<String>,
    pub sender: Option<String>,
    pub images: Vec<PathBuf>,
    pub prompt: Vec<String>,
    pub json: bool,
}

pub async fn handle_generate(source: &ConfigSource, args: GenerateArgs) -> Result<()> {
    let GenerateArgs { group, session, sender, images: image_paths, prompt, json } = args;
    let config = match source.load() {
        Ok(config) => config,
        Err(e) => return report_failure(e.into(), json),
    };
    let engine = ImageEngine::from_config(&config).context("Failed to initialise engine")?;

    let mut images = Vec::with_capacity(image_paths.len());
    for path in &image_paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read reference image {}", path.display()))?;
        images.push(ReferenceImage::Bytes { data, mime_type: None });
    }

    let group = GroupKey::derive(group.as_deref(), session.as_deref(), sender.as_deref());
    let request = engine.request(prompt.join(" "), images);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let outcome = match engine.generate(&group, &request, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(e.into(), json),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
        return Ok(());
    }

    match &outcome.reference {
        DeliveredReference::Local(path) => println!("{} {}", "✓".green(), path.display()),
        DeliveredReference::Remote { host, path } => {
            println!("{} {} (on {})", "✓".green(), path, host.cyan());
        },
    }
    if let Some(reason) = &outcome.degraded {
        println!(
            "{} Remote delivery failed, only the local copy is available: {}",
            "!".yellow(),
            reason
        );
    }
    println!(
        "  {} attempt(s) across {} API key(s) in {:.1}s",
        outcome.report.total_attempts(),
        outcome.report.credentials,
        outcome.report.elapsed.as_secs_f32()
    );
    Ok(())
}

pub async fn handle_receive(source: &ConfigSource, bind: Option<SocketAddr>, dir: Option<PathBuf>) -> Result<()> {
    let config = source.load().context("Failed to load configuration")?;

    let store = match dir {
        Some(dir) => ArtifactStore::new(dir, Duration::from_secs(config.artifacts.retention_secs)),
        None => ArtifactStore::from_config(&config.artifacts).context("Failed to open artifact directory")?,
    };
    let addr = bind.unwrap_or_else(|| {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.delivery.port.unwrap_or(DEFAULT_RECEIVER_PORT)))
    });

    let receiver = PushReceiver::bind(addr, store)
        .await
        .with_context(|| format!("Failed to bind push receiver on {}", addr))?
        .with_timeout(Duration::from_secs(config.delivery.timeout_secs));

    println!("{} Receiving on {}", "▶".cyan(), receiver.local_addr()?);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    receiver.run(cancel).await?;
    Ok(())
}

pub async fn handle_cleanup(source: &ConfigSource) -> Result<()> {
    let config = source.load().context("Failed to load configuration")?;
    let store = ArtifactStore::from_config(&config.artifacts).context("Failed to open artifact directory")?;

    let report = store.cleanup(SystemTime::now()).await;

    println!("{}", format!("Artifact cleanup: {}", store.dir().display()).cyan().bold());
    println!("  Removed:  {}", report.removed);
    println!("  Retained: {}", report.retained);
    if !report.skipped.is_empty() {
        println!("  Skipped:  {}", report.skipped.len().to_string().yellow());
        for (path, reason) in &report.skipped {
            println!("    {} ({})", path.display(), reason);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aiimg_types::GenerationError;

    #[test]
    fn test_named_config_must_exist() {
        let source = ConfigSource::resolve(Some(PathBuf::from("/nonexistent/aiimg/config.json"))).unwrap();
        assert!(matches!(source.load(), Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_failure_json_carries_error_domain() {
        let value = failure_json(&TypedError::from(GenerationError::Cancelled));
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"]["domain"], "Generation");
        assert_eq!(value["error"]["error"]["type"], "Cancelled");

        let value = failure_json(&ConfigError::NotFound { path: "/x.json".into() }.into());
        assert_eq!(value["error"]["domain"], "Config");
    }
}
