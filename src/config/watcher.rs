//! Polling-based config file watcher.
//!
//! Checks the config file's mtime every 2 seconds. When a change is
//! detected, debounces for 500ms (to handle partial writes from editors),
//! validates and reloads, then sends the result via an mpsc channel.
//! No external filesystem-notify dependency - a plain poll loop.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;

use super::validation::{check_ranges, check_unknown_keys, ValidationWarning};
use super::ProcessRuntimeConfig;

/// Events emitted by the config watcher.
#[derive(Debug)]
pub enum ConfigEvent {
    /// Config was successfully reloaded, with any non-fatal warnings.
    Reloaded(Vec<ValidationWarning>),
    /// Reload was attempted but failed to parse (old config remains active).
    Error(String),
}

/// Interval between mtime checks.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Debounce delay after detecting a change (editors often write in stages).
const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Run the config file watcher loop.
///
/// Polls `path` for mtime changes and reloads the global config when
/// detected. Sends events on `tx`. Returns when the channel is closed.
pub async fn run_config_watcher(path: PathBuf, tx: mpsc::Sender<ConfigEvent>) {
    tracing::info!(path = %path.display(), "Config watcher started");

    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let current = match get_mtime(&path) {
            Some(t) => t,
            None => {
                if last_mtime.is_some() {
                    tracing::warn!(
                        path = %path.display(),
                        "Config file not accessible - keeping current config, will retry"
                    );
                    last_mtime = None;
                }
                continue;
            }
        };

        let changed = match last_mtime {
            Some(prev) => current != prev,
            None => true,
        };
        if !changed {
            continue;
        }

        // Debounce: wait, then re-check mtime to ensure the write is complete.
        tokio::time::sleep(DEBOUNCE_DELAY).await;
        if get_mtime(&path) != Some(current) {
            continue;
        }
        last_mtime = Some(current);

        let event = match reload_from_path(&path) {
            Ok(warnings) => ConfigEvent::Reloaded(warnings),
            Err(e) => {
                tracing::error!(error = %e, "Config hot-reload failed - keeping previous config");
                ConfigEvent::Error(e)
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Config watcher channel closed, stopping");
            return;
        }
    }
}

fn reload_from_path(path: &PathBuf) -> Result<Vec<ValidationWarning>, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: toml::Value = toml::from_str(&text).map_err(|e| e.to_string())?;

    let explicit_keys = collect_dotted_keys(&value, String::new());
    let mut warnings = check_unknown_keys(&explicit_keys);

    let config: ProcessRuntimeConfig = value.try_into().map_err(|e: toml::de::Error| e.to_string())?;
    warnings.extend(check_ranges(&config));

    super::reload(config);
    Ok(warnings)
}

fn collect_dotted_keys(value: &toml::Value, prefix: String) -> std::collections::HashSet<String> {
    let mut keys = std::collections::HashSet::new();
    if let toml::Value::Table(table) = value {
        for (k, v) in table {
            let dotted = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.insert(dotted.clone());
            keys.extend(collect_dotted_keys(v, dotted));
        }
    }
    keys
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &PathBuf) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
