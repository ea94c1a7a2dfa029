//! Loads [`MonitorConfig`]: built-in defaults, then a JSON patch file, then
//! `UPLOADWATCH_*` environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::MonitorError;
use crate::types::config::MonitorConfig;

pub const CONFIG_FILE: &str = "config.json";

const ENV_MAX_RETRIES: &str = "UPLOADWATCH_MAX_RETRIES";
const ENV_BASE_DELAY: &str = "UPLOADWATCH_BASE_DELAY_SECONDS";
const ENV_INTER_SOURCE_DELAY: &str = "UPLOADWATCH_INTER_SOURCE_DELAY_SECONDS";
const ENV_CONCURRENCY: &str = "UPLOADWATCH_CONCURRENCY_LIMIT";
pub const ENV_PROFILE_URL: &str = "UPLOADWATCH_PROFILE_URL";
pub const ENV_ADVISOR_URL: &str = "UPLOADWATCH_ADVISOR_URL";

/// An explicit `path` must exist. Without one, `<data_dir>/config.json` is
/// used when present.
pub fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<MonitorConfig, MonitorError> {
    let file: Option<PathBuf> = match path {
        Some(p) if !p.exists() => {
            return Err(MonitorError::Config(format!(
                "config file {} does not exist",
                p.display()
            )))
        }
        Some(p) => Some(p.to_path_buf()),
        None => Some(data_dir.join(CONFIG_FILE)).filter(|p| p.exists()),
    };

    let mut value = serde_json::to_value(MonitorConfig::default())?;
    if let Some(file) = &file {
        let raw = std::fs::read_to_string(file)?;
        let patch: Value = serde_json::from_str(&raw)
            .map_err(|e| MonitorError::Config(format!("{}: {}", file.display(), e)))?;
        merge_json(&mut value, &patch);
        debug!(path = %file.display(), "Applied config file");
    }

    let mut config: MonitorConfig =
        serde_json::from_value(value).map_err(|e| MonitorError::Config(e.to_string()))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Deep-merges `patch` into `base`. Objects merge key by key; anything else
/// replaces.
pub fn merge_json(base: &mut Value, patch: &Value) {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (base, patch) {
        for (key, value) in patch_map {
            if value.is_object() && base_map.get(key).is_some_and(Value::is_object) {
                if let Some(existing) = base_map.get_mut(key) {
                    merge_json(existing, value);
                }
            } else {
                base_map.insert(key.clone(), value.clone());
            }
        }
    }
}

pub fn apply_env_overrides<F>(config: &mut MonitorConfig, lookup: F) -> Result<(), MonitorError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parsed(&lookup, ENV_MAX_RETRIES)? {
        config.max_retries = v;
    }
    if let Some(v) = parsed(&lookup, ENV_BASE_DELAY)? {
        config.base_delay_seconds = v;
    }
    if let Some(v) = parsed(&lookup, ENV_INTER_SOURCE_DELAY)? {
        config.inter_source_delay_seconds = v;
    }
    if let Some(v) = parsed(&lookup, ENV_CONCURRENCY)? {
        config.concurrency_limit = v;
    }
    config.validate()
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>, MonitorError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MonitorError::Config(format!("{}={} is not a valid value", key, raw))),
        _ => Ok(None),
    }
}

/// Endpoints of the optional remote collaborators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteEndpoints {
    pub profile_url: Option<String>,
    pub advisor_url: Option<String>,
}

impl RemoteEndpoints {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            profile_url: non_empty(ENV_PROFILE_URL),
            advisor_url: non_empty(ENV_ADVISOR_URL),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
