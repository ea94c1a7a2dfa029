use tracing::{debug, warn};

use crate::error::MonitorError;

const SERVICE: &str = "dev.uploadwatch";

pub const PROFILE: &str = "profile";
pub const ADVISOR: &str = "advisor";

fn keychain_key(service: &str) -> String {
    format!("{}_api_key", service)
}

fn env_key(service: &str) -> String {
    format!("UPLOADWATCH_{}_API_KEY", service.to_ascii_uppercase())
}

fn validate_service(service: &str) -> Result<(), MonitorError> {
    match service {
        PROFILE | ADVISOR => Ok(()),
        _ => Err(MonitorError::Config(format!(
            "Invalid service: '{}'. Must be '{}' or '{}'",
            service, PROFILE, ADVISOR
        ))),
    }
}

fn entry(service: &str) -> Result<keyring::Entry, MonitorError> {
    validate_service(service)?;
    keyring::Entry::new(SERVICE, &keychain_key(service))
        .map_err(|e| MonitorError::Config(format!("Failed to create keychain entry: {}", e)))
}

/// Store an API key in the OS keychain.
pub fn keychain_set(service: &str, api_key: &str) -> Result<(), MonitorError> {
    entry(service)?
        .set_password(api_key)
        .map_err(|e| MonitorError::Config(format!("Failed to store in keychain: {}", e)))?;
    debug!(service, "API key stored in keychain");
    Ok(())
}

/// Returns None if not set.
pub fn keychain_get(service: &str) -> Result<Option<String>, MonitorError> {
    match entry(service)?.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(MonitorError::Config(format!(
            "Failed to read from keychain: {}",
            e
        ))),
    }
}

pub fn keychain_delete(service: &str) -> Result<(), MonitorError> {
    match entry(service)?.delete_credential() {
        Ok(()) => {
            debug!(service, "API key deleted from keychain");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(MonitorError::Config(format!(
            "Failed to delete from keychain: {}",
            e
        ))),
    }
}

pub fn keychain_exists(service: &str) -> Result<bool, MonitorError> {
    Ok(keychain_get(service)?.is_some())
}

/// API key for a remote collaborator: `UPLOADWATCH_<SERVICE>_API_KEY` first,
/// then the keychain. Keychain failures are logged and treated as unset.
pub fn resolve_api_key(service: &str) -> Result<Option<String>, MonitorError> {
    resolve_with(service, |key| std::env::var(key).ok(), keychain_get)
}

fn resolve_with<E, K>(service: &str, env: E, keychain: K) -> Result<Option<String>, MonitorError>
where
    E: Fn(&str) -> Option<String>,
    K: Fn(&str) -> Result<Option<String>, MonitorError>,
{
    validate_service(service)?;
    if let Some(key) = env(&env_key(service)).filter(|k| !k.trim().is_empty()) {
        return Ok(Some(key));
    }
    match keychain(service) {
        Ok(found) => Ok(found),
        Err(e) => {
            warn!(service, error = %e, "Keychain unavailable, continuing without API key");
            Ok(None)
        }
    }
}
