//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks URLs, proxy prefix shape, retry invariants, lifetimes,
//!   and backend specific required fields.

use reqwest::Url;
use tracing::{error, info};

use crate::config::settings::{
    LineConfig, RetryConfig, SecretsConfig, ServiceConfig, SettingsConfig, StoreConfig,
};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_line(&cfg.line, &cfg.settings, &mut errors);
    validate_secrets(&cfg.secrets, &mut errors);
    validate_store(&cfg.store, &mut errors);
    validate_url("gcp.metadata_token_url", &cfg.gcp.metadata_token_url, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.http_timeout_ms == 0 {
        errors.push("settings.http_timeout_ms must be > 0".to_string());
    }
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }
    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' is not a valid port",
            settings.server.port
        ));
    }
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_line(line: &LineConfig, settings: &SettingsConfig, errors: &mut Vec<String>) {
    if line.channel_id.trim().is_empty() {
        errors.push("line.channel_id must not be empty (set CHANNEL_ID)".to_string());
    }
    validate_url("line.token_endpoint", &line.token_endpoint, errors);
    validate_url("line.api_base_url", &line.api_base_url, errors);
    if line.audience.trim().is_empty() {
        errors.push("line.audience must not be empty".to_string());
    }

    let prefix = line.proxy_prefix.as_str();
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        errors.push(format!(
            "line.proxy_prefix '{}' must start with '/', be non-root and have no trailing '/'",
            prefix
        ));
    }

    if line.assertion_ttl_seconds == 0 {
        errors.push("line.assertion_ttl_seconds must be > 0".to_string());
    }
    if line.access_token_ttl_seconds <= settings.safety_margin_seconds {
        errors.push(format!(
            "line.access_token_ttl_seconds ({}) must exceed settings.safety_margin_seconds ({})",
            line.access_token_ttl_seconds, settings.safety_margin_seconds
        ));
    }
    if line.private_key_secret.trim().is_empty() || line.key_id_secret.trim().is_empty() {
        errors.push("line.private_key_secret and line.key_id_secret must not be empty".to_string());
    }
}

fn validate_secrets(secrets: &SecretsConfig, errors: &mut Vec<String>) {
    match secrets {
        SecretsConfig::Env => {}
        SecretsConfig::File { dir } => {
            if dir.trim().is_empty() {
                errors.push("secrets.dir must not be empty".to_string());
            }
        }
        SecretsConfig::Gcp { project_id, base_url } => {
            if project_id.trim().is_empty() {
                errors.push("secrets.project_id must not be empty (set GOOGLE_CLOUD_PROJECT)".to_string());
            }
            validate_url("secrets.base_url", base_url, errors);
        }
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    match store {
        StoreConfig::Memory => {}
        StoreConfig::File { path } => {
            if path.trim().is_empty() {
                errors.push("store.path must not be empty".to_string());
            }
        }
        StoreConfig::Datastore { project_id, namespace, base_url } => {
            if project_id.trim().is_empty() {
                errors.push("store.project_id must not be empty (set GOOGLE_CLOUD_PROJECT)".to_string());
            }
            if namespace.trim().is_empty() {
                errors.push("store.namespace must not be empty".to_string());
            }
            validate_url("store.base_url", base_url, errors);
        }
    }
}

fn validate_url(field: &str, value: &str, errors: &mut Vec<String>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!("{} '{}' has unsupported scheme '{}'", field, value, url.scheme())),
        Err(e) => errors.push(format!("{} '{}' is not a valid URL: {}", field, value, e)),
    }
}
