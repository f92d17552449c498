use serde::Deserialize;

use crate::resilience::retry::RetrySettings;
use crate::utils::constants::*;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub line: LineConfig,
    pub secrets: SecretsConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default = "default_safety_margin_seconds")]
    pub safety_margin_seconds: u64,
    /// upper bound for every outbound call: secrets, store, exchange, upstream
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            safety_margin_seconds: default_safety_margin_seconds(),
            http_timeout_ms: default_http_timeout_ms(),
            retry: None,
            metrics: MetricsConfig::default(),
            server: ServerConfig::default(),
            logging: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    /// will be mutiply by 2 on every attempt until max_delay_ms 
    pub base_delay_ms: Option<u64>,
    /// max delay for retrying
    /// invariant: >= base_delay_ms. 
    pub max_delay_ms: Option<u64>,
}

impl RetryConfig {
    /// Missing config means a single attempt: failures surface immediately.
    pub fn to_settings(retry: &Option<RetryConfig>) -> RetrySettings {
        RetrySettings {
            attempts: retry.as_ref().and_then(|r| r.attempts).unwrap_or(1),
            base_delay_ms: retry.as_ref().and_then(|r| r.base_delay_ms).unwrap_or(200),
            max_delay_ms: retry.as_ref().and_then(|r| r.max_delay_ms).unwrap_or(1000),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path(), is_enabled: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

/// ================================
/// LINE channel
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    /// channel id, used as `iss` and `sub` of the assertion
    pub channel_id: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,
    #[serde(default = "default_assertion_ttl_seconds")]
    pub assertion_ttl_seconds: u64,
    /// requested lifetime of the issued access token, sent as `token_exp`
    #[serde(default = "default_access_token_ttl_seconds")]
    pub access_token_ttl_seconds: u64,
    #[serde(default = "default_private_key_secret")]
    pub private_key_secret: String,
    #[serde(default = "default_key_id_secret")]
    pub key_id_secret: String,
    /// keep key material for the process lifetime, dropped on exchange rejection
    #[serde(default)]
    pub cache_signing_key: bool,
}

/// ================================
/// Secret provider backends
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SecretsConfig {
    /// `line-priv-key` is read from `LINE_PRIV_KEY`
    Env,
    /// one file per secret name inside `dir`
    File { dir: String },
    /// Google Secret Manager, latest version
    Gcp {
        project_id: String,
        #[serde(default = "default_secret_manager_url")]
        base_url: String,
    },
}

/// ================================
/// Token store backends
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File { path: String },
    Datastore {
        project_id: String,
        #[serde(default = "default_datastore_namespace")]
        namespace: String,
        #[serde(default = "default_datastore_url")]
        base_url: String,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct GcpConfig {
    #[serde(default = "default_metadata_token_url")]
    pub metadata_token_url: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self { metadata_token_url: default_metadata_token_url() }
    }
}

fn default_safety_margin_seconds() -> u64 { DEFAULT_SAFETY_MARGIN_SECS }
fn default_http_timeout_ms() -> u64 { DEFAULT_HTTP_TIMEOUT_MS }
fn default_metrics_path() -> String { "/metrics".to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> String { "8080".to_string() }
fn default_token_endpoint() -> String { LINE_TOKEN_ENDPOINT.to_string() }
fn default_audience() -> String { LINE_AUDIENCE.to_string() }
fn default_api_base_url() -> String { LINE_API_BASE_URL.to_string() }
fn default_proxy_prefix() -> String { DEFAULT_PROXY_PREFIX.to_string() }
fn default_assertion_ttl_seconds() -> u64 { ASSERTION_TTL_SECS }
fn default_access_token_ttl_seconds() -> u64 { ACCESS_TOKEN_TTL_SECS }
fn default_private_key_secret() -> String { PRIVATE_KEY_SECRET.to_string() }
fn default_key_id_secret() -> String { KEY_ID_SECRET.to_string() }
fn default_secret_manager_url() -> String { GCP_SECRET_MANAGER_URL.to_string() }
fn default_datastore_namespace() -> String { DATASTORE_NAMESPACE.to_string() }
fn default_datastore_url() -> String { GCP_DATASTORE_URL.to_string() }
fn default_metadata_token_url() -> String { GCP_METADATA_TOKEN_URL.to_string() }
