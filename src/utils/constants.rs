//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 300;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

// Credential record identity in the token store
pub const TOKEN_KIND: &str = "LineAccessToken";
pub const TOKEN_ID: &str = "current";

// LINE platform
pub const LINE_TOKEN_ENDPOINT: &str = "https://api.line.me/oauth2/v2.1/token";
pub const LINE_AUDIENCE: &str = "https://api.line.me/";
pub const LINE_API_BASE_URL: &str = "https://api.line.me";
pub const ASSERTION_TTL_SECS: u64 = 60 * 30;
pub const ACCESS_TOKEN_TTL_SECS: u64 = 60 * 60 * 24 * 30;
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

// Secret names
pub const PRIVATE_KEY_SECRET: &str = "line-priv-key";
pub const KEY_ID_SECRET: &str = "line-kid";

// GCP
pub const GCP_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
pub const GCP_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";
pub const GCP_DATASTORE_URL: &str = "https://datastore.googleapis.com";
pub const DATASTORE_NAMESPACE: &str = "line-bot";
pub const METADATA_TOKEN_SAFETY_MARGIN_SECS: u64 = 60;

pub const DEFAULT_PROXY_PREFIX: &str = "/line";
