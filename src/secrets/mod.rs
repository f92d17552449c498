//! Secret providers
//!
//! Resolve named secrets (signing key, key id). Providers hold no business
//! logic and do not cache; callers decide how long a value is kept.

use async_trait::async_trait;
use thiserror::Error;
use reqwest::Client;
use std::sync::Arc;

use crate::config::settings::SecretsConfig;
use crate::sources::metadata::MetadataTokenSource;

pub mod env;
pub mod file;
pub mod gcp;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret '{0}' not found")]
    NotFound(String),
    #[error("secret '{name}' could not be accessed: {reason}")]
    Access { name: String, reason: String },
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

pub fn build_secret_provider(
    cfg: &SecretsConfig,
    client: &Client,
    auth: &MetadataTokenSource,
) -> Arc<dyn SecretProvider> {
    match cfg {
        SecretsConfig::Env => Arc::new(env::EnvSecretProvider),
        SecretsConfig::File { dir } => Arc::new(file::FileSecretProvider::new(dir)),
        SecretsConfig::Gcp { project_id, base_url } => Arc::new(gcp::GcpSecretProvider::new(
            client.clone(),
            base_url.to_owned(),
            project_id.to_owned(),
            auth.clone(),
        )),
    }
}
