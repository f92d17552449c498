use async_trait::async_trait;

use crate::secrets::{SecretError, SecretProvider};

/// Reads `line-priv-key` from `LINE_PRIV_KEY` and so on.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    pub fn env_var_name(secret_name: &str) -> String {
        secret_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let var = Self::env_var_name(name);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::NotFound(name.to_owned())),
            Err(e) => Err(SecretError::Access { name: name.to_owned(), reason: format!("{}: {}", var, e) }),
        }
    }
}
