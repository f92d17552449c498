use async_trait::async_trait;
use thiserror::Error;

use crate::cache::token::CredentialRecord;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

/// Point lookups and overwrites of the credential record by (kind, id).
///
/// `get` returning `Ok(None)` is a normal first-run outcome. A stored value
/// that cannot be read back as a [`CredentialRecord`] is reported as absent,
/// so the next refresh overwrites it.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<CredentialRecord>, StoreError>;

    async fn save(&self, kind: &str, id: &str, record: &CredentialRecord) -> Result<(), StoreError>;
}
