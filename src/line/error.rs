use thiserror::Error;

use crate::cache::store::StoreError;
use crate::secrets::SecretError;

/// Every way acquiring a channel access token can fail. Cloneable so one
/// refresh outcome can be handed to every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("secret '{0}' not found")]
    SecretNotFound(String),
    #[error("{0}")]
    SecretUnavailable(String),
    #[error("{0}")]
    StoreUnavailable(String),
    #[error("failed to sign assertion: {0}")]
    SigningError(String),
    #[error("token exchange rejected with status {status}: {body}")]
    ExchangeRejected { status: u16, body: String },
    #[error("token endpoint unreachable: {0}")]
    ExchangeUnavailable(String),
    #[error("malformed token exchange response: {0}")]
    MalformedExchangeResponse(String),
    #[error("credential refresh aborted: {0}")]
    RefreshAborted(String),
}

impl CredentialError {
    /// Failures worth another exchange attempt: transport errors and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            CredentialError::ExchangeUnavailable(_) => true,
            CredentialError::ExchangeRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<SecretError> for CredentialError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::NotFound(name) => CredentialError::SecretNotFound(name),
            access @ SecretError::Access { .. } => CredentialError::SecretUnavailable(access.to_string()),
        }
    }
}

impl From<StoreError> for CredentialError {
    fn from(err: StoreError) -> Self {
        CredentialError::StoreUnavailable(err.to_string())
    }
}
