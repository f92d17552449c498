use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::line::error::CredentialError;

/// Payload of the self-issued JWT presented to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    /// how long the assertion itself is usable
    pub exp: i64,
    /// requested lifetime of the issued access token, in seconds
    pub token_exp: u64,
}

#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    audience: String,
    assertion_ttl_seconds: u64,
    access_token_ttl_seconds: u64,
}

impl AssertionBuilder {
    pub fn new(audience: String, assertion_ttl_seconds: u64, access_token_ttl_seconds: u64) -> Self {
        Self { audience, assertion_ttl_seconds, access_token_ttl_seconds }
    }

    pub fn claims(&self, issuer_id: &str, now: i64) -> AssertionClaims {
        AssertionClaims {
            iss: issuer_id.to_owned(),
            sub: issuer_id.to_owned(),
            aud: self.audience.clone(),
            exp: now + self.assertion_ttl_seconds as i64,
            token_exp: self.access_token_ttl_seconds,
        }
    }

    /// Compact RS256 JWS with `kid` in the header. PKCS#1 v1.5 signatures
    /// are deterministic, so equal inputs yield equal assertions.
    pub fn build_assertion(
        &self,
        signing_key: &EncodingKey,
        key_id: &str,
        issuer_id: &str,
        now: i64,
    ) -> Result<String, CredentialError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key_id.to_owned());

        jsonwebtoken::encode(&header, &self.claims(issuer_id, now), signing_key)
            .map_err(|e| CredentialError::SigningError(e.to_string()))
    }
}
