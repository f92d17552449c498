use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::line::error::CredentialError;
use crate::utils::constants::CLIENT_ASSERTION_TYPE;

/// Access token issued in exchange for an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Client for the channel access token v2.1 endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    client: Client,
    token_endpoint: String,
}

impl TokenExchangeClient {
    /// `client` should carry the configured request timeout.
    pub fn new(client: Client, token_endpoint: String) -> Self {
        Self { client, token_endpoint }
    }

    pub async fn exchange(&self, assertion: &str) -> Result<ExchangedToken, CredentialError> {
        debug!("exchanging assertion at {}", self.token_endpoint);
        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::ExchangeUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::ExchangeUnavailable(e.to_string()))?;
        if !status.is_success() {
            warn!("token exchange rejected: {} {}", status, body);
            return Err(CredentialError::ExchangeRejected { status: status.as_u16(), body });
        }

        parse_exchange_response(&body)
    }
}

fn parse_exchange_response(body: &str) -> Result<ExchangedToken, CredentialError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| CredentialError::MalformedExchangeResponse(format!("not JSON: {}", e)))?;

    let access_token = json
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| CredentialError::MalformedExchangeResponse("'access_token' missing or not a string".into()))?;
    let expires_in = json
        .get("expires_in")
        .and_then(Value::as_i64)
        .ok_or_else(|| CredentialError::MalformedExchangeResponse("'expires_in' missing or not an integer".into()))?;
    if expires_in <= 0 {
        return Err(CredentialError::MalformedExchangeResponse(format!(
            "'expires_in' must be positive, got {}",
            expires_in
        )));
    }

    Ok(ExchangedToken { access_token: access_token.to_owned(), expires_in })
}
