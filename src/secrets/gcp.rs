use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::secrets::{SecretError, SecretProvider};
use crate::sources::metadata::MetadataTokenSource;

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: Option<SecretPayload>,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

/// Google Secret Manager, always the `latest` version.
#[derive(Clone)]
pub struct GcpSecretProvider {
    client: Client,
    base_url: String,
    project_id: String,
    auth: MetadataTokenSource,
}

impl GcpSecretProvider {
    pub fn new(client: Client, base_url: String, project_id: String, auth: MetadataTokenSource) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned(), project_id, auth }
    }
}

#[async_trait]
impl SecretProvider for GcpSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let access_error = |reason: String| SecretError::Access { name: name.to_owned(), reason };

        let bearer = self.auth.bearer_token().await.map_err(|e| access_error(e.to_string()))?;
        let url = format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.base_url, self.project_id, name
        );
        debug!("accessing secret '{}'", name);

        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| access_error(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(SecretError::NotFound(name.to_owned())),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(access_error(format!("{} {}", status, body)));
            }
            _ => {}
        }

        let body: AccessSecretVersionResponse =
            response.json().await.map_err(|e| access_error(e.to_string()))?;
        let data = body
            .payload
            .and_then(|p| p.data)
            .ok_or_else(|| SecretError::NotFound(name.to_owned()))?;
        let decoded = STANDARD.decode(data.as_bytes()).map_err(|e| access_error(e.to_string()))?;
        let value = String::from_utf8(decoded).map_err(|e| access_error(e.to_string()))?;
        if value.is_empty() {
            return Err(SecretError::NotFound(name.to_owned()));
        }
        Ok(value)
    }
}
