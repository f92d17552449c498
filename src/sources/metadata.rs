use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::token::CredentialRecord;
use crate::helpers::time::Clock;
use crate::utils::constants::METADATA_TOKEN_SAFETY_MARGIN_SECS;

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Service account token from the GCE/Cloud Run metadata server, used to
/// authorize Secret Manager and Datastore REST calls.
#[derive(Clone)]
pub struct MetadataTokenSource {
    client: Client,
    url: String,
    clock: Arc<dyn Clock>,
    cached: Arc<Mutex<Option<CredentialRecord>>>,
}

impl MetadataTokenSource {
    pub fn new(client: Client, url: String, clock: Arc<dyn Clock>) -> Self {
        Self { client, url, clock, cached: Arc::new(Mutex::new(None)) }
    }

    pub async fn bearer_token(&self) -> Result<String> {
        // held across the fetch so concurrent callers share one request
        let mut cached = self.cached.lock().await;
        let now = self.clock.now_unix();
        if let Some(record) = cached.as_ref().filter(|r| r.is_fresh(now, METADATA_TOKEN_SAFETY_MARGIN_SECS)) {
            return Ok(record.access_token.clone());
        }

        debug!("fetching service account token from metadata server");
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("Metadata request failed: {}", response.status()));
        }
        let body: MetadataTokenResponse = response.json().await?;
        info!("service account token fetched, expires in {}s", body.expires_in);

        if body.expires_in <= 0 {
            return Err(anyhow!("Metadata token has non-positive expires_in {}", body.expires_in));
        }
        let record = CredentialRecord::issued_at(body.access_token, now, body.expires_in)
            .ok_or_else(|| anyhow!("Metadata token expires_in {} is out of range", body.expires_in))?;
        let token = record.access_token.clone();
        *cached = Some(record);
        Ok(token)
    }
}
