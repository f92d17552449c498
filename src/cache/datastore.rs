use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::store::{StoreError, TokenStore};
use crate::cache::token::CredentialRecord;
use crate::sources::metadata::MetadataTokenSource;

/// Google Cloud Datastore (Firestore in Datastore mode) over its REST API.
/// Only `:lookup` and `:commit` with a single upsert are used.
#[derive(Clone)]
pub struct DatastoreTokenStore {
    client: Client,
    base_url: String,
    project_id: String,
    namespace: String,
    auth: MetadataTokenSource,
}

impl DatastoreTokenStore {
    pub fn new(
        client: Client,
        base_url: String,
        project_id: String,
        namespace: String,
        auth: MetadataTokenSource,
    ) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned(), project_id, namespace, auth }
    }

    fn key(&self, kind: &str, id: &str) -> Value {
        json!({
            "partitionId": { "projectId": self.project_id, "namespaceId": self.namespace },
            "path": [{ "kind": kind, "name": id }]
        })
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, StoreError> {
        let bearer = self
            .auth
            .bearer_token()
            .await
            .map_err(|e| StoreError::Unavailable(format!("datastore auth: {}", e)))?;
        let url = format!("{}/v1/projects/{}:{}", self.base_url, self.project_id, method);

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("datastore {}: {}", method, e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "datastore {} failed: {} {}",
                method, status, text
            )));
        }
        response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("datastore {} response: {}", method, e)))
    }
}

/// Datastore encodes int64 as a JSON string, older writers used doubles.
fn integer_property(value: &Value) -> Option<i64> {
    value
        .get("integerValue")
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_i64()))
        .or_else(|| value.get("doubleValue").and_then(Value::as_f64).map(|f| f as i64))
}

fn record_from_entity(entity: &Value) -> Option<CredentialRecord> {
    let properties = entity.get("properties")?;
    let access_token = properties.get("access_token")?.get("stringValue")?.as_str()?;
    let expires_at = integer_property(properties.get("expires_at")?)?;
    Some(CredentialRecord::new(access_token.to_owned(), expires_at))
}

#[async_trait]
impl TokenStore for DatastoreTokenStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let response = self.call("lookup", json!({ "keys": [self.key(kind, id)] })).await?;

        let entity = response
            .get("found")
            .and_then(Value::as_array)
            .and_then(|found| found.first())
            .and_then(|result| result.get("entity"));
        let Some(entity) = entity else {
            debug!("datastore entity {}/{} not found", kind, id);
            return Ok(None);
        };

        let record = record_from_entity(entity);
        if record.is_none() {
            warn!("datastore entity {}/{} has an unexpected shape, treating as absent", kind, id);
        }
        Ok(record)
    }

    async fn save(&self, kind: &str, id: &str, record: &CredentialRecord) -> Result<(), StoreError> {
        let body = json!({
            "mode": "NON_TRANSACTIONAL",
            "mutations": [{
                "upsert": {
                    "key": self.key(kind, id),
                    "properties": {
                        "access_token": { "stringValue": record.access_token, "excludeFromIndexes": true },
                        "expires_at": { "integerValue": record.expires_at.to_string() }
                    }
                }
            }]
        });
        self.call("commit", body).await.map(|_| ())
    }
}
