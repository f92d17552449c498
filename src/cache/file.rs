use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::store::{StoreError, TokenStore};
use crate::cache::token::CredentialRecord;

/// JSON document on disk holding `"kind/id" -> record`.
/// Writes go to a sibling temp file which is renamed over the target.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), write_lock: Mutex::new(()) }
    }

    fn slot(kind: &str, id: &str) -> String {
        format!("{}/{}", kind, id)
    }

    async fn read_all(&self) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("token store file {} is corrupt, ignoring it: {}", self.path.display(), e);
                Ok(HashMap::new())
            }
        }
    }

    async fn write_all(&self, map: &HashMap<String, serde_json::Value>) -> Result<(), StoreError> {
        let unavailable = |e: std::io::Error| {
            StoreError::Unavailable(format!("write {}: {}", self.path.display(), e))
        };
        let content = serde_json::to_vec_pretty(map)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(unavailable)?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await.map_err(unavailable)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(unavailable)?;
        }
        tokio::fs::rename(&tmp, &self.path).await.map_err(unavailable)?;
        debug!("token store file {} written", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let map = self.read_all().await?;
        Ok(map
            .get(&Self::slot(kind, id))
            .and_then(|value| serde_json::from_value(value.clone()).ok()))
    }

    async fn save(&self, kind: &str, id: &str, record: &CredentialRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await?;
        let value = serde_json::to_value(record)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        map.insert(Self::slot(kind, id), value);
        self.write_all(&map).await
    }
}
