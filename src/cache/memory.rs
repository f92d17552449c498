use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::store::{StoreError, TokenStore};
use crate::cache::token::CredentialRecord;

/// Process-local store: (kind, id) -> record
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<HashMap<(String, String), CredentialRecord>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let map = self.inner.read().await;
        Ok(map.get(&(kind.to_owned(), id.to_owned())).cloned())
    }

    async fn save(&self, kind: &str, id: &str, record: &CredentialRecord) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        map.insert((kind.to_owned(), id.to_owned()), record.clone());
        Ok(())
    }
}
