use reqwest::Client;
use std::sync::Arc;

use crate::cache::store::TokenStore;
use crate::config::settings::StoreConfig;
use crate::sources::metadata::MetadataTokenSource;

pub mod datastore;
pub mod file;
pub mod memory;
pub mod store;
pub mod token;

pub fn build_token_store(
    cfg: &StoreConfig,
    client: &Client,
    auth: &MetadataTokenSource,
) -> Arc<dyn TokenStore> {
    match cfg {
        StoreConfig::Memory => Arc::new(memory::MemoryTokenStore::new()),
        StoreConfig::File { path } => Arc::new(file::FileTokenStore::new(path)),
        StoreConfig::Datastore { project_id, namespace, base_url } => {
            Arc::new(datastore::DatastoreTokenStore::new(
                client.clone(),
                base_url.to_owned(),
                project_id.to_owned(),
                namespace.to_owned(),
                auth.clone(),
            ))
        }
    }
}
