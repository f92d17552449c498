use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::secrets::{SecretError, SecretProvider};

/// Mounted secrets: `<dir>/<secret name>`, surrounding whitespace trimmed.
#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    dir: PathBuf,
}

impl FileSecretProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretProvider for FileSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        if name.contains('/') || name.contains("..") {
            return Err(SecretError::Access { name: name.to_owned(), reason: "invalid secret name".into() });
        }
        let path = self.dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
            Ok(_) => Err(SecretError::NotFound(name.to_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SecretError::NotFound(name.to_owned())),
            Err(e) => Err(SecretError::Access { name: name.to_owned(), reason: format!("{}: {}", path.display(), e) }),
        }
    }
}
