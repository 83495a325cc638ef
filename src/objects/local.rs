use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{validate_name, ObjectStore, ObjectStoreError};
use crate::config::ObjectsConfig;

/// Photos written to a local directory and served from `public_base_url`.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub async fn new<P: AsRef<Path>>(root: P, public_base_url: &str) -> Result<Self, ObjectStoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn from_config(config: &ObjectsConfig) -> Result<Self, ObjectStoreError> {
        Self::new(&config.root, &config.public_base_url).await
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, ObjectStoreError> {
        validate_name(name)?;
        let path = self.path_for(name);
        // Readers never see a partial file
        let partial = self.root.join(format!(".{name}.partial"));
        fs::write(&partial, bytes).await?;
        fs::rename(&partial, &path).await?;
        debug!(object = name, content_type, size = bytes.len(), "Stored photo");
        Ok(format!("{}/{}", self.public_base_url, name))
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        validate_name(name)?;
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => {
                debug!(object = name, "Removed photo");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
