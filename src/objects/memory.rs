use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{validate_name, ObjectStore, ObjectStoreError};

/// Object store held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl InMemoryObjectStore {
    pub const BASE_URL: &'static str = "memory://photos";

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(name).map(|(_, bytes)| bytes.clone())
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, ObjectStoreError> {
        validate_name(name)?;
        self.objects
            .write()
            .await
            .insert(name.to_string(), (content_type.to_string(), bytes.to_vec()));
        Ok(format!("{}/{}", Self::BASE_URL, name))
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        validate_name(name)?;
        self.objects.write().await.remove(name);
        Ok(())
    }
}
