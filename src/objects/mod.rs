// Object store - where the photo desks put their pictures
//
// Uploads a blob under a name and hands back the URL the record store keeps.

pub mod compress;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::models::BeneficiaryId;
use crate::stages::Step;

pub use compress::{CompressedPhoto, PhotoCompression};
pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Photo is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Photo could not be compressed: {0}")]
    Compression(String),

    #[error("Invalid object name '{0}'")]
    InvalidName(String),

    #[error("Object storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for photos.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `name` and return the public URL.
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, ObjectStoreError>;

    /// Remove `name`. Removing a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError>;
}

/// Which of the two photo desks a picture comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoKind {
    Before,
    After,
}

impl PhotoKind {
    pub fn step(&self) -> Step {
        match self {
            PhotoKind::Before => Step::BeforePhoto,
            PhotoKind::After => Step::AfterPhoto,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            PhotoKind::Before => "before",
            PhotoKind::After => "after",
        }
    }
}

impl fmt::Display for PhotoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// `{before|after}-{id}-{unix_millis}.{ext}`
pub fn photo_object_name(kind: PhotoKind, id: &BeneficiaryId, extension: &str, at: DateTime<Utc>) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let ext = if ext.is_empty() { "jpg".to_string() } else { ext };
    format!("{}-{}-{}.{}", kind.prefix(), id, at.timestamp_millis(), ext)
}

/// Content type for a photo extension, defaulting to JPEG.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), ObjectStoreError> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidName(name.to_string()))
    }
}
