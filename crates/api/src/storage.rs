//! Object storage for signatures and catalog images.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object path segment `{0}`")]
    InvalidPath(String),
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// `<feature>/<entity-id>/<filename>`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    feature: String,
    entity_id: String,
    filename: String,
}

impl ObjectPath {
    pub fn new(
        feature: impl Into<String>,
        entity_id: impl ToString,
        filename: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let path = Self {
            feature: feature.into(),
            entity_id: entity_id.to_string(),
            filename: filename.into(),
        };
        for segment in [&path.feature, &path.entity_id, &path.filename] {
            let bad = segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\']);
            if bad {
                return Err(StorageError::InvalidPath(segment.clone()));
            }
        }
        Ok(path)
    }

    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.feature, self.entity_id, self.filename)
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` and return the public URL of the object.
    async fn upload(
        &self,
        path: &ObjectPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// Writes under a root directory that the server exposes at `public_base_url`.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl AsRef<Path>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(
        &self,
        path: &ObjectPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let target = self.root.join(path.key());
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        tracing::debug!(key = %path.key(), content_type, size = bytes.len(), "object stored");
        Ok(format!("{}/{}", self.public_base_url, path.key()))
    }
}

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStorage {
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        path: &ObjectPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = path.key();
        self.objects.write().await.insert(
            key.clone(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory://{key}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUrl {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Decode `data:<type>;base64,<payload>`.
pub fn decode_data_url(value: &str) -> Result<DataUrl, StorageError> {
    let rest = value
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| StorageError::InvalidDataUrl("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| StorageError::InvalidDataUrl("missing payload".into()))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| StorageError::InvalidDataUrl("only base64 payloads are accepted".into()))?;
    if content_type.is_empty() {
        return Err(StorageError::InvalidDataUrl("missing content type".into()));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| StorageError::InvalidDataUrl(err.to_string()))?;
    if bytes.is_empty() {
        return Err(StorageError::InvalidDataUrl("empty payload".into()));
    }
    Ok(DataUrl {
        content_type: content_type.to_string(),
        bytes,
    })
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_validated() {
        let path = ObjectPath::new("inspections", "abc", "check-in-signature.png").unwrap();
        assert_eq!(path.key(), "inspections/abc/check-in-signature.png");
        assert!(ObjectPath::new("inspections", "..", "x.png").is_err());
        assert!(ObjectPath::new("inspections", "a/b", "x.png").is_err());
        assert!(ObjectPath::new("", "a", "x.png").is_err());
    }

    #[test]
    fn data_urls_decode() {
        let decoded = decode_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(decoded.content_type, "image/png");
        assert_eq!(&decoded.bytes[1..4], b"PNG");
        assert!(decode_data_url("").is_err());
        assert!(decode_data_url("data:image/png,plain").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(decode_data_url("data:image/png;base64,").is_err());
    }

    #[tokio::test]
    async fn memory_storage_keeps_objects() {
        let storage = MemoryObjectStorage::default();
        let path = ObjectPath::new("services", "42", "cover.jpg").unwrap();
        let url = storage
            .upload(&path, vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "memory://services/42/cover.jpg");
        let stored = storage.get("services/42/cover.jpg").await.unwrap();
        assert_eq!(stored.bytes, vec![1, 2, 3]);
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn local_storage_writes_under_root() {
        let root = std::env::temp_dir().join(format!("autodetail-{}", uuid::Uuid::new_v4()));
        let storage = LocalObjectStorage::new(&root, "http://localhost:8080/files/");
        let path = ObjectPath::new("products", "7", "photo.png").unwrap();
        let url = storage.upload(&path, vec![9], "image/png").await.unwrap();
        assert_eq!(url, "http://localhost:8080/files/products/7/photo.png");
        let written = tokio::fs::read(root.join("products/7/photo.png")).await.unwrap();
        assert_eq!(written, vec![9]);
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
