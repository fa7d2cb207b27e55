//! Image storage collaborator for avatars and POI images.
//!
//! The engines only see the trait; the default implementation writes to a
//! local directory served statically under `/uploads`.

use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

/// What the image is for; governs the size ceiling and filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Avatar,
    Poi,
}

impl ImageKind {
    /// Maximum accepted upload size in bytes.
    pub fn max_bytes(&self) -> usize {
        match self {
            ImageKind::Avatar => 2 * 1024 * 1024,
            ImageKind::Poi => 5 * 1024 * 1024,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            ImageKind::Avatar => "avatar",
            ImageKind::Poi => "poi",
        }
    }
}

/// URLs of a stored image.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub url: String,
    /// Present only when the backing store produced one; the local store
    /// does no image processing.
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported image type {0}; expected image/jpeg or image/png")]
    InvalidType(String),

    #[error("file exceeds the {max_bytes} byte limit")]
    TooLarge { max_bytes: usize },

    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Map an accepted content type to its file extension.
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Validate and persist an uploaded image, returning its public URL.
    async fn store(
        &self,
        kind: ImageKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, ImageError>;
}

/// Filesystem-backed image store.
pub struct LocalImageStore {
    root: PathBuf,
    public_base: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(
        &self,
        kind: ImageKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, ImageError> {
        let ext = extension_for(content_type)
            .ok_or_else(|| ImageError::InvalidType(content_type.to_owned()))?;
        if bytes.len() > kind.max_bytes() {
            return Err(ImageError::TooLarge {
                max_bytes: kind.max_bytes(),
            });
        }

        let filename = format!("{}-{}.{ext}", kind.prefix(), Uuid::new_v4());
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&filename), bytes).await?;

        Ok(StoredImage {
            url: format!("{}/{filename}", self.public_base.trim_end_matches('/')),
            thumbnail_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_png_and_returns_public_url() {
        let dir = std::env::temp_dir().join(format!("breakoutglobe-test-{}", Uuid::new_v4()));
        let store = LocalImageStore::new(&dir, "/uploads");

        let stored = store
            .store(ImageKind::Avatar, "image/png", &[0x89, 0x50, 0x4e, 0x47])
            .await
            .unwrap();

        assert!(stored.url.starts_with("/uploads/avatar-"));
        assert!(stored.url.ends_with(".png"));
        assert!(stored.thumbnail_url.is_none());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn rejects_unsupported_content_type() {
        let store = LocalImageStore::new(std::env::temp_dir(), "/uploads");
        let err = store
            .store(ImageKind::Avatar, "image/gif", &[0u8; 4])
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::InvalidType(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_upload() {
        let store = LocalImageStore::new(std::env::temp_dir(), "/uploads");
        let oversized = vec![0u8; ImageKind::Avatar.max_bytes() + 1];
        let err = store
            .store(ImageKind::Avatar, "image/jpeg", &oversized)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { .. }));
    }
}
