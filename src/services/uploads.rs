//! Local storage for uploaded cover images

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::{
    config::UploadsConfig,
    error::{AppError, AppResult},
};

const COVERS_DIR: &str = "covers";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Detect the image format from its magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }
}

/// A validated image held in memory
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub url: String,
    pub path: PathBuf,
}

#[derive(Clone)]
pub struct UploadsService {
    config: UploadsConfig,
}

impl UploadsService {
    pub fn new(config: UploadsConfig) -> Self {
        Self { config }
    }

    pub fn max_bytes(&self) -> usize {
        self.config.max_bytes
    }

    /// Check size and format of an uploaded image
    pub fn validate_image(&self, bytes: Vec<u8>) -> AppResult<ImageUpload> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Image is empty".to_string()));
        }
        if bytes.len() > self.config.max_bytes {
            return Err(AppError::Validation(format!(
                "Image exceeds the maximum size of {} bytes",
                self.config.max_bytes
            )));
        }
        let kind = ImageKind::sniff(&bytes).ok_or_else(|| {
            AppError::Validation("Unsupported image type, use JPEG, PNG or WebP".to_string())
        })?;
        Ok(ImageUpload { bytes, kind })
    }

    /// Write a cover image under a content-hash file name and return its public URL
    pub async fn store_cover(&self, image: &ImageUpload) -> AppResult<StoredFile> {
        let file_name = format!("{}.{}", content_hash(&image.bytes), image.kind.extension());
        let dir = Path::new(&self.config.directory).join(COVERS_DIR);
        let path = dir.join(&file_name);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {}", e)))?;

        // Same content, same name
        if tokio::fs::metadata(&path).await.is_err() {
            tokio::fs::write(&path, &image.bytes)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to store upload: {}", e)))?;
            tracing::debug!("Stored cover {}", path.display());
        }

        Ok(StoredFile {
            url: format!(
                "{}/{}/{}",
                self.config.public_path.trim_end_matches('/'),
                COVERS_DIR,
                file_name
            ),
            path,
        })
    }
}

fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    fn service(dir: &Path, max_bytes: usize) -> UploadsService {
        UploadsService::new(UploadsConfig {
            directory: dir.to_string_lossy().into_owned(),
            max_bytes,
            public_path: "/uploads/".to_string(),
        })
    }

    #[test]
    fn test_sniff() {
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(PNG), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"GIF89a"), None);
        assert_eq!(ImageKind::sniff(b""), None);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let uploads = service(Path::new("/tmp"), 8);
        assert!(matches!(uploads.validate_image(vec![]), Err(AppError::Validation(_))));
        assert!(matches!(uploads.validate_image(PNG.to_vec()), Err(AppError::Validation(_))));
        let uploads = service(Path::new("/tmp"), 1024);
        assert!(matches!(uploads.validate_image(b"GIF89a....".to_vec()), Err(AppError::Validation(_))));
        assert_eq!(uploads.validate_image(PNG.to_vec()).unwrap().kind, ImageKind::Png);
    }

    #[tokio::test]
    async fn test_store_cover_uses_content_hash() {
        let dir = std::env::temp_dir().join(format!("bookclub-uploads-{}", uuid::Uuid::new_v4()));
        let uploads = service(&dir, 1024);
        let image = uploads.validate_image(PNG.to_vec()).unwrap();

        let first = uploads.store_cover(&image).await.unwrap();
        let second = uploads.store_cover(&image).await.unwrap();

        let expected = format!("/uploads/covers/{}.png", content_hash(PNG));
        assert_eq!(first.url, expected);
        assert_eq!(first.path, second.path);
        assert_eq!(tokio::fs::read(&first.path).await.unwrap(), PNG);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
