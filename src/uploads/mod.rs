/// Disk storage for uploaded images
///
/// Files are stored flat in the upload directory as `<uuid>.<ext>` and
/// referenced from the database by their public path `/uploads/<file>`.
use crate::error::{SurfError, SurfResult};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Public URL prefix under which uploads are served
pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Disk-backed upload store
#[derive(Debug, Clone)]
pub struct UploadStore {
    base_path: PathBuf,
    max_file_size: usize,
}

impl UploadStore {
    pub fn new(base_path: PathBuf, max_file_size: usize) -> Self {
        Self {
            base_path,
            max_file_size,
        }
    }

    /// Directory served under [`PUBLIC_PREFIX`]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Create the upload directory if missing
    pub async fn ensure_dir(&self) -> SurfResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Validate and store an image, returning its public URL
    ///
    /// `field` names the form field in validation errors.
    pub async fn save_image(&self, field: &str, data: &[u8]) -> SurfResult<String> {
        if data.is_empty() {
            return Err(SurfError::field(field, "Uploaded file is empty"));
        }

        if data.len() > self.max_file_size {
            return Err(SurfError::field(
                field,
                &format!(
                    "File too large (max {} bytes)",
                    self.max_file_size
                ),
            ));
        }

        let extension = image_extension(data)
            .ok_or_else(|| SurfError::field(field, "Only image files are allowed"))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        self.ensure_dir().await?;

        fs::write(self.base_path.join(&file_name), data)
            .await
            .map_err(|e| SurfError::Internal(format!("Failed to write upload {}: {}", file_name, e)))?;

        tracing::debug!("Stored upload {} ({} bytes)", file_name, data.len());
        Ok(format!("{}{}", PUBLIC_PREFIX, file_name))
    }

    /// Remove a previously stored file by its public URL
    ///
    /// URLs that do not point into the upload directory are ignored, as are
    /// files that are already gone.
    pub async fn remove(&self, public_url: &str) -> SurfResult<()> {
        let Some(path) = self.resolve(public_url) else {
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SurfError::Internal(format!(
                "Failed to delete upload {}: {}",
                public_url, e
            ))),
        }
    }

    /// Remove a file and log instead of failing
    pub async fn remove_best_effort(&self, public_url: &str) {
        if let Err(e) = self.remove(public_url).await {
            tracing::warn!("Could not remove upload {}: {}", public_url, e);
        }
    }

    fn resolve(&self, public_url: &str) -> Option<PathBuf> {
        let file_name = public_url.strip_prefix(PUBLIC_PREFIX)?;
        let valid = !file_name.is_empty()
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !file_name.starts_with('.');

        valid.then(|| self.base_path.join(file_name))
    }
}

fn image_extension(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}
