// Media storage for uploaded avatars and logos

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};

const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct MediaStore {
    base_path: PathBuf,
}

impl MediaStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create media directory: {e}")))?;
        Ok(())
    }

    /// Stores an image under `<kind>/<owner>-<uuid>.<ext>` and returns its
    /// public URL path.
    pub async fn save_image(
        &self,
        kind: &str,
        owner_id: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<String> {
        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(
                "Image must be smaller than 2 MB".to_string(),
            ));
        }

        let ext = image_extension(file_name).ok_or_else(|| {
            AppError::Validation("Only png, jpg, gif and webp images are allowed".to_string())
        })?;

        let dir = self.base_path.join(kind);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create directories: {e}")))?;

        let stored_name = format!("{owner_id}-{}.{ext}", Uuid::new_v4());
        fs::write(dir.join(&stored_name), data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {e}")))?;

        Ok(format!("/media/{kind}/{stored_name}"))
    }

    /// Removes a previously stored file given its public URL. Foreign URLs are
    /// ignored.
    pub async fn remove(&self, url: &str) -> Result<()> {
        let Some(relative) = url.strip_prefix("/media/") else {
            return Ok(());
        };
        if relative.split('/').any(|part| part == ".." || part.is_empty()) {
            return Ok(());
        }

        let path = self.base_path.join(relative);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }
}

fn image_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        _ => None,
    }
}
