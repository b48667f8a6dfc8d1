//! Local image file storage.
//!
//! Consumers hand over raw bytes and a file extension and get back an opaque
//! absolute path string, usable later as a `CardImage` path.

use crate::error::StoreResult;
use std::path::PathBuf;
use uuid::Uuid;

pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Image store rooted at `dir`; the directory is created if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!("Failed to create image directory: {}", e);
        } else {
            log::debug!("Image directory: {:?}", dir);
        }
        Self { dir }
    }

    /// Writes the bytes to a freshly named file and returns its path.
    pub fn save(&self, bytes: &[u8], extension: &str) -> StoreResult<String> {
        let extension = extension.trim_start_matches('.');
        let filename = format!("{}.{}", Uuid::new_v4().simple(), extension);
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)?;
        log::debug!("Saved image: {}", path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}
