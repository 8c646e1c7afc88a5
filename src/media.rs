//! Image storage under the public media root.
//!
//! Uploads are staged first and only renamed into the public directory
//! once the database insert has succeeded, so a failed insert never leaves
//! an orphaned image behind.

use chrono::Utc;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};

/// Public subdirectory for school images; also the URL prefix they are
/// served under.
pub const IMAGE_DIR: &str = "schoolimage";

const STAGING_DIR: &str = ".staging";

#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        MediaStore { root }
    }

    /// Create the image and staging directories.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.staging_dir()).await
    }

    fn image_dir(&self) -> PathBuf {
        self.root.join(IMAGE_DIR)
    }

    fn staging_dir(&self) -> PathBuf {
        self.image_dir().join(STAGING_DIR)
    }

    /// Write the uploaded bytes to the staging area. The caller commits the
    /// staged image after its database row exists, or discards it.
    pub async fn stage_image(&self, original_name: &str, bytes: &[u8]) -> io::Result<StagedImage> {
        let filename = image_filename(original_name, Utc::now().timestamp_millis());
        self.prepare().await?;
        let staged_path = self.staging_dir().join(&filename);
        tokio::fs::write(&staged_path, bytes).await?;
        debug!("Staged image at {}", staged_path.display());
        Ok(StagedImage {
            staged_path,
            final_path: self.image_dir().join(&filename),
            public_path: format!("/{}/{}", IMAGE_DIR, filename),
        })
    }
}

/// An uploaded image sitting in the staging area.
#[derive(Debug)]
pub struct StagedImage {
    staged_path: PathBuf,
    final_path: PathBuf,
    public_path: String,
}

impl StagedImage {
    /// The server-relative path stored in the database row.
    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Move the image into the public directory.
    pub async fn commit(self) -> io::Result<()> {
        tokio::fs::rename(&self.staged_path, &self.final_path).await?;
        debug!("Committed image to {}", self.final_path.display());
        Ok(())
    }

    /// Remove the staged file. Failure to clean up is logged, not raised;
    /// the submission already failed for another reason.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.staged_path).await {
            warn!(
                "Failed to remove staged image {}: {}",
                self.staged_path.display(),
                e
            );
        }
    }
}

/// Derive the stored filename: upload timestamp in milliseconds, an
/// underscore, then the sanitized original name.
pub fn image_filename(original_name: &str, at_millis: i64) -> String {
    format!("{}_{}", at_millis, sanitize_filename(original_name))
}

/// Reduce a client-supplied filename to a safe single path component with
/// spaces replaced by underscores.
pub fn sanitize_filename(original_name: &str) -> String {
    let base = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let base = base.replace(' ', "_").replace('\\', "_");
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base
    }
}
