//! Media upload collaborator.
//!
//! The account service treats media storage as an external collaborator: it
//! hands over a local staged file and gets back a public URL, or `None` on
//! failure. `None` is a deliberate value-based failure signal so callers
//! branch on it explicitly instead of catching errors.
//!
//! [`DiskMediaStore`] is the built-in implementation - it moves staged files
//! into a configured media root and derives URLs from a configured public
//! base. All of its configuration is injected at construction; there is no
//! process-global client state.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub url: String,
}

/// Upload collaborator contract: `None` signals failure without panicking.
///
/// `remove` is the compensating operation for an upload whose surrounding
/// work failed afterwards (e.g. the account insert lost a race). It is
/// best-effort: failures are logged, never surfaced.
pub trait MediaUploader: Send + Sync {
    fn upload<'a>(&'a self, local_path: &'a Path) -> BoxFuture<'a, Option<UploadedMedia>>;

    fn remove<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ()>;
}

/// Media storage on the local filesystem, serving URLs under a public base.
pub struct DiskMediaStore {
    root: PathBuf,
    public_base: Url,
}

impl DiskMediaStore {
    /// Create the store, ensuring the media root exists.
    pub fn new(root: impl Into<PathBuf>, public_base: Url) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, public_base })
    }
}

impl MediaUploader for DiskMediaStore {
    fn upload<'a>(&'a self, local_path: &'a Path) -> BoxFuture<'a, Option<UploadedMedia>> {
        Box::pin(async move {
            let ext = local_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin");
            let file_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
            let dest = self.root.join(&file_name);

            if let Err(e) = tokio::fs::copy(local_path, &dest).await {
                warn!(path = %local_path.display(), error = %e, "Media upload failed");
                return None;
            }

            let url = match self.public_base.join(&file_name) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Media URL construction failed");
                    let _ = tokio::fs::remove_file(&dest).await;
                    return None;
                }
            };

            Some(UploadedMedia { url })
        })
    }

    fn remove<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            // Only URLs this store minted map back to files under the root
            let Some(file_name) = url.strip_prefix(self.public_base.as_str()) else {
                warn!(url = %url, "Refusing to remove media outside the public base");
                return;
            };
            if file_name.contains('/') || file_name.contains("..") {
                warn!(url = %url, "Refusing to remove media outside the public base");
                return;
            }

            if let Err(e) = tokio::fs::remove_file(self.root.join(file_name)).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(url = %url, error = %e, "Failed to remove uploaded media");
                }
            }
        })
    }
}

/// A temporary local file staged from an incoming upload.
///
/// The file is removed from disk when the value drops, so every exit path
/// of a handler - success, validation failure, upload failure - releases
/// the artifact without explicit cleanup calls.
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    /// Write upload bytes to a fresh file in `staging_dir`.
    /// `original_name` is only consulted for the file extension.
    pub async fn write(
        staging_dir: &Path,
        original_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(staging_dir).await?;

        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let path = staging_dir.join(format!("upload-{}.{}", uuid::Uuid::new_v4(), ext));

        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}
