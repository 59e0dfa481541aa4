use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{ImageToolError, ToolResult};

/// Where default-named images go, relative to the home directory.
pub const DEFAULT_IMAGE_SUBDIR: &str = "Pictures/gpt-image-rmcp";

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Directories used when the caller did not name an output file.
#[derive(Clone, Debug)]
pub struct OutputDirs {
    home_dir: Option<PathBuf>,
    work_dir: PathBuf,
}

impl OutputDirs {
    pub fn new(home_dir: Option<PathBuf>, work_dir: PathBuf) -> Self {
        Self { home_dir, work_dir }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Creates the home image directory on demand, falling back to the work directory.
    pub async fn resolve_default_dir(&self) -> PathBuf {
        let Some(home) = self.home_dir.as_ref() else {
            warn!(work_dir = %self.work_dir.display(), "no home directory, using work directory");
            return self.work_dir.clone();
        };
        let preferred = home.join(DEFAULT_IMAGE_SUBDIR);
        match fs::create_dir_all(&preferred).await {
            Ok(()) => preferred,
            Err(err) => {
                warn!(
                    dir = %preferred.display(),
                    work_dir = %self.work_dir.display(),
                    error = %err,
                    "cannot create image directory, using work directory"
                );
                self.work_dir.clone()
            }
        }
    }
}

/// Writes every image or none of them.
///
/// Each image lands in a hidden sibling temp file first; only when all temp
/// writes succeeded are they renamed into place, in order.
pub async fn write_images(files: &[(PathBuf, &[u8])]) -> ToolResult<()> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        let temp = temp_path(path);
        let result = async {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&temp, bytes).await
        }
        .await;
        if let Err(err) = result {
            remove_all(&staged).await;
            return Err(ImageToolError::filesystem(path.clone(), err));
        }
        debug!(temp = %temp.display(), len = bytes.len(), "staged image");
        staged.push(temp);
    }

    let mut written = Vec::with_capacity(files.len());
    for (index, ((path, _), temp)) in files.iter().zip(&staged).enumerate() {
        if let Err(source) = fs::rename(temp, path).await {
            remove_all(&staged[index..]).await;
            if written.is_empty() {
                return Err(ImageToolError::filesystem(path.clone(), source));
            }
            return Err(ImageToolError::PartialWrite {
                written,
                failed_index: index + 1,
                path: path.clone(),
                source,
            });
        }
        info!(path = %path.display(), "saved image");
        written.push(index + 1);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    // unique per call so concurrent writers to one target never share a temp
    let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{sequence}.tmp", std::process::id()))
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot remove staged image");
            }
        }
    }
}
