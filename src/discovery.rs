use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SubsweepError};

/// A video file found under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    /// Absolute path to the video
    pub path: PathBuf,
    /// Lowercased container extension
    pub extension: String,
}

impl VideoAsset {
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Lazy, depth-first walk over the root yielding videos in file-name order
pub struct VideoFiles {
    root: PathBuf,
    walker: walkdir::IntoIter,
    extensions: Vec<String>,
}

impl VideoFiles {
    /// Canonical root the walk started from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for VideoFiles {
    type Item = VideoAsset;

    fn next(&mut self) -> Option<VideoAsset> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(extension) = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_lowercase)
            else {
                continue;
            };

            if self.extensions.contains(&extension) {
                debug!("Discovered video: {}", entry.path().display());
                return Some(VideoAsset {
                    path: entry.into_path(),
                    extension,
                });
            }
        }
    }
}

/// Enumerate videos under `root` whose extension is in `extensions` (case-insensitive).
///
/// Fails only when the root itself is missing or unreadable. Entries that cannot be
/// read further down the tree are logged and skipped. Re-invoking on an unchanged
/// tree yields the same sequence.
pub fn discover<P: AsRef<Path>>(root: P, extensions: &[String]) -> Result<VideoFiles> {
    let root = root.as_ref();

    let root = std::fs::canonicalize(root).map_err(|e| {
        SubsweepError::Discovery(format!("Root path {} is not accessible: {}", root.display(), e))
    })?;

    if !root.is_dir() {
        return Err(SubsweepError::Discovery(format!(
            "Root path {} is not a directory",
            root.display()
        )));
    }

    std::fs::read_dir(&root).map_err(|e| {
        SubsweepError::Discovery(format!("Root path {} is not readable: {}", root.display(), e))
    })?;

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    Ok(VideoFiles {
        root,
        walker,
        extensions: extensions.iter().map(|ext| ext.to_lowercase()).collect(),
    })
}
