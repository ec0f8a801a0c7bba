//! Locating the subtitle artifacts that belong to a video.
//!
//! For `<dir>/<name>.<ext>` the artifacts live at `<dir>/<name>.<source>.srt` and
//! `<dir>/<name>.<target>.srt`. Locating only reads the filesystem.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::subtitle::SUBTITLE_EXTENSION;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Observed state of one subtitle artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactState {
    pub exists: bool,
    /// Exists and holds something other than whitespace
    pub non_empty: bool,
}

impl ArtifactState {
    pub const ABSENT: ArtifactState = ArtifactState {
        exists: false,
        non_empty: false,
    };

    /// A finished artifact that can be reused as-is
    pub fn is_usable(&self) -> bool {
        self.exists && self.non_empty
    }

    /// Inspect the file at `path`
    pub fn inspect(path: &Path) -> Self {
        let metadata = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Self::ABSENT,
        };

        if metadata.len() == 0 {
            return ArtifactState {
                exists: true,
                non_empty: false,
            };
        }

        let non_empty = match fs::read(path) {
            Ok(bytes) => bytes
                .strip_prefix(UTF8_BOM)
                .unwrap_or(bytes.as_slice())
                .iter()
                .any(|b| !b.is_ascii_whitespace()),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                false
            }
        };

        ArtifactState {
            exists: true,
            non_empty,
        }
    }
}

/// Derived artifact paths for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl ArtifactPaths {
    pub fn for_video(video: &Path, source_language: &str, target_language: &str) -> Self {
        Self {
            source: subtitle_path(video, source_language),
            target: subtitle_path(video, target_language),
        }
    }
}

/// Artifact states for one video, as read at decision time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedArtifacts {
    pub source: ArtifactState,
    pub target: ArtifactState,
}

/// `<dir>/<stem>.<language>.srt` for the given video path
pub fn subtitle_path(video: &Path, language: &str) -> PathBuf {
    let stem = video.file_stem().unwrap_or_default().to_string_lossy();
    video.with_file_name(format!("{}.{}.{}", stem, language, SUBTITLE_EXTENSION))
}

/// Look up both artifacts of a video
pub fn locate(paths: &ArtifactPaths) -> LocatedArtifacts {
    LocatedArtifacts {
        source: ArtifactState::inspect(&paths.source),
        target: ArtifactState::inspect(&paths.target),
    }
}
