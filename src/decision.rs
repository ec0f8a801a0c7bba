use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::{ArtifactState, LocatedArtifacts};

/// What has to run for one video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingDecision {
    /// Target subtitles already exist
    SkipEntirely,
    /// Source subtitles exist, only translation is missing
    TranslateOnly,
    /// Nothing usable on disk
    TranscribeAndTranslate,
}

impl ProcessingDecision {
    pub fn needs_transcription(&self) -> bool {
        matches!(self, ProcessingDecision::TranscribeAndTranslate)
    }

    pub fn needs_translation(&self) -> bool {
        !matches!(self, ProcessingDecision::SkipEntirely)
    }
}

impl fmt::Display for ProcessingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessingDecision::SkipEntirely => "skip-entirely",
            ProcessingDecision::TranslateOnly => "translate-only",
            ProcessingDecision::TranscribeAndTranslate => "transcribe-and-translate",
        };
        f.write_str(label)
    }
}

/// Pick the steps to run, resuming from the most downstream usable artifact.
pub fn decide(source: ArtifactState, target: ArtifactState) -> ProcessingDecision {
    if target.is_usable() {
        ProcessingDecision::SkipEntirely
    } else if source.is_usable() {
        ProcessingDecision::TranslateOnly
    } else {
        ProcessingDecision::TranscribeAndTranslate
    }
}

impl From<LocatedArtifacts> for ProcessingDecision {
    fn from(located: LocatedArtifacts) -> Self {
        decide(located.source, located.target)
    }
}
