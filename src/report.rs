use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::decision::ProcessingDecision;
use crate::error::{Result, SubsweepError};

/// When a finished batch should exit with a non-zero status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Fail if at least one video failed
    #[default]
    AnyFailure,
    /// Fail only if every processed video failed
    AllFailed,
    /// Always exit successfully once traversal completes
    Never,
}

/// The step at which a video failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailedStep {
    ReadSource,
    Transcribe,
    PersistSource,
    Translate,
    PersistTarget,
}

impl fmt::Display for FailedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailedStep::ReadSource => "read-source",
            FailedStep::Transcribe => "transcribe",
            FailedStep::PersistSource => "persist-source",
            FailedStep::Translate => "translate",
            FailedStep::PersistTarget => "persist-target",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Succeeded,
    Skipped,
    Failed { step: FailedStep, reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// Result of processing one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoReport {
    pub path: PathBuf,
    /// Path relative to the batch root, for log readability
    pub relative_path: PathBuf,
    pub decision: ProcessingDecision,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
}

impl VideoReport {
    pub fn new(
        path: &Path,
        root: &Path,
        decision: ProcessingDecision,
        outcome: Outcome,
        elapsed: Duration,
    ) -> Self {
        let relative_path = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
        Self {
            path: path.to_path_buf(),
            relative_path,
            decision,
            outcome,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Everything that happened during one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub root: PathBuf,
    pub source_language: String,
    pub target_language: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub videos: Vec<VideoReport>,
}

impl BatchReport {
    pub fn new(root: &Path, source_language: &str, target_language: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            root: root.to_path_buf(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            videos: Vec::new(),
        }
    }

    pub fn record(&mut self, video: VideoReport) {
        self.videos.push(video);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.videos.iter().filter(|v| predicate(&v.outcome)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &VideoReport> {
        self.videos.iter().filter(|v| v.outcome.is_failure())
    }

    /// Whether the process should exit non-zero under `policy`. An empty batch never fails.
    pub fn should_fail(&self, policy: ExitPolicy) -> bool {
        let failed = self.failed();
        match policy {
            ExitPolicy::AnyFailure => failed > 0,
            ExitPolicy::AllFailed => failed > 0 && failed == self.videos.len(),
            ExitPolicy::Never => false,
        }
    }

    pub fn log_summary(&self) {
        info!(
            "Batch {} finished: {} videos, {} succeeded, {} skipped, {} failed",
            self.run_id,
            self.videos.len(),
            self.succeeded(),
            self.skipped(),
            self.failed()
        );

        for video in self.failures() {
            if let Outcome::Failed { step, reason } = &video.outcome {
                warn!("  FAILED {} at {}: {}", video.relative_path.display(), step, reason);
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            SubsweepError::ArtifactWrite(format!(
                "Failed to write report {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }
}
