use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, SubsweepError};
use crate::subtitle::{read_srt, Cue};

/// Lines of stderr kept when a tool fails
const STDERR_TAIL_LINES: usize = 20;

/// External transcription command line
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl ToolCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a `--name value` pair
    pub fn option<S: Into<String>>(self, name: &str, value: S) -> Self {
        self.arg(format!("--{}", name)).arg(value)
    }

    /// Add a path argument
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Run the command to completion. Spawn failures and non-zero exits are
    /// transcription errors carrying the tail of stderr.
    pub async fn execute(&self) -> Result<Output> {
        info!("{}: {} {}", self.description, self.binary_path, self.args.join(" "));

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                SubsweepError::Transcription(format!("Failed to execute {}: {}", self.binary_path, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{} stdout:\n{}", self.binary_path, stdout);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubsweepError::Transcription(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                tail_lines(&stderr, STDERR_TAIL_LINES)
            )));
        }

        Ok(output)
    }
}

/// Last `count` lines of `text`
pub fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

/// Map the configured device to a concrete one; `auto` picks cuda when an NVIDIA
/// driver answers, cpu otherwise.
pub async fn resolve_device(requested: &str) -> String {
    if !requested.eq_ignore_ascii_case("auto") {
        return requested.to_lowercase();
    }

    let has_gpu = Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);

    let device = if has_gpu { "cuda" } else { "cpu" };
    info!("Inference device resolved to {}", device);
    device.to_string()
}

/// Check that a CLI tool can be started
pub async fn check_binary(binary_path: &str) -> Result<()> {
    let output = Command::new(binary_path)
        .arg("--help")
        .output()
        .await
        .map_err(|e| SubsweepError::Unavailable(format!("{} not found: {}", binary_path, e)))?;

    if output.status.success() {
        info!("Transcriber {} is available", binary_path);
        Ok(())
    } else {
        Err(SubsweepError::Unavailable(format!(
            "{} --help failed: {}",
            binary_path,
            tail_lines(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES)
        )))
    }
}

/// Read `<stem>.srt` that a CLI transcriber wrote into `output_dir`
pub async fn read_transcript_output(output_dir: &Path, video_path: &Path) -> Result<Vec<Cue>> {
    let stem = video_path
        .file_stem()
        .ok_or_else(|| SubsweepError::Transcription("Invalid video filename".to_string()))?
        .to_string_lossy();
    let srt_path = output_dir.join(format!("{}.srt", stem));

    if !srt_path.exists() {
        return Err(SubsweepError::Transcription(format!(
            "Expected transcriber output {} not found",
            srt_path.display()
        )));
    }

    let cues = read_srt(&srt_path)
        .await
        .map_err(|e| SubsweepError::Transcription(e.to_string()))?;

    if cues.iter().all(|cue| cue.text.trim().is_empty()) {
        return Err(SubsweepError::Transcription(format!(
            "No speech recognized in {}",
            video_path.display()
        )));
    }

    Ok(cues)
}
