use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, SubsweepError};

/// Extension shared by every subtitle artifact
pub const SUBTITLE_EXTENSION: &str = "srt";

static TIMING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("timing regex is valid")
});

/// One timed subtitle line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    pub fn new<S: Into<String>>(start_ms: u64, end_ms: u64, text: S) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Same timing, different text
    pub fn with_text<S: Into<String>>(&self, text: S) -> Self {
        Self::new(self.start_ms, self.end_ms, text)
    }
}

/// Format milliseconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Render cues as SRT text, numbering from 1
pub fn format_srt(cues: &[Cue]) -> String {
    let mut content = String::new();

    for (index, cue) in cues.iter().enumerate() {
        // A blank line inside a cue would end the block early
        let text = cue
            .text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_timestamp(cue.start_ms),
            format_timestamp(cue.end_ms),
            text
        ));
    }

    content
}

/// Parse SRT text into cues. Blank input yields no cues; non-blank input without a
/// single timing line is an error.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines().chain(std::iter::once("")) {
        let line = line.trim_end();
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }

        match parse_block(&block) {
            Some(cue) => cues.push(cue),
            None => debug!("Skipping subtitle block without timing: {:?}", block.first()),
        }
        block.clear();
    }

    if cues.is_empty() && !content.trim().is_empty() {
        return Err(SubsweepError::Subtitle(
            "No valid subtitle entries found".to_string(),
        ));
    }

    Ok(cues)
}

fn parse_block(block: &[&str]) -> Option<Cue> {
    let timing_index = block
        .iter()
        .take(2)
        .position(|line| TIMING_LINE.is_match(line.trim()))?;
    let caps = TIMING_LINE.captures(block[timing_index].trim())?;

    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let start_ms = to_millis(field(1)?, field(2)?, field(3)?, field(4)?)?;
    let end_ms = to_millis(field(5)?, field(6)?, field(7)?, field(8)?)?;

    let text = block[timing_index + 1..]
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n");

    Some(Cue::new(start_ms, end_ms, text))
}

/// `None` when the timestamp does not fit in a `u64` of milliseconds
fn to_millis(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

/// Read and parse a subtitle file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        SubsweepError::Subtitle(format!("Failed to read {}: {}", path.display(), e))
    })?;

    parse_srt(&content)
        .map_err(|e| SubsweepError::Subtitle(format!("{}: {}", path.display(), e)))
}

/// Write cues to `path` so that the final path either holds the complete file or is
/// untouched. The content goes to a hidden temporary file in the same directory,
/// is synced, and is then renamed over the destination.
pub fn write_srt_atomic<P: AsRef<Path>>(path: P, cues: &[Cue]) -> Result<()> {
    let path = path.as_ref();
    if cues.is_empty() {
        return Err(SubsweepError::ArtifactWrite(format!(
            "Refusing to write empty subtitle file {}",
            path.display()
        )));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| SubsweepError::ArtifactWrite(format!("Invalid path {}", path.display())))?
        .to_string_lossy();

    let write_error =
        |e: std::io::Error| SubsweepError::ArtifactWrite(format!("{}: {}", path.display(), e));

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;

    temp.write_all(format_srt(cues).as_bytes()).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;

    info!("Wrote {} cues to {}", cues.len(), path.display());
    Ok(())
}
