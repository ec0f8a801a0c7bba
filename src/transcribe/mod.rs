// Speech-to-text collaborators
//
// Every back-end is an external CLI that writes an SRT file into a private
// temporary directory; the parsed cues are handed back to the pipeline, which
// owns persisting them beside the video.
//
// - WhisperX: whisperx CLI (default)
// - Whisper: OpenAI whisper CLI

pub mod common;
pub mod whisper;
pub mod whisperx;

use async_trait::async_trait;
use std::path::Path;

pub use common::*;
use crate::config::{TranscriberConfig, TranscriberImplementation};
use crate::error::Result;
use crate::subtitle::Cue;

/// Turns the speech of a video into timed source-language cues
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio track of a video
    async fn transcribe(&self, video_path: &Path) -> Result<Vec<Cue>>;

    /// Check that the back-end can be run at all
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create the configured transcriber for `language`
    pub async fn create_transcriber(config: TranscriberConfig, language: &str) -> Box<dyn Transcriber> {
        let device = resolve_device(&config.device).await;
        match config.implementation {
            TranscriberImplementation::Whisperx => {
                Box::new(whisperx::WhisperXTranscriber::new(config, language, device))
            }
            TranscriberImplementation::Whisper => {
                Box::new(whisper::WhisperTranscriber::new(config, language, device))
            }
        }
    }
}
