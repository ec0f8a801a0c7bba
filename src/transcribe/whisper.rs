// OpenAI Whisper Python CLI

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::common::{check_binary, read_transcript_output, ToolCommand};
use super::Transcriber;
use crate::config::TranscriberConfig;
use crate::error::{Result, SubsweepError};
use crate::subtitle::Cue;

pub struct WhisperTranscriber {
    config: TranscriberConfig,
    language: String,
    device: String,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriberConfig, language: &str, device: String) -> Self {
        Self {
            config,
            language: language.to_string(),
            device,
        }
    }

    pub fn build_command(&self, video_path: &Path, output_dir: &Path) -> ToolCommand {
        // whisper has no compute_type; half precision is a boolean switch
        let fp16 = if self.config.compute_type.eq_ignore_ascii_case("float16") && self.device != "cpu" {
            "True"
        } else {
            "False"
        };

        ToolCommand::new(self.config.binary(), "Whisper transcription")
            .path(video_path)
            .option("model", &self.config.model)
            .option("output_dir", output_dir.to_string_lossy())
            .option("output_format", "srt")
            .option("task", "transcribe")
            .option("language", &self.language)
            .option("device", &self.device)
            .option("fp16", fp16)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, video_path: &Path) -> Result<Vec<Cue>> {
        info!("Transcribing {} with Whisper ({})", video_path.display(), self.config.model);

        let temp_dir = tempfile::Builder::new()
            .prefix("subsweep-whisper-")
            .tempdir()
            .map_err(|e| SubsweepError::Transcription(format!("Failed to create temp directory: {}", e)))?;

        self.build_command(video_path, temp_dir.path()).execute().await?;
        read_transcript_output(temp_dir.path(), video_path).await
    }

    async fn check_availability(&self) -> Result<()> {
        check_binary(self.config.binary()).await
    }
}
