use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::common::{check_binary, read_transcript_output, ToolCommand};
use super::Transcriber;
use crate::config::TranscriberConfig;
use crate::error::{Result, SubsweepError};
use crate::subtitle::Cue;

/// Drives the `whisperx` CLI
pub struct WhisperXTranscriber {
    config: TranscriberConfig,
    language: String,
    device: String,
}

impl WhisperXTranscriber {
    pub fn new(config: TranscriberConfig, language: &str, device: String) -> Self {
        Self {
            config,
            language: language.to_string(),
            device,
        }
    }

    pub fn build_command(&self, video_path: &Path, output_dir: &Path) -> ToolCommand {
        ToolCommand::new(self.config.binary(), "WhisperX transcription")
            .path(video_path)
            .option("model", &self.config.model)
            .option("output_dir", output_dir.to_string_lossy())
            .option("output_format", "srt")
            .option("task", "transcribe")
            .option("language", &self.language)
            .option("batch_size", self.config.batch_size.to_string())
            .option("compute_type", &self.config.compute_type)
            .option("device", &self.device)
    }
}

#[async_trait]
impl Transcriber for WhisperXTranscriber {
    async fn transcribe(&self, video_path: &Path) -> Result<Vec<Cue>> {
        info!("Transcribing {} with WhisperX ({})", video_path.display(), self.config.model);

        let temp_dir = tempfile::Builder::new()
            .prefix("subsweep-whisperx-")
            .tempdir()
            .map_err(|e| SubsweepError::Transcription(format!("Failed to create temp directory: {}", e)))?;

        self.build_command(video_path, temp_dir.path()).execute().await?;
        read_transcript_output(temp_dir.path(), video_path).await
    }

    async fn check_availability(&self) -> Result<()> {
        check_binary(self.config.binary()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_matches_whisperx_cli() {
        let transcriber = WhisperXTranscriber::new(TranscriberConfig::default(), "en", "cuda".to_string());
        let cmd = transcriber.build_command(Path::new("/data/show.mkv"), Path::new("/tmp/out"));

        assert_eq!(cmd.binary_path, "whisperx");
        assert_eq!(
            cmd.args,
            vec![
                "/data/show.mkv", "--model", "large-v3", "--output_dir", "/tmp/out",
                "--output_format", "srt", "--task", "transcribe", "--language", "en",
                "--batch_size", "1", "--compute_type", "float16", "--device", "cuda",
            ]
        );
    }

    #[tokio::test]
    async fn test_unavailable_binary() {
        let config = TranscriberConfig {
            binary_path: Some("subsweep-missing-whisperx".to_string()),
            ..TranscriberConfig::default()
        };
        let transcriber = WhisperXTranscriber::new(config, "en", "cpu".to_string());

        assert!(transcriber.check_availability().await.unwrap_err().is_fatal());
        assert!(!transcriber
            .transcribe(Path::new("/data/show.mkv"))
            .await
            .unwrap_err()
            .is_fatal());
    }
}
