use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SubsweepError};
use crate::report::ExitPolicy;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "subsweep.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mounted directory scanned recursively for videos
    pub root_path: PathBuf,
    /// Language tag of the transcribed subtitles
    pub source_language: String,
    /// Language tag of the translated subtitles
    pub target_language: String,
    /// Video container extensions to pick up (case-insensitive)
    pub video_extensions: Vec<String>,
    /// When the process exits non-zero after a batch
    pub exit_policy: ExitPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Which speech-to-text CLI to drive
    pub implementation: TranscriberImplementation,
    /// Path to the transcriber binary; defaults to the implementation's CLI name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
    /// Model name passed to the transcriber
    pub model: String,
    /// Inference device: auto, cuda or cpu
    pub device: String,
    /// Numeric precision used by whisperx
    pub compute_type: String,
    /// Batch size used by whisperx
    pub batch_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriberImplementation {
    /// WhisperX CLI with aligned timestamps
    Whisperx,
    /// OpenAI Whisper Python CLI
    Whisper,
}

impl TranscriberImplementation {
    /// Executable name looked up on `PATH` when no binary is configured
    pub fn default_binary(&self) -> &'static str {
        match self {
            TranscriberImplementation::Whisperx => "whisperx",
            TranscriberImplementation::Whisper => "whisper",
        }
    }
}

impl TranscriberConfig {
    /// Binary to run: the configured path, or the implementation's own CLI
    pub fn binary(&self) -> &str {
        self.binary_path
            .as_deref()
            .unwrap_or_else(|| self.implementation.default_binary())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// How cues are grouped into requests
    pub mode: TranslationMode,
    /// Cues per request in batch mode
    pub batch_size: usize,
    /// Maximum retries for a failed request
    pub max_retries: u32,
    /// HTTP timeout per request in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationMode {
    /// Send one request per cue
    Simple,
    /// Send cues in batches and fall back to single cues on count mismatch
    Batch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the daily rotated log file
    pub log_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("/data"),
            source_language: "en".to_string(),
            target_language: "nl".to_string(),
            video_extensions: vec!["mkv".to_string(), "mp4".to_string()],
            exit_policy: ExitPolicy::AnyFailure,
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            implementation: TranscriberImplementation::Whisperx,
            binary_path: None,
            model: "large-v3".to_string(),
            device: "auto".to_string(),
            compute_type: "float16".to_string(),
            batch_size: 1,
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            mode: TranslationMode::Batch,
            batch_size: 32,
            max_retries: 3,
            timeout_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(".subsweep").join("log"),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubsweepError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SubsweepError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Load `path` if given, else `subsweep.toml` from the working directory, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubsweepError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubsweepError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply command line / environment overrides on top of the file values
    pub fn apply_overrides(
        &mut self,
        root_path: Option<PathBuf>,
        target_language: Option<String>,
        exit_policy: Option<ExitPolicy>,
    ) {
        if let Some(root) = root_path {
            self.pipeline.root_path = root;
        }
        if let Some(lang) = target_language {
            self.pipeline.target_language = lang;
        }
        if let Some(policy) = exit_policy {
            self.pipeline.exit_policy = policy;
        }
    }

    /// Normalize language tags and reject settings the pipeline cannot run with
    pub fn validate(&mut self) -> Result<()> {
        let pipeline = &mut self.pipeline;
        pipeline.source_language = pipeline.source_language.trim().to_lowercase();
        pipeline.target_language = pipeline.target_language.trim().to_lowercase();

        for lang in [&pipeline.source_language, &pipeline.target_language] {
            if !is_language_tag(lang) {
                return Err(SubsweepError::Config(format!(
                    "Invalid language code '{}': expected a 2 or 3 letter code",
                    lang
                )));
            }
        }

        if pipeline.source_language == pipeline.target_language {
            return Err(SubsweepError::Config(format!(
                "Target language '{}' equals the source language",
                pipeline.target_language
            )));
        }

        pipeline.video_extensions = pipeline
            .video_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if pipeline.video_extensions.is_empty() {
            return Err(SubsweepError::Config("No video extensions configured".to_string()));
        }

        if self.translate.batch_size == 0 {
            return Err(SubsweepError::Config("translate.batch_size must be at least 1".to_string()));
        }

        Ok(())
    }
}

fn is_language_tag(tag: &str) -> bool {
    (2..=3).contains(&tag.len()) && tag.chars().all(|c| c.is_ascii_lowercase())
}
