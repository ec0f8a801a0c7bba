use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubsweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Artifact write error: {0}")]
    ArtifactWrite(String),

    #[error("Subtitle format error: {0}")]
    Subtitle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl SubsweepError {
    /// Errors that abort the whole run rather than a single video.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SubsweepError::Discovery(_) | SubsweepError::Config(_) | SubsweepError::Unavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SubsweepError>;
