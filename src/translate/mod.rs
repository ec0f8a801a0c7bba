// Subtitle translation collaborators, backed by a local Ollama model
//
// - Simple: one request per cue
// - Batch: several cues per request with per-cue fallback

pub mod batch;
pub mod common;
pub mod simple;

use async_trait::async_trait;

pub use common::*;
use crate::config::{TranslateConfig, TranslationMode};
use crate::error::Result;
use crate::subtitle::Cue;

/// Translates cue text while keeping cue count and timing unchanged
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate every cue into `target_language`
    async fn translate(&self, cues: &[Cue], target_language: &str) -> Result<Vec<Cue>>;

    /// Check that the model can be reached
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create a translator for the configured mode
    pub fn create_translator(config: TranslateConfig, source_language: &str) -> Result<Box<dyn Translator>> {
        Ok(match config.mode {
            TranslationMode::Simple => Box::new(simple::SimpleTranslator::new(config, source_language)?),
            TranslationMode::Batch => Box::new(batch::BatchTranslator::new(config, source_language)?),
        })
    }
}
