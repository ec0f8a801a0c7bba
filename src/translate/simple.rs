use async_trait::async_trait;
use tracing::{debug, info};

use super::{common::BaseTranslator, Translator};
use crate::config::TranslateConfig;
use crate::error::Result;
use crate::subtitle::Cue;

/// Simple translation: one request per cue
pub struct SimpleTranslator {
    base: BaseTranslator,
}

impl SimpleTranslator {
    pub fn new(config: TranslateConfig, source_language: &str) -> Result<Self> {
        Ok(Self {
            base: BaseTranslator::new(config, source_language)?,
        })
    }
}

#[async_trait]
impl Translator for SimpleTranslator {
    async fn translate(&self, cues: &[Cue], target_language: &str) -> Result<Vec<Cue>> {
        info!("Starting simple translation of {} cues to {}", cues.len(), target_language);

        let mut translated = Vec::with_capacity(cues.len());
        for (idx, cue) in cues.iter().enumerate() {
            if cue.text.trim().is_empty() {
                translated.push(cue.clone());
                continue;
            }

            let text = self.base.translate_text(&cue.text, target_language).await?;
            debug!("Cue {}/{}: {} => {}", idx + 1, cues.len(), cue.text, text);
            translated.push(cue.with_text(text));
        }

        Ok(translated)
    }

    async fn check_availability(&self) -> Result<()> {
        self.base.check_availability().await
    }
}
