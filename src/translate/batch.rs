use async_trait::async_trait;
use tracing::{info, warn};

use super::{common::BaseTranslator, Translator};
use crate::config::TranslateConfig;
use crate::error::Result;
use crate::subtitle::Cue;

/// Batched translation: up to `batch_size` cues per request, falling back to one
/// request per cue whenever the model does not answer line for line.
pub struct BatchTranslator {
    base: BaseTranslator,
}

impl BatchTranslator {
    pub fn new(config: TranslateConfig, source_language: &str) -> Result<Self> {
        Ok(Self {
            base: BaseTranslator::new(config, source_language)?,
        })
    }

    async fn translate_chunk(&self, chunk: &[Cue], target_language: &str) -> Result<Vec<Cue>> {
        let texts: Vec<&str> = chunk
            .iter()
            .map(|cue| cue.text.as_str())
            .filter(|text| !text.trim().is_empty())
            .collect();

        if texts.is_empty() {
            return Ok(chunk.to_vec());
        }

        let translations = match self.base.translate_texts(&texts, target_language).await? {
            Some(translations) => translations,
            None => {
                warn!("Falling back to per-cue translation for {} cues", texts.len());
                let mut translations = Vec::with_capacity(texts.len());
                for text in &texts {
                    translations.push(self.base.translate_text(text, target_language).await?);
                }
                translations
            }
        };

        Ok(merge_translations(chunk, translations))
    }
}

/// Put translations back onto the non-blank cues of `chunk`, in order
fn merge_translations(chunk: &[Cue], translations: Vec<String>) -> Vec<Cue> {
    let mut translations = translations.into_iter();
    chunk
        .iter()
        .map(|cue| {
            if cue.text.trim().is_empty() {
                cue.clone()
            } else {
                cue.with_text(translations.next().unwrap_or_else(|| cue.text.clone()))
            }
        })
        .collect()
}

#[async_trait]
impl Translator for BatchTranslator {
    async fn translate(&self, cues: &[Cue], target_language: &str) -> Result<Vec<Cue>> {
        let batch_size = self.base.config.batch_size.max(1);
        let total_batches = cues.len().div_ceil(batch_size);
        info!(
            "Translating {} cues to {} in {} batches",
            cues.len(),
            target_language,
            total_batches
        );

        let mut translated = Vec::with_capacity(cues.len());
        for (idx, chunk) in cues.chunks(batch_size).enumerate() {
            info!("Translation batch {} of {}", idx + 1, total_batches);
            translated.extend(self.translate_chunk(chunk, target_language).await?);
        }

        Ok(translated)
    }

    async fn check_availability(&self) -> Result<()> {
        self.base.check_availability().await
    }
}
