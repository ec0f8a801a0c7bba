use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TranslateConfig;
use crate::error::{Result, SubsweepError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTranslationResult {
    pub translations: Vec<String>,
}

/// Ollama client shared by the translation modes
pub struct BaseTranslator {
    pub client: Client,
    pub config: TranslateConfig,
    pub source_language: String,
}

impl BaseTranslator {
    pub fn new(config: TranslateConfig, source_language: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            source_language: source_language.to_string(),
        })
    }

    /// Send one prompt to Ollama and return the raw model response
    pub async fn generate(&self, prompt: String) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SubsweepError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubsweepError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SubsweepError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw = generated.response.trim().to_string();
        debug!("Raw Ollama response: {}", raw);

        if raw.is_empty() {
            return Err(SubsweepError::Translation("Empty translation received".to_string()));
        }
        Ok(raw)
    }

    /// `generate` with up to `max_retries` additional attempts
    pub async fn generate_with_retries(&self, prompt: String) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.generate(prompt.clone()).await {
                Ok(raw) => return Ok(raw),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!("Translation request failed (attempt {}/{}): {}", attempt, self.config.max_retries, e);
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Translate a single text
    pub async fn translate_text(&self, text: &str, target_language: &str) -> Result<String> {
        let prompt = build_translation_prompt(text, &self.source_language, target_language);
        let raw = self.generate_with_retries(prompt).await?;
        Ok(parse_single_response(&raw))
    }

    /// Translate several texts in one request. `None` means the model did not
    /// return exactly one translation per input.
    pub async fn translate_texts(
        &self,
        texts: &[&str],
        target_language: &str,
    ) -> Result<Option<Vec<String>>> {
        let prompt = build_batch_prompt(texts, &self.source_language, target_language);
        let raw = self.generate_with_retries(prompt).await?;
        Ok(parse_batch_response(&raw, texts.len()))
    }

    /// Check that Ollama answers and knows the configured model
    pub async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": self.config.model }))
            .send()
            .await
            .map_err(|e| SubsweepError::Unavailable(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.config.model);
            Ok(())
        } else {
            Err(SubsweepError::Unavailable(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.config.model, self.config.model
            )))
        }
    }
}

/// Prompt asking for one translation as `{"text": ...}`
pub fn build_translation_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    let source_name = language_code_to_name(source_language);
    let target_name = language_code_to_name(target_language);

    format!(
        "You are a professional subtitle translator.\n\
         \n\
         Translate the subtitle line from {} to {} (language code: {}).\n\
         Keep it short enough to read on screen and keep line breaks.\n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         [Subtitle line]\n\
         {}\n",
        source_name, target_name, target_language, target_name, text
    )
}

/// Prompt asking for a JSON array with exactly one translation per line
pub fn build_batch_prompt(texts: &[&str], source_language: &str, target_language: &str) -> String {
    let source_name = language_code_to_name(source_language);
    let target_name = language_code_to_name(target_language);
    let lines = serde_json::to_string_pretty(texts).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are a professional subtitle translator.\n\
         \n\
         Translate each of the {} subtitle lines below from {} to {} (language code: {}).\n\
         Translate every line separately, in order. Never merge or split lines.\n\
         Return ONLY JSON in the form {{\"translations\":[\"...\", \"...\"]}} with exactly {} entries.\n\
         \n\
         [Subtitle lines]\n\
         {}\n",
        texts.len(),
        source_name,
        target_name,
        target_language,
        texts.len(),
        lines
    )
}

/// Extract the translation from a single-line response
pub fn parse_single_response(raw: &str) -> String {
    if let Ok(result) = serde_json::from_str::<TranslationResult>(raw) {
        return result.text.trim().to_string();
    }
    clean_translation_response(raw)
}

/// Extract a batch of translations, rejecting anything but exactly `expected` entries
pub fn parse_batch_response(raw: &str, expected: usize) -> Option<Vec<String>> {
    let translations = serde_json::from_str::<BatchTranslationResult>(raw)
        .map(|result| result.translations)
        .or_else(|_| serde_json::from_str::<Vec<String>>(raw))
        .ok()?;

    if translations.len() != expected {
        warn!(
            "Batch translation returned {} lines for {} inputs",
            translations.len(),
            expected
        );
        return None;
    }

    Some(translations.into_iter().map(|t| t.trim().to_string()).collect())
}

/// Drop chatter that models put around a free-form translation
pub fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();

    for &line in &lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("Here is")
            || trimmed.starts_with("Here are")
            || trimmed.starts_with("Translation:")
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ")
        {
            continue;
        }
        if trimmed.starts_with("**") && trimmed.ends_with("**") {
            continue;
        }
        return trimmed.trim_matches('"').to_string();
    }

    response.trim().to_string()
}

/// Full language name for prompts; unknown codes are passed through
pub fn language_code_to_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "nl" => "Dutch",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "cs" => "Czech",
        "hu" => "Hungarian",
        "ro" => "Romanian",
        "el" => "Greek",
        "tr" => "Turkish",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "hi" => "Hindi",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        _ => return code.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> TranslateConfig {
        TranslateConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            timeout_secs: 5,
            ..TranslateConfig::default()
        }
    }

    #[test]
    fn test_prompts_name_languages() {
        let prompt = build_translation_prompt("Good morning", "en", "nl");
        assert!(prompt.contains("from English to Dutch"));
        assert!(prompt.contains("Good morning"));

        let batch = build_batch_prompt(&["One", "Two"], "en", "de");
        assert!(batch.contains("exactly 2 entries"));
        assert!(batch.contains("\"One\""));
        assert!(batch.contains("German"));
    }

    #[test]
    fn test_parse_single_response() {
        assert_eq!(parse_single_response(r#"{"text":" Goedemorgen "}"#), "Goedemorgen");
        assert_eq!(parse_single_response("Here is the translation:\n\"Goedemorgen\""), "Goedemorgen");
    }

    #[test]
    fn test_parse_batch_response() {
        assert_eq!(
            parse_batch_response(r#"{"translations":["Een","Twee"]}"#, 2),
            Some(vec!["Een".to_string(), "Twee".to_string()])
        );
        assert_eq!(
            parse_batch_response(r#"["Een","Twee"]"#, 2),
            Some(vec!["Een".to_string(), "Twee".to_string()])
        );
        assert_eq!(parse_batch_response(r#"{"translations":["Een Twee"]}"#, 2), None);
        assert_eq!(parse_batch_response("not json", 1), None);
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_code_to_name("NL"), "Dutch");
        assert_eq!(language_code_to_name("xx"), "xx");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let base = BaseTranslator::new(unreachable_config(), "en").unwrap();

        let err = base.translate_text("Hello", "nl").await.unwrap_err();
        assert!(matches!(err, SubsweepError::Translation(_)));

        let err = base.check_availability().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
