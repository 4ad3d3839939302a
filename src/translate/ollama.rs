use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{Result, SubweaveError};
use crate::subtitle::LanguageCode;
use super::TranslationBackend;

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

/// Translation through a local LLM served by Ollama.
///
/// Any pair of configured languages is considered available; the only
/// resource to acquire is the model itself.
pub struct OllamaBackend {
    client: Client,
    config: TranslateConfig,
    languages: Vec<String>,
}

impl OllamaBackend {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let languages = config.supported_languages();

        Ok(Self {
            client,
            config,
            languages,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn model_installed(&self) -> Result<bool> {
        let response = self
            .client
            .post(self.url("api/show"))
            .json(&serde_json::json!({ "name": self.config.model }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SubweaveError::Config(format!("Ollama API error {}: {}", status, body)))
            }
        }
    }

    fn build_prompt(&self, text: &str, from: &LanguageCode, to: &LanguageCode) -> String {
        let source = language_code_to_name(from.as_str());
        let target = language_code_to_name(to.as_str());

        format!(
            "You are a professional subtitle translator.\n\
             \n\
             Translate the subtitle blocks below from {source} to {target} ONLY.\n\
             Each block starts with its number on its own line and blocks are separated by one blank line.\n\
             Keep every block number and the same number of blocks. Never merge or split blocks.\n\
             \n\
             Return ONLY JSON as {{\"text\":\"the translated blocks\"}}.\n\
             Do not include explanations, alternatives, or text in other languages.\n\
             \n\
             [Blocks to translate]\n\
             {text}"
        )
    }
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    fn name(&self) -> String {
        format!("ollama:{}", self.config.model)
    }

    async fn has_resource(&self, from: &LanguageCode, to: &LanguageCode) -> Result<bool> {
        let supported = |code: &LanguageCode| self.languages.iter().any(|l| l == code.as_str());
        Ok(supported(from) && supported(to))
    }

    async fn acquire_resource(&self, _from: &LanguageCode, _to: &LanguageCode) -> Result<()> {
        if self.model_installed().await? {
            debug!("Ollama model {} already present", self.config.model);
            return Ok(());
        }

        info!("Pulling Ollama model {}", self.config.model);
        let response = self
            .client
            .post(self.url("api/pull"))
            .json(&serde_json::json!({ "name": self.config.model, "stream": false }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SubweaveError::Config(format!(
                "Failed to pull model {}: {} {}",
                self.config.model, status, body
            )));
        }
        Ok(())
    }

    async fn translate_block(&self, text: &str, from: &LanguageCode, to: &LanguageCode) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: self.build_prompt(text, from, to),
            stream: false,
            format: "json".to_string(),
        };

        let url = self.url("api/generate");
        debug!("Sending translation request to: {}", url);

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubweaveError::Config(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response.json().await?;
        parse_generated(&generated.response)
    }
}

/// Extract the translated blocks from a model reply. Models are asked for
/// `{"text": ...}` but sometimes answer with bare or fenced text.
pub fn parse_generated(raw: &str) -> Result<String> {
    let raw = raw.trim();
    debug!("Raw Ollama response: {}", raw);

    if raw.is_empty() {
        return Err(SubweaveError::Config("Empty translation received".to_string()));
    }

    if let Ok(result) = serde_json::from_str::<TranslationResult>(raw) {
        return Ok(result.text.trim().to_string());
    }

    Ok(clean_response(raw))
}

fn clean_response(response: &str) -> String {
    response
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !(trimmed.starts_with("```")
                || trimmed.starts_with("Translation:")
                || trimmed.starts_with("Here is")
                || trimmed.starts_with("Here are"))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "ru" => "Russian",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "nl" => "Dutch",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "he" => "Hebrew",
        "hu" => "Hungarian",
        "cs" => "Czech",
        "uk" => "Ukrainian",
        "sk" => "Slovak",
        "bg" => "Bulgarian",
        "hr" => "Croatian",
        "ca" => "Catalan",
        "el" => "Greek",
        "id" => "Indonesian",
        _ => code,
    }
    .to_string()
}
