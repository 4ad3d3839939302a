use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, SubweaveError};
use crate::subtitle::LanguageCode;
use super::TranslationBackend;

/// Entry of `GET /languages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageEntry {
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Absent on older servers, where every installed language is a target
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
struct TranslateRequest<'a, Q: Serialize> {
    q: Q,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct TranslateResponse<T> {
    #[serde(rename = "translatedText")]
    translated_text: T,
}

/// Whether the server's language table offers `from -> to`.
pub fn pair_available(languages: &[LanguageEntry], from: &str, to: &str) -> bool {
    let Some(source) = languages.iter().find(|entry| entry.code == from) else {
        return false;
    };
    match &source.targets {
        Some(targets) => targets.iter().any(|t| t == to),
        None => from != to && languages.iter().any(|entry| entry.code == to),
    }
}

/// LibreTranslate server. Language packages are installed server-side, so
/// availability is whatever `/languages` reports.
pub struct LibreTranslateBackend {
    client: Client,
    config: TranslateConfig,
    languages: OnceCell<Vec<LanguageEntry>>,
}

impl LibreTranslateBackend {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            languages: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn languages(&self) -> Result<&[LanguageEntry]> {
        let languages = self
            .languages
            .get_or_try_init(|| async {
                let response = self.client.get(self.url("languages")).send().await?;
                if !response.status().is_success() {
                    return Err(SubweaveError::Config(format!(
                        "LibreTranslate /languages returned {}",
                        response.status()
                    )));
                }
                let languages: Vec<LanguageEntry> = response.json().await?;
                debug!("LibreTranslate offers {} languages", languages.len());
                Ok::<_, SubweaveError>(languages)
            })
            .await?;
        Ok(languages.as_slice())
    }

    async fn post_translate<Q, T>(&self, q: Q, from: &LanguageCode, to: &LanguageCode) -> Result<T>
    where
        Q: Serialize + Send + Sync,
        T: for<'de> Deserialize<'de>,
    {
        let request = TranslateRequest {
            q,
            source: from.as_str(),
            target: to.as_str(),
            format: "text",
            api_key: self.config.api_key.as_deref(),
        };

        let response = self.client.post(self.url("translate")).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SubweaveError::Config(format!(
                "LibreTranslate error {}: {}",
                status, body
            )));
        }

        let parsed: TranslateResponse<T> = response.json().await?;
        Ok(parsed.translated_text)
    }
}

#[async_trait]
impl TranslationBackend for LibreTranslateBackend {
    fn name(&self) -> String {
        "libretranslate".to_string()
    }

    async fn has_resource(&self, from: &LanguageCode, to: &LanguageCode) -> Result<bool> {
        Ok(pair_available(self.languages().await?, from.as_str(), to.as_str()))
    }

    async fn acquire_resource(&self, from: &LanguageCode, to: &LanguageCode) -> Result<()> {
        debug!("LibreTranslate manages packages server-side ({} -> {})", from, to);
        Ok(())
    }

    async fn translate_block(&self, text: &str, from: &LanguageCode, to: &LanguageCode) -> Result<String> {
        self.post_translate(text, from, to).await
    }

    /// The server accepts an array for `q` and answers with one string per
    /// entry, so no framing is needed.
    async fn translate_batch(
        &self,
        parts: &[String],
        from: &LanguageCode,
        to: &LanguageCode,
    ) -> Result<Vec<String>> {
        let translated: Vec<String> = self.post_translate(parts, from, to).await?;
        Ok(translated.into_iter().map(|t| t.trim().to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANGUAGES: &str = r#"[
        {"code": "en", "name": "English", "targets": ["en", "fr", "ja"]},
        {"code": "ja", "name": "Japanese", "targets": ["en", "ja"]},
        {"code": "fr", "name": "French", "targets": ["en", "fr"]}
    ]"#;

    #[test]
    fn direct_pairs_come_from_targets() {
        let languages: Vec<LanguageEntry> = serde_json::from_str(LANGUAGES).unwrap();
        assert!(pair_available(&languages, "ja", "en"));
        assert!(pair_available(&languages, "en", "fr"));
        assert!(!pair_available(&languages, "ja", "fr"));
        assert!(!pair_available(&languages, "de", "en"));
    }

    #[test]
    fn servers_without_targets_pair_everything() {
        let languages: Vec<LanguageEntry> =
            serde_json::from_str(r#"[{"code": "en", "name": "English"}, {"code": "es", "name": "Spanish"}]"#).unwrap();
        assert!(pair_available(&languages, "es", "en"));
        assert!(!pair_available(&languages, "es", "fr"));
    }

    #[test]
    fn request_omits_missing_api_key() {
        let request = TranslateRequest {
            q: ["Hello", "World"],
            source: "en",
            target: "fr",
            format: "text",
            api_key: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["q"][1], "World");
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn batch_response_parses() {
        let parsed: TranslateResponse<Vec<String>> =
            serde_json::from_str(r#"{"translatedText": ["Bonjour", "Monde"]}"#).unwrap();
        assert_eq!(parsed.translated_text, vec!["Bonjour", "Monde"]);
    }
}
