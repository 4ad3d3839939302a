// Machine translation.
//
// - Router: plans a direct or pivoted route and reassembles text onto timings
// - Ollama: local LLM backend
// - Libre: LibreTranslate (Argos Translate) backend

pub mod libre;
pub mod ollama;
pub mod router;

use async_trait::async_trait;

pub use router::*;

use crate::config::{TranslateConfig, TranslationBackendKind};
use crate::error::Result;
use crate::subtitle::{frame_texts, unframe_texts, LanguageCode};

/// A machine-translation service.
///
/// Callers must confirm `has_resource` for a pair and call
/// `acquire_resource` before translating; a backend is not expected to fail
/// gracefully on pairs it cannot serve.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> String;

    /// Whether a translation resource exists (installed or installable) for the pair.
    async fn has_resource(&self, from: &LanguageCode, to: &LanguageCode) -> Result<bool>;

    /// Install or download whatever the pair needs.
    async fn acquire_resource(&self, from: &LanguageCode, to: &LanguageCode) -> Result<()>;

    /// Translate one block of text.
    async fn translate_block(&self, text: &str, from: &LanguageCode, to: &LanguageCode) -> Result<String>;

    /// Translate N parts in a single request, returning the parts the service
    /// produced. The router checks the count; implementations just report it.
    async fn translate_batch(
        &self,
        parts: &[String],
        from: &LanguageCode,
        to: &LanguageCode,
    ) -> Result<Vec<String>> {
        let translated = self.translate_block(&frame_texts(parts), from, to).await?;
        Ok(unframe_texts(&translated))
    }
}

/// Factory for creating translation backends
pub struct TranslationBackendFactory;

impl TranslationBackendFactory {
    pub fn create_backend(config: TranslateConfig) -> Result<Box<dyn TranslationBackend>> {
        Ok(match config.backend {
            TranslationBackendKind::Ollama => Box::new(ollama::OllamaBackend::new(config)?),
            TranslationBackendKind::LibreTranslate => Box::new(libre::LibreTranslateBackend::new(config)?),
        })
    }

    pub fn create_router(config: TranslateConfig) -> Result<TranslationRouter> {
        let intermediate = config.intermediate_language()?;
        Ok(TranslationRouter::new(Self::create_backend(config)?, intermediate))
    }
}
