// Speech-to-text collaborators.
//
// - WhisperCpp: whisper.cpp `whisper-cli`
// - OpenAI: OpenAI's Python `whisper` command
//
// Each implementation parses its tool's JSON into a `Transcript`; nothing
// here caches results, the pipeline owns idempotency.

pub mod openai;
pub mod whisper_cpp;

use async_trait::async_trait;
use std::path::Path;

use crate::config::{TranscriberConfig, TranscriberImplementation};
use crate::error::Result;
use crate::models::ModelStore;
use crate::subtitle::{LanguageCode, SubtitleDocument, TimedSegment};

/// One timed piece of recognised speech.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Fully materialised transcription result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub language: LanguageCode,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Source-language subtitle document for this transcript.
    pub fn into_document(self) -> Result<SubtitleDocument> {
        let segments = self
            .segments
            .into_iter()
            .map(|seg| TimedSegment::new(seg.start, seg.end, seg.text))
            .collect::<Result<Vec<_>>>()?;
        SubtitleDocument::new(self.language, segments)
    }
}

/// Speech-to-text collaborator. `transcribe` blocks until the whole file is
/// processed and returns every segment at once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file. `language` skips detection when given.
    async fn transcribe(&self, audio_path: &Path, language: Option<LanguageCode>) -> Result<Transcript>;

    /// Model identifier, recorded alongside cached transcripts
    fn model_id(&self) -> String;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(config: TranscriberConfig) -> Result<Box<dyn Transcriber>> {
        Ok(match config.implementation {
            TranscriberImplementation::WhisperCpp => {
                let models = ModelStore::new(&config.models_dir)?;
                Box::new(whisper_cpp::WhisperCppTranscriber::new(config, models))
            }
            TranscriberImplementation::Openai => Box::new(openai::OpenAITranscriber::new(config)),
        })
    }
}

/// Whisper reports bare language names in some builds; map them to codes.
pub(crate) fn detected_language(raw: Option<&str>) -> Result<LanguageCode> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("und");
    let code = match raw.to_lowercase().as_str() {
        "english" => "en",
        "japanese" => "ja",
        "korean" => "ko",
        "chinese" => "zh",
        "french" => "fr",
        "german" => "de",
        "spanish" => "es",
        "russian" => "ru",
        "italian" => "it",
        "portuguese" => "pt",
        "dutch" => "nl",
        "polish" => "pl",
        "turkish" => "tr",
        "arabic" => "ar",
        "hindi" => "hi",
        _ => raw,
    };
    LanguageCode::new(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_becomes_numbered_document() {
        let transcript = Transcript {
            language: LanguageCode::new("en").unwrap(),
            segments: vec![
                TranscriptSegment { start: 0.0, end: 1.5, text: " Hello ".into() },
                TranscriptSegment { start: 1.5, end: 3.0, text: "World".into() },
            ],
        };
        let document = transcript.into_document().unwrap();
        assert_eq!(document.language().as_str(), "en");
        assert_eq!(document.texts(), vec!["Hello", "World"]);
        assert_eq!(document.segments()[1].index(), 2);
    }

    #[test]
    fn maps_language_names() {
        assert_eq!(detected_language(Some("Japanese")).unwrap().as_str(), "ja");
        assert_eq!(detected_language(Some("fr")).unwrap().as_str(), "fr");
        assert_eq!(detected_language(None).unwrap().as_str(), "und");
    }
}
