use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, SubweaveError};
use crate::subtitle::LanguageCode;

fn default_intermediate_language() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(".subweave/models")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory for every artifact; defaults to the input video's directory
    pub output_dir: Option<PathBuf>,
    /// Skip language detection and treat the audio as this language
    pub source_language: Option<String>,
    /// Translate subtitles to this language
    pub target_language: Option<String>,
    /// Render subtitles into the video frames instead of adding a soft track.
    /// Defaults to a soft track.
    #[serde(default)]
    pub burn_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Which speech-to-text tool to drive
    pub implementation: TranscriberImplementation,
    /// Path to transcriber binary (e.g., whisper-cli)
    pub binary_path: String,
    /// Model name (e.g. "base") or path to a model file
    pub model: String,
    /// Compute precision
    pub precision: Precision,
    /// Where downloaded whisper.cpp models are kept
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    /// Seconds before a transcription run is abandoned
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriberImplementation {
    /// whisper.cpp `whisper-cli`
    WhisperCpp,
    /// OpenAI's Python `whisper` command
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float16,
    Float32,
    Int8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translation service
    pub backend: TranslationBackendKind,
    /// Service endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation (ollama)
    pub model: String,
    /// API key, if the service requires one
    pub api_key: Option<String>,
    /// Pivot language used when a pair has no direct resource
    #[serde(default = "default_intermediate_language")]
    pub intermediate_language: String,
    /// Language codes the LLM backend is allowed to translate between
    pub supported_languages: String,
    /// Seconds before a translation request is abandoned
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationBackendKind {
    /// Local LLM through the Ollama HTTP API
    Ollama,
    /// LibreTranslate (Argos Translate) server
    LibreTranslate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Additional encoding options for burned-in subtitles
    /// Common options: ["-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p"]
    pub subtitle_options: Vec<String>,
    /// Seconds before an ffmpeg run is abandoned
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            implementation: TranscriberImplementation::WhisperCpp,
            binary_path: "whisper-cli".to_string(),
            model: "base".to_string(),
            precision: Precision::Float16,
            models_dir: default_models_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            backend: TranslationBackendKind::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            intermediate_language: default_intermediate_language(),
            supported_languages: "en,ja,ko,zh,fr,de,es,ru,it,pt,pl,nl,tr,ar,hi,th,vi,sv,da,no,fi,he,hu,cs,uk".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            subtitle_options: vec![],
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubweaveError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SubweaveError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubweaveError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubweaveError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

impl PipelineConfig {
    pub fn source_language(&self) -> Result<Option<LanguageCode>> {
        self.source_language.as_deref().map(LanguageCode::new).transpose()
    }

    pub fn target_language(&self) -> Result<Option<LanguageCode>> {
        self.target_language.as_deref().map(LanguageCode::new).transpose()
    }
}

impl TranslateConfig {
    pub fn intermediate_language(&self) -> Result<LanguageCode> {
        LanguageCode::new(self.intermediate_language.as_str())
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.supported_languages
            .split(',')
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect()
    }
}
