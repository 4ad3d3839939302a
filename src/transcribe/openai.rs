use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::command::ToolCommand;
use crate::config::{Precision, TranscriberConfig};
use crate::error::{Result, SubweaveError};
use crate::subtitle::LanguageCode;
use super::{detected_language, Transcriber, Transcript, TranscriptSegment};

/// OpenAI Whisper `--output_format json` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperOutput {
    pub text: String,
    pub segments: Vec<OpenAIWhisperSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperSegment {
    pub id: u64,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TryFrom<OpenAIWhisperOutput> for Transcript {
    type Error = SubweaveError;

    fn try_from(output: OpenAIWhisperOutput) -> Result<Self> {
        Ok(Transcript {
            language: detected_language(output.language.as_deref())?,
            segments: output
                .segments
                .into_iter()
                .map(|seg| TranscriptSegment {
                    start: seg.start,
                    end: seg.end,
                    text: seg.text.trim().to_string(),
                })
                .collect(),
        })
    }
}

/// Drives the Python `whisper` command
pub struct OpenAITranscriber {
    config: TranscriberConfig,
}

impl OpenAITranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, audio_path: &Path, output_dir: &Path, language: Option<&LanguageCode>) -> ToolCommand {
        let fp16 = match self.config.precision {
            Precision::Float16 => "True",
            Precision::Float32 => "False",
            Precision::Int8 => {
                warn!("openai-whisper has no int8 mode, running in float32");
                "False"
            }
        };

        let mut cmd = ToolCommand::new(&self.config.binary_path, "OpenAI Whisper transcription")
            .timeout_secs(self.config.timeout_secs)
            .path_arg(audio_path)
            .opt("--model", self.config.model.as_str())
            .arg("--output_dir")
            .path_arg(output_dir)
            .opt("--output_format", "json")
            .opt("--fp16", fp16);

        if let Some(lang) = language {
            cmd = cmd.opt("--language", lang.as_str());
        }
        cmd
    }
}

#[async_trait]
impl Transcriber for OpenAITranscriber {
    async fn transcribe(&self, audio_path: &Path, language: Option<LanguageCode>) -> Result<Transcript> {
        info!("Transcribing {} with OpenAI Whisper model {}", audio_path.display(), self.config.model);

        let temp_dir = tempfile::tempdir()?;
        self.build_command(audio_path, temp_dir.path(), language.as_ref())
            .execute(SubweaveError::TranscriptionFailed)
            .await?;

        let audio_filename = audio_path
            .file_stem()
            .ok_or_else(|| SubweaveError::TranscriptionFailed("Invalid audio filename".to_string()))?;
        let json_file = temp_dir
            .path()
            .join(format!("{}.json", audio_filename.to_string_lossy()));

        let json_content = fs::read_to_string(&json_file).await.map_err(|e| {
            SubweaveError::TranscriptionFailed(format!("Failed to read whisper output: {}", e))
        })?;
        let output: OpenAIWhisperOutput = serde_json::from_str(&json_content).map_err(|e| {
            SubweaveError::TranscriptionFailed(format!("Failed to parse OpenAI Whisper JSON: {}", e))
        })?;

        let mut transcript = Transcript::try_from(output)?;
        if let Some(language) = language {
            transcript.language = language;
        }
        Ok(transcript)
    }

    fn model_id(&self) -> String {
        format!("openai-whisper:{}", self.config.model)
    }
}
