use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::command::ToolCommand;
use crate::config::TranscriberConfig;
use crate::error::{Result, SubweaveError};
use crate::models::ModelStore;
use crate::subtitle::LanguageCode;
use super::{detected_language, Transcriber, Transcript, TranscriptSegment};

/// whisper.cpp `-oj` JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub result: WhisperCppResult,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Segment bounds in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

impl TryFrom<WhisperCppOutput> for Transcript {
    type Error = SubweaveError;

    fn try_from(output: WhisperCppOutput) -> Result<Self> {
        let language = detected_language(output.result.language.as_deref())?;
        let segments = output
            .transcription
            .into_iter()
            .map(|seg| TranscriptSegment {
                start: seg.offsets.from.max(0) as f64 / 1000.0,
                end: seg.offsets.to.max(0) as f64 / 1000.0,
                text: seg.text.trim().to_string(),
            })
            .collect();
        Ok(Transcript { language, segments })
    }
}

/// Drives whisper.cpp's `whisper-cli`
pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
    models: ModelStore,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig, models: ModelStore) -> Self {
        Self { config, models }
    }

    fn build_command(&self, model_path: &Path, audio_path: &Path, output_base: &Path, language: Option<&LanguageCode>) -> ToolCommand {
        // whisper-cli assumes English unless told to detect.
        let language = language.map(|l| l.to_string()).unwrap_or_else(|| "auto".to_string());

        ToolCommand::new(&self.config.binary_path, "whisper.cpp transcription")
            .timeout_secs(self.config.timeout_secs)
            .arg("-oj")
            .arg("-of")
            .path_arg(output_base)
            .arg("-m")
            .path_arg(model_path)
            .arg("-f")
            .path_arg(audio_path)
            .opt("-l", language)
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: Option<LanguageCode>) -> Result<Transcript> {
        info!("Transcribing {} with whisper.cpp model {}", audio_path.display(), self.config.model);

        let model_path = self
            .models
            .ensure(&self.config.model, self.config.precision)
            .await?;

        let temp_dir = tempfile::tempdir()?;
        let output_base = temp_dir.path().join("transcript");
        let output_path = temp_dir.path().join("transcript.json");

        self.build_command(&model_path, audio_path, &output_base, language.as_ref())
            .execute(SubweaveError::TranscriptionFailed)
            .await?;

        let json_content = fs::read_to_string(&output_path).await.map_err(|e| {
            SubweaveError::TranscriptionFailed(format!("Failed to read whisper output: {}", e))
        })?;
        debug!(
            "whisper.cpp JSON first 500 chars: {}",
            json_content.chars().take(500).collect::<String>()
        );

        let output: WhisperCppOutput = serde_json::from_str(&json_content).map_err(|e| {
            SubweaveError::TranscriptionFailed(format!("Failed to parse whisper.cpp JSON: {}", e))
        })?;
        let mut transcript = Transcript::try_from(output)?;
        if let Some(language) = language {
            transcript.language = language;
        }

        info!(
            "Transcribed {} segments, language: {}",
            transcript.segments.len(),
            transcript.language
        );
        Ok(transcript)
    }

    fn model_id(&self) -> String {
        format!("whisper.cpp:{}", self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "systeminfo": "AVX = 1",
        "model": {"type": "base"},
        "result": {"language": "en"},
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:01,500"},
             "offsets": {"from": 0, "to": 1500}, "text": " Hello"},
            {"timestamps": {"from": "00:00:01,500", "to": "00:00:03,000"},
             "offsets": {"from": 1500, "to": 3000}, "text": " World"}
        ]
    }"#;

    #[test]
    fn parses_whisper_cpp_json() {
        let output: WhisperCppOutput = serde_json::from_str(SAMPLE).unwrap();
        let transcript = Transcript::try_from(output).unwrap();
        assert_eq!(transcript.language.as_str(), "en");
        assert_eq!(
            transcript.segments,
            vec![
                TranscriptSegment { start: 0.0, end: 1.5, text: "Hello".into() },
                TranscriptSegment { start: 1.5, end: 3.0, text: "World".into() },
            ]
        );
    }

    #[test]
    fn requests_detection_without_hint() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = WhisperCppTranscriber::new(
            TranscriberConfig::default(),
            ModelStore::new(dir.path()).unwrap(),
        );
        let cmd = transcriber.build_command(
            Path::new("ggml-base.bin"),
            Path::new("a.wav"),
            Path::new("/tmp/t"),
            None,
        );
        assert!(cmd.args.windows(2).any(|w| w[0] == "-l" && w[1] == "auto"));

        let ja = LanguageCode::new("ja").unwrap();
        let cmd = transcriber.build_command(Path::new("m"), Path::new("a.wav"), Path::new("/tmp/t"), Some(&ja));
        assert!(cmd.args.windows(2).any(|w| w[0] == "-l" && w[1] == "ja"));
    }
}
