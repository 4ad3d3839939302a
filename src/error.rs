use std::fmt;

use thiserror::Error;

/// Pipeline stage a fatal failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Transcribe,
    Translate,
    Mux,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Mux => "mux",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SubweaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid timecode: {0}")]
    InvalidTimecode(String),

    #[error("Malformed subtitle: {0}")]
    MalformedSubtitle(String),

    #[error("No translation route from '{from}' to '{to}'")]
    NoTranslationRoute { from: String, to: String },

    #[error("Translation leg {from} -> {to} unavailable: {reason}")]
    TranslationRouteUnavailable {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Translation returned {actual} parts, expected {expected}")]
    TranslationCountMismatch { expected: usize, actual: usize },

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Subtitle muxing failed: {0}")]
    MuxingFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<SubweaveError>,
    },
}

impl SubweaveError {
    /// Wrap an error with the stage it aborted.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            already @ SubweaveError::StageFailed { .. } => already,
            other => SubweaveError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Translation failures have a fallback (the source subtitle) and never abort a run.
    pub fn is_translation_failure(&self) -> bool {
        matches!(
            self,
            SubweaveError::NoTranslationRoute { .. }
                | SubweaveError::TranslationRouteUnavailable { .. }
                | SubweaveError::TranslationCountMismatch { .. }
        )
    }

    /// The stage a run failed at, if this error came out of the orchestrator.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SubweaveError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SubweaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wrapping_is_not_nested() {
        let err = SubweaveError::MuxingFailed("boom".into())
            .at_stage(Stage::Mux)
            .at_stage(Stage::Extract);
        assert_eq!(err.stage(), Some(Stage::Mux));
        assert_eq!(err.to_string(), "mux stage failed: Subtitle muxing failed: boom");
    }

    #[test]
    fn classifies_translation_failures() {
        assert!(SubweaveError::TranslationCountMismatch { expected: 2, actual: 1 }.is_translation_failure());
        assert!(
            SubweaveError::NoTranslationRoute { from: "ja".into(), to: "fr".into() }
                .is_translation_failure()
        );
        assert!(!SubweaveError::ExtractionFailed("x".into()).is_translation_failure());
    }
}
