// Media container operations: audio extraction and subtitle muxing.
//
// - Processor: ffmpeg-backed implementation
// - Commands: ffmpeg argument builders

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::subtitle::LanguageCode;

/// Everything the muxing collaborator needs for one output video.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxRequest {
    pub video: PathBuf,
    pub subtitle: PathBuf,
    pub language: LanguageCode,
    pub burn_in: bool,
    pub output: PathBuf,
}

/// Audio/video container collaborator. Calls block until the tool exits.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Extract the audio stream as 16 kHz mono WAV. Fails with `ExtractionFailed`.
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Mux a subtitle file into a new video. Fails with `MuxingFailed`.
    async fn mux_subtitles(&self, request: &MuxRequest) -> Result<()>;

    /// Check that the underlying tool can be executed
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessor> {
        Box::new(processor::FfmpegProcessor::new(config))
    }
}
