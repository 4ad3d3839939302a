use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, Precision};
use crate::error::{Result, SubweaveError};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SUBWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by `run` and `batch`. Each overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub struct RunOptions {
    /// Output directory for every artifact (default: beside the input)
    #[arg(short, long, env = "SUBWEAVE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Language spoken in the video; skips detection
    #[arg(short, long, env = "SUBWEAVE_SOURCE_LANGUAGE")]
    pub source_lang: Option<String>,

    /// Translate subtitles to this language
    #[arg(short, long, env = "SUBWEAVE_SUB_LANGUAGE")]
    pub target_lang: Option<String>,

    /// Whisper model name or model file path
    #[arg(short, long, env = "SUBWEAVE_WHISPER_MODEL")]
    pub model: Option<String>,

    /// Compute precision: float16, float32 or int8
    #[arg(long, env = "SUBWEAVE_PRECISION")]
    pub precision: Option<String>,

    /// Render subtitles into the picture instead of adding a track.
    /// `--burn-in false` forces a soft track over the config file.
    #[arg(
        long,
        env = "SUBWEAVE_BURN_IN",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub burn_in: Option<bool>,
}

impl RunOptions {
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(dir) = &self.output_dir {
            config.pipeline.output_dir = Some(dir.clone());
        }
        if let Some(lang) = &self.source_lang {
            config.pipeline.source_language = Some(lang.clone());
        }
        if let Some(lang) = &self.target_lang {
            config.pipeline.target_language = Some(lang.clone());
        }
        if let Some(model) = &self.model {
            config.transcriber.model = model.clone();
        }
        if let Some(precision) = &self.precision {
            config.transcriber.precision = parse_precision(precision)?;
        }
        if let Some(burn_in) = self.burn_in {
            config.pipeline.burn_in = burn_in;
        }
        Ok(())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one video through extraction, transcription, translation and muxing
    Run {
        /// Input video file
        #[arg(short, long, env = "SUBWEAVE_INPUT_VIDEO")]
        input: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Run every video file under a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Extract audio from video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (default: {base}-audio.wav beside the video)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transcribe audio to an SRT file
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file (default: {base}.{lang}-sub.srt beside the audio)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Source language hint
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate an SRT file, keeping its timing
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file (default: the input name with the language swapped)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Language of the input (default: read from a {base}.{lang}-sub.srt name)
        #[arg(short, long)]
        from: Option<String>,

        /// Target language
        #[arg(short, long)]
        to: String,
    },

    /// Mux a subtitle file into a video
    Mux {
        /// Input video file
        #[arg(long)]
        video: PathBuf,

        /// Subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Language tag for the subtitle track
        #[arg(short, long)]
        language: String,

        /// Output video file (default: {base}-with-subs-{lang}.mp4 beside the video)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render subtitles into the picture
        #[arg(long)]
        burn_in: bool,
    },

    /// List available whisper.cpp models and their status
    Models {
        /// Download missing models
        #[arg(long)]
        download: bool,

        /// Only this model
        #[arg(long)]
        name: Option<String>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "subweave.toml")]
        output: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse compute precision from string
pub fn parse_precision(value: &str) -> Result<Precision> {
    match value.to_lowercase().as_str() {
        "float16" | "f16" => Ok(Precision::Float16),
        "float32" | "f32" => Ok(Precision::Float32),
        "int8" | "q8" => Ok(Precision::Int8),
        _ => Err(SubweaveError::Config(format!(
            "Invalid precision '{}'. Valid values: float16, float32, int8",
            value
        ))),
    }
}
