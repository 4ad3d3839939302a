//! subweave: a resumable subtitle pipeline for video files.
//!
//! Audio is extracted with ffmpeg, transcribed with whisper, optionally
//! translated (directly or through a pivot language) and muxed back into the
//! video. Every stage is skipped when its output file already exists.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod paths;
pub mod pipeline;
pub mod subtitle;
pub mod timecode;
pub mod transcribe;
pub mod translate;
