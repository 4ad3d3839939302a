use async_trait::async_trait;
use std::path::Path;
use tempfile::TempPath;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubweaveError};
use super::{MediaCommandBuilder, MediaProcessor, MuxRequest};

/// ffmpeg-backed media processor
pub struct FfmpegProcessor {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegProcessor {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, config.timeout_secs);

        Self {
            config,
            command_builder,
        }
    }
}

/// Hidden file next to `target` with the same extension, so ffmpeg still
/// picks the container from the name. Removed when dropped unless persisted.
fn staging_path(target: &Path) -> Result<TempPath> {
    let dir = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let suffix = target
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let file = tempfile::Builder::new()
        .prefix(".subweave-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

fn publish(staged: TempPath, target: &Path) -> Result<()> {
    staged.persist(target).map_err(|e| SubweaveError::Io(e.error))?;
    debug!("Published {}", target.display());
    Ok(())
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        let staged = staging_path(audio_path)?;
        self.command_builder
            .extract_audio(video_path, &staged)
            .execute(SubweaveError::ExtractionFailed)
            .await?;
        publish(staged, audio_path)?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn mux_subtitles(&self, request: &MuxRequest) -> Result<()> {
        info!(
            "Muxing {} subtitles from {} into {} -> {} ({})",
            request.language,
            request.subtitle.display(),
            request.video.display(),
            request.output.display(),
            if request.burn_in { "burn-in" } else { "soft track" }
        );

        let staged = staging_path(&request.output)?;
        let staged_request = MuxRequest {
            output: staged.to_path_buf(),
            ..request.clone()
        };

        let command = if request.burn_in {
            self.command_builder
                .mux_burn_in(&staged_request, &self.config.subtitle_options)
        } else {
            self.command_builder.mux_soft(&staged_request)
        };
        command.execute(SubweaveError::MuxingFailed).await?;
        publish(staged, &request.output)?;

        info!("Subtitle muxing completed successfully");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        let output = self
            .command_builder
            .version_check()
            .execute(|reason| SubweaveError::Config(format!("Media processor not available: {}", reason)))
            .await?;

        let version_info = String::from_utf8_lossy(&output.stdout);
        debug!(
            "Media processor: {}",
            version_info.lines().next().unwrap_or("unknown version")
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::subtitle::LanguageCode;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Stand-in ffmpeg that writes `content` to its last argument and exits with `code`.
    fn fake_ffmpeg(dir: &TempDir, content: &str, code: i32) -> FfmpegProcessor {
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nfor last; do :; done\nprintf '{}' > \"$last\"\nexit {}\n", content, code),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        FfmpegProcessor::new(MediaConfig {
            binary_path: script.to_string_lossy().to_string(),
            ..MediaConfig::default()
        })
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn mux_request(dir: &Path, burn_in: bool) -> MuxRequest {
        MuxRequest {
            video: dir.join("talk.mp4"),
            subtitle: dir.join("talk.fr-sub.srt"),
            language: LanguageCode::new("fr").unwrap(),
            burn_in,
            output: dir.join("talk-with-subs-fr.mp4"),
        }
    }

    #[tokio::test]
    async fn failed_extraction_leaves_no_audio() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let processor = fake_ffmpeg(&tools, "partial", 1);

        let audio = work.path().join("talk-audio.wav");
        let err = processor
            .extract_audio(&work.path().join("talk.mp4"), &audio)
            .await
            .unwrap_err();

        assert!(matches!(err, SubweaveError::ExtractionFailed(_)));
        assert!(entries(work.path()).is_empty());
    }

    #[tokio::test]
    async fn failed_mux_leaves_no_output() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let processor = fake_ffmpeg(&tools, "partial", 1);

        for burn_in in [false, true] {
            let err = processor
                .mux_subtitles(&mux_request(work.path(), burn_in))
                .await
                .unwrap_err();
            assert!(matches!(err, SubweaveError::MuxingFailed(_)));
        }
        assert!(entries(work.path()).is_empty());
    }

    #[tokio::test]
    async fn successful_mux_is_moved_into_place() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let processor = fake_ffmpeg(&tools, "muxed", 0);

        let request = mux_request(work.path(), false);
        processor.mux_subtitles(&request).await.unwrap();

        assert_eq!(std::fs::read_to_string(&request.output).unwrap(), "muxed");
        assert_eq!(entries(work.path()), vec!["talk-with-subs-fr.mp4"]);
    }

    #[test]
    fn staging_path_keeps_the_extension() {
        let work = tempfile::tempdir().unwrap();
        let staged = staging_path(&work.path().join("talk-audio.wav")).unwrap();
        let staged: &Path = staged.as_ref();

        assert_eq!(staged.parent(), Some(work.path()));
        assert_eq!(staged.extension().and_then(|e| e.to_str()), Some("wav"));
        assert!(staged.file_name().unwrap().to_string_lossy().starts_with(".subweave-"));
    }
}
