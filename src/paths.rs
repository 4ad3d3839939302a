//! Deterministic artifact layout. Every idempotency check in the pipeline is
//! a plain existence test on one of these paths.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, SubweaveError};
use crate::subtitle::LanguageCode;

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    output_dir: PathBuf,
    base: String,
}

impl ArtifactPaths {
    /// Derive the layout for `video`, with every artifact placed in `output_dir`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(video: P, output_dir: Q) -> Result<Self> {
        let video = video.as_ref();
        let base = video
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| SubweaveError::Config(format!("Invalid video filename: {}", video.display())))?;

        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            base,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{base}-audio.wav`
    pub fn audio(&self) -> PathBuf {
        self.output_dir.join(format!("{}-audio.wav", self.base))
    }

    /// `{base}.{lang}-sub.srt`
    pub fn subtitle(&self, language: &LanguageCode) -> PathBuf {
        self.output_dir.join(format!("{}.{}-sub.srt", self.base, language))
    }

    /// `{base}-with-subs-{lang}.mp4`
    pub fn output_video(&self, language: &LanguageCode) -> PathBuf {
        self.output_dir.join(format!("{}-with-subs-{}.mp4", self.base, language))
    }

    /// `{base}.transcript.json`, records which language the source subtitle is in.
    pub fn transcript_manifest(&self) -> PathBuf {
        self.output_dir.join(format!("{}.transcript.json", self.base))
    }
}

/// Language tag of a `{base}.{lang}-sub.srt` file name.
pub fn subtitle_language(path: &Path) -> Option<LanguageCode> {
    let name = path.file_name()?.to_str()?;
    let (_, lang) = name.strip_suffix("-sub.srt")?.rsplit_once('.')?;
    LanguageCode::new(lang).ok()
}

/// Where a translation of `input` into `to` goes: the same base with the
/// language swapped, or `{stem}.{to}-sub.srt` for other names.
pub fn translated_subtitle_path(input: &Path, to: &LanguageCode) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let base = match name.strip_suffix("-sub.srt").and_then(|rest| rest.rsplit_once('.')) {
        Some((base, _)) => base.to_string(),
        None => input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
    };
    input.with_file_name(format!("{}.{}-sub.srt", base, to))
}

/// Write `contents` to a temporary file next to `path`, then rename it into place.
pub async fn write_atomic(path: &Path, contents: String) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| SubweaveError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| SubweaveError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_derived_from_base_name() {
        let paths = ArtifactPaths::new("/videos/talk.mp4", "/out").unwrap();
        let en = LanguageCode::new("en").unwrap();
        assert_eq!(paths.base(), "talk");
        assert_eq!(paths.audio(), PathBuf::from("/out/talk-audio.wav"));
        assert_eq!(paths.subtitle(&en), PathBuf::from("/out/talk.en-sub.srt"));
        assert_eq!(paths.output_video(&en), PathBuf::from("/out/talk-with-subs-en.mp4"));
        assert_eq!(paths.transcript_manifest(), PathBuf::from("/out/talk.transcript.json"));
    }

    #[test]
    fn rejects_video_without_file_name() {
        assert!(ArtifactPaths::new("/", "/out").is_err());
    }

    #[test]
    fn language_is_read_back_from_subtitle_names() {
        let ja = LanguageCode::new("ja").unwrap();
        assert_eq!(subtitle_language(Path::new("/out/my.talk.ja-sub.srt")), Some(ja.clone()));
        assert_eq!(subtitle_language(Path::new("/out/talk.srt")), None);

        let fr = LanguageCode::new("fr").unwrap();
        assert_eq!(
            translated_subtitle_path(Path::new("/out/my.talk.ja-sub.srt"), &fr),
            PathBuf::from("/out/my.talk.fr-sub.srt")
        );
        assert_eq!(
            translated_subtitle_path(Path::new("/out/talk.srt"), &fr),
            PathBuf::from("/out/talk.fr-sub.srt")
        );
    }

    #[tokio::test]
    async fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_atomic(&path, "one".to_string()).await.unwrap();
        write_atomic(&path, "two".to_string()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
