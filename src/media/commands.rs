use std::path::Path;

use crate::command::ToolCommand;
use super::MuxRequest;

/// Builder for the ffmpeg invocations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
    timeout_secs: u64,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S, timeout_secs: u64) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout_secs,
        }
    }

    fn command(&self, description: &str) -> ToolCommand {
        ToolCommand::new(&self.binary_path, description).timeout_secs(self.timeout_secs)
    }

    /// Build audio extraction command (PCM 16-bit, 16 kHz, mono)
    pub fn extract_audio<P: AsRef<Path>, Q: AsRef<Path>>(&self, video_path: P, audio_path: Q) -> ToolCommand {
        self.command("Audio extraction")
            .arg("-y")
            .arg("-i")
            .path_arg(video_path)
            .arg("-vn")
            .opt("-acodec", "pcm_s16le")
            .opt("-ar", "16000")
            .opt("-ac", "1")
            .path_arg(audio_path)
    }

    /// Build soft subtitle muxing command: streams are copied and the
    /// subtitle track is tagged with language and title metadata.
    pub fn mux_soft(&self, request: &MuxRequest) -> ToolCommand {
        let title = request
            .subtitle
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| request.language.to_string());

        self.command("Soft subtitle muxing")
            .arg("-y")
            .arg("-i")
            .path_arg(&request.video)
            .arg("-i")
            .path_arg(&request.subtitle)
            .opt("-map", "0:v")
            .opt("-map", "0:a?")
            .opt("-map", "1:0")
            .opt("-c", "copy")
            .opt("-c:s", "mov_text")
            .opt("-metadata:s:s:0", format!("language={}", request.language))
            .opt("-metadata:s:s:0", format!("title={}", title))
            .path_arg(&request.output)
    }

    /// Build burn-in command: frames are re-encoded with the subtitles drawn on them.
    pub fn mux_burn_in(&self, request: &MuxRequest, additional_options: &[String]) -> ToolCommand {
        self.command("Subtitle burn-in")
            .arg("-y")
            .arg("-i")
            .path_arg(&request.video)
            .opt("-vf", format!("subtitles=filename={}", escape_filter_path(&request.subtitle)))
            .opt("-c:v", "libx264")
            .opt("-c:a", "copy")
            .args(additional_options.iter().cloned())
            .path_arg(&request.output)
    }

    pub fn version_check(&self) -> ToolCommand {
        self.command("Version check").arg("-version")
    }
}

/// Escape a path for use as a filter option value in an ffmpeg filter graph.
pub fn escape_filter_path(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        if matches!(c, '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::LanguageCode;
    use std::path::PathBuf;

    fn request(burn_in: bool) -> MuxRequest {
        MuxRequest {
            video: PathBuf::from("/in/talk.mp4"),
            subtitle: PathBuf::from("/out/talk.fr-sub.srt"),
            language: LanguageCode::new("fr").unwrap(),
            burn_in,
            output: PathBuf::from("/out/talk-with-subs-fr.mp4"),
        }
    }

    #[test]
    fn soft_mux_sets_language_and_title() {
        let cmd = MediaCommandBuilder::new("ffmpeg", 0).mux_soft(&request(false));
        let args = cmd.args.join(" ");
        assert!(args.contains("-c:s mov_text"));
        assert!(args.contains("-metadata:s:s:0 language=fr"));
        assert!(args.contains("-metadata:s:s:0 title=talk.fr-sub"));
        assert_eq!(cmd.args.last().unwrap(), "/out/talk-with-subs-fr.mp4");
    }

    #[test]
    fn burn_in_uses_subtitles_filter_and_extra_options() {
        let options = vec!["-crf".to_string(), "23".to_string()];
        let cmd = MediaCommandBuilder::new("ffmpeg", 0).mux_burn_in(&request(true), &options);
        assert!(cmd.args.contains(&"subtitles=filename=/out/talk.fr-sub.srt".to_string()));
        assert!(cmd.args.windows(2).any(|w| w[0] == "-crf" && w[1] == "23"));
        assert!(!cmd.args.iter().any(|a| a == "mov_text"));
    }

    #[test]
    fn extraction_writes_mono_wav() {
        let cmd = MediaCommandBuilder::new("ffmpeg", 60).extract_audio("a.mp4", "a-audio.wav");
        assert_eq!(
            cmd.args,
            vec!["-y", "-i", "a.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "a-audio.wav"]
        );
        assert_eq!(cmd.timeout.map(|t| t.as_secs()), Some(60));
    }

    #[test]
    fn escapes_filter_metacharacters() {
        assert_eq!(
            escape_filter_path(Path::new("/tmp/it's: a [test].srt")),
            r"/tmp/it\'s\: a \[test\].srt"
        );
    }
}
