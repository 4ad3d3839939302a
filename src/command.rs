use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubweaveError};

/// An external tool invocation (ffmpeg, whisper, ...).
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub description: String,
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(program: S1, description: S2) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            description: description.into(),
            timeout: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn path_arg<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// `flag value` pair.
    pub fn opt<S1: Into<String>, S2: Into<String>>(self, flag: S1, value: S2) -> Self {
        self.arg(flag).arg(value)
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Run to completion. Spawn errors, timeouts and non-zero exits are
    /// reported through `failure`, which picks the stage-specific error.
    pub async fn execute(&self, failure: fn(String) -> SubweaveError) -> Result<Output> {
        debug!("Executing {}: {} {:?}", self.description, self.program, self.args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output()).await.map_err(|_| {
                failure(format!(
                    "{} timed out after {}s",
                    self.description,
                    limit.as_secs()
                ))
            })?,
            None => cmd.output().await,
        }
        .map_err(|e| failure(format!("Failed to execute {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_argument_list() {
        let cmd = ToolCommand::new("ffmpeg", "probe")
            .opt("-i", "in.mp4")
            .arg("-y")
            .path_arg(Path::new("out.wav"))
            .timeout_secs(0);
        assert_eq!(cmd.args, vec!["-i", "in.mp4", "-y", "out.wav"]);
        assert!(cmd.timeout.is_none());
    }

    #[tokio::test]
    async fn missing_program_maps_to_stage_error() {
        let err = ToolCommand::new("definitely-not-a-real-binary-4821", "Audio extraction")
            .execute(SubweaveError::ExtractionFailed)
            .await
            .unwrap_err();
        assert!(matches!(err, SubweaveError::ExtractionFailed(_)));
    }
}
