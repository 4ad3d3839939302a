//! Stage sequencing for one video: extract, transcribe or load, translate or
//! skip, mux. Each stage is skipped when its output path already exists, so a
//! run interrupted at any point resumes at the first missing artifact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, Stage, SubweaveError};
use crate::media::{MediaProcessor, MediaProcessorFactory, MuxRequest};
use crate::paths::{write_atomic, ArtifactPaths};
use crate::subtitle::{LanguageCode, SubtitleDocument};
use crate::transcribe::{Transcriber, TranscriberFactory};
use crate::translate::{TranslationBackendFactory, TranslationRouter};

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Marker in the names of videos this tool produced.
const OUTPUT_MARKER: &str = "-with-subs-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Start,
    AudioExtracted,
    Transcribed,
    SourceSubtitleCached,
    TargetResolved,
    TranslationSkipped,
    Muxed,
    Done,
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The collaborator was invoked
    Executed,
    /// The stage's output already existed
    Cached,
    /// No target language, or the target is the source language
    NotRequested,
    /// Translation failed and the source subtitle is used instead
    FellBack { reason: String },
}

/// Records which language the cached source subtitle is in. Without it the
/// source subtitle path is unknown until transcription has run again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptManifest {
    pub language: LanguageCode,
    pub model: String,
    pub segments: usize,
    pub created_at: DateTime<Utc>,
}

impl TranscriptManifest {
    pub fn new(language: LanguageCode, model: String, segments: usize) -> Self {
        Self {
            language,
            model,
            segments,
            created_at: Utc::now(),
        }
    }

    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, serde_json::to_string_pretty(self)?).await
    }
}

/// State of a single `run`. Never persisted.
#[derive(Debug)]
pub struct PipelineRun {
    pub id: Uuid,
    pub video: PathBuf,
    pub paths: ArtifactPaths,
    pub burn_in: bool,
    pub source_language: Option<LanguageCode>,
    pub target_language: Option<LanguageCode>,
    pub subtitle: Option<(PathBuf, LanguageCode)>,
    pub state: RunState,
    stages: Vec<(Stage, StageOutcome)>,
}

impl PipelineRun {
    fn new(id: Uuid, video: &Path, paths: ArtifactPaths, burn_in: bool, target_language: Option<LanguageCode>) -> Self {
        Self {
            id,
            video: video.to_path_buf(),
            paths,
            burn_in,
            source_language: None,
            target_language,
            subtitle: None,
            state: RunState::Start,
            stages: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        self.stages.push((stage, outcome));
    }

    fn fail(&mut self, stage: Stage, err: SubweaveError) -> SubweaveError {
        let err = err.at_stage(stage);
        error!("Run failed: {}", err);
        self.advance(RunState::Failed {
            stage,
            reason: err.to_string(),
        });
        err
    }
}

/// What a successful run produced and which stages actually did work.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub id: Uuid,
    pub video: PathBuf,
    pub source_language: LanguageCode,
    pub subtitle: PathBuf,
    pub subtitle_language: LanguageCode,
    pub output: PathBuf,
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl RunReport {
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, outcome)| outcome)
    }

    /// True when no collaborator was invoked.
    pub fn fully_cached(&self) -> bool {
        self.stages.iter().all(|(_, outcome)| *outcome != StageOutcome::Executed)
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub completed: Vec<RunReport>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct Pipeline {
    config: Config,
    source_override: Option<LanguageCode>,
    target_language: Option<LanguageCode>,
    media: Box<dyn MediaProcessor>,
    transcriber: Box<dyn Transcriber>,
    router: TranslationRouter,
}

impl Pipeline {
    /// Build the configured collaborators and check that the media tool runs.
    pub async fn from_config(config: Config) -> Result<Self> {
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        media.check_availability().await?;
        let transcriber = TranscriberFactory::create_transcriber(config.transcriber.clone())?;
        let router = TranslationBackendFactory::create_router(config.translate.clone())?;

        Self::with_collaborators(config, media, transcriber, router)
    }

    pub fn with_collaborators(
        config: Config,
        media: Box<dyn MediaProcessor>,
        transcriber: Box<dyn Transcriber>,
        router: TranslationRouter,
    ) -> Result<Self> {
        Ok(Self {
            source_override: config.pipeline.source_language()?,
            target_language: config.pipeline.target_language()?,
            config,
            media,
            transcriber,
            router,
        })
    }

    pub fn router(&self) -> &TranslationRouter {
        &self.router
    }

    /// Run every stage for `video`.
    pub async fn run<P: AsRef<Path>>(&self, video: P) -> Result<RunReport> {
        let video = video.as_ref();
        let id = Uuid::new_v4();
        let span = info_span!("run", id = %id);
        self.drive(id, video).instrument(span).await
    }

    async fn drive(&self, id: Uuid, video: &Path) -> Result<RunReport> {
        info!("Processing {}", video.display());

        if !video.exists() {
            return Err(SubweaveError::FileNotFound(video.display().to_string()).at_stage(Stage::Extract));
        }

        let output_dir = self.output_dir_for(video).map_err(|e| e.at_stage(Stage::Extract))?;
        fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| SubweaveError::from(e).at_stage(Stage::Extract))?;
        let paths = ArtifactPaths::new(video, &output_dir).map_err(|e| e.at_stage(Stage::Extract))?;

        let mut run = PipelineRun::new(
            id,
            video,
            paths,
            self.config.pipeline.burn_in,
            self.target_language.clone(),
        );

        let extracted = self.extract(&mut run).await;
        extracted.map_err(|e| run.fail(Stage::Extract, e))?;

        let source = self.transcribe_or_load(&mut run).await;
        let source = source.map_err(|e| run.fail(Stage::Transcribe, e))?;

        let resolved = self.translate_or_skip(&mut run, &source).await;
        let (subtitle, subtitle_language) = resolved.map_err(|e| run.fail(Stage::Translate, e))?;

        let muxed = self.mux(&mut run, &subtitle, &subtitle_language).await;
        let output = muxed.map_err(|e| run.fail(Stage::Mux, e))?;

        run.advance(RunState::Done);
        info!("Finished {} -> {}", video.display(), output.display());

        Ok(RunReport {
            id,
            video: run.video,
            source_language: source.language().clone(),
            subtitle,
            subtitle_language,
            output,
            stages: run.stages,
        })
    }

    fn output_dir_for(&self, video: &Path) -> Result<PathBuf> {
        if let Some(dir) = &self.config.pipeline.output_dir {
            return Ok(dir.clone());
        }
        match video.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Ok(PathBuf::from(".")),
            Some(parent) => Ok(parent.to_path_buf()),
            None => Err(SubweaveError::Config("Cannot determine output directory".to_string())),
        }
    }

    async fn extract(&self, run: &mut PipelineRun) -> Result<()> {
        let audio = run.paths.audio();
        if audio.exists() {
            info!("Reusing extracted audio {}", audio.display());
            run.record(Stage::Extract, StageOutcome::Cached);
        } else {
            info!("Extracting audio to {}", audio.display());
            self.media.extract_audio(&run.video, &audio).await?;
            run.record(Stage::Extract, StageOutcome::Executed);
        }
        run.advance(RunState::AudioExtracted);
        Ok(())
    }

    /// Language of an existing source subtitle: the override if one is
    /// configured, else whatever the manifest recorded.
    async fn known_source_language(&self, paths: &ArtifactPaths) -> Option<LanguageCode> {
        if let Some(language) = &self.source_override {
            return Some(language.clone());
        }
        match TranscriptManifest::load(&paths.transcript_manifest()).await {
            Ok(manifest) => manifest.map(|m| m.language),
            Err(e) => {
                warn!("Ignoring unreadable transcript manifest: {}", e);
                None
            }
        }
    }

    async fn transcribe_or_load(&self, run: &mut PipelineRun) -> Result<SubtitleDocument> {
        if let Some(language) = self.known_source_language(&run.paths).await {
            let path = run.paths.subtitle(&language);
            if path.exists() {
                info!("Loading cached {} subtitle {}", language, path.display());
                let document = SubtitleDocument::load(&path, language.clone()).await?;
                run.source_language = Some(language);
                run.record(Stage::Transcribe, StageOutcome::Cached);
                run.advance(RunState::SourceSubtitleCached);
                return Ok(document);
            }
        }

        let mut transcript = self
            .transcriber
            .transcribe(&run.paths.audio(), self.source_override.clone())
            .await?;
        if let Some(language) = &self.source_override {
            transcript.language = language.clone();
        }

        let mut document = transcript.into_document()?;
        let path = run.paths.subtitle(document.language());

        // Manifest first: a manifest without its subtitle is just a cache miss.
        TranscriptManifest::new(document.language().clone(), self.transcriber.model_id(), document.len())
            .save(&run.paths.transcript_manifest())
            .await?;
        if path.exists() {
            warn!("Keeping existing {} rather than overwriting it", path.display());
            document = SubtitleDocument::load(&path, document.language().clone()).await?;
        } else {
            document.save(&path).await?;
        }

        info!("Transcribed {} segments in {}", document.len(), document.language());
        run.source_language = Some(document.language().clone());
        run.record(Stage::Transcribe, StageOutcome::Executed);
        run.advance(RunState::Transcribed);
        Ok(document)
    }

    async fn translate_or_skip(
        &self,
        run: &mut PipelineRun,
        source: &SubtitleDocument,
    ) -> Result<(PathBuf, LanguageCode)> {
        let source_language = source.language().clone();
        let source_path = run.paths.subtitle(&source_language);

        let target = match &run.target_language {
            Some(target) if *target != source_language => target.clone(),
            _ => {
                info!("No translation requested, using {} subtitles", source_language);
                run.record(Stage::Translate, StageOutcome::NotRequested);
                run.advance(RunState::TranslationSkipped);
                run.subtitle = Some((source_path.clone(), source_language.clone()));
                return Ok((source_path, source_language));
            }
        };

        let target_path = run.paths.subtitle(&target);
        if target_path.exists() {
            info!("Loading cached {} subtitle {}", target, target_path.display());
            SubtitleDocument::load(&target_path, target.clone()).await?;
            run.record(Stage::Translate, StageOutcome::Cached);
            run.advance(RunState::TargetResolved);
            run.subtitle = Some((target_path.clone(), target.clone()));
            return Ok((target_path, target));
        }

        match self.router.translate(source, &target).await {
            Ok(translated) => {
                translated.save(&target_path).await?;
                run.record(Stage::Translate, StageOutcome::Executed);
                run.advance(RunState::TargetResolved);
                run.subtitle = Some((target_path.clone(), target.clone()));
                Ok((target_path, target))
            }
            Err(e) => {
                warn!(
                    "Translation {} -> {} failed, continuing with {} subtitles: {}",
                    source_language, target, source_language, e
                );
                run.record(Stage::Translate, StageOutcome::FellBack { reason: e.to_string() });
                run.advance(RunState::TranslationSkipped);
                run.subtitle = Some((source_path.clone(), source_language.clone()));
                Ok((source_path, source_language))
            }
        }
    }

    async fn mux(&self, run: &mut PipelineRun, subtitle: &Path, language: &LanguageCode) -> Result<PathBuf> {
        let output = run.paths.output_video(language);
        if output.exists() {
            info!("Output {} already exists, not muxing again", output.display());
            run.record(Stage::Mux, StageOutcome::Cached);
        } else {
            let request = MuxRequest {
                video: run.video.clone(),
                subtitle: subtitle.to_path_buf(),
                language: language.clone(),
                burn_in: run.burn_in,
                output: output.clone(),
            };
            self.media.mux_subtitles(&request).await?;
            run.record(Stage::Mux, StageOutcome::Executed);
        }
        run.advance(RunState::Muxed);
        Ok(output)
    }

    /// Run every video under `dir` in turn. A failed video is logged and the
    /// batch moves on.
    pub async fn run_directory<P: AsRef<Path>>(&self, dir: P) -> Result<BatchSummary> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SubweaveError::Config(format!("{} is not a directory", dir.display())));
        }

        let videos = find_videos(dir);
        info!("Found {} video files to process", videos.len());

        let mut summary = BatchSummary::default();
        for video in videos {
            match self.run(&video).await {
                Ok(report) => summary.completed.push(report),
                Err(e) => {
                    warn!("Failed to process {}: {}", video.display(), e);
                    summary.failed.push((video, e.to_string()));
                }
            }
        }
        Ok(summary)
    }

    pub async fn extract_audio(&self, video: &Path, audio: &Path) -> Result<()> {
        self.media.extract_audio(video, audio).await
    }

    /// Transcribe `audio` and write the subtitle to `output`, or to
    /// `{base}.{lang}-sub.srt` beside the audio when no output is given.
    pub async fn transcribe_audio(&self, audio: &Path, output: Option<&Path>) -> Result<(PathBuf, SubtitleDocument)> {
        let mut transcript = self.transcriber.transcribe(audio, self.source_override.clone()).await?;
        if let Some(language) = &self.source_override {
            transcript.language = language.clone();
        }
        let document = transcript.into_document()?;

        let output = match output {
            Some(path) => path.to_path_buf(),
            None => {
                let dir = audio.parent().map(Path::to_path_buf).unwrap_or_default();
                let base = audio
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().trim_end_matches("-audio").to_string())
                    .unwrap_or_default();
                ArtifactPaths::new(dir.join(base), &dir)?.subtitle(document.language())
            }
        };
        document.save(&output).await?;
        Ok((output, document))
    }

    pub async fn mux_subtitles(&self, request: &MuxRequest) -> Result<()> {
        self.media.mux_subtitles(request).await
    }
}

/// Load `input` as `from`, translate it to `to` and write the result.
pub async fn translate_file(
    router: &TranslationRouter,
    input: &Path,
    from: LanguageCode,
    to: &LanguageCode,
    output: &Path,
) -> Result<SubtitleDocument> {
    let source = SubtitleDocument::load(input, from).await?;
    let translated = router.translate(&source, to).await?;
    translated.save(output).await?;
    Ok(translated)
}

/// Video files under `dir`, sorted, excluding videos this tool wrote and
/// hidden files (an interrupted mux can leave a `.subweave-*` staging file).
pub fn find_videos(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let is_video = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            let is_output = path
                .file_stem()
                .map(|stem| {
                    let stem = stem.to_string_lossy();
                    stem.starts_with('.') || stem.contains(OUTPUT_MARKER)
                })
                .unwrap_or(false);
            is_video && !is_output
        })
        .collect()
}
