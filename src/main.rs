//! subweave: extract, transcribe, translate and mux subtitles for video files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subweave::cli::{Args, Commands};
use subweave::config::Config;
use subweave::media::MuxRequest;
use subweave::models::ModelStore;
use subweave::paths::{self, ArtifactPaths};
use subweave::pipeline::{self, Pipeline, RunReport, StageOutcome};
use subweave::subtitle::LanguageCode;
use subweave::translate::TranslationBackendFactory;

const DEFAULT_CONFIG: &str = "subweave.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG);
                Config::from_file(DEFAULT_CONFIG)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Run { input, options } => {
            options.apply(&mut config)?;
            let pipeline = Pipeline::from_config(config).await?;
            let report = pipeline.run(&input).await?;
            print_report(&report);
        }
        Commands::Batch { input_dir, options } => {
            options.apply(&mut config)?;
            let pipeline = Pipeline::from_config(config).await?;
            let summary = pipeline.run_directory(&input_dir).await?;

            for report in &summary.completed {
                print_report(report);
            }
            for (video, reason) in &summary.failed {
                println!("FAILED {}: {}", relative(video).display(), reason);
            }
            println!(
                "\n{} succeeded, {} failed",
                summary.completed.len(),
                summary.failed.len()
            );
            if !summary.failed.is_empty() {
                anyhow::bail!("{} videos failed", summary.failed.len());
            }
        }
        Commands::Extract { input, output } => {
            let output = match output {
                Some(path) => path,
                None => ArtifactPaths::new(&input, parent_dir(&input))?.audio(),
            };
            info!("Extracting audio from: {}", input.display());
            let pipeline = Pipeline::from_config(config).await?;
            pipeline.extract_audio(&input, &output).await?;
            println!("{}", relative(&output).display());
        }
        Commands::Transcribe { input, output, language } => {
            if language.is_some() {
                config.pipeline.source_language = language;
            }
            info!("Transcribing audio: {}", input.display());
            let pipeline = Pipeline::from_config(config).await?;
            let (path, document) = pipeline.transcribe_audio(&input, output.as_deref()).await?;
            println!(
                "{} ({} segments, {})",
                relative(&path).display(),
                document.len(),
                document.language()
            );
        }
        Commands::Translate { input, output, from, to } => {
            let from = match from {
                Some(code) => LanguageCode::new(code)?,
                None => paths::subtitle_language(&input).with_context(|| {
                    format!(
                        "cannot tell the language of {}; pass --from",
                        input.display()
                    )
                })?,
            };
            let to = LanguageCode::new(to)?;
            let output = output.unwrap_or_else(|| paths::translated_subtitle_path(&input, &to));

            info!("Translating subtitles: {}", input.display());
            let router = TranslationBackendFactory::create_router(config.translate.clone())?;
            let translated = pipeline::translate_file(&router, &input, from, &to, &output).await?;
            println!("{} ({} segments)", relative(&output).display(), translated.len());
        }
        Commands::Mux { video, subtitles, language, output, burn_in } => {
            let language = LanguageCode::new(language)?;
            let output = match output {
                Some(path) => path,
                None => ArtifactPaths::new(&video, parent_dir(&video))?.output_video(&language),
            };
            let request = MuxRequest {
                video,
                subtitle: subtitles,
                language,
                burn_in: burn_in || config.pipeline.burn_in,
                output,
            };
            info!("Muxing subtitles into: {}", request.video.display());
            let pipeline = Pipeline::from_config(config).await?;
            pipeline.mux_subtitles(&request).await?;
            println!("{}", relative(&request.output).display());
        }
        Commands::Models { download, name } => {
            let precision = config.transcriber.precision;
            let store = ModelStore::new(&config.transcriber.models_dir)?;
            let models: Vec<_> = store
                .available_models(precision)
                .into_iter()
                .filter(|m| name.as_ref().is_none_or(|n| &m.name == n))
                .collect();
            if models.is_empty() {
                anyhow::bail!("no whisper.cpp model named {:?}", name.unwrap_or_default());
            }

            println!("\nAvailable Whisper Models ({:?}):", precision);
            println!("{:<16} {:<28} {:<10} {:<10}", "Name", "Filename", "Size (MB)", "Status");
            println!("{}", "-".repeat(66));
            for model in &models {
                let status = if store.local_path(model).exists() {
                    "Downloaded"
                } else {
                    "Missing"
                };
                println!(
                    "{:<16} {:<28} {:<10.1} {:<10}",
                    model.name, model.filename, model.size_mb, status
                );
            }

            if download {
                for model in &models {
                    store.download_model(model).await?;
                }
                info!("Models available in {}", store.models_dir().display());
            }
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists; pass --force to replace it", output.display());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("\n{}", relative(&report.video).display());
    for (stage, outcome) in &report.stages {
        let outcome = match outcome {
            StageOutcome::Executed => "done".to_string(),
            StageOutcome::Cached => "cached".to_string(),
            StageOutcome::NotRequested => "not requested".to_string(),
            StageOutcome::FellBack { reason } => format!("fell back to source subtitles ({})", reason),
        };
        println!("  {:<11} {}", stage.to_string(), outcome);
    }
    println!(
        "  subtitles   {} [{}]",
        relative(&report.subtitle).display(),
        report.subtitle_language
    );
    println!("  output      {}", relative(&report.output).display());
    if report.fully_cached() {
        println!("  (every artifact already existed)");
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Path relative to the working directory when that is shorter to read.
fn relative(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| pathdiff::diff_paths(path, cwd))
        .filter(|rel| !rel.starts_with(".."))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".subweave").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "subweave.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // The writer flushes on drop; it must live as long as the process.
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subweave.log").display()
    );

    Ok(())
}
