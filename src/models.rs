use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::Precision;
use crate::error::{Result, SubweaveError};

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub filename: String,
    pub url: String,
    pub size_mb: f64,
}

/// Published whisper.cpp models: (name, f16 size in MB, has a q8_0 variant)
const CATALOGUE: &[(&str, f64, bool)] = &[
    ("tiny", 75.0, true),
    ("tiny.en", 75.0, true),
    ("base", 142.0, true),
    ("base.en", 142.0, true),
    ("small", 466.0, true),
    ("small.en", 466.0, true),
    ("medium", 1500.0, true),
    ("medium.en", 1500.0, true),
    ("large-v2", 2900.0, true),
    ("large-v3", 2900.0, false),
    ("large-v3-turbo", 1500.0, true),
];

/// Local store of whisper.cpp ggml models, downloading on demand.
#[derive(Clone)]
pub struct ModelStore {
    client: Client,
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("subweave/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            models_dir: models_dir.as_ref().to_path_buf(),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Every catalogued model at the given precision.
    pub fn available_models(&self, precision: Precision) -> Vec<ModelInfo> {
        CATALOGUE
            .iter()
            .filter_map(|&(name, _, _)| Self::model_info(name, precision))
            .collect()
    }

    /// whisper.cpp bakes precision into the model file: f16 is the default
    /// build, int8 is the `q8_0` quantization. There is no f32 build, so
    /// float32 falls back to f16.
    pub fn model_info(name: &str, precision: Precision) -> Option<ModelInfo> {
        let &(name, size_mb, has_q8) = CATALOGUE.iter().find(|(n, _, _)| *n == name)?;
        let (filename, size_mb) = match precision {
            Precision::Int8 if has_q8 => (format!("ggml-{}-q8_0.bin", name), size_mb * 0.53),
            _ => (format!("ggml-{}.bin", name), size_mb),
        };
        Some(ModelInfo {
            name: name.to_string(),
            url: format!("{}/{}", MODEL_BASE_URL, filename),
            filename,
            size_mb,
        })
    }

    pub fn local_path(&self, model: &ModelInfo) -> PathBuf {
        self.models_dir.join(&model.filename)
    }

    /// Resolve a configured model (file path or catalogue name) to a local file,
    /// downloading it if needed.
    pub async fn ensure(&self, model: &str, precision: Precision) -> Result<PathBuf> {
        let as_path = Path::new(model);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        if precision == Precision::Float32 {
            warn!("whisper.cpp has no float32 models, using float16 for '{}'", model);
        }
        let info = Self::model_info(model, precision).ok_or_else(|| {
            SubweaveError::Config(format!(
                "Unknown whisper model '{}' (not a file and not a published model name)",
                model
            ))
        })?;

        let local_path = self.local_path(&info);
        if local_path.exists() {
            return Ok(local_path);
        }
        self.download_model(&info).await
    }

    pub async fn download_model(&self, model: &ModelInfo) -> Result<PathBuf> {
        let local_path = self.local_path(model);
        if local_path.exists() {
            info!("Model {} already exists at {}", model.name, local_path.display());
            return Ok(local_path);
        }
        async_fs::create_dir_all(&self.models_dir).await?;

        info!("Downloading {} model ({:.1} MB)...", model.name, model.size_mb);

        let mut response = self.client.get(&model.url).send().await?;
        if !response.status().is_success() {
            return Err(SubweaveError::Config(format!(
                "Failed to download model {}: HTTP {}",
                model.name,
                response.status()
            )));
        }

        let total = response
            .content_length()
            .unwrap_or((model.size_mb * 1_000_000.0) as u64);
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        // Stream into a temp file so an interrupted download never looks complete.
        let temp_path = local_path.with_extension("part");
        let mut file = async_fs::File::create(&temp_path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            pb.inc(chunk.len() as u64);
        }
        file.flush().await?;
        drop(file);

        async_fs::rename(&temp_path, &local_path).await?;

        pb.finish_with_message(format!("Downloaded {}", model.name));
        info!("Successfully downloaded {} to {}", model.name, local_path.display());

        Ok(local_path)
    }
}
