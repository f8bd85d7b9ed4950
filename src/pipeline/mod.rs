//! Conversion pipeline: provider XML to XMLTV
//!
//! Four stages run strictly in order, each persisting its artifact before
//! the next one starts:
//!
//! ```text
//! raw XML -> intermediate JSON -> normalized XMLTV JSON -> XMLTV XML
//! ```
//!
//! A failing stage stops the run; artifacts written by earlier stages are
//! left on disk for inspection.

pub mod error;
pub mod job;
pub mod stages;

pub use error::StageError;
pub use job::ConversionJob;

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::ArtifactsConfig;
use crate::models::{ChannelCatalog, Metrics};
use crate::utils::human_format::format_duration;
use stages::NormalizeSettings;

/// Runs the stages of one conversion and persists every artifact
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    catalog: Arc<ChannelCatalog>,
    artifacts: ArtifactsConfig,
    settings: NormalizeSettings,
}

impl ConversionPipeline {
    pub fn new(
        catalog: Arc<ChannelCatalog>,
        artifacts: ArtifactsConfig,
        settings: NormalizeSettings,
    ) -> Self {
        Self {
            catalog,
            artifacts,
            settings,
        }
    }

    pub fn artifacts(&self) -> &ArtifactsConfig {
        &self.artifacts
    }

    /// Convert `raw` into XMLTV, writing all intermediate artifacts
    pub async fn run(&self, raw: String) -> Result<Metrics, StageError> {
        let started = Instant::now();
        info!("Parsing provider export ({} bytes)", raw.len());
        let mut job = ConversionJob::new(raw);

        let programmes = job
            .parse()
            .inspect_err(|e| error!("Parse stage failed: {}", e))?;
        debug!("Provider export lists {} programmes", programmes);
        if let Some(intermediate) = job.intermediate() {
            write_json(&self.artifacts.intermediate_path, intermediate).await?;
            info!(
                "Intermediate tree written to {}",
                self.artifacts.intermediate_path.display()
            );
        }

        info!("Normalizing to XMLTV");
        let metrics = job
            .normalize(&self.catalog, &self.settings)
            .inspect_err(|e| error!("Normalize stage failed: {}", e))?;
        if let Some(normalized) = job.normalized() {
            write_json(&self.artifacts.normalized_path, normalized).await?;
            info!(
                "Normalized tree written to {}",
                self.artifacts.normalized_path.display()
            );
        }

        info!("Serializing XMLTV");
        let output = job
            .serialize()
            .inspect_err(|e| error!("Serialize stage failed: {}", e))?;
        write_text(&self.artifacts.output_path, output).await?;
        info!("XMLTV written to {}", self.artifacts.output_path.display());

        info!(
            "Done: {} channels, {} programmes in {}",
            metrics.channel_count,
            metrics.programme_count,
            format_duration(started.elapsed().as_millis() as u64)
        );
        Ok(metrics)
    }
}

async fn write_json(path: &Path, value: &Value) -> Result<(), StageError> {
    let contents = serde_json::to_string_pretty(value)?;
    write_text(path, &contents).await
}

async fn write_text(path: &Path, contents: &str) -> Result<(), StageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StageError::io(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StageError::io(path, e))
        .inspect_err(|e| error!("Failed to persist artifact: {}", e))
}
