//! One batch job: fetch, decode, run the pipeline, encode, store, report.
//!
//! ```text
//! JobRequest ──fetch──▶ bytes ──decode──▶ Raster ──pipeline──▶ Raster
//!                                                                 │
//! JobReport ◀── download_url ◀──store── bytes ◀──encode───────────┘
//! ```
//!
//! Everything before the pipeline and everything after it is fatal: a job
//! whose source cannot be read or whose result cannot be written produces a
//! [`PipelineError`] and no report. Step-level problems never reach this
//! layer; they are already recorded in the step results.

use crate::codec::{Codec, CodecError, format_name, parse_format};
use crate::config::PipelineConfig;
use crate::context::InvocationContext;
use crate::ops::ExecEnv;
use crate::pipeline::{Pipeline, StepResult, StepSpec};
use crate::storage::{BlobStore, StoreError, prefixed_locator, with_extension};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Job-fatal failure. No partial result accompanies it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to fetch '{locator}': {source}")]
    Fetch {
        locator: String,
        source: StoreError,
    },
    #[error("Failed to decode '{locator}': {source}")]
    Decode {
        locator: String,
        source: CodecError,
    },
    #[error("Failed to encode result as {format}: {source}")]
    Encode { format: String, source: CodecError },
    #[error("Failed to store '{locator}': {source}")]
    Store {
        locator: String,
        source: StoreError,
    },
    #[error("Invalid job request: {0}")]
    Request(String),
}

/// A job as submitted, usually parsed from a JSON document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobRequest {
    /// Locator of the source image.
    pub source: String,
    /// Locator for the result; derived from `source` when absent.
    #[serde(default)]
    pub destination: Option<String>,
    /// Encoding for the result; config default when absent.
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub operations: Vec<StepSpec>,
}

impl JobRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            output_format: None,
            operations: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepSpec) -> Self {
        self.operations.push(step);
        self
    }

    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(text).map_err(|e| PipelineError::Request(e.to_string()))
    }

    /// Read and parse a request document from disk.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Request(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
            .map_err(|e| PipelineError::Request(format!("{}: {e}", path.display())))
    }

    fn resolve_format(&self, config: &PipelineConfig) -> Result<ImageFormat, PipelineError> {
        match &self.output_format {
            Some(name) => parse_format(name).ok_or_else(|| {
                PipelineError::Request(format!("unknown output_format '{name}'"))
            }),
            None => Ok(config.output_format()),
        }
    }

    /// Where the result is written.
    ///
    /// An explicit destination is used as given. Otherwise the source name
    /// gets the configured prefix and the output format's extension.
    pub fn resolve_destination(&self, config: &PipelineConfig, format: ImageFormat) -> String {
        match &self.destination {
            Some(dest) => dest.clone(),
            None => {
                let prefixed = prefixed_locator(&self.source, &config.output.prefix);
                let extension = format.extensions_str().first().copied().unwrap_or("img");
                with_extension(&prefixed, extension)
            }
        }
    }
}

/// What a successful job hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub cold_start: bool,
    pub operation_outputs: Vec<StepResult>,
    pub final_width: u32,
    pub final_height: u32,
    pub final_mode: String,
    pub output_format: String,
    pub destination: String,
    pub image_url: String,
    pub image_url_expires_in: u64,
}

impl JobReport {
    pub fn failed_steps(&self) -> usize {
        self.operation_outputs.iter().filter(|r| !r.is_ok()).count()
    }
}

fn fatal(source: &str, error: PipelineError) -> PipelineError {
    warn!(source, %error, "job aborted");
    error
}

/// Run one job end to end.
///
/// The executor only sees the job once a raster exists: fetch and decode
/// failures return before any step runs, and encode or store failures
/// discard a completed outcome.
pub fn run_job(
    codec: &dyn Codec,
    store: &dyn BlobStore,
    ctx: &InvocationContext,
    config: &PipelineConfig,
    request: &JobRequest,
) -> Result<JobReport, PipelineError> {
    let cold_start = ctx.take_cold_start();

    let format = request
        .resolve_format(config)
        .map_err(|e| fatal(&request.source, e))?;
    let destination = request.resolve_destination(config, format);

    debug!(locator = %request.source, "fetching source");
    let bytes = store.fetch(&request.source).map_err(|source| {
        let error = PipelineError::Fetch {
            locator: request.source.clone(),
            source,
        };
        fatal(&request.source, error)
    })?;
    let raster = codec.decode(&bytes).map_err(|source| {
        let error = PipelineError::Decode {
            locator: request.source.clone(),
            source,
        };
        fatal(&request.source, error)
    })?;

    info!(
        source = %request.source,
        width = raster.width(),
        height = raster.height(),
        steps = request.operations.len(),
        cold_start,
        "running job"
    );
    let env = ExecEnv::new(codec).with_resize_filter(config.resize_filter());
    let outcome = Pipeline::new(env).execute(raster, &request.operations);

    let encoded = codec.encode(&outcome.raster, format).map_err(|source| {
        let error = PipelineError::Encode {
            format: format_name(format),
            source,
        };
        fatal(&request.source, error)
    })?;
    debug!(locator = %destination, bytes = encoded.len(), "storing result");
    if let Err(source) = store.store(&destination, &encoded) {
        let error = PipelineError::Store {
            locator: destination,
            source,
        };
        return Err(fatal(&request.source, error));
    }

    let ttl = config.storage.url_ttl_seconds;
    let image_url = store.download_url(&destination, ttl);
    info!(
        destination = %destination,
        succeeded = outcome.succeeded(),
        total = outcome.results.len(),
        "job complete"
    );

    Ok(JobReport {
        cold_start,
        final_width: outcome.raster.width(),
        final_height: outcome.raster.height(),
        final_mode: outcome.raster.format().mode().to_string(),
        output_format: format_name(format),
        operation_outputs: outcome.results,
        destination,
        image_url,
        image_url_expires_in: ttl,
    })
}
