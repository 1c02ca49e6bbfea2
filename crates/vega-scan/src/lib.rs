// vega-scan/src/lib.rs
// ============================================================
// vega-scan  –  Full-image grid analysis for VEGA
// Tiles a raster into fixed-size patches, classifies each one
// and assembles a row-major report, with at most N scans
// holding compute resources at any moment.
// ------------------------------------------------------------
// Public API
//   * Engine::predict_patch(source)                  – one patch
//   * Engine::get_image_analysis_data(path, size)    – grid report
//   * GridScanner / ScanGate                         – building blocks
// ============================================================

//! VEGA – grid scan layer and engine facade
//!
//! [`Engine`] owns the shared [`ModelRegistry`], the [`InferenceUnit`] built
//! on top of it and the [`ScanGate`] every full-image scan passes through.
//! Blocking work (decoding, inference) runs on tokio's blocking pool so the
//! async callers stay responsive while a scan waits for a slot.

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinError;
use vega_classify::HeuristicCorrector;
use vega_model::{InferenceError, ModelRegistry};
use vega_preprocess::{Preprocessor, Source};

pub mod config;
pub mod gate;
pub mod scanner;
pub mod tiles;

pub use config::{ConfigError, EngineConfig, ScanConfig};
pub use gate::{ScanGate, ScanPermit};
pub use scanner::{ClassSummary, GridReport, GridScanner, PatchResult, ScanOptions};
pub use tiles::{tiles, Tile};
pub use vega_classify::{
    BatchPrediction, EngineError, ErrorKind, ErrorReport, InferenceUnit, PatchPrediction, Result,
};

pub(crate) fn joined(e: JoinError) -> EngineError {
    EngineError::Inference(InferenceError::Backend(format!("worker task failed: {e}")))
}

/// Entry point for the request layer.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    unit: Arc<InferenceUnit>,
    scanner: GridScanner,
    gate: ScanGate,
}

impl Engine {
    /// Engine backed by the ONNX checkpoint named in `config`. Nothing is
    /// loaded until the first request or [`Engine::ensure_loaded`].
    pub fn new(config: EngineConfig) -> Self {
        let registry = ModelRegistry::new(config.model.clone(), config.preprocess.input_size);
        Self::with_registry(config, Arc::new(registry))
    }

    /// Engine over an existing registry, e.g. one with a custom loader.
    pub fn with_registry(config: EngineConfig, registry: Arc<ModelRegistry>) -> Self {
        let unit = Arc::new(InferenceUnit::new(
            registry,
            Preprocessor::new(config.preprocess.clone()),
            HeuristicCorrector::new(config.heuristics.clone()),
        ));
        let gate = ScanGate::new(config.scan.max_concurrent_scans);
        Self {
            scanner: GridScanner::new(Arc::clone(&unit)),
            unit,
            gate,
            config,
        }
    }

    pub fn ensure_loaded(&self) -> Result<()> {
        Ok(self.unit.registry().ensure_loaded()?)
    }

    /// `{class, confidence, probabilities}` for a single patch.
    pub async fn predict_patch(&self, source: Source) -> Result<PatchPrediction> {
        let unit = Arc::clone(&self.unit);
        tokio::task::spawn_blocking(move || unit.predict(&source))
            .await
            .map_err(joined)?
    }

    /// Independent predictions for several patches plus their tally.
    pub async fn predict_batch(&self, sources: Vec<Source>) -> Result<BatchPrediction> {
        let unit = Arc::clone(&self.unit);
        tokio::task::spawn_blocking(move || unit.predict_batch(&sources))
            .await
            .map_err(joined)?
    }

    /// Grid report for the image at `path`.
    pub async fn get_image_analysis_data(&self, path: impl AsRef<Path>, patch_size: u32) -> Result<GridReport> {
        self.scanner
            .analyze(&self.gate, path, patch_size, ScanOptions::default())
            .await
    }

    /// Grid report for a path or in-memory upload.
    pub async fn analyze_source(&self, source: Source, patch_size: u32, options: ScanOptions) -> Result<GridReport> {
        self.scanner
            .analyze_source(&self.gate, source, patch_size, options)
            .await
    }

    pub fn gate(&self) -> &ScanGate {
        &self.gate
    }

    pub fn scanner(&self) -> &GridScanner {
        &self.scanner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_patch_size(&self) -> u32 {
        self.config.scan.default_patch_size
    }
}
