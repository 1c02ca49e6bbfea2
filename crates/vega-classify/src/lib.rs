// vega-classify/src/lib.rs
// ============================================================
// vega-classify  –  Patch classification stage for VEGA
// Runs the shared land-cover classifier on one RGB patch and
// corrects its verdict with pixel-statistics heuristics.
// ------------------------------------------------------------
// Pipeline: Source → RgbImage → (heuristics | Array4<f32> →
//           classifier → heuristics) → PatchPrediction
// ------------------------------------------------------------
// Public API
//   * InferenceUnit::predict(source)        – one patch
//   * InferenceUnit::predict_batch(sources) – many patches + tally
//   * HeuristicCorrector                    – the two rule layers
// ============================================================

//! VEGA – classification layer
//!
//! [`InferenceUnit`] ties the preprocess crate, the model registry and the
//! [`HeuristicCorrector`] into a single patch → prediction operation. Errors
//! from every stage are folded into [`EngineError`], whose [`ErrorKind`]
//! is what callers outside the engine branch on.

use serde::Serialize;
use thiserror::Error;
use vega_model::{InferenceError, ModelLoadError};
use vega_preprocess::{DecodeError, PreprocessError};

pub mod distribution;
pub mod heuristics;
mod unit;

pub use distribution::ClassDistribution;
pub use heuristics::{Corrected, Decision, HeuristicConfig, HeuristicCorrector};
pub use unit::{BatchPrediction, InferenceUnit, PatchPrediction};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Patch size must be positive, got {0}")]
    InvalidPatchSize(u32),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse error category callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Checkpoint missing or malformed; retrying will not help.
    ModelLoad,
    /// Input is not a usable image; retry with different input.
    Decode,
    /// Classifier failed at run time; retry after backoff.
    Inference,
    InvalidArgument,
}

/// `{kind, message}` form of an [`EngineError`] for callers outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ModelLoad(_) => ErrorKind::ModelLoad,
            EngineError::Decode(_) | EngineError::Preprocess(_) => ErrorKind::Decode,
            EngineError::Inference(_) => ErrorKind::Inference,
            EngineError::InvalidPatchSize(_) => ErrorKind::InvalidArgument,
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}
