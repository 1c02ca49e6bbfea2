//! # vega-model
//!
//! Loads the land-cover classifier once and shares it read-only across every
//! inference in the process.
//!
//! ## Features
//!
//! - JSON checkpoint manifest: ordered class names plus the ONNX graph holding the weights
//! - ONNX Runtime backend, CUDA execution provider behind the `cuda` feature
//! - [`Classifier`] trait so tests and alternative backends can stand in for the network
//! - [`ModelRegistry`]: lazy, load-exactly-once ownership of the classifier

use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod checkpoint;
pub mod onnx;
pub mod registry;

pub use checkpoint::Checkpoint;
pub use onnx::OnnxClassifier;
pub use registry::ModelRegistry;

/// Configuration for locating and running the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the checkpoint manifest
    pub checkpoint_path: PathBuf,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Prefer the GPU when the crate is built with CUDA support
    pub use_gpu: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: get_default_checkpoint_path(),
            intra_threads: 1,
            use_gpu: true,
        }
    }
}

/// Get the default checkpoint manifest location
pub fn get_default_checkpoint_path() -> PathBuf {
    PathBuf::from("./models/checkpoint.json")
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Checkpoint not found at {0}")]
    Missing(PathBuf),
    #[error("Failed to read checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed checkpoint {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Checkpoint lists no class names")]
    NoClasses,
    #[error("Duplicate class name in checkpoint: {0}")]
    DuplicateClass(String),
    #[error("Model weights not found at {0}")]
    WeightsMissing(PathBuf),
    #[error("ONNX Runtime rejected the model: {0}")]
    Runtime(String),
    #[error("Classifier emits {got} scores but the checkpoint lists {expected} classes")]
    ClassCountMismatch { expected: usize, got: usize },
    #[error("Dry run of the loaded model failed: {0}")]
    DryRun(#[source] InferenceError),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference session lock poisoned")]
    SessionPoisoned,
    #[error("ONNX Runtime inference failed: {0}")]
    Runtime(String),
    #[error("Model produced no outputs")]
    NoOutput,
    #[error("Expected {expected} class scores, got {got}")]
    OutputShape { expected: usize, got: usize },
    #[error("{0}")]
    Backend(String),
}

/// A fixed-class image classifier.
///
/// Implementations are shared across threads and must be safe to call
/// concurrently; weights are read-only after construction.
pub trait Classifier: Send + Sync {
    /// Ordered class names, one per output score.
    fn class_names(&self) -> &[String];

    /// Class probabilities in `[0, 1]` for a `[1, 3, H, W]` tensor, in
    /// [`Classifier::class_names`] order.
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;

    /// Compute device the classifier runs on, for logging.
    fn device(&self) -> &str {
        "cpu"
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
