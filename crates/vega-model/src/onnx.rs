//! ONNX Runtime backed land-cover classifier
//!
//! The session is wrapped in a mutex: `Session::run` needs exclusive access,
//! so concurrent callers take turns on the network while preprocessing and
//! heuristics around it still run in parallel.

use crate::{softmax, Checkpoint, Classifier, InferenceError, ModelConfig, ModelLoadError};
use ndarray::Array4;
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};
use ort::value::TensorRef;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Land-cover classifier running an exported ONNX graph
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    class_names: Vec<String>,
    softmax: bool,
    device: &'static str,
}

impl OnnxClassifier {
    /// Read the checkpoint, build the session and verify the output layer
    /// matches the class list with a dry run on a zero tensor.
    pub fn load(config: &ModelConfig, input_size: u32) -> Result<Self, ModelLoadError> {
        let checkpoint = Checkpoint::read(&config.checkpoint_path)?;
        let weights = checkpoint.weights_path(&config.checkpoint_path);
        if !weights.exists() {
            return Err(ModelLoadError::WeightsMissing(weights));
        }

        info!(
            checkpoint = %config.checkpoint_path.display(),
            weights = %weights.display(),
            classes = checkpoint.class_names.len(),
            "Loading land-cover classifier"
        );

        let builder = Session::builder()
            .map_err(rejected)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(rejected)?
            .with_intra_threads(config.intra_threads)
            .map_err(rejected)?;
        let (builder, device) = select_device(builder, config.use_gpu)?;
        let session = builder.commit_from_file(&weights).map_err(rejected)?;

        let input_name = first_input(session.inputs.iter().map(|i| i.name.as_str()))?;

        let classifier = Self {
            session: Mutex::new(session),
            input_name,
            class_names: checkpoint.class_names,
            softmax: checkpoint.softmax,
            device,
        };

        let side = input_size as usize;
        let scores = classifier
            .scores(&Array4::<f32>::zeros((1, 3, side, side)))
            .map_err(ModelLoadError::DryRun)?;
        if scores.len() != classifier.class_names.len() {
            return Err(ModelLoadError::ClassCountMismatch {
                expected: classifier.class_names.len(),
                got: scores.len(),
            });
        }

        info!(
            input = %classifier.input_name,
            device = classifier.device,
            "Classifier ready"
        );
        Ok(classifier)
    }

    /// Raw output scores for one sample
    fn scores(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let value = TensorRef::from_array_view(input.view()).map_err(failed)?;

        let mut session = self.session.lock().map_err(|_| InferenceError::SessionPoisoned)?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => value])
            .map_err(failed)?;
        let (_, output) = outputs.iter().next().ok_or(InferenceError::NoOutput)?;
        let (_shape, data) = output.try_extract_tensor::<f32>().map_err(failed)?;
        Ok(data.to_vec())
    }
}

impl Classifier for OnnxClassifier {
    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let scores = self.scores(input)?;
        if scores.len() != self.class_names.len() {
            return Err(InferenceError::OutputShape {
                expected: self.class_names.len(),
                got: scores.len(),
            });
        }
        Ok(if self.softmax { softmax(&scores) } else { scores })
    }

    fn device(&self) -> &str {
        self.device
    }
}

#[cfg(feature = "cuda")]
fn select_device(builder: SessionBuilder, use_gpu: bool) -> Result<(SessionBuilder, &'static str), ModelLoadError> {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    let cuda = CUDAExecutionProvider::default();
    let available = use_gpu && cuda.is_available().unwrap_or(false);
    let device = device_for(use_gpu, available);
    if device != "cuda" {
        return Ok((builder, device));
    }
    debug!("registering CUDA execution provider");
    let builder = builder.with_execution_providers([cuda.build()]).map_err(rejected)?;
    Ok((builder, device))
}

#[cfg(not(feature = "cuda"))]
fn select_device(builder: SessionBuilder, use_gpu: bool) -> Result<(SessionBuilder, &'static str), ModelLoadError> {
    if use_gpu {
        debug!("built without the `cuda` feature, running on CPU");
    }
    Ok((builder, device_for(use_gpu, false)))
}

/// Device the session actually runs on; a GPU request without a usable
/// CUDA provider stays on the CPU.
fn device_for(use_gpu: bool, cuda_available: bool) -> &'static str {
    if use_gpu && cuda_available {
        "cuda"
    } else {
        if use_gpu {
            warn!("CUDA requested but unavailable, running on CPU");
        }
        "cpu"
    }
}

/// Name of the graph's first input; a graph without inputs cannot be fed.
fn first_input<'a>(mut names: impl Iterator<Item = &'a str>) -> Result<String, ModelLoadError> {
    names
        .next()
        .map(str::to_string)
        .ok_or_else(|| ModelLoadError::Runtime("model declares no inputs".to_string()))
}

fn rejected(e: impl std::fmt::Display) -> ModelLoadError {
    ModelLoadError::Runtime(e.to_string())
}

fn failed(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}
