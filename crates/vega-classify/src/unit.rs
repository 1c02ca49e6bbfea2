// vega-classify/src/unit.rs
use crate::distribution::round2;
use crate::heuristics::{Corrected, Decision, HeuristicCorrector};
use crate::{ClassDistribution, EngineError, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use vega_model::{Classifier, InferenceError, ModelRegistry};
use vega_preprocess::{decode, PixelStats, Preprocessor, RgbImage, Source};

/// Corrected verdict for one patch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchPrediction {
    #[serde(rename = "class")]
    pub label: String,
    /// Percent in `[0, 100]`; equals the label's entry in `probabilities`.
    pub confidence: f32,
    pub probabilities: ClassDistribution,
    #[serde(skip)]
    pub decided_by: Decision,
}

impl From<Corrected> for PatchPrediction {
    fn from(c: Corrected) -> Self {
        Self {
            label: c.label,
            confidence: c.confidence,
            probabilities: c.distribution,
            decided_by: c.decided_by,
        }
    }
}

/// Predictions for several independent patches, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrediction {
    pub predictions: Vec<PatchPrediction>,
    /// Label → number of inputs assigned that label.
    pub class_counts: BTreeMap<String, usize>,
    pub mean_confidence: f32,
}

impl BatchPrediction {
    fn tally(predictions: Vec<PatchPrediction>) -> Self {
        let mut class_counts = BTreeMap::new();
        for p in &predictions {
            *class_counts.entry(p.label.clone()).or_insert(0) += 1;
        }
        let mean_confidence = if predictions.is_empty() {
            0.0
        } else {
            round2(predictions.iter().map(|p| p.confidence).sum::<f32>() / predictions.len() as f32)
        };
        Self {
            predictions,
            class_counts,
            mean_confidence,
        }
    }
}

/// Patch → prediction: preprocess, classify, correct.
#[derive(Debug, Clone)]
pub struct InferenceUnit {
    registry: Arc<ModelRegistry>,
    preprocessor: Preprocessor,
    corrector: HeuristicCorrector,
}

impl InferenceUnit {
    pub fn new(registry: Arc<ModelRegistry>, preprocessor: Preprocessor, corrector: HeuristicCorrector) -> Self {
        Self {
            registry,
            preprocessor,
            corrector,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn corrector(&self) -> &HeuristicCorrector {
        &self.corrector
    }

    /// Decode and classify a single patch.
    pub fn predict(&self, source: &Source) -> Result<PatchPrediction> {
        let classifier = self.registry.classifier()?;
        let patch = decode(source)?;
        self.classify_patch(classifier.as_ref(), &patch)
    }

    /// Classify every source; the first failure fails the whole batch.
    pub fn predict_batch(&self, sources: &[Source]) -> Result<BatchPrediction> {
        let classifier = self.registry.classifier()?;
        let predictions = sources
            .par_iter()
            .map(|source| {
                let patch = decode(source)?;
                self.classify_patch(classifier.as_ref(), &patch)
            })
            .collect::<Result<Vec<_>>>()?;

        let batch = BatchPrediction::tally(predictions);
        info!(
            patches = batch.predictions.len(),
            classes = batch.class_counts.len(),
            mean_confidence = batch.mean_confidence,
            "batch classified"
        );
        Ok(batch)
    }

    /// Heuristics first; the classifier only sees patches no override claims.
    pub fn classify_patch(&self, classifier: &dyn Classifier, patch: &RgbImage) -> Result<PatchPrediction> {
        let stats = PixelStats::of(patch);
        let class_names = classifier.class_names();

        let corrected = self
            .corrector
            .classify_and_correct::<_, EngineError>(&stats, class_names, || {
                let tensor = self.preprocessor.run(patch)?;
                let probabilities = classifier.classify(&tensor)?;
                if probabilities.len() != class_names.len() {
                    return Err(InferenceError::OutputShape {
                        expected: class_names.len(),
                        got: probabilities.len(),
                    }
                    .into());
                }
                Ok(ClassDistribution::from_probabilities(class_names, &probabilities))
            })?;

        debug!(
            label = %corrected.label,
            confidence = corrected.confidence,
            decided_by = ?corrected.decided_by,
            "patch classified"
        );
        Ok(corrected.into())
    }
}
