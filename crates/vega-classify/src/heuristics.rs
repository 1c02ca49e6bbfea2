//! Pixel-statistics corrections around the learned classifier.
//!
//! The network confuses very dark patches (cloud and terrain shadow) and some
//! bright sand/soil patches with water. Two rule layers encode that domain
//! knowledge:
//!
//! 1. [`HeuristicCorrector::pre_inference`] may decide the label outright, in
//!    which case the classifier is never invoked.
//! 2. [`HeuristicCorrector::post_inference`] rewrites a `Water Body` verdict
//!    on a red-dominant patch to `Barren Land`.

use crate::distribution::ClassDistribution;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vega_preprocess::PixelStats;

/// Thresholds and labels of the correction rules, on the 0‑255 pixel scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Patches darker than this mean brightness are shadow.
    pub shadow_brightness: f32,
    /// How far the blue mean must exceed the red mean for a water override.
    pub water_margin_over_red: f32,
    /// How far the blue mean must exceed the green mean for a water override.
    pub water_margin_over_green: f32,
    pub shadow_label: String,
    pub water_label: String,
    pub barren_label: String,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            shadow_brightness: 30.0,
            water_margin_over_red: 20.0,
            water_margin_over_green: 20.0,
            shadow_label: "Shadow".to_string(),
            water_label: "Water Body".to_string(),
            barren_label: "Barren Land".to_string(),
        }
    }
}

/// Which layer produced the final label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Pre-inference override; the classifier did not run.
    Heuristic,
    /// Classifier output, unchanged.
    Classifier,
    /// Classifier output rewritten by the post-inference check.
    SanityCheck,
}

/// Label, confidence and distribution after both correction layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Corrected {
    pub label: String,
    pub confidence: f32,
    pub distribution: ClassDistribution,
    pub decided_by: Decision,
}

impl Corrected {
    fn from_distribution(distribution: ClassDistribution, decided_by: Decision) -> Self {
        let (label, confidence) = distribution
            .top()
            .map(|(label, p)| (label.to_string(), p))
            .unwrap_or_default();
        Self {
            label,
            confidence,
            distribution,
            decided_by,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicCorrector {
    config: HeuristicConfig,
}

impl HeuristicCorrector {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// Label forced by pixel statistics alone, if any. Shadow wins over water.
    pub fn pre_inference(&self, stats: &PixelStats) -> Option<&str> {
        let cfg = &self.config;
        if stats.brightness() < cfg.shadow_brightness {
            return Some(cfg.shadow_label.as_str());
        }
        if stats.mean_b > stats.mean_r + cfg.water_margin_over_red
            && stats.mean_b > stats.mean_g + cfg.water_margin_over_green
        {
            return Some(cfg.water_label.as_str());
        }
        None
    }

    /// Relabel water to barren land when red dominates blue; any other
    /// distribution passes through unchanged.
    pub fn post_inference(&self, stats: &PixelStats, distribution: ClassDistribution) -> ClassDistribution {
        let cfg = &self.config;
        let is_water = matches!(distribution.top(), Some((label, _)) if label == cfg.water_label);
        if is_water && stats.mean_r > stats.mean_b {
            debug!(
                mean_r = stats.mean_r,
                mean_b = stats.mean_b,
                "water verdict on red-dominant patch, relabelling"
            );
            return distribution.transfer(&cfg.water_label, &cfg.barren_label);
        }
        distribution
    }

    /// Run both layers around `infer`, which is only called when no
    /// pre-inference override fires.
    pub fn classify_and_correct<F, E>(&self, stats: &PixelStats, class_names: &[String], infer: F) -> Result<Corrected, E>
    where
        F: FnOnce() -> Result<ClassDistribution, E>,
    {
        if let Some(label) = self.pre_inference(stats) {
            debug!(label, brightness = stats.brightness(), "heuristic override");
            return Ok(Corrected {
                label: label.to_string(),
                confidence: 100.0,
                distribution: ClassDistribution::certain(class_names, label),
                decided_by: Decision::Heuristic,
            });
        }

        let raw = infer()?;
        let corrected = self.post_inference(stats, raw.clone());
        if corrected == raw {
            return Ok(Corrected::from_distribution(raw, Decision::Classifier));
        }

        // the relabelled class holds the moved mass; name it explicitly so a
        // tie with an earlier class cannot steal the verdict
        let label = self.config.barren_label.clone();
        let confidence = corrected.get(&label).unwrap_or_default();
        Ok(Corrected {
            label,
            confidence,
            distribution: corrected,
            decided_by: Decision::SanityCheck,
        })
    }
}
