// vega-scan/src/scanner.rs
use crate::gate::ScanGate;
use crate::tiles::{tiles, Tile};
use crate::joined;
use image::imageops;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use vega_classify::{ClassDistribution, EngineError, InferenceUnit, Result};
use vega_preprocess::{decode, RgbImage, Source};

/// Per-scan switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Attach each patch's full distribution to its result.
    pub with_probabilities: bool,
}

/// Verdict for one grid cell; `(x, y)` is its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchResult {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<ClassDistribution>,
}

/// Patches and pixel area assigned to one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub label: String,
    pub patches: usize,
    pub pixels: u64,
}

/// Whole-image result; `grid` is row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridReport {
    pub image_width: u32,
    pub image_height: u32,
    pub patch_size: u32,
    pub grid: Vec<PatchResult>,
}

impl GridReport {
    /// Per-label patch count and covered area, ordered by label. Edge cells
    /// count their clipped area.
    pub fn class_summary(&self) -> Vec<ClassSummary> {
        let mut by_label: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
        for cell in &self.grid {
            let w = cell.x.saturating_add(self.patch_size).min(self.image_width) - cell.x;
            let h = cell.y.saturating_add(self.patch_size).min(self.image_height) - cell.y;
            let entry = by_label.entry(cell.label.as_str()).or_default();
            entry.0 += 1;
            entry.1 += w as u64 * h as u64;
        }
        by_label
            .into_iter()
            .map(|(label, (patches, pixels))| ClassSummary {
                label: label.to_string(),
                patches,
                pixels,
            })
            .collect()
    }
}

/// Tiles an image and classifies every cell through the shared [`InferenceUnit`].
#[derive(Debug, Clone)]
pub struct GridScanner {
    unit: Arc<InferenceUnit>,
}

impl GridScanner {
    pub fn new(unit: Arc<InferenceUnit>) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &Arc<InferenceUnit> {
        &self.unit
    }

    /// Analyze the image at `path`.
    pub async fn analyze(
        &self,
        gate: &ScanGate,
        path: impl AsRef<Path>,
        patch_size: u32,
        options: ScanOptions,
    ) -> Result<GridReport> {
        self.analyze_source(gate, Source::from(path.as_ref()), patch_size, options)
            .await
    }

    /// Decode `source`, then hold one gate slot for the duration of the scan.
    /// A decode failure returns before the gate is touched.
    pub async fn analyze_source(
        &self,
        gate: &ScanGate,
        source: Source,
        patch_size: u32,
        options: ScanOptions,
    ) -> Result<GridReport> {
        if patch_size == 0 {
            return Err(EngineError::InvalidPatchSize(patch_size));
        }

        let label = source.describe();
        let image = tokio::task::spawn_blocking(move || decode(&source))
            .await
            .map_err(joined)??;

        let permit = gate.acquire().await?;
        debug!(source = %label, available = gate.available(), "scan gate acquired");

        let unit = Arc::clone(&self.unit);
        tokio::task::spawn_blocking(move || {
            // released when the scan ends, whatever its outcome
            let _permit = permit;
            scan_image(&unit, &image, patch_size, options)
        })
        .await
        .map_err(joined)?
    }
}

fn scan_image(unit: &InferenceUnit, image: &RgbImage, patch_size: u32, options: ScanOptions) -> Result<GridReport> {
    let classifier = unit.registry().classifier()?;
    let (width, height) = image.dimensions();
    let cells = tiles(width, height, patch_size);
    let started = Instant::now();
    info!(width, height, patch_size, patches = cells.len(), "grid scan started");

    let grid = cells
        .par_iter()
        .map(|tile| {
            let patch = crop(image, tile);
            let prediction = unit.classify_patch(classifier.as_ref(), &patch)?;
            Ok(PatchResult {
                x: tile.x,
                y: tile.y,
                label: prediction.label,
                confidence: prediction.confidence,
                probabilities: options.with_probabilities.then_some(prediction.probabilities),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        patches = grid.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "grid scan finished"
    );
    Ok(GridReport {
        image_width: width,
        image_height: height,
        patch_size,
        grid,
    })
}

fn crop(image: &RgbImage, tile: &Tile) -> RgbImage {
    imageops::crop_imm(image, tile.x, tile.y, tile.width, tile.height).to_image()
}
