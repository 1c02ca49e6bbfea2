//! vega‑preprocess – squash‑resize + normalize RGB patches into classifier tensors.
//!
//! The land-cover classifier was trained on `Resize((224, 224))` inputs, i.e. a
//! non-aspect-preserving resize with no center crop. [`Preprocessor::run`]
//! reproduces exactly that so confidence scores stay comparable with training.

use ndarray::Array4;
use resize::{new, Pixel, Type};
use rgb::FromSlice;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod source;
mod stats;

pub use image::RgbImage;
pub use source::{decode, DecodeError, Source};
pub use stats::PixelStats;

/// ImageNet channel means the backbone was trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations the backbone was trained with.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Cannot preprocess an empty patch ({0}x{1})")]
    EmptyPatch(u32, u32),
    #[error("Invalid input size {0}")]
    InvalidInputSize(u32),
    #[error("Resize failed: {0}")]
    Resize(#[from] resize::Error),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Resampling kernel used for the squash resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Point,
    /// Bilinear, the training-time default.
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl ResizeFilter {
    fn kernel(self) -> Type {
        match self {
            ResizeFilter::Point => Type::Point,
            ResizeFilter::Triangle => Type::Triangle,
            ResizeFilter::CatmullRom => Type::Catrom,
            ResizeFilter::Lanczos3 => Type::Lanczos3,
        }
    }
}

/// Preprocessing constants; all of them are fixed by how the model was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Square classifier input resolution (pixels per side).
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            filter: ResizeFilter::Triangle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a pre‑processor that outputs `[1, 3, S, S]` normalized f32 tensors.
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn input_size(&self) -> u32 {
        self.config.input_size
    }

    /// Resize, scale into `[0, 1]`, normalize per channel and pack as NCHW.
    pub fn run(&self, patch: &RgbImage) -> Result<Array4<f32>> {
        let (w, h) = patch.dimensions();
        if w == 0 || h == 0 {
            return Err(PreprocessError::EmptyPatch(w, h));
        }
        if self.config.input_size == 0 {
            return Err(PreprocessError::InvalidInputSize(0));
        }
        let size = self.config.input_size as usize;

        // 1. Squash resize to SxS, no aspect-preserving crop
        let mut dst = vec![0u8; size * size * 3];
        let mut resizer = new(
            w as usize,
            h as usize,
            size,
            size,
            Pixel::RGB8,
            self.config.filter.kernel(),
        )?;
        resizer.resize(patch.as_raw().as_rgb(), dst.as_rgb_mut())?;

        // 2. Scale to 0‑1, normalize and pack into ndarray (N,C,H,W)
        let PreprocessConfig { mean, std, .. } = self.config;
        let mut arr = Array4::<f32>::zeros((1, 3, size, size));
        for (idx, px) in dst.chunks_exact(3).enumerate() {
            let (y, x) = (idx / size, idx % size);
            for c in 0..3 {
                arr[[0, c, y, x]] = (px[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }
        Ok(arr)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}
