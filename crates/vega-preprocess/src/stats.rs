use image::RgbImage;

/// Per-channel means of a raw patch on the 0‑255 scale.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelStats {
    pub mean_r: f32,
    pub mean_g: f32,
    pub mean_b: f32,
}

impl PixelStats {
    pub fn of(patch: &RgbImage) -> Self {
        let n = patch.width() as u64 * patch.height() as u64;
        if n == 0 {
            return Self::default();
        }

        let mut sums = [0u64; 3];
        for px in patch.pixels() {
            sums[0] += px[0] as u64;
            sums[1] += px[1] as u64;
            sums[2] += px[2] as u64;
        }
        let mean = |s: u64| (s as f64 / n as f64) as f32;
        Self {
            mean_r: mean(sums[0]),
            mean_g: mean(sums[1]),
            mean_b: mean(sums[2]),
        }
    }

    /// Mean brightness, `(r + g + b) / 3` averaged over all pixels.
    pub fn brightness(&self) -> f32 {
        (self.mean_r + self.mean_g + self.mean_b) / 3.0
    }
}
