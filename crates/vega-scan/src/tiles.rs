// vega-scan/src/tiles.rs

/// Bounding box of one grid cell in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Non-overlapping cells covering `width × height`, row-major. Edge cells are
/// clipped to the image, never padded. `patch_size` must be positive.
pub fn tiles(width: u32, height: u32, patch_size: u32) -> Vec<Tile> {
    debug_assert!(patch_size > 0);
    let step = patch_size as usize;
    let mut out = Vec::with_capacity(width.div_ceil(patch_size) as usize * height.div_ceil(patch_size) as usize);
    for y in (0..height).step_by(step) {
        for x in (0..width).step_by(step) {
            out.push(Tile {
                x,
                y,
                width: x.saturating_add(patch_size).min(width) - x,
                height: y.saturating_add(patch_size).min(height) - y,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_ceiling_product() {
        for (w, h, p) in [(256, 256, 128), (100, 50, 32), (1, 1, 64), (65, 129, 64), (640, 480, 7)] {
            let cells = tiles(w, h, p);
            assert_eq!(cells.len() as u32, w.div_ceil(p) * h.div_ceil(p), "{w}x{h}/{p}");
        }
    }

    #[test]
    fn cells_cover_the_image_exactly() {
        let (w, h) = (100u32, 70u32);
        let mut hits = vec![0u8; (w * h) as usize];
        for t in tiles(w, h, 32) {
            for y in t.y..t.y + t.height {
                for x in t.x..t.x + t.width {
                    hits[(y * w + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&n| n == 1));
    }

    #[test]
    fn edge_cells_are_clipped() {
        let cells = tiles(100, 50, 32);
        let last = cells.last().unwrap();
        assert_eq!((last.x, last.y, last.width, last.height), (96, 32, 4, 18));
    }

    #[test]
    fn order_is_row_major() {
        let cells = tiles(64, 64, 32);
        let origins: Vec<_> = cells.iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(origins, [(0, 0), (32, 0), (0, 32), (32, 32)]);
    }

    #[test]
    fn oversized_patch_is_whole_image() {
        assert_eq!(
            tiles(50, 40, 64),
            [Tile {
                x: 0,
                y: 0,
                width: 50,
                height: 40
            }]
        );
    }
}
