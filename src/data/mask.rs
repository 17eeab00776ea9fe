use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;

/// Pixels whose first channel is strictly above this value are "in".
pub const DEFAULT_THRESHOLD: f32 = 0.5;

// ---------------------------------------------------------------------------
// RegionMask – binary region of interest from an image
// ---------------------------------------------------------------------------

/// Binary mask of a region of interest.
///
/// * `mask_2d`      – binary grid, image rows × image columns
/// * `full_vector`  – the grid unfolded row-major (0 = out, 1 = in)
/// * `index_vector` – flat indices of the in-values, ascending
/// * `material`     – label of the masked region
#[derive(Debug, Clone)]
pub struct RegionMask {
    mask_2d: Array2<u8>,
    full_vector: Vec<u8>,
    index_vector: Vec<usize>,
    material: String,
}

impl RegionMask {
    /// Load a mask image (normalized to `[0, 1]`) and threshold its first channel.
    pub fn from_image(path: &Path, material: &str) -> Result<Self> {
        Self::from_image_with_threshold(path, material, DEFAULT_THRESHOLD)
    }

    pub fn from_image_with_threshold(path: &Path, material: &str, threshold: f32) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("opening mask image {}", path.display()))?
            .to_rgb32f();
        let (width, height) = img.dimensions();
        let channel = Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
            img.get_pixel(col as u32, row as u32)[0]
        });
        let mask = Self::from_channel_with_threshold(&channel, material, threshold);
        log::info!(
            "Loaded mask '{material}' from {}: {}x{} px, {} in-region",
            path.display(),
            height,
            width,
            mask.count()
        );
        Ok(mask)
    }

    /// Threshold a single normalized channel at 50 %.
    pub fn from_channel(channel: &Array2<f32>, material: &str) -> Self {
        Self::from_channel_with_threshold(channel, material, DEFAULT_THRESHOLD)
    }

    pub fn from_channel_with_threshold(channel: &Array2<f32>, material: &str, threshold: f32) -> Self {
        let mask_2d = channel.mapv(|v| u8::from(v > threshold));
        let full_vector: Vec<u8> = mask_2d.iter().copied().collect();
        let index_vector = full_vector
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == 1)
            .map(|(i, _)| i)
            .collect();
        RegionMask {
            mask_2d,
            full_vector,
            index_vector,
            material: material.to_string(),
        }
    }

    pub fn mask_2d(&self) -> &Array2<u8> {
        &self.mask_2d
    }

    pub fn full_vector(&self) -> &[u8] {
        &self.full_vector
    }

    pub fn index_vector(&self) -> &[usize] {
        &self.index_vector
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    /// `(rows, columns)` of the source image.
    pub fn shape(&self) -> (usize, usize) {
        self.mask_2d.dim()
    }

    /// Number of in-region pixels.
    pub fn count(&self) -> usize {
        self.index_vector.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_uniform_dark_mask_is_empty() {
        let mask = RegionMask::from_channel(&Array2::from_elem((4, 5), 0.3), "leaf");
        assert!(mask.index_vector().is_empty());
        assert_eq!(mask.full_vector().len(), 20);
        assert_eq!(mask.material(), "leaf");
    }

    #[test]
    fn test_uniform_bright_mask_covers_everything() {
        let mask = RegionMask::from_channel(&Array2::from_elem((4, 5), 0.7), "leaf");
        assert_eq!(mask.index_vector(), (0..20).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_threshold_is_strict_and_row_major() {
        let channel = array![[0.5, 0.51, 0.0], [1.0, 0.2, 0.9]];
        let mask = RegionMask::from_channel(&channel, "pill");
        assert_eq!(mask.full_vector(), &[0, 1, 0, 1, 0, 1]);
        assert_eq!(mask.index_vector(), &[1, 3, 5]);
        assert_eq!(mask.mask_2d()[[1, 2]], 1);
        assert_eq!(mask.shape(), (2, 3));
    }

    #[test]
    fn test_index_vector_matches_full_vector() {
        let channel = Array2::from_shape_fn((7, 3), |(r, c)| ((r * 3 + c) % 4) as f32 / 3.0);
        let mask = RegionMask::from_channel(&channel, "x");
        for (i, &v) in mask.full_vector().iter().enumerate() {
            assert_eq!(v == 1, mask.index_vector().contains(&i));
        }
    }

    #[test]
    fn test_from_png_uses_first_channel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mask.png");
        // 3 wide, 2 tall; only the red channel decides.
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 0, Rgb([255, 0, 0]));
        img.put_pixel(0, 1, Rgb([0, 255, 255]));
        img.put_pixel(1, 1, Rgb([200, 0, 0]));
        img.save(&path).unwrap();

        let mask = RegionMask::from_image(&path, "In").unwrap();
        assert_eq!(mask.shape(), (2, 3));
        assert_eq!(mask.index_vector(), &[2, 4]);
    }

    #[test]
    fn test_missing_image_is_an_error() {
        assert!(RegionMask::from_image(Path::new("/nonexistent/mask.png"), "x").is_err());
    }
}
