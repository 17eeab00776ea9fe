use ndarray::{Array2, Array3, ArrayView1, s};

use super::model::{ModelError, Spectra, WavelengthVector};

/// Unfold a `(X, Y, B)` hypercube into an `(X·Y, B)` matrix.
///
/// Row `x * Y + y` holds the spectrum of pixel `(x, y)`. This is the same
/// row-major order [`RegionMask`](super::mask::RegionMask) uses, so mask
/// indices select the matching rows.
pub fn unfold_cube(cube: &Array3<f64>) -> Array2<f64> {
    let (x, y, bands) = cube.dim();
    // `iter()` walks in logical row-major order whatever the memory layout.
    let values: Vec<f64> = cube.iter().copied().collect();
    Array2::from_shape_vec((x * y, bands), values)
        .unwrap_or_else(|_| unreachable!("element count of a (x, y, b) cube is x*y*b"))
}

/// A hypercube together with its spectral axis.
///
/// Axis 0 is image lines (rows), axis 1 is samples (columns), axis 2 bands.
#[derive(Debug, Clone)]
pub struct HyperCube {
    data: Array3<f64>,
    wavelengths: WavelengthVector,
}

impl HyperCube {
    pub fn new(data: Array3<f64>, wavelengths: WavelengthVector) -> Result<Self, ModelError> {
        let bands = data.dim().2;
        if bands != wavelengths.len() {
            return Err(ModelError::ShapeMismatch(format!(
                "cube has {bands} bands but {} wavelengths",
                wavelengths.len()
            )));
        }
        Ok(Self { data, wavelengths })
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn wavelengths(&self) -> &WavelengthVector {
        &self.wavelengths
    }

    /// `(lines, samples, bands)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Spectrum of one pixel.
    pub fn pixel(&self, line: usize, sample: usize) -> Option<ArrayView1<'_, f64>> {
        let (lines, samples, _) = self.data.dim();
        (line < lines && sample < samples).then(|| self.data.slice(s![line, sample, ..]))
    }

    /// Unfold into one spectrum per pixel.
    pub fn unfold(&self) -> Spectra {
        Spectra::new(unfold_cube(&self.data), self.wavelengths.clone(), None)
            .unwrap_or_else(|_| unreachable!("band count was checked against the axis"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ShapeBuilder;

    fn numbered_cube(x: usize, y: usize, b: usize) -> Array3<f64> {
        Array3::from_shape_fn((x, y, b), |(i, j, k)| (i * 10_000 + j * 100 + k) as f64)
    }

    #[test]
    fn test_unfold_shape_and_order() {
        let cube = numbered_cube(3, 4, 5);
        let flat = unfold_cube(&cube);
        assert_eq!(flat.dim(), (12, 5));
        for x in 0..3 {
            for y in 0..4 {
                assert_eq!(flat.row(x * 4 + y), cube.slice(s![x, y, ..]));
            }
        }
    }

    #[test]
    fn test_unfold_ignores_memory_layout() {
        let cube = numbered_cube(2, 3, 4);
        let mut fortran = Array3::zeros((2, 3, 4).f());
        fortran.assign(&cube);
        assert_eq!(unfold_cube(&fortran), unfold_cube(&cube));
    }

    #[test]
    fn test_hypercube_band_check() {
        let wlv = WavelengthVector::from_band_indices(4).unwrap();
        assert!(HyperCube::new(numbered_cube(2, 2, 3), wlv.clone()).is_err());

        let cube = HyperCube::new(numbered_cube(2, 2, 4), wlv).unwrap();
        let spectra = cube.unfold();
        assert_eq!(spectra.len(), 4);
        assert_eq!(spectra.n_bands(), 4);
        assert_eq!(cube.pixel(1, 0).unwrap()[3], 10_003.0);
        assert!(cube.pixel(2, 0).is_none());
    }
}
