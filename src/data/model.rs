use std::collections::BTreeSet;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Shape and ordering violations of the in-memory data model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("wavelength vector is empty")]
    EmptyWavelengths,
    #[error("wavelength at index {index} is not finite")]
    NonFiniteWavelength { index: usize },
    #[error("wavelengths must be strictly increasing: [{index}] = {prev} is followed by {next}")]
    NonIncreasingWavelengths { index: usize, prev: f64, next: f64 },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("row {index} is out of range for {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },
}

// ---------------------------------------------------------------------------
// WavelengthVector – the shared spectral axis
// ---------------------------------------------------------------------------

/// Strictly increasing wavelength / wavenumber values, one per band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WavelengthVector {
    values: Vec<f64>,
}

impl WavelengthVector {
    pub fn new(values: Vec<f64>) -> Result<Self, ModelError> {
        if values.is_empty() {
            return Err(ModelError::EmptyWavelengths);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteWavelength { index });
        }
        for (index, pair) in values.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ModelError::NonIncreasingWavelengths {
                    index,
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(Self { values })
    }

    /// Axis `0, 1, …, bands-1` for cubes without wavelength metadata.
    pub fn from_band_indices(bands: usize) -> Result<Self, ModelError> {
        Self::new((0..bands).map(|b| b as f64).collect())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: construction rejects empty axes.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> f64 {
        self.values[0]
    }

    pub fn max(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Index of the entry closest to `value`. Ties go to the lower index.
    pub fn nearest_bin(&self, value: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &wl) in self.values.iter().enumerate() {
            let dist = (wl - value).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }
}

impl TryFrom<Vec<f64>> for WavelengthVector {
    type Error = ModelError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<WavelengthVector> for Vec<f64> {
    fn from(wlv: WavelengthVector) -> Self {
        wlv.values
    }
}

// ---------------------------------------------------------------------------
// Spectra – pixel × band intensity matrix
// ---------------------------------------------------------------------------

/// A set of spectra sharing one wavelength axis.
///
/// Rows are pixels / samples, columns are bands. The axis and the optional
/// per-row material column are reference-counted, so derived containers
/// (subsamples, masked selections) never copy the axis.
#[derive(Debug, Clone)]
pub struct Spectra {
    intensities: Array2<f64>,
    wavelengths: Arc<WavelengthVector>,
    materials: Option<Arc<Vec<String>>>,
}

impl Spectra {
    pub fn new(
        intensities: Array2<f64>,
        wavelengths: impl Into<Arc<WavelengthVector>>,
        materials: Option<Vec<String>>,
    ) -> Result<Self, ModelError> {
        Self::from_shared(intensities, wavelengths.into(), materials.map(Arc::new))
    }

    /// Build from an already shared axis and material column.
    pub fn from_shared(
        intensities: Array2<f64>,
        wavelengths: Arc<WavelengthVector>,
        materials: Option<Arc<Vec<String>>>,
    ) -> Result<Self, ModelError> {
        let (rows, bands) = intensities.dim();
        if bands != wavelengths.len() {
            return Err(ModelError::ShapeMismatch(format!(
                "{bands} bands but {} wavelengths",
                wavelengths.len()
            )));
        }
        if let Some(m) = &materials {
            if m.len() != rows {
                return Err(ModelError::ShapeMismatch(format!(
                    "{rows} rows but {} material labels",
                    m.len()
                )));
            }
        }
        Ok(Self {
            intensities,
            wavelengths,
            materials,
        })
    }

    /// Number of spectra.
    pub fn len(&self) -> usize {
        self.intensities.nrows()
    }

    /// Whether the container holds no spectra.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_bands(&self) -> usize {
        self.intensities.ncols()
    }

    pub fn intensities(&self) -> &Array2<f64> {
        &self.intensities
    }

    pub fn wavelengths(&self) -> &Arc<WavelengthVector> {
        &self.wavelengths
    }

    pub fn materials(&self) -> Option<&[String]> {
        self.materials.as_deref().map(Vec::as_slice)
    }

    pub fn material(&self, row: usize) -> Option<&str> {
        self.materials
            .as_ref()
            .and_then(|m| m.get(row))
            .map(String::as_str)
    }

    /// Sorted set of distinct material labels.
    pub fn unique_materials(&self) -> BTreeSet<String> {
        self.materials
            .as_ref()
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.intensities.row(index)
    }

    /// Same rows, every one labelled `material`.
    pub fn with_material(&self, material: &str) -> Spectra {
        Spectra {
            intensities: self.intensities.clone(),
            wavelengths: Arc::clone(&self.wavelengths),
            materials: Some(Arc::new(vec![material.to_string(); self.len()])),
        }
    }

    /// Draw `n` rows with replacement using a seeded generator.
    ///
    /// When `n` is at least the row count, all rows are returned unchanged
    /// and in their original order.
    pub fn random_subsample(&self, n: usize, seed: u64) -> Spectra {
        let rows = self.len();
        if n >= rows {
            return self.clone();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..rows)).collect();
        log::debug!("Subsampled {n} of {rows} spectra (seed {seed})");
        self.take_rows(&indices)
    }

    /// New container holding `indices` (in that order, repeats allowed).
    pub fn select_rows(&self, indices: &[usize]) -> Result<Spectra, ModelError> {
        let rows = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= rows) {
            return Err(ModelError::RowOutOfRange { index, rows });
        }
        Ok(self.take_rows(indices))
    }

    fn take_rows(&self, indices: &[usize]) -> Spectra {
        let intensities = self.intensities.select(Axis(0), indices);
        let materials = self
            .materials
            .as_ref()
            .map(|m| Arc::new(indices.iter().map(|&i| m[i].clone()).collect()));
        Spectra {
            intensities,
            wavelengths: Arc::clone(&self.wavelengths),
            materials,
        }
    }
}
