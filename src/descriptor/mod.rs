//! Spectral descriptors: wavelength-domain templates scored against spectra.
//!
//! A descriptor describes an idealized spectral feature and reports how well
//! a measured spectrum matches it as a fit metric in `[-1, 1]`. The
//! [`triangle`] descriptor models an ascending-then-descending peak and scores
//! each leg with a Pearson correlation; [`set`] groups descriptors per
//! material and reduces their scores.

pub mod set;
pub mod stats;
pub mod triangle;

use thiserror::Error;

use crate::data::model::WavelengthVector;

/// Why a descriptor could not be scored against a spectrum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("spectrum has {spectrum} values but the wavelength axis has {axis}")]
    LengthMismatch { spectrum: usize, axis: usize },
    #[error("peak {peak} is not strictly inside the axis range [{min}, {max}]")]
    OutOfDomain { peak: f64, min: f64, max: f64 },
    #[error("degenerate window: bins start={start}, peak={peak}, stop={stop} are not increasing")]
    DegenerateWindow { start: usize, peak: usize, stop: usize },
    #[error("spectrum is constant over bins {from}..={to}; correlation is undefined")]
    ConstantSegment { from: usize, to: usize },
    #[error("spectrum has non-finite values within bins {from}..={to}")]
    NonFiniteSegment { from: usize, to: usize },
}

/// Anything that can score a spectrum against a reference axis.
pub trait SpectralDescriptor {
    /// Material this descriptor identifies.
    fn material(&self) -> &str;

    /// Goodness of fit in `[-1, 1]`; higher is a better match.
    fn score(&self, spectrum: &[f64], axis: &WavelengthVector) -> Result<f64, MatchError>;
}
