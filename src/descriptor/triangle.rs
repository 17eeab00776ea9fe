use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stats::{Correlation, linspace, pearson};
use super::{MatchError, SpectralDescriptor};
use crate::data::model::WavelengthVector;

/// Invalid break-points at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("break-points must satisfy start < peak < stop, got ({start}, {peak}, {stop})")]
    Unordered { start: f64, peak: f64, stop: f64 },
    #[error("break-points must be finite, got ({start}, {peak}, {stop})")]
    NonFinite { start: f64, peak: f64, stop: f64 },
}

// ---------------------------------------------------------------------------
// TriangleDescriptor
// ---------------------------------------------------------------------------

/// An idealized peak: linear rise from `start` to `peak`, linear fall to `stop`.
///
/// Break-points are wavelengths on the same scale as the axis a spectrum is
/// compared against. They are fixed at construction; comparing never
/// modifies the descriptor, so one instance can be shared across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTriangle")]
pub struct TriangleDescriptor {
    material: String,
    start: f64,
    peak: f64,
    stop: f64,
}

#[derive(Deserialize)]
struct RawTriangle {
    material: String,
    start: f64,
    peak: f64,
    stop: f64,
}

impl TryFrom<RawTriangle> for TriangleDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawTriangle) -> Result<Self, Self::Error> {
        TriangleDescriptor::new(raw.material, raw.start, raw.peak, raw.stop)
    }
}

/// Outcome of comparing a [`TriangleDescriptor`] with one spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriangleMatch {
    /// Start wavelength after clamping to the axis minimum.
    pub start_wavelength: f64,
    /// Stop wavelength after clamping to the axis maximum.
    pub stop_wavelength: f64,
    pub start_bin: usize,
    pub peak_bin: usize,
    pub stop_bin: usize,
    /// Rising leg: spectrum `[start_bin..=peak_bin]` vs. a 0 → 1 ramp.
    pub ascending: Correlation,
    /// Falling leg: spectrum `[peak_bin..=stop_bin]` vs. a 1 → 0 ramp.
    pub descending: Correlation,
    /// Mean of the two leg coefficients.
    pub score: f64,
}

impl TriangleDescriptor {
    pub fn new(
        material: impl Into<String>,
        start: impl Into<f64>,
        peak: impl Into<f64>,
        stop: impl Into<f64>,
    ) -> Result<Self, DescriptorError> {
        let (start, peak, stop) = (start.into(), peak.into(), stop.into());
        if !(start.is_finite() && peak.is_finite() && stop.is_finite()) {
            return Err(DescriptorError::NonFinite { start, peak, stop });
        }
        if !(start < peak && peak < stop) {
            return Err(DescriptorError::Unordered { start, peak, stop });
        }
        Ok(Self {
            material: material.into(),
            start,
            peak,
            stop,
        })
    }

    /// `(start, peak, stop)` as constructed.
    pub fn breakpoints(&self) -> (f64, f64, f64) {
        (self.start, self.peak, self.stop)
    }

    /// Correlate `spectrum` (aligned to `axis`) with the triangle template.
    ///
    /// The peak must lie strictly inside the axis range. Start and stop are
    /// clamped to the axis ends for this call only, then each break-point
    /// is mapped to its nearest bin.
    pub fn compare(&self, spectrum: &[f64], axis: &WavelengthVector) -> Result<TriangleMatch, MatchError> {
        if spectrum.len() != axis.len() {
            return Err(MatchError::LengthMismatch {
                spectrum: spectrum.len(),
                axis: axis.len(),
            });
        }

        let (min, max) = (axis.min(), axis.max());
        if !(min < self.peak && self.peak < max) {
            return Err(MatchError::OutOfDomain {
                peak: self.peak,
                min,
                max,
            });
        }
        let start_wavelength = self.start.max(min);
        let stop_wavelength = self.stop.min(max);

        let start_bin = axis.nearest_bin(start_wavelength);
        let peak_bin = axis.nearest_bin(self.peak);
        let stop_bin = axis.nearest_bin(stop_wavelength);
        if !(start_bin < peak_bin && peak_bin < stop_bin) {
            return Err(MatchError::DegenerateWindow {
                start: start_bin,
                peak: peak_bin,
                stop: stop_bin,
            });
        }

        let ascending = leg(spectrum, start_bin, peak_bin, 0.0, 1.0)?;
        let descending = leg(spectrum, peak_bin, stop_bin, 1.0, 0.0)?;

        Ok(TriangleMatch {
            start_wavelength,
            stop_wavelength,
            start_bin,
            peak_bin,
            stop_bin,
            ascending,
            descending,
            score: (ascending.coefficient + descending.coefficient) / 2.0,
        })
    }
}

/// Correlate `spectrum[from..=to]` with a ramp of the same length.
fn leg(spectrum: &[f64], from: usize, to: usize, ramp_from: f64, ramp_to: f64) -> Result<Correlation, MatchError> {
    let segment = &spectrum[from..=to];
    if !segment.iter().all(|v| v.is_finite()) {
        return Err(MatchError::NonFiniteSegment { from, to });
    }
    let ramp = linspace(ramp_from, ramp_to, segment.len());
    pearson(segment, &ramp).ok_or(MatchError::ConstantSegment { from, to })
}

impl SpectralDescriptor for TriangleDescriptor {
    fn material(&self) -> &str {
        &self.material
    }

    fn score(&self, spectrum: &[f64], axis: &WavelengthVector) -> Result<f64, MatchError> {
        self.compare(spectrum, axis).map(|m| m.score)
    }
}

impl fmt::Display for TriangleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TriangleDescriptor {}: ({}, {}, {}) (start, peak, stop)",
            self.material, self.start, self.peak, self.stop
        )
    }
}
