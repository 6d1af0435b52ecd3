//! Axis tags and calibrations for line-scan image arrays.
//!
//! - [`AxisTag`] names the role of an array dimension (space, time, channel).
//! - [`AxisCalibration`] maps an integer sample index onto a physical
//!   coordinate `origin + index · step`.
//!
//! Notes
//! -----
//! - Calibrations are metadata only; they never rescale array values.
use crate::epscat::errors::{EpscatError, EpscatResult};
use serde::{Deserialize, Serialize};

/// Role of one dimension of an image array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisTag {
    /// Position along the scan line (the non-temporal axis).
    Space,
    /// Acquisition time.
    Time,
    /// Channel index in a multi-channel stack.
    Channel,
}

/// Linear calibration of one axis: `coordinate(i) = origin + i · step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    pub origin: f64,
    pub step: f64,
}

impl AxisCalibration {
    /// Build a calibration with a finite, strictly positive step.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidSamplingPeriod`] when `step` is not finite
    ///   and positive or `origin` is not finite.
    pub fn new(origin: f64, step: f64) -> EpscatResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(EpscatError::InvalidSamplingPeriod { value: step });
        }
        if !origin.is_finite() {
            return Err(EpscatError::InvalidSamplingPeriod { value: origin });
        }
        Ok(Self { origin, step })
    }

    /// Unit calibration (origin 0, step 1): coordinates equal indices.
    pub const fn index() -> Self {
        Self { origin: 0.0, step: 1.0 }
    }

    /// Physical coordinate of sample `index`.
    pub fn coordinate(&self, index: usize) -> f64 {
        self.origin + index as f64 * self.step
    }

    /// Nearest (signed) sample index of a physical coordinate.
    pub fn index_of(&self, coordinate: f64) -> isize {
        ((coordinate - self.origin) / self.step).round() as isize
    }
}
