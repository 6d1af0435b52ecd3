//! Half-open analysis windows in physical time or sample indices.
//!
//! Purpose
//! -------
//! Represent the ROI, baseline (F0), fit, integration and discrimination
//! windows used throughout the analysis, and convert between physical
//! coordinates and sample indices with a single rounding convention.
//!
//! Conventions
//! -----------
//! - Windows are half-open `[begin, end)`; the sample at `end` is excluded.
//! - Physical → index conversion uses [`AxisCalibration::index_of`] (nearest
//!   sample) on both ends. The last *included* sample is therefore
//!   `index_of(end) − 1`.
//! - Protruding windows are clipped into `[0, extent)`; clipping is reported
//!   to the caller through [`Clipped::clipped`], never as an error. A window
//!   that lies entirely outside the data is an error.
use crate::epscat::{
    core::axes::AxisCalibration,
    errors::{EpscatError, EpscatResult},
};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Half-open interval `[begin, end)` in physical coordinates (time or space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Interval {
    pub begin: f64,
    pub end: f64,
}

impl From<[f64; 2]> for Interval {
    fn from(value: [f64; 2]) -> Self {
        Self { begin: value[0], end: value[1] }
    }
}

impl From<Interval> for [f64; 2] {
    fn from(value: Interval) -> Self {
        [value.begin, value.end]
    }
}

impl Interval {
    /// Build a validated window.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidWindow`] when a bound is not finite or
    ///   `end <= begin`.
    pub fn new(name: &'static str, begin: f64, end: f64) -> EpscatResult<Self> {
        let w = Self { begin, end };
        w.validate(name)?;
        Ok(w)
    }

    /// Check ordering and finiteness of an already-built window.
    pub fn validate(&self, name: &'static str) -> EpscatResult<()> {
        if !self.begin.is_finite() || !self.end.is_finite() {
            return Err(EpscatError::InvalidWindow {
                name,
                begin: self.begin,
                end: self.end,
                reason: "bounds must be finite",
            });
        }
        if self.end <= self.begin {
            return Err(EpscatError::InvalidWindow {
                name,
                begin: self.begin,
                end: self.end,
                reason: "end must exceed begin",
            });
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }

    /// Intersection with `[lo, hi)`, or `None` when they do not overlap.
    pub fn intersect(&self, lo: f64, hi: f64) -> Option<Self> {
        let begin = self.begin.max(lo);
        let end = self.end.min(hi);
        (end > begin).then_some(Self { begin, end })
    }

    /// Convert into a sample-index window on the given axis.
    pub fn to_samples(&self, axis: &AxisCalibration) -> SampleWindow {
        SampleWindow { begin: axis.index_of(self.begin), end: axis.index_of(self.end) }
    }
}

/// Half-open window `[begin, end)` in (signed, unclipped) sample indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub begin: isize,
    pub end: isize,
}

/// Result of clipping a [`SampleWindow`] into data bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clipped {
    pub range: Range<usize>,
    pub clipped: bool,
}

impl SampleWindow {
    /// Build a validated index window.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidWindow`] when `end <= begin`.
    pub fn new(name: &'static str, begin: isize, end: isize) -> EpscatResult<Self> {
        let w = Self { begin, end };
        w.validate(name)?;
        Ok(w)
    }

    pub fn validate(&self, name: &'static str) -> EpscatResult<()> {
        if self.end <= self.begin {
            return Err(EpscatError::InvalidWindow {
                name,
                begin: self.begin as f64,
                end: self.end as f64,
                reason: "end must exceed begin",
            });
        }
        Ok(())
    }

    pub fn from_range(range: Range<usize>) -> Self {
        Self { begin: range.start as isize, end: range.end as isize }
    }

    pub fn len(&self) -> usize {
        (self.end - self.begin).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Clip into `[0, extent)`.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidWindow`] when the window is degenerate or lies
    ///   entirely outside the data.
    pub fn clip(&self, name: &'static str, extent: usize) -> EpscatResult<Clipped> {
        self.validate(name)?;
        let begin = self.begin.max(0) as usize;
        let end = (self.end.max(0) as usize).min(extent);
        if begin >= end {
            return Err(EpscatError::InvalidWindow {
                name,
                begin: self.begin as f64,
                end: self.end as f64,
                reason: "window lies outside the data",
            });
        }
        let clipped = self.begin < 0 || self.end as i128 > extent as i128;
        Ok(Clipped { range: begin..end, clipped })
    }
}
