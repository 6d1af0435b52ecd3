//! Trigger protocols and manually placed cursors.
//!
//! A [`TriggerProtocol`] is supplied by the protocol-detection collaborator:
//! it lists electrophysiology event times and the frames it applies to.
//! Event times are on the electrophysiology clock; subtracting
//! `imaging_delay` converts them onto the image time axis.
use crate::epscat::{core::window::Interval, errors::EpscatResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerProtocol {
    pub name: String,
    #[serde(default)]
    pub presynaptic: Vec<f64>,
    #[serde(default)]
    pub postsynaptic: Vec<f64>,
    #[serde(default)]
    pub photostimulation: Vec<f64>,
    #[serde(default, rename = "imagingDelay")]
    pub imaging_delay: f64,
    #[serde(default)]
    frames: Vec<usize>,
}

impl TriggerProtocol {
    pub fn new(name: impl Into<String>, imaging_delay: f64, frames: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            presynaptic: Vec::new(),
            postsynaptic: Vec::new(),
            photostimulation: Vec::new(),
            imaging_delay,
            frames,
        }
    }

    /// Frames this protocol was recorded with.
    pub fn frame_indices(&self) -> &[usize] {
        &self.frames
    }

    pub fn applies_to(&self, frame: usize) -> bool {
        self.frames.contains(&frame)
    }

    /// All trigger times on the image time axis, sorted ascending.
    pub fn image_event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .presynaptic
            .iter()
            .chain(&self.postsynaptic)
            .chain(&self.photostimulation)
            .filter(|t| t.is_finite())
            .map(|t| t - self.imaging_delay)
            .collect();
        times.sort_by(f64::total_cmp);
        times
    }
}

/// A horizontal marker placed on the line-scan image. `position` is a
/// coordinate on the time axis and `window` the width of the band it marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalCursor {
    pub position: f64,
    pub window: f64,
}

impl HorizontalCursor {
    pub fn new(position: f64, window: f64) -> Self {
        Self { position, window }
    }

    /// The band `[position − window/2, position + window/2)`.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidWindow`](crate::epscat::errors::EpscatError::InvalidWindow)
    ///   for a non-positive or non-finite width.
    pub fn interval(&self, name: &'static str) -> EpscatResult<Interval> {
        let half = self.window / 2.0;
        Interval::new(name, self.position - half, self.position + half)
    }
}
