//! Waveform amplitude over a sample window.
//!
//! Two methods are available:
//! - [`AmplitudeMethod::Direct`]: peak minus trough, `max − min`.
//! - [`AmplitudeMethod::LevelCrossing`]: split the samples at the mid-level
//!   `(max + min)/2` and take the mean of the upper group minus the mean of
//!   the lower group. Less sensitive to single-sample noise spikes.
//!
//! Non-finite samples are ignored; a window without finite samples has a
//! `NaN` amplitude.
use crate::epscat::errors::EpscatError;
use ndarray::{ArrayView1, s};
use serde::Deserialize;
use std::{ops::Range, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum AmplitudeMethod {
    #[default]
    Direct,
    LevelCrossing,
}

impl FromStr for AmplitudeMethod {
    type Err = EpscatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "direct" | "peaktrough" => Ok(AmplitudeMethod::Direct),
            "levelcrossing" | "level" => Ok(AmplitudeMethod::LevelCrossing),
            _ => Err(EpscatError::UnknownName { kind: "amplitude method", name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for AmplitudeMethod {
    type Error = EpscatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl AmplitudeMethod {
    /// Amplitude of `values[window]`; the window is clamped to the data.
    pub fn amplitude(&self, values: ArrayView1<'_, f64>, window: Range<usize>) -> f64 {
        let end = window.end.min(values.len());
        let start = window.start.min(end);
        let v: Vec<f64> =
            values.slice(s![start..end]).iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return f64::NAN;
        }
        let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = v.iter().copied().fold(f64::INFINITY, f64::min);
        match self {
            AmplitudeMethod::Direct => max - min,
            AmplitudeMethod::LevelCrossing => {
                if max == min {
                    return 0.0;
                }
                let mid = 0.5 * (max + min);
                let (hi, lo): (Vec<f64>, Vec<f64>) = v.iter().copied().partition(|&x| x >= mid);
                mean(&hi) - mean(&lo)
            }
        }
    }
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}
