//! Free-form annotation map carried alongside a [`Signal`](super::signal::Signal).
//!
//! Analysis stages record their results here (fit coefficients, R², integrals,
//! discrimination lists, amplitudes) so the reporting collaborator can flatten
//! one map into one table row. A key is present only when the stage that owns
//! it actually ran; nothing is zero- or null-filled.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// ---- Well-known keys ------------------------------------------------------

/// Creation timestamp (UTC, serialized as RFC 3339).
pub const KEY_DATETIME: &str = "DateTime";
/// Marker flag set by the extractor.
pub const KEY_EPSCAT: &str = "EPSCaT";
/// Whether the ratio signal was linearly detrended.
pub const KEY_DETRENDED: &str = "Detrended";
/// Baseline (F0) window actually used, in samples.
pub const KEY_F0_RANGE: &str = "F0Range";
/// ROI window actually used, in samples.
pub const KEY_ROI_RANGE: &str = "RoiRange";
/// Scalar resting fluorescence.
pub const KEY_F0: &str = "F0";
/// Nested fit result map.
pub const KEY_FIT: &str = "Fit";
/// Nested discrimination result map.
pub const KEY_DISCRIMINATION: &str = "Discrimination";
/// Per-component amplitudes of the raw waveform.
pub const KEY_AMPLITUDE: &str = "Amplitude";
/// Per-component amplitudes of the fitted curve.
pub const KEY_FIT_AMPLITUDE: &str = "FitAmplitude";
/// Name of the analysed unit.
pub const KEY_UNIT: &str = "Unit";
/// Frame index.
pub const KEY_FRAME: &str = "Frame";
/// Trigger protocol name.
pub const KEY_PROTOCOL: &str = "Protocol";
/// Indicator/reference channel indices.
pub const KEY_CHANNELS: &str = "Channels";
/// Set on a result kept from an earlier run because re-analysis failed.
pub const KEY_STALE: &str = "Stale";

// ---- Keys inside the fit map ----------------------------------------------

pub const KEY_COEFFICIENTS: &str = "Coefficients";
pub const KEY_COEFFICIENT_NAMES: &str = "CoefficientNames";
pub const KEY_RSQ: &str = "Rsq";
pub const KEY_INTEGRATION: &str = "Integration";
pub const KEY_CONVERGED: &str = "Converged";
pub const KEY_STATUS: &str = "Status";

// ---- Keys inside the discrimination map ------------------------------------

pub const KEY_SUCCESS: &str = "success";
pub const KEY_BASE_VALUE: &str = "base_value";
pub const KEY_PEAK_VALUE: &str = "peak_value";
pub const KEY_DISCRIMINANT_VALUE: &str = "discriminant_value";
pub const KEY_DISCR_2D: &str = "Discr_2D";

/// One annotation value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Annotation {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Floats(Vec<f64>),
    Bools(Vec<bool>),
    Texts(Vec<String>),
    Timestamp(DateTime<Utc>),
    List(Vec<Annotation>),
    Map(Annotations),
}

impl From<bool> for Annotation {
    fn from(v: bool) -> Self {
        Annotation::Bool(v)
    }
}

impl From<i64> for Annotation {
    fn from(v: i64) -> Self {
        Annotation::Int(v)
    }
}

impl From<usize> for Annotation {
    fn from(v: usize) -> Self {
        Annotation::Int(v as i64)
    }
}

impl From<f64> for Annotation {
    fn from(v: f64) -> Self {
        Annotation::Float(v)
    }
}

impl From<&str> for Annotation {
    fn from(v: &str) -> Self {
        Annotation::Text(v.to_string())
    }
}

impl From<String> for Annotation {
    fn from(v: String) -> Self {
        Annotation::Text(v)
    }
}

impl From<Vec<f64>> for Annotation {
    fn from(v: Vec<f64>) -> Self {
        Annotation::Floats(v)
    }
}

impl From<Vec<bool>> for Annotation {
    fn from(v: Vec<bool>) -> Self {
        Annotation::Bools(v)
    }
}

impl From<Vec<String>> for Annotation {
    fn from(v: Vec<String>) -> Self {
        Annotation::Texts(v)
    }
}

impl From<DateTime<Utc>> for Annotation {
    fn from(v: DateTime<Utc>) -> Self {
        Annotation::Timestamp(v)
    }
}

impl From<Annotations> for Annotation {
    fn from(v: Annotations) -> Self {
        Annotation::Map(v)
    }
}

impl Annotation {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Annotation::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Annotation::Float(v) => Some(*v),
            Annotation::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Annotation::Floats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bools(&self) -> Option<&[bool]> {
        match self {
            Annotation::Bools(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Annotations> {
        match self {
            Annotation::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Annotation::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Annotation]> {
        match self {
            Annotation::List(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered string-keyed annotation map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, Annotation>);

impl Annotations {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Annotation>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Annotation> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Annotation> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Union with `other`; keys of `other` overwrite existing ones.
    pub fn merge(&mut self, other: Annotations) {
        self.0.extend(other.0);
    }

    /// Stamp [`KEY_DATETIME`] with the current wall-clock time.
    pub fn stamp_now(&mut self) {
        self.insert(KEY_DATETIME, Utc::now());
    }
}
