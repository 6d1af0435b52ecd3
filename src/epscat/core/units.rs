//! Analysis units: where on the scan line a waveform is extracted.
//!
//! Purpose
//! -------
//! Callers name the unit to analyse in one of four ways (a landmark, a name,
//! a complete analysis unit, or nothing for the whole scan line). This
//! module resolves every form once into a [`ResolvedUnit`], the canonical
//! `(spatial window, protocol)` pair that the rest of the pipeline consumes.
//!
//! Key behaviors
//! -------------
//! - A [`Landmark`] spans `position ± width/2`, using its own width when set
//!   and the configured ROI width otherwise.
//! - An [`AnalysisUnit`] carries an explicit spatial interval and optionally
//!   the name of its protocol.
//! - Names are looked up among analysis units first, then landmarks.
//! - The protocol is the unit's own when named, else the first catalog
//!   protocol whose frame list contains the frame being analysed.
use crate::epscat::{
    core::{axes::AxisCalibration, protocol::TriggerProtocol, window::{Interval, SampleWindow}},
    errors::{EpscatError, EpscatResult},
};
use serde::{Deserialize, Serialize};

/// Name given to the whole-scan-line default unit.
pub const WHOLE_UNIT_NAME: &str = "Whole";

/// A named point on the scan line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub position: f64,
    #[serde(default)]
    pub width: Option<f64>,
}

/// A named spatial interval with an optional protocol binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisUnit {
    pub name: String,
    pub roi: Interval,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// The forms in which a caller may designate a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitSpec {
    Landmark(Landmark),
    Name(String),
    Unit(AnalysisUnit),
    /// The whole scan line.
    Whole,
}

impl UnitSpec {
    /// Name used for logging and failure reports before resolution.
    pub fn label(&self) -> &str {
        match self {
            UnitSpec::Landmark(l) => &l.name,
            UnitSpec::Name(n) => n,
            UnitSpec::Unit(u) => &u.name,
            UnitSpec::Whole => WHOLE_UNIT_NAME,
        }
    }
}

impl From<&str> for UnitSpec {
    fn from(name: &str) -> Self {
        UnitSpec::Name(name.to_string())
    }
}

impl From<Landmark> for UnitSpec {
    fn from(l: Landmark) -> Self {
        UnitSpec::Landmark(l)
    }
}

impl From<AnalysisUnit> for UnitSpec {
    fn from(u: AnalysisUnit) -> Self {
        UnitSpec::Unit(u)
    }
}

/// Canonical unit consumed by the extraction and discrimination stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUnit {
    pub name: String,
    /// Spatial window in samples, not yet clipped to the scan extent.
    pub roi: SampleWindow,
    pub protocol: Option<TriggerProtocol>,
}

/// Named units, landmarks and protocols known for one data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitCatalog {
    #[serde(default)]
    pub units: Vec<AnalysisUnit>,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub protocols: Vec<TriggerProtocol>,
}

impl UnitCatalog {
    /// First protocol associated with `frame`.
    pub fn protocol_for_frame(&self, frame: usize) -> Option<&TriggerProtocol> {
        self.protocols.iter().find(|p| p.applies_to(frame))
    }

    fn protocol_named(&self, name: &str) -> EpscatResult<&TriggerProtocol> {
        self.protocols
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EpscatError::UnknownName { kind: "protocol", name: name.to_string() })
    }

    /// Resolve a unit designation for one frame.
    ///
    /// # Errors
    /// - [`EpscatError::UnknownUnit`] for a name found nowhere in the catalog.
    /// - [`EpscatError::UnknownName`] for an unknown protocol name.
    /// - [`EpscatError::InvalidConfig`] when a landmark has no usable width.
    /// - [`EpscatError::InvalidWindow`] for a degenerate spatial interval.
    pub fn resolve(
        &self, spec: &UnitSpec, frame: usize, space: &AxisCalibration, n_space: usize,
        default_width: Option<f64>,
    ) -> EpscatResult<ResolvedUnit> {
        match spec {
            UnitSpec::Whole => Ok(ResolvedUnit {
                name: WHOLE_UNIT_NAME.to_string(),
                roi: SampleWindow::from_range(0..n_space),
                protocol: self.protocol_for_frame(frame).cloned(),
            }),
            UnitSpec::Landmark(l) => self.resolve_landmark(l, frame, space, default_width),
            UnitSpec::Unit(u) => self.resolve_unit(u, frame, space),
            UnitSpec::Name(name) => {
                if let Some(u) = self.units.iter().find(|u| &u.name == name) {
                    return self.resolve_unit(u, frame, space);
                }
                if let Some(l) = self.landmarks.iter().find(|l| &l.name == name) {
                    return self.resolve_landmark(l, frame, space, default_width);
                }
                Err(EpscatError::UnknownUnit { name: name.clone() })
            }
        }
    }

    fn resolve_landmark(
        &self, landmark: &Landmark, frame: usize, space: &AxisCalibration,
        default_width: Option<f64>,
    ) -> EpscatResult<ResolvedUnit> {
        let width = landmark.width.or(default_width).ok_or_else(|| EpscatError::InvalidConfig {
            key: "Roi.width",
            reason: format!("landmark '{}' has no width and no default ROI width is set", landmark.name),
        })?;
        if !(width.is_finite() && width > 0.0) {
            return Err(EpscatError::InvalidConfig {
                key: "Roi.width",
                reason: format!("width {width} must be finite and > 0"),
            });
        }
        let roi = Interval::new("roi", landmark.position - width / 2.0, landmark.position + width / 2.0)?;
        Ok(ResolvedUnit {
            name: landmark.name.clone(),
            roi: nonempty_samples(&roi, space),
            protocol: self.protocol_for_frame(frame).cloned(),
        })
    }

    fn resolve_unit(
        &self, unit: &AnalysisUnit, frame: usize, space: &AxisCalibration,
    ) -> EpscatResult<ResolvedUnit> {
        unit.roi.validate("roi")?;
        let protocol = match &unit.protocol {
            Some(name) => Some(self.protocol_named(name)?.clone()),
            None => self.protocol_for_frame(frame).cloned(),
        };
        Ok(ResolvedUnit { name: unit.name.clone(), roi: nonempty_samples(&unit.roi, space), protocol })
    }
}

// Narrow intervals that round onto one index still cover one sample.
fn nonempty_samples(interval: &Interval, axis: &AxisCalibration) -> SampleWindow {
    let w = interval.to_samples(axis);
    if w.end <= w.begin {
        SampleWindow { begin: w.begin, end: w.begin + 1 }
    } else {
        w
    }
}
