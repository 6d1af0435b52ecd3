//! Core data contracts for EPSCaT analysis.
//!
//! Purpose
//! -------
//! Validated containers shared by every analysis stage: axis calibrations,
//! line-scan images and channel layouts, windows, signals with their
//! annotation maps, model parameters, trigger protocols, analysis units and
//! the diagnostics sink.
//!
//! Conventions
//! -----------
//! - Images are stored `space × time`; signals are stored `samples × columns`.
//! - Windows are half-open and converted to samples by nearest-index rounding.
//! - Undefined samples are `NaN`, never zero.
pub mod annotations;
pub mod axes;
pub mod diagnostics;
pub mod image;
pub mod params;
pub mod protocol;
pub mod signal;
pub mod units;
pub mod validation;
pub mod window;

pub use self::annotations::{Annotation, Annotations};
pub use self::axes::{AxisCalibration, AxisTag};
pub use self::diagnostics::{Diagnostic, Diagnostics};
pub use self::image::{ChannelSource, LineScan};
pub use self::params::{ComponentParams, CompoundParams, default_coefficient_names};
pub use self::protocol::{HorizontalCursor, TriggerProtocol};
pub use self::signal::Signal;
pub use self::units::{AnalysisUnit, Landmark, ResolvedUnit, UnitCatalog, UnitSpec};
pub use self::window::{Interval, SampleWindow};
