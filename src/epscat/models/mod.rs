//! Curve models fitted to EPSCaT waveforms.
pub mod compound;

pub use self::compound::{CompoundModel, FitSamples};
