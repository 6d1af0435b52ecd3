//! Discrimination-window policies.
//!
//! Purpose
//! -------
//! Derive the `(baseline, peak)` window pair of every EPSCaT component from
//! one of three sources:
//!
//! - [`WindowChoice::Triggers`]: trigger times of the unit's protocol,
//!   shifted onto the image clock by the imaging delay.
//! - [`WindowChoice::Delays`]: onset parameters `x₀` in component order,
//!   fitted when a fit ran, nominal (initial guess) otherwise.
//! - [`WindowChoice::Cursors`]: each horizontal cursor marks the band
//!   `[position − window/2, position + window/2)`. Cursors are sorted by
//!   position and paired consecutively, `(0, 1), (2, 3), …`, as
//!   `(baseline, peak)`.
//!
//! For the anchored policies an anchor `t` yields the baseline
//! `[t − BaseWindow, t)` and the peak `[t, t + PeakWindow)`. With
//! `first_only` only the earliest pair is kept.
//!
//! Errors
//! ------
//! A policy without its source (no protocol, no triggers, no delays, no
//! cursors or an odd number of them) is [`EpscatError::MissingWindows`]: discrimination never
//! silently skips a unit.
use crate::epscat::{
    core::{
        axes::AxisCalibration,
        protocol::{HorizontalCursor, TriggerProtocol},
        window::Interval,
    },
    discriminate::DiscriminationWindows,
    errors::{EpscatError, EpscatResult},
};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum WindowChoice {
    Triggers,
    #[default]
    Delays,
    Cursors,
}

impl FromStr for WindowChoice {
    type Err = EpscatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triggers" | "trigger" => Ok(WindowChoice::Triggers),
            "delays" | "delay" => Ok(WindowChoice::Delays),
            "cursors" | "cursor" => Ok(WindowChoice::Cursors),
            _ => Err(EpscatError::UnknownName { kind: "window choice", name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for WindowChoice {
    type Error = EpscatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub choice: WindowChoice,
    pub first_only: bool,
    /// Baseline duration before each anchor.
    pub base_window: f64,
    /// Peak duration after each anchor.
    pub peak_window: f64,
}

/// Sources a policy may draw on.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSources<'a> {
    pub protocol: Option<&'a TriggerProtocol>,
    pub delays: Option<&'a [f64]>,
    pub cursors: &'a [HorizontalCursor],
}

impl WindowPolicy {
    /// Resolve the windows in samples of `time`.
    ///
    /// # Errors
    /// - [`EpscatError::MissingWindows`] when the policy's source is absent.
    /// - [`EpscatError::InvalidWindow`] for non-positive window durations.
    pub fn resolve(
        &self, sources: &WindowSources<'_>, time: &AxisCalibration,
    ) -> EpscatResult<Vec<DiscriminationWindows>> {
        let mut windows = match self.choice {
            WindowChoice::Triggers => {
                let protocol = sources.protocol.ok_or_else(|| EpscatError::MissingWindows {
                    reason: "no trigger protocol is associated with this unit and frame".into(),
                })?;
                let anchors = protocol.image_event_times();
                if anchors.is_empty() {
                    return Err(EpscatError::MissingWindows {
                        reason: format!("protocol '{}' has no trigger events", protocol.name),
                    });
                }
                self.anchored(&anchors, time)?
            }
            WindowChoice::Delays => {
                let delays = sources.delays.filter(|d| !d.is_empty()).ok_or_else(|| {
                    EpscatError::MissingWindows { reason: "no model delays are available".into() }
                })?;
                self.anchored(delays, time)?
            }
            WindowChoice::Cursors => cursor_windows(sources.cursors, time)?,
        };
        if self.first_only {
            windows.truncate(1);
        }
        Ok(windows)
    }

    fn anchored(
        &self, anchors: &[f64], time: &AxisCalibration,
    ) -> EpscatResult<Vec<DiscriminationWindows>> {
        anchors
            .iter()
            .map(|&t| {
                let base = Interval::new("discrimination base", t - self.base_window, t)?;
                let peak = Interval::new("discrimination peak", t, t + self.peak_window)?;
                Ok(DiscriminationWindows { base: base.to_samples(time), peak: peak.to_samples(time) })
            })
            .collect()
    }
}

fn cursor_windows(
    cursors: &[HorizontalCursor], time: &AxisCalibration,
) -> EpscatResult<Vec<DiscriminationWindows>> {
    if cursors.is_empty() || cursors.len() % 2 != 0 {
        return Err(EpscatError::MissingWindows {
            reason: format!(
                "cursor mode needs a positive even number of cursors, found {}",
                cursors.len()
            ),
        });
    }
    let mut sorted = cursors.to_vec();
    sorted.sort_by(|a, b| a.position.total_cmp(&b.position));
    sorted
        .chunks_exact(2)
        .map(|pair| {
            let base = pair[0].interval("discrimination base")?;
            let peak = pair[1].interval("discrimination peak")?;
            Ok(DiscriminationWindows { base: base.to_samples(time), peak: peak.to_samples(time) })
        })
        .collect()
}
