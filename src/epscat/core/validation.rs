//! Shared validation helpers for EPSCaT inputs.
use crate::epscat::errors::{EpscatError, EpscatResult};

/// Check an indicator/reference channel pair against the channel count.
///
/// # Errors
/// - [`EpscatError::ChannelOutOfRange`] when either index is out of range.
/// - [`EpscatError::IdenticalChannels`] when both indices coincide.
pub fn validate_channel_pair(
    indicator: usize, reference: Option<usize>, count: usize,
) -> EpscatResult<()> {
    if indicator >= count {
        return Err(EpscatError::ChannelOutOfRange { index: indicator, count });
    }
    if let Some(r) = reference {
        if r >= count {
            return Err(EpscatError::ChannelOutOfRange { index: r, count });
        }
        if r == indicator {
            return Err(EpscatError::IdenticalChannels { index: r });
        }
    }
    Ok(())
}

/// Require a finite, strictly positive scalar setting.
pub fn validate_positive(key: &'static str, value: f64) -> EpscatResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EpscatError::InvalidConfig {
            key,
            reason: format!("{value} must be finite and > 0"),
        });
    }
    Ok(())
}

/// Mean of the finite values, or `NaN` when there are none.
pub fn finite_mean<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_pair_rejects_identical_and_out_of_range() {
        assert!(validate_channel_pair(0, Some(1), 2).is_ok());
        assert!(validate_channel_pair(0, None, 1).is_ok());
        assert_eq!(
            validate_channel_pair(1, Some(1), 2),
            Err(EpscatError::IdenticalChannels { index: 1 })
        );
        assert_eq!(
            validate_channel_pair(0, Some(2), 2),
            Err(EpscatError::ChannelOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn finite_mean_skips_nan() {
        assert_eq!(finite_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(finite_mean(&[f64::NAN]).is_nan());
    }
}
