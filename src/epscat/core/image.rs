//! Line-scan image containers and channel layouts.
//!
//! Purpose
//! -------
//! Hold the raw fluorescence data handed over by the image-loading
//! collaborator in one canonical orientation, and resolve channels by index
//! from either supported layout.
//!
//! Key behaviors
//! -------------
//! - [`LineScan`] stores one channel as a `space × time` array together with
//!   the calibration of both axes.
//! - [`LineScan::from_tagged`] accepts a dynamically-shaped array plus axis
//!   tags, rejects anything that is not 2-D or lacks a space/time tag, and
//!   transposes `time × space` input into canonical orientation. It never
//!   reshapes.
//! - [`ChannelSource`] covers both layouts: one stacked multi-channel array,
//!   or a list of single-channel line scans.
//!
//! Invariants & assumptions
//! ------------------------
//! - `data.nrows()` is the spatial extent, `data.ncols()` the temporal one.
//! - Every channel of a [`ChannelSource`] shares the same shape and
//!   calibrations.
use crate::epscat::{
    core::axes::{AxisCalibration, AxisTag},
    errors::{EpscatError, EpscatResult},
};
use ndarray::{Array2, Array3, ArrayD, ArrayView2, Axis, Ix2, Ix3, IxDyn};

/// One channel of a line scan, stored as `space × time`.
#[derive(Debug, Clone, PartialEq)]
pub struct LineScan {
    data: Array2<f64>,
    space: AxisCalibration,
    time: AxisCalibration,
}

impl LineScan {
    /// Wrap an array that is already in `space × time` orientation.
    ///
    /// # Errors
    /// - [`EpscatError::DimensionMismatch`] when either extent is zero.
    pub fn new(
        data: Array2<f64>, space: AxisCalibration, time: AxisCalibration,
    ) -> EpscatResult<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(EpscatError::DimensionMismatch { expected: 2, found: 0 });
        }
        Ok(Self { data, space, time })
    }

    /// Build a line scan from a tagged dynamic array.
    ///
    /// # Errors
    /// - [`EpscatError::DimensionMismatch`] when `data` is not 2-D.
    /// - [`EpscatError::AxisCountMismatch`] when `tags.len() != 2`.
    /// - [`EpscatError::MissingAxis`] when `Space` or `Time` is absent.
    pub fn from_tagged(
        data: ArrayD<f64>, tags: &[AxisTag], space: AxisCalibration, time: AxisCalibration,
    ) -> EpscatResult<Self> {
        if data.ndim() != 2 {
            return Err(EpscatError::DimensionMismatch { expected: 2, found: data.ndim() });
        }
        if tags.len() != 2 {
            return Err(EpscatError::AxisCountMismatch { tags: tags.len(), ndim: 2 });
        }
        let s = axis_position(tags, AxisTag::Space)?;
        let t = axis_position(tags, AxisTag::Time)?;
        let arr = data
            .permuted_axes(IxDyn(&[s, t]))
            .into_dimensionality::<Ix2>()
            .map_err(|_| EpscatError::DimensionMismatch { expected: 2, found: tags.len() })?;
        Self::new(arr.as_standard_layout().to_owned(), space, time)
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn n_space(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_time(&self) -> usize {
        self.data.ncols()
    }

    pub fn space(&self) -> AxisCalibration {
        self.space
    }

    pub fn time(&self) -> AxisCalibration {
        self.time
    }

    /// Shape as `(space, time)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.data.nrows(), self.data.ncols())
    }
}

/// Channel layout of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSource {
    /// One array stacked as `channel × space × time`.
    Stacked { data: Array3<f64>, space: AxisCalibration, time: AxisCalibration },
    /// One single-channel line scan per channel.
    Separate(Vec<LineScan>),
}

impl ChannelSource {
    /// Build a stacked source from a tagged 3-D array.
    ///
    /// # Errors
    /// - [`EpscatError::DimensionMismatch`] when `data` is not 3-D.
    /// - [`EpscatError::MissingAxis`] when a space, time or channel tag is absent.
    pub fn from_tagged_stack(
        data: ArrayD<f64>, tags: &[AxisTag], space: AxisCalibration, time: AxisCalibration,
    ) -> EpscatResult<Self> {
        if data.ndim() != 3 {
            return Err(EpscatError::DimensionMismatch { expected: 3, found: data.ndim() });
        }
        if tags.len() != 3 {
            return Err(EpscatError::AxisCountMismatch { tags: tags.len(), ndim: 3 });
        }
        let c = axis_position(tags, AxisTag::Channel)?;
        let s = axis_position(tags, AxisTag::Space)?;
        let t = axis_position(tags, AxisTag::Time)?;
        let arr = data
            .permuted_axes(IxDyn(&[c, s, t]))
            .into_dimensionality::<Ix3>()
            .map_err(|_| EpscatError::DimensionMismatch { expected: 3, found: tags.len() })?;
        Ok(Self::Stacked { data: arr.as_standard_layout().to_owned(), space, time })
    }

    pub fn n_channels(&self) -> usize {
        match self {
            ChannelSource::Stacked { data, .. } => data.len_of(Axis(0)),
            ChannelSource::Separate(scans) => scans.len(),
        }
    }

    /// Extract channel `index` as a standalone [`LineScan`].
    ///
    /// # Errors
    /// - [`EpscatError::ChannelOutOfRange`] for an invalid index.
    pub fn channel(&self, index: usize) -> EpscatResult<LineScan> {
        let count = self.n_channels();
        if index >= count {
            return Err(EpscatError::ChannelOutOfRange { index, count });
        }
        match self {
            ChannelSource::Stacked { data, space, time } => {
                LineScan::new(data.index_axis(Axis(0), index).to_owned(), *space, *time)
            }
            ChannelSource::Separate(scans) => Ok(scans[index].clone()),
        }
    }
}

fn axis_position(tags: &[AxisTag], wanted: AxisTag) -> EpscatResult<usize> {
    tags.iter()
        .position(|&t| t == wanted)
        .ok_or_else(|| EpscatError::MissingAxis { missing: wanted, tags: tags.to_vec() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, array};

    fn cal() -> (AxisCalibration, AxisCalibration) {
        (AxisCalibration::index(), AxisCalibration::new(0.0, 0.01).expect("valid"))
    }

    #[test]
    // Purpose
    // -------
    // `time × space` input is transposed (not reshaped) into canonical order.
    fn from_tagged_transposes_time_major_input() {
        let (space, time) = cal();
        let raw = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn(); // 3 time × 2 space
        let scan = LineScan::from_tagged(raw, &[AxisTag::Time, AxisTag::Space], space, time)
            .expect("valid tags");

        assert_eq!(scan.shape(), (2, 3));
        assert_eq!(scan.data()[[0, 2]], 5.0);
        assert_eq!(scan.data()[[1, 0]], 2.0);
    }

    #[test]
    fn from_tagged_rejects_wrong_dimensionality_and_missing_tags() {
        let (space, time) = cal();
        let cube = Array::<f64, _>::zeros((2, 2, 2)).into_dyn();
        assert!(matches!(
            LineScan::from_tagged(cube, &[AxisTag::Space, AxisTag::Time], space, time),
            Err(EpscatError::DimensionMismatch { expected: 2, found: 3 })
        ));

        let flat = Array::<f64, _>::zeros((2, 2)).into_dyn();
        assert!(matches!(
            LineScan::from_tagged(flat, &[AxisTag::Space, AxisTag::Channel], space, time),
            Err(EpscatError::MissingAxis { missing: AxisTag::Time, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Both channel layouts resolve the same channel content by index.
    fn stacked_and_separate_layouts_agree() {
        let (space, time) = cal();
        let ch0 = array![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        let ch1 = array![[7.0, 8.0, 9.0], [7.0, 8.0, 9.0]];
        let stacked = ndarray::stack(Axis(0), &[ch0.view(), ch1.view()]).expect("same shape");
        let source = ChannelSource::from_tagged_stack(
            stacked.into_dyn(),
            &[AxisTag::Channel, AxisTag::Space, AxisTag::Time],
            space,
            time,
        )
        .expect("valid stack");
        let separate = ChannelSource::Separate(vec![
            LineScan::new(ch0, space, time).expect("valid"),
            LineScan::new(ch1, space, time).expect("valid"),
        ]);

        assert_eq!(source.n_channels(), 2);
        assert_eq!(source.channel(1).expect("in range"), separate.channel(1).expect("in range"));
        assert!(matches!(
            separate.channel(2),
            Err(EpscatError::ChannelOutOfRange { index: 2, count: 2 })
        ));
    }
}
