//! Uniformly sampled multi-column signal.
//!
//! Purpose
//! -------
//! Carry one EPSCaT waveform through the pipeline: the extractor creates it
//! with a single column, the fitter appends fitted-curve columns, and the
//! integrator/discriminator annotate it.
//!
//! Invariants
//! ----------
//! - `sampling_period` is finite and strictly positive.
//! - All columns share the same sample count (rows = samples).
//! - Column 0 is always the data column; when fitted, column 1 is the
//!   compound fitted curve and columns `2..` the per-component curves.
//! - Samples that are undefined (before the baseline start, outside the fit
//!   window) hold `NaN`.
use crate::epscat::{
    core::{annotations::Annotations, axes::AxisCalibration},
    errors::{EpscatError, EpscatResult},
};
use ndarray::{Array1, Array2, ArrayView1, Axis, s};

/// Column name of the extracted data.
pub const COLUMN_DATA: &str = "data";
/// Column name of the compound fitted curve.
pub const COLUMN_FIT: &str = "fit";

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Signal name; the orchestrator uses the analysis unit name.
    pub name: String,
    /// Physical units of the values (e.g. `"ΔF/F0"`).
    pub units: String,
    /// Free-form analysis metadata.
    pub annotations: Annotations,
    time: AxisCalibration,
    values: Array2<f64>,
    column_names: Vec<String>,
}

impl Signal {
    /// Create a single-column signal.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidSamplingPeriod`] for a non-positive period.
    pub fn new(
        name: impl Into<String>, data: Array1<f64>, t_start: f64, sampling_period: f64,
        units: impl Into<String>,
    ) -> EpscatResult<Self> {
        let time = AxisCalibration::new(t_start, sampling_period)?;
        let n = data.len();
        let values = data.into_shape((n, 1)).map_err(|_| EpscatError::ColumnLengthMismatch {
            expected: n,
            found: 0,
        })?;
        Ok(Self {
            name: name.into(),
            units: units.into(),
            annotations: Annotations::new(),
            time,
            values,
            column_names: vec![COLUMN_DATA.to_string()],
        })
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn sampling_period(&self) -> f64 {
        self.time.step
    }

    pub fn t_start(&self) -> f64 {
        self.time.origin
    }

    /// End of the signal's time extent (exclusive).
    pub fn t_stop(&self) -> f64 {
        self.time.coordinate(self.n_samples())
    }

    pub fn time_axis(&self) -> AxisCalibration {
        self.time
    }

    /// Sample times `t_start + i·Δt` for every row.
    pub fn times(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n_samples()).map(|i| self.time.coordinate(i)))
    }

    pub fn column(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.n_columns()).then(|| self.values.column(index))
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Append a column of matching length.
    ///
    /// # Errors
    /// - [`EpscatError::ColumnLengthMismatch`] when lengths differ.
    pub fn push_column(&mut self, name: impl Into<String>, column: ArrayView1<'_, f64>) -> EpscatResult<()> {
        if column.len() != self.n_samples() {
            return Err(EpscatError::ColumnLengthMismatch {
                expected: self.n_samples(),
                found: column.len(),
            });
        }
        self.values
            .push_column(column)
            .map_err(|_| EpscatError::ColumnLengthMismatch {
                expected: self.n_samples(),
                found: column.len(),
            })?;
        self.column_names.push(name.into());
        Ok(())
    }

    /// Drop every column except the data column.
    pub fn truncate_to_data(&mut self) {
        self.values = self.values.slice(s![.., 0..1]).to_owned();
        self.column_names.truncate(1);
    }

    /// Copy of the data column.
    pub fn data(&self) -> Array1<f64> {
        self.values.index_axis(Axis(1), 0).to_owned()
    }
}
