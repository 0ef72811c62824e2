// Dense square matrices over chord indices.
//
// A thin wrapper over `nalgebra::DMatrix<f64>`. Entry (to, from) is the
// probability of moving from chord `from` to chord `to`, so a column is the
// outgoing distribution of one chord. nalgebra stores column-major, which
// keeps every column a contiguous slice of the backing storage.
//
// On top of nalgebra's product this adds the stochastic-column helpers the
// power engine needs: drift renormalization and the invariant check.
//
// See also: `power.rs`, which builds on `multiply` and `renormalize_columns`.

use nalgebra::DMatrix;

/// Tolerance for "sums to one" and "is zero" checks.
pub const EPSILON: f64 = 1e-9;

/// Columns whose mass is within this distance of one are treated as
/// stochastic columns that have drifted, and are rescaled to exactly one.
pub const DRIFT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<f64>);

impl Matrix {
    pub fn zeros(size: usize) -> Self {
        Matrix(DMatrix::zeros(size, size))
    }

    pub fn identity(size: usize) -> Self {
        Matrix(DMatrix::identity(size, size))
    }

    /// Build from row-major nested rows (`rows[to][from]`), the way a matrix
    /// is written out on paper. Panics if the rows are not square.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let size = rows.len();
        for (to, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), size, "row {to} is not {size} wide");
        }
        Matrix(DMatrix::from_fn(size, size, |to, from| rows[to][from]))
    }

    pub fn size(&self) -> usize {
        self.0.nrows()
    }

    /// Probability of moving to `to` given the current chord `from`.
    pub fn get(&self, to: usize, from: usize) -> f64 {
        self.0[(to, from)]
    }

    pub fn set(&mut self, to: usize, from: usize, value: f64) {
        self.0[(to, from)] = value;
    }

    /// Outgoing distribution of chord `from`.
    pub fn column(&self, from: usize) -> &[f64] {
        let size = self.size();
        &self.0.as_slice()[from * size..(from + 1) * size]
    }

    pub fn column_sum(&self, from: usize) -> f64 {
        self.0.column(from).sum()
    }

    /// Matrix product `self * other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.size(), other.size(), "multiply: size mismatch");
        Matrix(&self.0 * &other.0)
    }

    /// Rescale every column whose mass has drifted slightly off one back to
    /// exactly one. Zero columns and columns with real mass loss are left
    /// alone.
    pub fn renormalize_columns(&mut self) {
        for mut column in self.0.column_iter_mut() {
            let sum = column.sum();
            if sum > EPSILON && (sum - 1.0).abs() <= DRIFT_TOLERANCE {
                column /= sum;
            }
        }
    }

    /// True if every entry is non-negative and every column sums to one
    /// within `EPSILON` or is entirely zero.
    pub fn is_column_stochastic(&self) -> bool {
        self.first_non_stochastic_column().is_none()
    }

    /// First column that has a negative entry or sums to neither zero nor
    /// one.
    pub fn first_non_stochastic_column(&self) -> Option<usize> {
        self.0.column_iter().position(|column| {
            if column.iter().any(|&v| v < 0.0 || !v.is_finite()) {
                return true;
            }
            let sum = column.sum();
            sum.abs() > EPSILON && (sum - 1.0).abs() > EPSILON
        })
    }

    /// Largest absolute entrywise difference.
    pub fn max_abs_diff(&self, other: &Matrix) -> f64 {
        assert_eq!(self.size(), other.size(), "max_abs_diff: size mismatch");
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}
