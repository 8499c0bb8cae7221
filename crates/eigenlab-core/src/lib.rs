//! # EigenLab Core
//!
//! Shared types and utilities for the EigenLab eigenvalue engine.
//!
//! ## Algorithms Built On These Types
//!
//! | Algorithm | Crate | Finds | Fails with |
//! |-----------|-------|-------|------------|
//! | Power iteration | `eigenlab-power` | Dominant eigenpair | zero vector, complex, no convergence |
//! | Inverse power iteration | `eigenlab-power` | Eigenpair closest to a shift | singular shift, complex, no convergence |
//! | Shifted QR with deflation | `eigenlab-qr` | Full spectrum | non-square, no convergence |
//! | Eigenvector recovery | `eigenlab-qr` | Null vector of `A - λI` | shape only |
//!
//! ## Conventions
//!
//! 1. Matrices are dense row-major `ndarray` arrays, borrowed immutably by every algorithm
//! 2. Complex eigenvalues always come in adjacent conjugate pairs, `+im` first
//! 3. No algorithm keeps state between calls

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Dense square matrix
pub type Matrix = Array2<f64>;

/// Dense vector
pub type Vector = Array1<f64>;

/// Components smaller than this are flushed to zero in returned eigenvectors
pub const ZERO_CLEANUP_THRESHOLD: f64 = 1e-10;

/// Common errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EigenError {
    #[error("Matrix must be square, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },

    #[error("Matrix must have at least one row")]
    EmptyMatrix,

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Encountered zero vector at iteration {iteration}")]
    ZeroVectorEncountered { iteration: usize },

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Complex eigenvalue detected: {re} {im:+}i")]
    ComplexEigenvalueDetected { re: f64, im: f64 },

    #[error("Did not converge within {iterations} iterations")]
    DidNotConverge { iterations: usize },

    #[error("Matrix is not symmetric")]
    NotSymmetric,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, EigenError>;

// ============================================================================
// EIGENVALUES
// ============================================================================

/// A single eigenvalue: real, or one half of a complex-conjugate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Eigenvalue {
    Real(f64),
    Complex { re: f64, im: f64 },
}

impl Eigenvalue {
    /// Both members of the conjugate pair `re ± im·i`, positive imaginary part first
    pub fn conjugate_pair(re: f64, im: f64) -> [Eigenvalue; 2] {
        let im = im.abs();
        [
            Eigenvalue::Complex { re, im },
            Eigenvalue::Complex { re, im: -im },
        ]
    }

    pub fn re(&self) -> f64 {
        match *self {
            Self::Real(v) => v,
            Self::Complex { re, .. } => re,
        }
    }

    pub fn im(&self) -> f64 {
        match *self {
            Self::Real(_) => 0.0,
            Self::Complex { im, .. } => im,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Self::Real(_))
    }

    /// Real value, if this eigenvalue has no imaginary part
    pub fn as_real(&self) -> Option<f64> {
        match *self {
            Self::Real(v) => Some(v),
            Self::Complex { .. } => None,
        }
    }

    pub fn to_complex(&self) -> Complex64 {
        Complex64::new(self.re(), self.im())
    }

    /// `(real, imaginary)` form
    pub fn as_tuple(&self) -> (f64, f64) {
        (self.re(), self.im())
    }

    /// Ordering used for spectra: real part ascending, then `|im|`, then `+im` before `-im`.
    /// Conjugates share `re` and `|im|`, so a sorted spectrum keeps pairs adjacent.
    pub fn spectral_cmp(&self, other: &Self) -> Ordering {
        self.re()
            .total_cmp(&other.re())
            .then_with(|| self.im().abs().total_cmp(&other.im().abs()))
            .then_with(|| other.im().total_cmp(&self.im()))
    }
}

impl fmt::Display for Eigenvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Real(v) => write!(f, "{v}"),
            Self::Complex { re, im } if im < 0.0 => write!(f, "{re} - {}i", -im),
            Self::Complex { re, im } => write!(f, "{re} + {im}i"),
        }
    }
}

impl From<Eigenvalue> for Complex64 {
    fn from(value: Eigenvalue) -> Self {
        value.to_complex()
    }
}

/// Sort a spectrum in place with [`Eigenvalue::spectral_cmp`]
pub fn sort_spectrum(eigenvalues: &mut [Eigenvalue]) {
    eigenvalues.sort_by(Eigenvalue::spectral_cmp);
}

/// Eigenvalue with its unit eigenvector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenPair {
    /// Eigenvalue estimate
    pub value: f64,
    /// Unit eigenvector
    pub vector: Vector,
    /// Iterations spent
    pub iterations: usize,
}

impl EigenPair {
    /// Residual norm `‖A·v − λ·v‖`
    pub fn residual(&self, a: &Matrix) -> f64 {
        let r = a.dot(&self.vector) - &self.vector * self.value;
        r.dot(&r).sqrt()
    }
}

// ============================================================================
// SOLVER PARAMETERS
// ============================================================================

/// Shift used by each QR step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStrategy {
    /// Eigenvalue of the trailing 2x2 block closest to the corner entry
    #[default]
    Wilkinson,
    /// Corner entry of the active block
    Rayleigh,
    /// Plain QR iteration
    Unshifted,
}

/// Test deciding when a subdiagonal entry is negligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeflationCriterion {
    /// `|h[k, k-1]| < tol`
    #[default]
    Absolute,
    /// `|h[k, k-1]| < tol * (|h[k, k]| + |h[k-1, k-1]|)`
    Relative,
}

/// Tolerance and budget for the power family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationParams {
    /// Convergence tolerance on successive eigenvalue estimates
    pub tol: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
}

impl Default for IterationParams {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_iterations: 1000,
        }
    }
}

impl IterationParams {
    pub fn validate(&self) -> Result<()> {
        validate_budget(self.tol, self.max_iterations)
    }
}

/// QR algorithm control parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrParams {
    /// Deflation tolerance
    pub tol: f64,
    /// Pass budget shared by every deflation stage
    pub max_iterations: usize,
    /// Shift selection
    pub shift: ShiftStrategy,
    /// Deflation test
    pub deflation: DeflationCriterion,
}

impl Default for QrParams {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_iterations: 1000,
            shift: ShiftStrategy::Wilkinson,
            deflation: DeflationCriterion::Absolute,
        }
    }
}

impl QrParams {
    pub fn validate(&self) -> Result<()> {
        validate_budget(self.tol, self.max_iterations)
    }
}

/// Full engine configuration, as read from a config file
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenConfig {
    pub iteration: IterationParams,
    pub qr: QrParams,
}

fn validate_budget(tol: f64, max_iterations: usize) -> Result<()> {
    if !(tol.is_finite() && tol > 0.0) {
        return Err(EigenError::InvalidParameter(format!(
            "tolerance must be positive and finite, got {tol}"
        )));
    }
    if max_iterations == 0 {
        return Err(EigenError::InvalidParameter(
            "max_iterations must be at least 1".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// SHAPE HELPERS
// ============================================================================

/// Dimension of a square, non-empty matrix
pub fn ensure_square(a: &Matrix) -> Result<usize> {
    let (rows, cols) = a.dim();
    if rows != cols {
        return Err(EigenError::NonSquareMatrix { rows, cols });
    }
    if rows == 0 {
        return Err(EigenError::EmptyMatrix);
    }
    Ok(rows)
}

/// Check a vector has length `n`
pub fn ensure_len(v: &Vector, n: usize) -> Result<()> {
    if v.len() != n {
        return Err(EigenError::DimensionMismatch {
            expected: n,
            found: v.len(),
        });
    }
    Ok(())
}

/// Build a matrix from nested rows (as read from JSON)
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<Matrix> {
    let nrows = rows.len();
    if nrows == 0 {
        return Err(EigenError::EmptyMatrix);
    }
    let ncols = rows[0].len();
    if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
        return Err(EigenError::DimensionMismatch {
            expected: ncols,
            found: bad.len(),
        });
    }
    let data: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((nrows, ncols), data)
        .map_err(|e| EigenError::InvalidParameter(e.to_string()))
}

/// Flush components with magnitude below `threshold` to zero
pub fn clean_small_components(v: &mut Vector, threshold: f64) {
    v.mapv_inplace(|x| if x.abs() < threshold { 0.0 } else { x });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_spectrum_ordering() {
        let mut eigs = vec![Eigenvalue::Real(3.0), Eigenvalue::Real(-1.0)];
        eigs.extend(Eigenvalue::conjugate_pair(1.0, -2.0));
        eigs.push(Eigenvalue::Real(1.0));
        sort_spectrum(&mut eigs);

        assert_eq!(eigs[0], Eigenvalue::Real(-1.0));
        assert_eq!(eigs[1], Eigenvalue::Real(1.0));
        assert_eq!(eigs[2], Eigenvalue::Complex { re: 1.0, im: 2.0 });
        assert_eq!(eigs[3], Eigenvalue::Complex { re: 1.0, im: -2.0 });
        assert_eq!(eigs[4], Eigenvalue::Real(3.0));
    }

    #[test]
    fn test_eigenvalue_accessors() {
        let [plus, minus] = Eigenvalue::conjugate_pair(0.5, 1.5);
        assert_eq!(plus.as_tuple(), (0.5, 1.5));
        assert_eq!(minus.to_complex(), Complex64::new(0.5, -1.5));
        assert!(!plus.is_real());
        assert_eq!(plus.as_real(), None);
        assert_eq!(Eigenvalue::Real(2.0).as_real(), Some(2.0));
        assert_eq!(minus.to_string(), "0.5 - 1.5i");
    }

    #[test]
    fn test_ensure_square() {
        let a = Matrix::zeros((2, 3));
        assert_eq!(
            ensure_square(&a),
            Err(EigenError::NonSquareMatrix { rows: 2, cols: 3 })
        );
        assert_eq!(ensure_square(&Matrix::zeros((0, 0))), Err(EigenError::EmptyMatrix));
        assert_eq!(ensure_square(&Matrix::eye(4)), Ok(4));
    }

    #[test]
    fn test_matrix_from_rows() {
        let a = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(a, array![[1.0, 2.0], [3.0, 4.0]]);

        let ragged = matrix_from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(ragged, Err(EigenError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_clean_small_components() {
        let mut v = array![1e-12, 0.5, -3e-11, -0.25];
        clean_small_components(&mut v, ZERO_CLEANUP_THRESHOLD);
        assert_eq!(v, array![0.0, 0.5, 0.0, -0.25]);
    }

    #[test]
    fn test_params_validation() {
        assert!(IterationParams::default().validate().is_ok());
        let bad = QrParams {
            tol: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(EigenError::InvalidParameter(_))));
        let bad = IterationParams {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let cfg: EigenConfig =
            serde_json::from_str(r#"{"qr": {"shift": "rayleigh", "deflation": "relative"}}"#)
                .unwrap();
        assert_eq!(cfg.qr.shift, ShiftStrategy::Rayleigh);
        assert_eq!(cfg.qr.deflation, DeflationCriterion::Relative);
        approx::assert_relative_eq!(cfg.qr.tol, 1e-8);
        assert_eq!(cfg.iteration.max_iterations, 1000);
    }

    #[test]
    fn test_eigenpair_residual() {
        let a = array![[2.0, 0.0], [0.0, 1.0]];
        let pair = EigenPair {
            value: 2.0,
            vector: array![1.0, 0.0],
            iterations: 1,
        };
        approx::assert_abs_diff_eq!(pair.residual(&a), 0.0);
    }
}
