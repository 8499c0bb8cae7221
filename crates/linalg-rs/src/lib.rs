//! # EigenLab Linear Algebra
//!
//! Dense primitives consumed by the eigenvalue algorithms:
//! - Gaussian elimination with partial pivoting (`LuFactorization`, `solve_linear_system`)
//! - Orthogonal factorization `A = QR`
//! - Householder reduction to upper-Hessenberg form
//! - Norms, inversion and the complex characteristic determinant `det(A - λI)`
//!
//! QR factorization and complex determinants go through nalgebra; everything the
//! eigenvalue code touches per iteration stays in `ndarray`.

use eigenlab_core::{ensure_square, EigenError, Matrix, Result, Vector};
use log::{debug, trace};
use nalgebra::DMatrix;
use num_complex::Complex64;

/// Pivots below this fraction of the largest matrix entry mark the matrix as singular
pub const SINGULAR_PIVOT_RTOL: f64 = 1e-12;

// ============================================================================
// NORMS
// ============================================================================

/// Euclidean norm
pub fn norm_l2(v: &Vector) -> f64 {
    v.dot(v).sqrt()
}

/// Unit vector in the direction of `v`, or `None` for the zero vector
pub fn normalized(v: &Vector) -> Option<Vector> {
    let norm = norm_l2(v);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v / norm)
}

/// Frobenius norm
pub fn frobenius_norm(a: &Matrix) -> f64 {
    a.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Largest absolute entry
pub fn max_abs(a: &Matrix) -> f64 {
    a.iter().fold(0.0_f64, |m, &x| m.max(x.abs()))
}

/// `A - σI` as a fresh matrix
pub fn shifted(a: &Matrix, sigma: f64) -> Matrix {
    let mut b = a.clone();
    b.diag_mut().mapv_inplace(|d| d - sigma);
    b
}

// ============================================================================
// LU SOLVER
// ============================================================================

/// Row-pivoted LU factorization `PA = LU`, stored packed in one matrix
#[derive(Debug, Clone)]
pub struct LuFactorization {
    lu: Matrix,
    perm: Vec<usize>,
}

impl LuFactorization {
    /// Factor `a` with partial pivoting.
    ///
    /// Fails with `SingularMatrix` when a pivot falls below
    /// `SINGULAR_PIVOT_RTOL * max|a_ij|`.
    pub fn new(a: &Matrix) -> Result<Self> {
        let n = ensure_square(a)?;
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let threshold = SINGULAR_PIVOT_RTOL * max_abs(a);

        for k in 0..n {
            // Pivot
            let mut max_row = k;
            let mut max_val = lu[[k, k]].abs();
            for i in (k + 1)..n {
                if lu[[i, k]].abs() > max_val {
                    max_val = lu[[i, k]].abs();
                    max_row = i;
                }
            }

            if max_val <= threshold || max_val == 0.0 {
                debug!("LU: pivot {max_val:e} in column {k} below {threshold:e}");
                return Err(EigenError::SingularMatrix(format!(
                    "zero pivot in column {k}"
                )));
            }

            if max_row != k {
                for j in 0..n {
                    lu.swap([k, j], [max_row, j]);
                }
                perm.swap(k, max_row);
            }

            // Eliminate, keeping multipliers below the diagonal
            for i in (k + 1)..n {
                let factor = lu[[i, k]] / lu[[k, k]];
                lu[[i, k]] = factor;
                for j in (k + 1)..n {
                    lu[[i, j]] -= factor * lu[[k, j]];
                }
            }
        }

        Ok(Self { lu, perm })
    }

    pub fn dim(&self) -> usize {
        self.perm.len()
    }

    /// Solve `Ax = b` with the stored factors
    pub fn solve(&self, b: &Vector) -> Result<Vector> {
        let n = self.dim();
        if b.len() != n {
            return Err(EigenError::DimensionMismatch {
                expected: n,
                found: b.len(),
            });
        }

        // Forward substitution on the permuted right-hand side (L has unit diagonal)
        let mut y = Vector::zeros(n);
        for i in 0..n {
            let mut sum = b[self.perm[i]];
            for j in 0..i {
                sum -= self.lu[[i, j]] * y[j];
            }
            y[i] = sum;
        }

        // Back substitution
        let mut x = Vector::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum / self.lu[[i, i]];
        }

        Ok(x)
    }

    /// Determinant from the pivots and the permutation parity
    pub fn determinant(&self) -> f64 {
        let n = self.dim();
        let mut det: f64 = (0..n).map(|i| self.lu[[i, i]]).product();
        let mut seen = vec![false; n];
        for start in 0..n {
            if seen[start] {
                continue;
            }
            let mut len = 0;
            let mut i = start;
            while !seen[i] {
                seen[i] = true;
                i = self.perm[i];
                len += 1;
            }
            if len % 2 == 0 {
                det = -det;
            }
        }
        det
    }
}

/// Solve `Ax = b` by Gaussian elimination with partial pivoting
pub fn solve_linear_system(a: &Matrix, b: &Vector) -> Result<Vector> {
    LuFactorization::new(a)?.solve(b)
}

/// Inverse of a nonsingular matrix, one LU solve per column
pub fn invert(a: &Matrix) -> Result<Matrix> {
    let lu = LuFactorization::new(a)?;
    let n = lu.dim();
    let mut inv = Matrix::zeros((n, n));
    for j in 0..n {
        let mut e = Vector::zeros(n);
        e[j] = 1.0;
        let col = lu.solve(&e)?;
        inv.column_mut(j).assign(&col);
    }
    Ok(inv)
}

// ============================================================================
// QR FACTORIZATION
// ============================================================================

pub fn to_dmatrix(a: &Matrix) -> DMatrix<f64> {
    let (rows, cols) = a.dim();
    DMatrix::from_fn(rows, cols, |i, j| a[[i, j]])
}

pub fn from_dmatrix(m: &DMatrix<f64>) -> Matrix {
    Matrix::from_shape_fn(m.shape(), |(i, j)| m[(i, j)])
}

/// Householder QR factorization: returns `(Q, R)` with `Q` orthogonal and `R` upper triangular
pub fn qr_factorize(a: &Matrix) -> (Matrix, Matrix) {
    let qr = to_dmatrix(a).qr();
    (from_dmatrix(&qr.q()), from_dmatrix(&qr.r()))
}

// ============================================================================
// HESSENBERG REDUCTION
// ============================================================================

/// Reduce a square matrix to upper-Hessenberg form `H = QᵀAQ` with Householder reflectors.
///
/// Columns already zero below the subdiagonal are skipped, so Hessenberg (and
/// triangular) input comes back bit-for-bit unchanged.
pub fn to_hessenberg(a: &Matrix) -> Result<Matrix> {
    let n = ensure_square(a)?;
    let mut h = a.clone();

    for k in 0..n.saturating_sub(2) {
        let tail_sq: f64 = ((k + 2)..n).map(|i| h[[i, k]] * h[[i, k]]).sum();
        if tail_sq == 0.0 {
            continue;
        }

        // Householder vector for h[k+1.., k]
        let head = h[[k + 1, k]];
        let alpha = (head * head + tail_sq).sqrt();
        let sign = if head >= 0.0 { 1.0 } else { -1.0 };
        let mut v = Vector::zeros(n - k - 1);
        v[0] = head + sign * alpha;
        for i in (k + 2)..n {
            v[i - k - 1] = h[[i, k]];
        }
        let vv = v.dot(&v);
        if vv == 0.0 {
            continue;
        }

        // Left: rows k+1.. of H
        for j in 0..n {
            let mut s = 0.0;
            for (idx, vi) in v.iter().enumerate() {
                s += vi * h[[k + 1 + idx, j]];
            }
            let f = 2.0 * s / vv;
            for (idx, vi) in v.iter().enumerate() {
                h[[k + 1 + idx, j]] -= f * vi;
            }
        }

        // Right: columns k+1.. of H
        for i in 0..n {
            let mut s = 0.0;
            for (idx, vj) in v.iter().enumerate() {
                s += h[[i, k + 1 + idx]] * vj;
            }
            let f = 2.0 * s / vv;
            for (idx, vj) in v.iter().enumerate() {
                h[[i, k + 1 + idx]] -= f * vj;
            }
        }

        h[[k + 1, k]] = -sign * alpha;
        for i in (k + 2)..n {
            h[[i, k]] = 0.0;
        }
        trace!("hessenberg: reflected column {k}, subdiagonal {:e}", h[[k + 1, k]]);
    }

    Ok(h)
}

/// True when every entry below the first subdiagonal is at most `tol` in magnitude
pub fn is_upper_hessenberg(a: &Matrix, tol: f64) -> bool {
    let (rows, cols) = a.dim();
    (0..rows).all(|i| (0..cols.min(i.saturating_sub(1))).all(|j| a[[i, j]].abs() <= tol))
}

// ============================================================================
// CHARACTERISTIC DETERMINANT
// ============================================================================

/// `det(A - λI)` for a possibly complex `λ`
pub fn characteristic_determinant(a: &Matrix, lambda: Complex64) -> Result<Complex64> {
    let n = ensure_square(a)?;
    let m = DMatrix::<Complex64>::from_fn(n, n, |i, j| {
        let entry = Complex64::new(a[[i, j]], 0.0);
        if i == j {
            entry - lambda
        } else {
            entry
        }
    });
    Ok(m.determinant())
}
