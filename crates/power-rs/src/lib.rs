//! # EigenLab Power
//!
//! Single-eigenpair iterations:
//! - Power iteration: eigenpair of largest magnitude
//! - Inverse (shifted) power iteration: eigenpair closest to a shift `σ`
//!
//! Both normalize every iterate to unit length, keep the iterate's sign aligned with
//! the previous one, and estimate the eigenvalue with a Rayleigh quotient against the
//! original matrix.
//!
//! Known limitation: when the two largest-magnitude eigenvalues are `λ` and `-λ`,
//! power iteration can oscillate between their eigenvectors. The sign alignment
//! dampens this but does not remove it.
//! Complex detection only runs once the estimate settles. For a generic complex
//! dominant pair it never does, and the call ends in `DidNotConverge` rather than
//! `ComplexEigenvalueDetected`.

use eigenlab_core::{
    clean_small_components, ensure_len, ensure_square, EigenError, EigenPair, IterationParams,
    Matrix, Result, Vector, ZERO_CLEANUP_THRESHOLD,
};
use eigenlab_linalg::{norm_l2, normalized, shifted, LuFactorization};
use eigenlab_qr::{block_eigenvalues, qr_eigenvalues};
use log::{debug, trace};

/// Imaginary parts above this fraction of `max(1, |λ|)` mean the dominant eigenvalue is complex
pub const COMPLEX_DETECTION_RTOL: f64 = 1e-3;

// ============================================================================
// ITERATION STATE
// ============================================================================

/// Current iterate and eigenvalue estimate of a running iteration
#[derive(Debug, Clone)]
struct IterationState {
    x: Vector,
    estimate: Option<f64>,
    iteration: usize,
}

impl IterationState {
    fn new(x: Vector) -> Self {
        Self {
            x,
            estimate: None,
            iteration: 0,
        }
    }

    /// Accept a new iterate; true once the estimate has settled or `x` is an exact eigenvector
    fn advance(&mut self, x: Vector, lambda: f64, residual: f64, tol: f64) -> bool {
        let settled = self
            .estimate
            .map_or(false, |previous| (lambda - previous).abs() < tol);
        trace!(
            "iteration {}: λ = {lambda}, residual = {residual:e}",
            self.iteration
        );
        self.x = x;
        self.estimate = Some(lambda);
        settled || residual < tol
    }

    fn finish(mut self, lambda: f64) -> EigenPair {
        clean_small_components(&mut self.x, ZERO_CLEANUP_THRESHOLD);
        EigenPair {
            value: lambda,
            vector: self.x,
            iterations: self.iteration,
        }
    }
}

/// Normalized starting vector: `x0`, or all ones
fn start_vector(n: usize, x0: Option<&Vector>) -> Result<Vector> {
    let x = match x0 {
        Some(v) => {
            ensure_len(v, n)?;
            v.clone()
        }
        None => Vector::ones(n),
    };
    normalized(&x).ok_or(EigenError::ZeroVectorEncountered { iteration: 0 })
}

fn align_sign(reference: &Vector, v: &mut Vector) {
    if reference.dot(v) < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

// ============================================================================
// POWER ITERATION
// ============================================================================

/// Eigenvalue of largest magnitude and its unit eigenvector.
///
/// `x0` defaults to the all-ones vector. Fails with `ZeroVectorEncountered` when
/// `A` maps an iterate to zero, `ComplexEigenvalueDetected` when the dominant
/// eigenvalue has an imaginary part, and `DidNotConverge` once `max_iterations`
/// iterations pass without the estimate settling to within `tol`.
pub fn power_iteration(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
    x0: Option<&Vector>,
) -> Result<EigenPair> {
    let n = ensure_square(a)?;
    IterationParams {
        tol,
        max_iterations,
    }
    .validate()?;

    let mut state = IterationState::new(start_vector(n, x0)?);
    let mut ax = a.dot(&state.x);

    while state.iteration < max_iterations {
        state.iteration += 1;

        let norm = norm_l2(&ax);
        if norm == 0.0 {
            return Err(EigenError::ZeroVectorEncountered {
                iteration: state.iteration,
            });
        }
        let mut x_new = &ax / norm;
        align_sign(&state.x, &mut x_new);

        // Rayleigh quotient (A·x_old)·x_new
        let lambda = ax.dot(&x_new);
        let ax_new = a.dot(&x_new);
        let residual = norm_l2(&(&ax_new - &(&x_new * lambda)));

        if state.advance(x_new, lambda, residual, tol) {
            let im = imaginary_residual(a, &state.x, &ax_new, lambda);
            if im > COMPLEX_DETECTION_RTOL * lambda.abs().max(1.0) {
                debug!("power iteration: dominant eigenvalue {lambda} ± {im}i is complex");
                return Err(EigenError::ComplexEigenvalueDetected { re: lambda, im });
            }
            debug!(
                "power iteration converged to {lambda} after {} iterations",
                state.iteration
            );
            return Ok(state.finish(lambda));
        }
        ax = ax_new;
    }

    Err(EigenError::DidNotConverge {
        iterations: max_iterations,
    })
}

/// Imaginary part of the eigenvalues of `A` projected onto `span{x, r}`, where `r` is the
/// residual `A·x - λ·x` made orthogonal to `x`.
///
/// Near a real eigenvector the projection is close to triangular and this is zero; when
/// `x` is caught in the invariant plane of a complex pair the projection reproduces that
/// pair.
fn imaginary_residual(a: &Matrix, x: &Vector, ax: &Vector, lambda: f64) -> f64 {
    let mut r = ax - &(x * lambda);
    let along = r.dot(x);
    r.scaled_add(-along, x);
    let r_norm = norm_l2(&r);
    if r_norm <= f64::EPSILON * norm_l2(ax).max(1.0) {
        return 0.0;
    }
    let q = r / r_norm;
    let aq = a.dot(&q);
    let [first, _] = block_eigenvalues(x.dot(ax), x.dot(&aq), q.dot(ax), q.dot(&aq));
    first.im().abs()
}

// ============================================================================
// INVERSE POWER ITERATION
// ============================================================================

/// Eigenvalue of `A` closest to `shift`, with its unit eigenvector.
///
/// Rejects matrices with any non-real eigenvalue up front. `A - σI` is factored once;
/// if `σ` coincides with an eigenvalue the factorization fails with `SingularMatrix`.
pub fn inverse_power_iteration(
    a: &Matrix,
    shift: f64,
    tol: f64,
    max_iterations: usize,
    x0: Option<&Vector>,
) -> Result<EigenPair> {
    let n = ensure_square(a)?;
    IterationParams {
        tol,
        max_iterations,
    }
    .validate()?;
    let x = start_vector(n, x0)?;

    if let Some(e) = qr_eigenvalues(a, tol, max_iterations)?
        .into_iter()
        .find(|e| !e.is_real())
    {
        debug!("inverse power iteration: spectrum contains {e}");
        return Err(EigenError::ComplexEigenvalueDetected {
            re: e.re(),
            im: e.im(),
        });
    }

    let lu = LuFactorization::new(&shifted(a, shift)).map_err(|_| {
        EigenError::SingularMatrix(format!("A - {shift}I is singular; the shift is an eigenvalue"))
    })?;

    let mut state = IterationState::new(x);
    while state.iteration < max_iterations {
        state.iteration += 1;

        let y = lu.solve(&state.x)?;
        let mut y = normalized(&y).ok_or(EigenError::ZeroVectorEncountered {
            iteration: state.iteration,
        })?;
        // An eigenvalue below the shift flips the iterate every step
        align_sign(&state.x, &mut y);

        // Rayleigh quotient against the original matrix
        let ay = a.dot(&y);
        let lambda = state.x.dot(&ay);
        let residual = norm_l2(&(&ay - &(&y * lambda)));

        if state.advance(y, lambda, residual, tol) {
            debug!(
                "inverse power iteration (σ = {shift}) converged to {lambda} after {} iterations",
                state.iteration
            );
            return Ok(state.finish(lambda));
        }
    }

    Err(EigenError::DidNotConverge {
        iterations: max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn diag(values: &[f64]) -> Matrix {
        Matrix::from_diag(&Vector::from(values.to_vec()))
    }

    #[test]
    fn test_power_diagonal() {
        let a = diag(&[1.0, 3.0, 2.0]);
        let pair = power_iteration(&a, 1e-10, 1000, None).unwrap();
        assert_abs_diff_eq!(pair.value, 3.0, epsilon = 1e-8);
        assert_abs_diff_eq!(pair.vector[0], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(pair.vector[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pair.vector[2], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_power_scalar_one_step() {
        let a = array![[5.0]];
        let pair = power_iteration(&a, 1e-8, 1000, None).unwrap();
        assert_eq!(pair.value, 5.0);
        assert_eq!(pair.vector, array![1.0]);
        assert_eq!(pair.iterations, 1);
    }

    #[test]
    fn test_power_zero_matrix() {
        let a = Matrix::zeros((3, 3));
        assert_eq!(
            power_iteration(&a, 1e-8, 1000, None),
            Err(EigenError::ZeroVectorEncountered { iteration: 1 })
        );
    }

    #[test]
    fn test_power_symmetric_eigenpair() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let pair = power_iteration(&a, 1e-12, 1000, Some(&array![1.0, 0.0])).unwrap();
        assert_abs_diff_eq!(pair.value, 3.0, epsilon = 1e-10);
        assert!(pair.residual(&a) < 1e-5);
        assert_abs_diff_eq!(norm_l2(&pair.vector), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_power_negative_dominant() {
        let a = diag(&[-4.0, 1.0, 2.0]);
        let pair = power_iteration(&a, 1e-10, 1000, None).unwrap();
        assert_abs_diff_eq!(pair.value, -4.0, epsilon = 1e-8);
        assert!(pair.residual(&a) < 1e-4);
    }

    #[test]
    fn test_power_nonsymmetric() {
        let a = array![[2.0, 1.0, 0.0], [0.0, 3.0, 1.0], [0.0, 0.0, 6.0]];
        let pair = power_iteration(&a, 1e-12, 1000, None).unwrap();
        assert_abs_diff_eq!(pair.value, 6.0, epsilon = 1e-9);
        assert!(pair.residual(&a) < 1e-6);
    }

    #[test]
    fn test_power_complex_dominant() {
        let rotation = array![[0.0, -1.0], [1.0, 0.0]];
        assert!(matches!(
            power_iteration(&rotation, 1e-8, 1000, None),
            Err(EigenError::ComplexEigenvalueDetected { .. })
        ));

        let a = array![[0.0, -2.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        match power_iteration(&a, 1e-8, 1000, None) {
            Err(EigenError::ComplexEigenvalueDetected { im, .. }) => {
                assert_abs_diff_eq!(im, 2.0, epsilon = 1e-3)
            }
            other => panic!("expected complex eigenvalue, got {other:?}"),
        }
    }

    #[test]
    fn test_power_complex_pair_never_settles() {
        // Eigenvalues 1 ± √5 i; |A·x| depends on the direction of x, so the estimate keeps moving
        let a = array![[1.0, -5.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.5]];
        assert_eq!(
            power_iteration(&a, 1e-10, 1000, None),
            Err(EigenError::DidNotConverge { iterations: 1000 })
        );
    }

    #[test]
    fn test_power_bad_start_vector() {
        let a = Matrix::eye(3);
        assert_eq!(
            power_iteration(&a, 1e-8, 10, Some(&array![1.0, 2.0])),
            Err(EigenError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            power_iteration(&a, 1e-8, 10, Some(&Vector::zeros(3))),
            Err(EigenError::ZeroVectorEncountered { iteration: 0 })
        );
    }

    #[test]
    fn test_power_budget() {
        let a = diag(&[1.0, 0.999, 0.5]);
        assert_eq!(
            power_iteration(&a, 1e-14, 5, None),
            Err(EigenError::DidNotConverge { iterations: 5 })
        );
    }

    #[test]
    fn test_inverse_rotation_rejected() {
        let a = array![[0.0, -1.0], [1.0, 0.0]];
        assert!(matches!(
            inverse_power_iteration(&a, 0.0, 1e-8, 1000, None),
            Err(EigenError::ComplexEigenvalueDetected { .. })
        ));
    }

    #[test]
    fn test_inverse_smallest_eigenvalue() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let pair = inverse_power_iteration(&a, 0.0, 1e-12, 1000, Some(&array![1.0, 0.0])).unwrap();
        assert_abs_diff_eq!(pair.value, 1.0, epsilon = 1e-10);
        let s = 1.0 / 2.0_f64.sqrt();
        assert_abs_diff_eq!(pair.vector[0].abs(), s, epsilon = 1e-5);
        assert_abs_diff_eq!(pair.vector[1].abs(), s, epsilon = 1e-5);
    }

    #[test]
    fn test_inverse_targets_shift() {
        let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 4.0]];
        let expected = [3.0 - 3.0_f64.sqrt(), 3.0, 3.0 + 3.0_f64.sqrt()];
        for (shift, want) in [(1.0, expected[0]), (2.9, expected[1]), (5.0, expected[2])] {
            let pair = inverse_power_iteration(&a, shift, 1e-12, 1000, None).unwrap();
            assert_abs_diff_eq!(pair.value, want, epsilon = 1e-9);
            assert!(pair.residual(&a) < 1e-5);
        }
    }

    #[test]
    fn test_inverse_eigenvalue_below_shift_keeps_sign() {
        let a = diag(&[1.0, 2.0, 3.0]);
        let pair = inverse_power_iteration(&a, 3.2, 1e-12, 1000, None).unwrap();
        assert_abs_diff_eq!(pair.value, 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(pair.vector[2].abs(), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_inverse_budget() {
        // 1 and 3 are almost equally close to the shift; the ratio 0.9998 needs tens of thousands of steps
        let a = diag(&[1.0, 3.0, 5.0]);
        assert_eq!(
            inverse_power_iteration(&a, 2.0001, 1e-14, 3, None),
            Err(EigenError::DidNotConverge { iterations: 3 })
        );
    }

    #[test]
    fn test_inverse_zero_start_vector() {
        let a = diag(&[1.0, 2.0, 3.0]);
        assert_eq!(
            inverse_power_iteration(&a, 0.5, 1e-8, 100, Some(&Vector::zeros(3))),
            Err(EigenError::ZeroVectorEncountered { iteration: 0 })
        );
    }

    #[test]
    fn test_inverse_singular_shift() {
        let a = diag(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            inverse_power_iteration(&a, 2.0, 1e-8, 1000, None),
            Err(EigenError::SingularMatrix(_))
        ));
    }

    #[test]
    fn test_non_square_rejected() {
        let a = Matrix::zeros((2, 3));
        assert_eq!(
            power_iteration(&a, 1e-8, 10, None),
            Err(EigenError::NonSquareMatrix { rows: 2, cols: 3 })
        );
        assert_eq!(
            inverse_power_iteration(&a, 0.0, 1e-8, 10, None),
            Err(EigenError::NonSquareMatrix { rows: 2, cols: 3 })
        );
    }
}
