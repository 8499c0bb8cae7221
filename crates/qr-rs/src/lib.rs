//! # EigenLab QR
//!
//! Full-spectrum eigenvalue computation for general real square matrices.
//!
//! This crate provides:
//! - The QR algorithm on a Hessenberg reduction, with Wilkinson, Rayleigh or no shift;
//!   the Wilkinson strategy takes a real double step when the trailing block has a complex pair
//! - Progressive deflation of the active block down to scalars and 2x2 blocks
//! - Eigenvector and eigenspace recovery from `A - λI` by Gaussian elimination
//! - Eigen-decomposition `A = P D P⁻¹` for real, non-defective spectra
//! - Full and reduced singular value decomposition `A = U Σ Vᵀ` through `AᵀA`
//!
//! Reference: Golub, G.H. & Van Loan, C.F. Matrix Computations, ch. 7.

use eigenlab_core::{
    ensure_square, sort_spectrum, DeflationCriterion, EigenError, Eigenvalue, Matrix, QrParams,
    Result, ShiftStrategy, Vector,
};
use eigenlab_linalg::{
    frobenius_norm, invert, max_abs, norm_l2, qr_factorize, shifted, to_hessenberg,
};
use log::{debug, trace, warn};
use ndarray::s;
use serde::{Deserialize, Serialize};

/// Consecutive non-deflating QR steps before an exceptional shift is injected
pub const EXCEPTIONAL_SHIFT_PERIOD: usize = 10;

/// Relative pivot size below which a column of `A - λI` counts as free
pub const NULL_PIVOT_TOL: f64 = 1e-8;

/// Relative distance under which computed eigenvalues are treated as one repeated eigenvalue
pub const CLUSTER_TOL: f64 = 1e-6;

// ============================================================================
// QR ALGORITHM
// ============================================================================

/// Outcome of a QR run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrReport {
    /// Sorted spectrum
    pub eigenvalues: Vec<Eigenvalue>,
    /// Passes through the deflation state machine (the budgeted quantity)
    pub passes: usize,
    /// Passes that performed a QR factor/update step
    pub qr_steps: usize,
}

/// All eigenvalues of `a`, Wilkinson-shifted, absolute deflation tolerance
pub fn qr_eigenvalues(a: &Matrix, tol: f64, max_iterations: usize) -> Result<Vec<Eigenvalue>> {
    let params = QrParams {
        tol,
        max_iterations,
        ..Default::default()
    };
    Ok(qr_eigenvalues_with(a, &params)?.eigenvalues)
}

/// All eigenvalues of `a` by plain (unshifted) QR iteration
pub fn unshifted_qr_eigenvalues(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
) -> Result<Vec<Eigenvalue>> {
    let params = QrParams {
        tol,
        max_iterations,
        shift: ShiftStrategy::Unshifted,
        ..Default::default()
    };
    Ok(qr_eigenvalues_with(a, &params)?.eigenvalues)
}

/// QR algorithm with explicit shift strategy and deflation criterion
pub fn qr_eigenvalues_with(a: &Matrix, params: &QrParams) -> Result<QrReport> {
    let n = ensure_square(a)?;
    params.validate()?;

    let h = to_hessenberg(a)?;
    let mut active = ActiveSubmatrix::new(h, *params);
    let report = active.run()?;
    debug!(
        "QR: {n}x{n} solved in {} passes ({} QR steps)",
        report.passes, report.qr_steps
    );
    Ok(report)
}

/// What a single pass over the active block does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// `m == 1`: the last diagonal entry
    Scalar,
    /// `h[m-1, m-2]` negligible: the corner entry has decoupled
    Corner,
    /// `m == 2`: solve the remaining block analytically
    FinalBlock,
    /// `h[m-2, m-3]` negligible: the trailing 2x2 block has decoupled
    TrailingBlock,
    /// Nothing converged yet: shifted QR step
    QrStep,
}

/// Shift applied by one QR step
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shift {
    /// `H - μI = QR`, `H <- RQ + μI`
    Single(f64),
    /// Both roots of `x² - s·x + t` at once: `H² - sH + tI = QR`, `H <- QᵀHQ`.
    /// Stays real when the roots are a complex pair.
    Double { s: f64, t: f64 },
}

/// Hessenberg buffer whose leading `m x m` block is still unreduced
struct ActiveSubmatrix {
    h: Matrix,
    m: usize,
    params: QrParams,
    eigenvalues: Vec<Eigenvalue>,
    passes: usize,
    qr_steps: usize,
    stalled: usize,
}

impl ActiveSubmatrix {
    fn new(h: Matrix, params: QrParams) -> Self {
        let m = h.nrows();
        Self {
            h,
            m,
            params,
            eigenvalues: Vec::with_capacity(m),
            passes: 0,
            qr_steps: 0,
            stalled: 0,
        }
    }

    fn run(&mut self) -> Result<QrReport> {
        while self.m > 0 {
            if self.passes >= self.params.max_iterations {
                debug!(
                    "QR: budget of {} passes exhausted with {} rows active",
                    self.params.max_iterations, self.m
                );
                return Err(EigenError::DidNotConverge {
                    iterations: self.params.max_iterations,
                });
            }
            self.passes += 1;

            let pass = self.classify();
            trace!("QR pass {}: m = {}, {:?}", self.passes, self.m, pass);
            self.apply(pass);
        }

        let mut eigenvalues = std::mem::take(&mut self.eigenvalues);
        sort_spectrum(&mut eigenvalues);
        Ok(QrReport {
            eigenvalues,
            passes: self.passes,
            qr_steps: self.qr_steps,
        })
    }

    fn classify(&self) -> Pass {
        let m = self.m;
        if m == 1 {
            Pass::Scalar
        } else if self.negligible(m - 1) {
            Pass::Corner
        } else if m == 2 {
            Pass::FinalBlock
        } else if self.negligible(m - 2) {
            Pass::TrailingBlock
        } else {
            Pass::QrStep
        }
    }

    fn apply(&mut self, pass: Pass) {
        let m = self.m;
        match pass {
            Pass::Scalar | Pass::Corner => {
                self.eigenvalues.push(Eigenvalue::Real(self.h[[m - 1, m - 1]]));
                self.deflate(1);
            }
            Pass::FinalBlock | Pass::TrailingBlock => {
                let pair = self.trailing_block_eigenvalues();
                self.eigenvalues.extend(pair);
                self.deflate(2);
            }
            Pass::QrStep => {
                let shift = self.shift();
                trace!("QR step with {shift:?}");
                self.qr_step(shift);
                self.qr_steps += 1;
                self.stalled += 1;
            }
        }
    }

    fn deflate(&mut self, rows: usize) {
        self.m -= rows;
        self.stalled = 0;
        debug!("QR: deflated {rows} row(s), {} remaining", self.m);
    }

    /// Is the subdiagonal entry `h[k, k-1]` small enough to split the block there?
    fn negligible(&self, k: usize) -> bool {
        let sub = self.h[[k, k - 1]].abs();
        match self.params.deflation {
            DeflationCriterion::Absolute => sub < self.params.tol,
            DeflationCriterion::Relative => {
                let mut scale = self.h[[k, k]].abs() + self.h[[k - 1, k - 1]].abs();
                if scale == 0.0 {
                    scale = frobenius_norm(&self.h.slice(s![..self.m, ..self.m]).to_owned());
                }
                sub <= self.params.tol * scale
            }
        }
    }

    /// Entries `(a, b, c, d)` of the trailing 2x2 block of the active matrix
    fn trailing_block(&self) -> (f64, f64, f64, f64) {
        let m = self.m;
        (
            self.h[[m - 2, m - 2]],
            self.h[[m - 2, m - 1]],
            self.h[[m - 1, m - 2]],
            self.h[[m - 1, m - 1]],
        )
    }

    fn trailing_block_eigenvalues(&self) -> [Eigenvalue; 2] {
        let (a, b, c, d) = self.trailing_block();
        block_eigenvalues(a, b, c, d)
    }

    fn shift(&self) -> Shift {
        let m = self.m;
        let corner = self.h[[m - 1, m - 1]];
        if self.params.shift == ShiftStrategy::Unshifted {
            return Shift::Single(0.0);
        }
        if self.stalled > 0 && self.stalled % EXCEPTIONAL_SHIFT_PERIOD == 0 {
            let mu = corner + self.h[[m - 1, m - 2]].abs() + self.h[[m - 2, m - 3]].abs();
            warn!("QR: {} steps without deflation, exceptional shift {mu}", self.stalled);
            return Shift::Single(mu);
        }
        match self.params.shift {
            ShiftStrategy::Rayleigh => Shift::Single(corner),
            _ => {
                let (a, b, c, d) = self.trailing_block();
                match block_eigenvalues(a, b, c, d) {
                    [Eigenvalue::Real(_), _] => Shift::Single(wilkinson_shift(a, b, c, d)),
                    // A single real shift cannot reach a complex pair
                    _ => Shift::Double {
                        s: a + d,
                        t: a * d - b * c,
                    },
                }
            }
        }
    }

    fn qr_step(&mut self, shift: Shift) {
        let m = self.m;
        let h = self.h.slice(s![..m, ..m]).to_owned();
        let mut next = match shift {
            Shift::Single(mu) => {
                let (q, r) = qr_factorize(&shifted(&h, mu));
                let mut next = r.dot(&q);
                next.diag_mut().mapv_inplace(|d| d + mu);
                next
            }
            Shift::Double { s, t } => {
                let mut poly = h.dot(&h) - &(&h * s);
                poly.diag_mut().mapv_inplace(|d| d + t);
                let (q, _) = qr_factorize(&poly);
                q.t().dot(&h).dot(&q)
            }
        };

        // Both updates keep H Hessenberg; drop rounding noise below the subdiagonal
        for i in 2..m {
            for j in 0..(i - 1) {
                next[[i, j]] = 0.0;
            }
        }
        self.h.slice_mut(s![..m, ..m]).assign(&next);
    }
}

/// Eigenvalues of `[[a, b], [c, d]]`.
///
/// The discriminant `(trace/2)^2 - det` is evaluated as `((a - d)/2)^2 + bc`,
/// which avoids cancellation when the diagonal entries are close.
pub fn block_eigenvalues(a: f64, b: f64, c: f64, d: f64) -> [Eigenvalue; 2] {
    let half_trace = 0.5 * (a + d);
    let half_gap = 0.5 * (a - d);
    let disc = half_gap * half_gap + b * c;
    if disc >= 0.0 {
        let root = disc.sqrt();
        [
            Eigenvalue::Real(half_trace - root),
            Eigenvalue::Real(half_trace + root),
        ]
    } else {
        Eigenvalue::conjugate_pair(half_trace, (-disc).sqrt())
    }
}

/// Eigenvalue of `[[a, b], [c, d]]` closest to `d`; the real part when the pair is complex
pub fn wilkinson_shift(a: f64, b: f64, c: f64, d: f64) -> f64 {
    match block_eigenvalues(a, b, c, d) {
        [Eigenvalue::Real(lo), Eigenvalue::Real(hi)] => {
            if (lo - d).abs() <= (hi - d).abs() {
                lo
            } else {
                hi
            }
        }
        [pair, _] => pair.re(),
    }
}

// ============================================================================
// EIGENVECTOR RECOVERY
// ============================================================================

/// Row-echelon form of `A - λI`
struct Echelon {
    m: Matrix,
    /// `(row, column)` of every pivot, in elimination order
    pivots: Vec<(usize, usize)>,
    /// Columns without a usable pivot
    free: Vec<usize>,
}

/// Gaussian elimination with partial pivoting. Columns whose best remaining pivot is
/// at most `pivot_tol * max|M|` become free and do not consume a row.
fn row_echelon(mut m: Matrix, pivot_tol: f64) -> Echelon {
    let n = m.nrows();
    let threshold = pivot_tol * max_abs(&m);
    let mut pivots = Vec::with_capacity(n);
    let mut free = Vec::new();
    let mut row = 0;

    for col in 0..n {
        let mut best_row = row;
        let mut best = 0.0_f64;
        for i in row..n {
            if m[[i, col]].abs() > best {
                best = m[[i, col]].abs();
                best_row = i;
            }
        }

        if best <= threshold {
            free.push(col);
            continue;
        }

        if best_row != row {
            for j in 0..n {
                m.swap([row, j], [best_row, j]);
            }
        }
        for i in (row + 1)..n {
            let factor = m[[i, col]] / m[[row, col]];
            for j in col..n {
                m[[i, j]] -= factor * m[[row, j]];
            }
        }
        pivots.push((row, col));
        row += 1;
    }

    Echelon { m, pivots, free }
}

impl Echelon {
    /// Column of the pivot smallest in magnitude
    fn weakest_pivot(&self) -> Option<usize> {
        self.pivots
            .iter()
            .min_by(|&&(r1, c1), &&(r2, c2)| {
                self.m[[r1, c1]].abs().total_cmp(&self.m[[r2, c2]].abs())
            })
            .map(|&(_, col)| col)
    }
}

/// Solution with `v[free_col] = 1`, other free variables zero, pivot variables back-substituted
fn back_substitute(echelon: &Echelon, free_col: usize) -> Vector {
    let n = echelon.m.nrows();
    let mut v = Vector::zeros(n);
    v[free_col] = 1.0;
    for &(row, col) in echelon.pivots.iter().rev() {
        if col == free_col {
            continue;
        }
        let mut sum = 0.0;
        for j in (col + 1)..n {
            sum += echelon.m[[row, j]] * v[j];
        }
        v[col] = -sum / echelon.m[[row, col]];
    }
    v
}

/// Unit vector with its largest-magnitude component positive, `None` if `v` is degenerate
fn unit_with_sign_convention(mut v: Vector) -> Option<Vector> {
    let norm = norm_l2(&v);
    if !norm.is_finite() || norm < f64::EPSILON {
        return None;
    }
    v /= norm;
    let lead = v
        .iter()
        .copied()
        .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if lead < 0.0 {
        v.mapv_inplace(|x| -x);
    }
    Some(v)
}

/// Unit eigenvector of `a` for the real eigenvalue `lambda`.
///
/// `lambda` is not verified. The first numerically free column of `A - λI` carries the
/// free variable. When no column is degenerate, as happens when `lambda` is only
/// approximate, the column with the smallest pivot is freed and its row dropped from
/// back substitution. A degenerate solution falls back to `e₀`.
pub fn recover_eigenvector(a: &Matrix, lambda: f64) -> Result<Vector> {
    let n = ensure_square(a)?;
    let echelon = row_echelon(shifted(a, lambda), NULL_PIVOT_TOL);
    let free_col = match echelon.free.first() {
        Some(&col) => col,
        None => {
            let col = echelon.weakest_pivot().unwrap_or(n - 1);
            debug!("recovery: A - {lambda}I has full numerical rank, freeing column {col}");
            col
        }
    };

    match unit_with_sign_convention(back_substitute(&echelon, free_col)) {
        Some(v) => Ok(v),
        None => {
            warn!("recovery: degenerate solution for λ = {lambda}, returning e0");
            let mut e0 = Vector::zeros(n);
            e0[0] = 1.0;
            Ok(e0)
        }
    }
}

/// Unit basis of the numerical null space of `A - λI`, one vector per free column.
///
/// Empty when `lambda` is not an eigenvalue at relative pivot tolerance `pivot_tol`.
pub fn recover_eigenspace(a: &Matrix, lambda: f64, pivot_tol: f64) -> Result<Vec<Vector>> {
    ensure_square(a)?;
    let echelon = row_echelon(shifted(a, lambda), pivot_tol);
    Ok(echelon
        .free
        .iter()
        .filter_map(|&col| unit_with_sign_convention(back_substitute(&echelon, col)))
        .collect())
}

// ============================================================================
// EIGEN-DECOMPOSITION
// ============================================================================

/// `A = P D P⁻¹`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenDecomposition {
    /// Eigenvalues, ascending, matching the columns of `vectors`
    pub eigenvalues: Vec<f64>,
    /// `P`: unit eigenvectors as columns
    pub vectors: Matrix,
    /// `D`
    pub diagonal: Matrix,
    /// `P⁻¹`
    pub inverse: Matrix,
}

impl EigenDecomposition {
    /// `P D P⁻¹`
    pub fn reconstruct(&self) -> Matrix {
        self.vectors.dot(&self.diagonal).dot(&self.inverse)
    }
}

/// Eigen-decomposition of a matrix with a real, non-defective spectrum
pub fn eigen_decomposition(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
) -> Result<EigenDecomposition> {
    decompose(a, tol, max_iterations, false)
}

/// Eigen-decomposition of a symmetric matrix with orthonormal `P` (so `P⁻¹ = Pᵀ`)
pub fn symmetric_eigen_decomposition(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
) -> Result<EigenDecomposition> {
    ensure_square(a)?;
    if !is_symmetric(a) {
        return Err(EigenError::NotSymmetric);
    }
    decompose(a, tol, max_iterations, true)
}

/// `|a_ij - a_ji| <= 1e-8 + 1e-5 |a_ji|` for every entry
pub fn is_symmetric(a: &Matrix) -> bool {
    let (rows, cols) = a.dim();
    rows == cols
        && (0..rows).all(|i| {
            (0..i).all(|j| (a[[i, j]] - a[[j, i]]).abs() <= 1e-8 + 1e-5 * a[[j, i]].abs())
        })
}

fn decompose(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
    orthonormal: bool,
) -> Result<EigenDecomposition> {
    let n = ensure_square(a)?;
    let spectrum = qr_eigenvalues(a, tol, max_iterations)?;

    let mut values = Vec::with_capacity(n);
    for e in &spectrum {
        match e.as_real() {
            Some(v) => values.push(v),
            None => {
                return Err(EigenError::ComplexEigenvalueDetected {
                    re: e.re(),
                    im: e.im(),
                })
            }
        }
    }

    let scale = values.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
    let mut vectors = Matrix::zeros((n, n));
    let mut col = 0;
    for cluster in cluster_eigenvalues(&values, CLUSTER_TOL * scale) {
        let k = cluster.len();
        let lambda = cluster.iter().sum::<f64>() / k as f64;

        let mut basis = recover_eigenspace(a, lambda, CLUSTER_TOL)?;
        if basis.len() < k {
            if k == 1 {
                basis = vec![recover_eigenvector(a, lambda)?];
            } else {
                return Err(EigenError::SingularMatrix(format!(
                    "defective matrix: eigenvalue {lambda} has multiplicity {k} \
                     but an eigenspace of dimension {}",
                    basis.len()
                )));
            }
        }
        basis.truncate(k);
        if orthonormal {
            orthonormalize(&mut basis);
        }

        for v in basis {
            vectors.column_mut(col).assign(&v);
            col += 1;
        }
    }

    let inverse = if orthonormal {
        vectors.t().to_owned()
    } else {
        invert(&vectors).map_err(|_| {
            EigenError::SingularMatrix("eigenvectors are linearly dependent".into())
        })?
    };

    Ok(EigenDecomposition {
        diagonal: Matrix::from_diag(&Vector::from(values.clone())),
        eigenvalues: values,
        vectors,
        inverse,
    })
}

/// Split an ascending list into runs whose members lie within `tol` of the run's first value
fn cluster_eigenvalues(values: &[f64], tol: f64) -> Vec<Vec<f64>> {
    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for &v in values {
        match clusters.last_mut() {
            Some(run) if (v - run[0]).abs() <= tol => run.push(v),
            _ => clusters.push(vec![v]),
        }
    }
    clusters
}

/// Modified Gram-Schmidt in place
fn orthonormalize(basis: &mut [Vector]) {
    for i in 0..basis.len() {
        for j in 0..i {
            let proj = basis[i].dot(&basis[j]);
            let prev = basis[j].clone();
            basis[i].scaled_add(-proj, &prev);
        }
        let norm = norm_l2(&basis[i]);
        if norm > f64::EPSILON {
            basis[i] /= norm;
        }
    }
}

// ============================================================================
// SINGULAR VALUE DECOMPOSITION
// ============================================================================

/// Singular values at or below this fraction of the largest are reported as zero
pub const ZERO_SINGULAR_RTOL: f64 = 1e-10;

/// `A = U Σ Vᵀ`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularValueDecomposition {
    /// Left singular vectors as columns
    pub u: Matrix,
    /// `min(rows, cols)` singular values, descending
    pub singular_values: Vec<f64>,
    /// `Σ`, shaped to sit between `U` and `Vᵀ`
    pub sigma: Matrix,
    /// Right singular vectors as rows
    pub vt: Matrix,
}

impl SingularValueDecomposition {
    /// `U Σ Vᵀ`
    pub fn reconstruct(&self) -> Matrix {
        self.u.dot(&self.sigma).dot(&self.vt)
    }

    /// Number of nonzero singular values
    pub fn rank(&self) -> usize {
        self.singular_values.iter().filter(|&&s| s > 0.0).count()
    }
}

/// Full SVD of a `rows x cols` matrix: `U` is `rows x rows`, `Σ` is `rows x cols`, `Vᵀ` is `cols x cols`
pub fn singular_value_decomposition(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
) -> Result<SingularValueDecomposition> {
    svd(a, tol, max_iterations, true)
}

/// Reduced SVD: with `k = min(rows, cols)`, `U` is `rows x k`, `Σ` is `k x k`, `Vᵀ` is `k x cols`
pub fn reduced_singular_value_decomposition(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
) -> Result<SingularValueDecomposition> {
    svd(a, tol, max_iterations, false)
}

/// Right singular vectors come from the symmetric eigen-decomposition of `AᵀA`.
/// Each singular value is `‖A·vᵢ‖` and the matching left vector is `A·vᵢ / σᵢ`;
/// left vectors for zero singular values complete `U` to an orthonormal set.
fn svd(
    a: &Matrix,
    tol: f64,
    max_iterations: usize,
    full: bool,
) -> Result<SingularValueDecomposition> {
    let (rows, cols) = a.dim();
    if rows == 0 || cols == 0 {
        return Err(EigenError::EmptyMatrix);
    }
    let k = rows.min(cols);

    let gram = a.t().dot(a);
    let dec = symmetric_eigen_decomposition(&gram, tol, max_iterations)?;

    let mut pairs: Vec<(f64, Vector, Vector)> = (0..cols)
        .rev()
        .map(|j| {
            let v = dec.vectors.column(j).to_owned();
            let av = a.dot(&v);
            (norm_l2(&av), v, av)
        })
        .collect();
    pairs.sort_by(|x, y| y.0.total_cmp(&x.0));

    let cutoff = ZERO_SINGULAR_RTOL * pairs[0].0;
    let rank = pairs.iter().take_while(|p| p.0 > cutoff).count().min(k);
    debug!("SVD: {rows}x{cols} matrix of numerical rank {rank}");

    let mut left: Vec<Vector> = pairs[..rank].iter().map(|(s, _, av)| av / *s).collect();
    orthonormalize(&mut left);
    complete_orthonormal_basis(&mut left, rows, if full { rows } else { k });

    let singular_values: Vec<f64> = pairs
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, p)| if i < rank { p.0 } else { 0.0 })
        .collect();

    let right_count = if full { cols } else { k };
    let mut vt = Matrix::zeros((right_count, cols));
    for (i, (_, v, _)) in pairs.iter().take(right_count).enumerate() {
        vt.row_mut(i).assign(v);
    }

    let mut u = Matrix::zeros((rows, left.len()));
    for (j, col) in left.iter().enumerate() {
        u.column_mut(j).assign(col);
    }

    let mut sigma = Matrix::zeros((left.len(), right_count));
    for (i, &s) in singular_values.iter().enumerate() {
        sigma[[i, i]] = s;
    }

    Ok(SingularValueDecomposition {
        u,
        singular_values,
        sigma,
        vt,
    })
}

/// Extend an orthonormal set in `dim` dimensions to `target` vectors with
/// orthogonalized standard basis vectors
fn complete_orthonormal_basis(basis: &mut Vec<Vector>, dim: usize, target: usize) {
    for i in 0..dim {
        if basis.len() >= target {
            break;
        }
        let mut w = Vector::zeros(dim);
        w[i] = 1.0;
        // Two Gram-Schmidt sweeps
        for _ in 0..2 {
            for b in basis.iter() {
                let proj = w.dot(b);
                w.scaled_add(-proj, b);
            }
        }
        let norm = norm_l2(&w);
        if norm > 1e-6 {
            basis.push(w / norm);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
