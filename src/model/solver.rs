//! MAP estimation for the linear-in-parameters model.
//!
//! Gaussian priors become ridge penalties, Laplace priors become L1
//! penalties. For a fixed noise scale the ridge coefficients are profiled
//! out, which leaves a small lasso over the Laplace coefficients that is
//! solved by cyclic coordinate descent. The noise scale is then re-estimated
//! from the residuals, and the two steps alternate until it settles.

use tracing::trace;

use crate::error::ModelFitError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Prior {
    Normal { scale: f64 },
    Laplace { scale: f64 },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SolverSettings {
    /// Noise re-estimation passes.
    pub max_iterations: usize,
    /// Relative change of the noise variance that counts as settled.
    pub tolerance: f64,
    /// Coordinate descent sweeps per pass.
    pub max_sweeps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            tolerance: 1e-7,
            max_sweeps: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Estimate {
    pub coefficients: Vec<f64>,
    pub sigma: f64,
    pub iterations: usize,
}

const SIGMA2_FLOOR: f64 = 1e-12;
const SWEEP_TOLERANCE: f64 = 1e-12;
// keeps short histories (more columns than rows) factorable
const RIDGE_JITTER: f64 = 1e-10;

// row-major
pub(crate) struct Design {
    rows: usize,
    cols: usize,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Design {
    pub fn new(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            x: Vec::new(),
            y: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: &[f64], y: f64) {
        debug_assert_eq!(row.len(), self.cols);
        self.x.extend_from_slice(row);
        self.y.push(y);
        self.rows += 1;
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.x[i * self.cols..(i + 1) * self.cols]
    }

    fn gram(&self) -> (Vec<f64>, Vec<f64>) {
        let p = self.cols;
        let mut xtx = vec![0.0; p * p];
        let mut xty = vec![0.0; p];
        for i in 0..self.rows {
            let row = self.row(i);
            let y = self.y[i];
            for a in 0..p {
                xty[a] += row[a] * y;
                for b in a..p {
                    xtx[a * p + b] += row[a] * row[b];
                }
            }
        }
        for a in 0..p {
            for b in 0..a {
                xtx[a * p + b] = xtx[b * p + a];
            }
        }
        (xtx, xty)
    }

    fn residual_sum_of_squares(&self, w: &[f64]) -> f64 {
        (0..self.rows)
            .map(|i| {
                let fitted: f64 = self.row(i).iter().zip(w).map(|(x, w)| x * w).sum();
                (self.y[i] - fitted).powi(2)
            })
            .sum()
    }

    fn variance(&self) -> f64 {
        let n = self.rows as f64;
        let mean = self.y.iter().sum::<f64>() / n;
        self.y.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n
    }
}

/// Maximises the posterior of `y = Xw + noise` under `priors`.
pub(crate) fn fit_map(
    design: &Design,
    priors: &[Prior],
    settings: SolverSettings,
) -> Result<Estimate, ModelFitError> {
    debug_assert_eq!(priors.len(), design.cols);

    let (xtx, xty) = design.gram();
    let ridge: Vec<usize> = (0..priors.len())
        .filter(|&j| matches!(priors[j], Prior::Normal { .. }))
        .collect();
    let lasso: Vec<usize> = (0..priors.len())
        .filter(|&j| matches!(priors[j], Prior::Laplace { .. }))
        .collect();

    let mut sigma2 = design.variance().max(SIGMA2_FLOOR);
    let mut deltas = vec![0.0; lasso.len()];

    for iteration in 1..=settings.max_iterations {
        let w = penalised_solve(&xtx, &xty, priors, &ridge, &lasso, sigma2, &mut deltas, settings)?;
        if w.iter().any(|v| !v.is_finite()) {
            return Err(ModelFitError::Solver("non-finite coefficient".into()));
        }

        let next = (design.residual_sum_of_squares(&w) / design.rows as f64).max(SIGMA2_FLOOR);
        // moves below the floor are numerical noise
        let settled = (next - sigma2).abs() <= settings.tolerance * sigma2 + SIGMA2_FLOOR;
        sigma2 = next;

        if iteration > 1 && settled {
            return Ok(Estimate {
                coefficients: w,
                sigma: sigma2.sqrt(),
                iterations: iteration,
            });
        }
    }

    Err(ModelFitError::NotConverged {
        iterations: settings.max_iterations,
    })
}

/// Minimises `½wᵀ(XᵀX + D)w - wᵀXᵀy + Σ λ|w_L|` for the current noise level.
///
/// `deltas` holds the Laplace coefficients and doubles as the warm start.
#[allow(clippy::too_many_arguments)]
fn penalised_solve(
    xtx: &[f64],
    xty: &[f64],
    priors: &[Prior],
    ridge: &[usize],
    lasso: &[usize],
    sigma2: f64,
    deltas: &mut [f64],
    settings: SolverSettings,
) -> Result<Vec<f64>, ModelFitError> {
    let p = priors.len();
    let (nu, nl) = (ridge.len(), lasso.len());

    let mut a_uu = vec![0.0; nu * nu];
    for (r, &i) in ridge.iter().enumerate() {
        for (c, &j) in ridge.iter().enumerate() {
            a_uu[r * nu + c] = xtx[i * p + j];
        }
        if let Prior::Normal { scale } = priors[i] {
            a_uu[r * nu + r] += sigma2 / (scale * scale) + RIDGE_JITTER;
        }
    }
    let factor = cholesky(a_uu, nu)?;

    // profile out the ridge block: w_u = v - M d
    let b_u: Vec<f64> = ridge.iter().map(|&i| xty[i]).collect();
    let v = cholesky_substitute(&factor, b_u, nu);
    let m: Vec<Vec<f64>> = lasso
        .iter()
        .map(|&l| cholesky_substitute(&factor, ridge.iter().map(|&i| xtx[i * p + l]).collect(), nu))
        .collect();

    // reduced lasso: ½dᵀQd - cᵀd + λ|d|
    let mut q = vec![0.0; nl * nl];
    let mut c = vec![0.0; nl];
    for (r, &i) in lasso.iter().enumerate() {
        let cross: f64 = ridge.iter().zip(&v).map(|(&u, vu)| xtx[i * p + u] * vu).sum();
        c[r] = xty[i] - cross;
        for (k, &j) in lasso.iter().enumerate() {
            let cross: f64 = ridge.iter().zip(&m[k]).map(|(&u, mu)| xtx[i * p + u] * mu).sum();
            q[r * nl + k] = xtx[i * p + j] - cross;
        }
    }
    let lambdas: Vec<f64> = lasso
        .iter()
        .map(|&l| match priors[l] {
            Prior::Laplace { scale } => sigma2 / scale,
            Prior::Normal { .. } => 0.0,
        })
        .collect();

    if nl > 0 {
        let lasso_problem = Lasso {
            q: &q,
            c: &c,
            lambdas: &lambdas,
            n: nl,
        };
        let sweeps = lasso_problem.solve(deltas, settings.max_sweeps);
        if sweeps == settings.max_sweeps {
            trace!(sweeps, "changepoint solve used its whole sweep budget");
        }
    }

    let mut w = vec![0.0; p];
    for (r, &i) in ridge.iter().enumerate() {
        w[i] = v[r] - m.iter().zip(deltas.iter()).map(|(col, d)| col[r] * d).sum::<f64>();
    }
    for (k, &l) in lasso.iter().enumerate() {
        w[l] = deltas[k];
    }
    Ok(w)
}

// min ½dᵀQd - cᵀd + Σ λ_j |d_j|
struct Lasso<'a> {
    q: &'a [f64],
    c: &'a [f64],
    lambdas: &'a [f64],
    n: usize,
}

impl Lasso<'_> {
    // Coordinate descent with an exact finish once the sign pattern is
    // optimal. An exhausted budget keeps the current iterate.
    fn solve(&self, d: &mut [f64], max_sweeps: usize) -> usize {
        let n = self.n;
        let mut tried: Option<Vec<i8>> = None;
        for sweep in 1..=max_sweeps {
            let mut largest = 0.0_f64;
            for j in 0..n {
                let qjj = self.q[j * n + j];
                let updated = if qjj <= f64::EPSILON {
                    0.0
                } else {
                    soft_threshold(self.c[j] - self.cross(j, d), self.lambdas[j]) / qjj
                };
                largest = largest.max((updated - d[j]).abs());
                d[j] = updated;
            }
            if largest < SWEEP_TOLERANCE {
                return sweep;
            }

            let pattern = sign_pattern(d);
            if tried.as_ref() != Some(&pattern) {
                if let Some(exact) = self.active_set_solution(d) {
                    d.copy_from_slice(&exact);
                    return sweep;
                }
                tried = Some(pattern);
            }
        }
        max_sweeps
    }

    fn cross(&self, j: usize, d: &[f64]) -> f64 {
        (0..self.n)
            .filter(|&k| k != j)
            .map(|k| self.q[j * self.n + k] * d[k])
            .sum()
    }

    fn active_set_solution(&self, d: &[f64]) -> Option<Vec<f64>> {
        let n = self.n;
        let active: Vec<usize> = (0..n).filter(|&j| d[j] != 0.0).collect();
        let k = active.len();

        let mut exact = vec![0.0; n];
        if k > 0 {
            let mut sub = vec![0.0; k * k];
            for (r, &i) in active.iter().enumerate() {
                for (s, &j) in active.iter().enumerate() {
                    sub[r * k + s] = self.q[i * n + j];
                }
            }
            let rhs = active
                .iter()
                .map(|&i| self.c[i] - self.lambdas[i] * d[i].signum())
                .collect();
            let factor = cholesky(sub, k).ok()?;
            let x = cholesky_substitute(&factor, rhs, k);
            for (r, &i) in active.iter().enumerate() {
                // sign flip: wrong active set
                if x[r].signum() != d[i].signum() || !x[r].is_finite() {
                    return None;
                }
                exact[i] = x[r];
            }
        }

        // zero coordinates must stay inside their thresholds
        let slack = |j: usize| self.lambdas[j] * (1.0 + 1e-9) + 1e-15;
        let optimal = (0..n)
            .filter(|j| !active.contains(j))
            .all(|j| (self.c[j] - self.cross(j, &exact)).abs() <= slack(j));
        optimal.then_some(exact)
    }
}

fn sign_pattern(d: &[f64]) -> Vec<i8> {
    d.iter()
        .map(|&x| if x > 0.0 { 1 } else if x < 0.0 { -1 } else { 0 })
        .collect()
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}

/// Lower Cholesky factor of a symmetric positive definite `n × n` matrix
/// (row-major). Only the lower triangle of the result is meaningful.
pub(crate) fn cholesky(mut a: Vec<f64>, n: usize) -> Result<Vec<f64>, ModelFitError> {
    for j in 0..n {
        let mut diag = a[j * n + j];
        for k in 0..j {
            diag -= a[j * n + k] * a[j * n + k];
        }
        if !(diag.is_finite() && diag > 0.0) {
            return Err(ModelFitError::Solver(format!(
                "matrix is not positive definite at pivot {j}"
            )));
        }
        let diag = diag.sqrt();
        a[j * n + j] = diag;

        for i in (j + 1)..n {
            let mut v = a[i * n + j];
            for k in 0..j {
                v -= a[i * n + k] * a[j * n + k];
            }
            a[i * n + j] = v / diag;
        }
    }
    Ok(a)
}

// LLᵀx = b
pub(crate) fn cholesky_substitute(l: &[f64], mut b: Vec<f64>, n: usize) -> Vec<f64> {
    for i in 0..n {
        let mut v = b[i];
        for k in 0..i {
            v -= l[i * n + k] * b[k];
        }
        b[i] = v / l[i * n + i];
    }
    for i in (0..n).rev() {
        let mut v = b[i];
        for k in (i + 1)..n {
            v -= l[k * n + i] * b[k];
        }
        b[i] = v / l[i * n + i];
    }
    b
}
