//! Levenberg–Marquardt solver for two-parameter least squares.
//!
//! In this project we repeatedly solve small nonlinear problems of the form:
//!
//! ```text
//! minimize Σ (y_i - f(t_i; p))^2,   p = [c0, tau]
//! ```
//!
//! Implementation choices:
//! - The parameter dimension is fixed at 2, so the normal equations are
//!   accumulated directly into `nalgebra` 2x2 matrices (no `n x 2` Jacobian is
//!   ever materialised).
//! - Marquardt damping scales the diagonal of `JᵀJ`, which keeps the step
//!   well-behaved when `c0` and `tau` differ by orders of magnitude.
//! - The caller evaluates one observation at a time and may return `None` to
//!   mark a trial point as inadmissible (non-finite, or a forbidden parameter
//!   value). Inadmissible trials are rejected like any step that does not
//!   lower SSE.
//!
//! Stopping rules, checked at the current point before every step so that the
//! damping level never decides convergence:
//! - the residual is orthogonal to both Jacobian columns (`gtol`)
//! - the undamped Gauss-Newton step predicts an SSE reduction below `ftol * SSE`
//! - the undamped Gauss-Newton step is shorter than `xtol` relative to `p`
//!
//! A step is accepted only when it strictly lowers SSE. If the damping grows
//! past `LAMBDA_MAX` without such a step the search has stalled away from any
//! stationary point and the solve fails.

use nalgebra::{Matrix2, Vector2};
use thiserror::Error;

/// Damping past this means no downhill step exists from the current point.
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_MIN: f64 = 1e-12;

/// Floor for diagonal entries of `JᵀJ` when building the damping term.
const DIAG_FLOOR: f64 = 1e-30;

/// `1 - corr(J_c0, J_tau)^2` at or below this is treated as a singular Jacobian.
const SINGULAR_RTOL: f64 = 1e-12;

/// Solver tolerances and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Predicted relative SSE reduction below which the search ends.
    pub ftol: f64,
    /// Relative Gauss-Newton step length below which the search ends.
    pub xtol: f64,
    /// Cosine between the residual and each Jacobian column below which the
    /// search ends.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

/// A converged least-squares solution.
#[derive(Debug, Clone)]
pub struct Solution {
    pub params: Vector2<f64>,
    /// `inv(JᵀJ) * SSE / (n - 2)`, or `+inf` everywhere when `n <= 2`.
    pub covariance: Matrix2<f64>,
    pub sse: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveFailure {
    #[error("no observations")]
    NoData,
    #[error("residuals are not finite at the initial guess")]
    NonFiniteStart,
    #[error("singular Jacobian at the solution")]
    SingularJacobian,
    #[error("maximum number of iterations ({0}) exceeded")]
    IterationCap(usize),
    #[error("no downhill step from the current point")]
    Stagnated,
}

/// Normal-equation terms at one parameter point.
#[derive(Debug, Clone)]
struct Linearization {
    sse: f64,
    jtj: Matrix2<f64>,
    jtr: Vector2<f64>,
}

/// Minimize the sum of squared residuals starting from `p0`.
///
/// `point(p, i)` returns the residual `y_i - f(t_i; p)` and the model gradient
/// `∂f/∂p` for observation `i`, or `None` if `p` is not admissible there.
pub fn levenberg_marquardt<F>(
    n: usize,
    p0: Vector2<f64>,
    point: F,
    opts: &SolverOptions,
) -> Result<Solution, SolveFailure>
where
    F: Fn(&Vector2<f64>, usize) -> Option<(f64, Vector2<f64>)>,
{
    if n == 0 {
        return Err(SolveFailure::NoData);
    }

    let mut p = p0;
    let mut lin = linearize(&point, &p, n).ok_or(SolveFailure::NonFiniteStart)?;
    let mut lambda = opts.initial_lambda;
    let mut iterations = 0;

    while lin.sse > 0.0 {
        if converged(&lin, &p, opts) {
            break;
        }
        if iterations >= opts.max_iterations {
            return Err(SolveFailure::IterationCap(opts.max_iterations));
        }
        iterations += 1;

        let damping = Matrix2::from_diagonal(&lin.jtj.diagonal().map(|d| lambda * d.max(DIAG_FLOOR)));
        let step = (lin.jtj + damping).try_inverse().map(|inv| inv * lin.jtr);

        let accepted = step.and_then(|delta| {
            let candidate = p + delta;
            linearize(&point, &candidate, n)
                .filter(|next| next.sse < lin.sse)
                .map(|next| (candidate, next))
        });

        match accepted {
            Some((candidate, next)) => {
                p = candidate;
                lin = next;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
            }
            None => {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(SolveFailure::Stagnated);
                }
            }
        }
    }

    let covariance = covariance(&lin, n)?;
    Ok(Solution {
        params: p,
        covariance,
        sse: lin.sse,
        iterations,
    })
}

fn linearize<F>(point: &F, p: &Vector2<f64>, n: usize) -> Option<Linearization>
where
    F: Fn(&Vector2<f64>, usize) -> Option<(f64, Vector2<f64>)>,
{
    let mut sse = 0.0;
    let mut jtj = Matrix2::zeros();
    let mut jtr = Vector2::zeros();
    for i in 0..n {
        let (r, g) = point(p, i)?;
        if !(r.is_finite() && g[0].is_finite() && g[1].is_finite()) {
            return None;
        }
        sse += r * r;
        jtj += g * g.transpose();
        jtr += g * r;
    }
    sse.is_finite().then_some(Linearization { sse, jtj, jtr })
}

/// Convergence at `p`, judged from undamped quantities only.
fn converged(lin: &Linearization, p: &Vector2<f64>, opts: &SolverOptions) -> bool {
    let orthogonal = (0..2).all(|i| {
        let scale = (lin.jtj[(i, i)] * lin.sse).sqrt();
        scale == 0.0 || lin.jtr[i].abs() <= opts.gtol * scale
    });
    if orthogonal {
        return true;
    }
    let Some(gn) = gauss_newton_step(&lin.jtj, &lin.jtr) else {
        return false;
    };
    let predicted = lin.jtr.dot(&gn);
    predicted <= opts.ftol * lin.sse || (0..2).all(|i| gn[i].abs() <= opts.xtol * (p[i].abs() + opts.xtol))
}

/// Undamped step `inv(JᵀJ) * Jᵀr`, or `None` when `JᵀJ` is numerically singular.
fn gauss_newton_step(jtj: &Matrix2<f64>, jtr: &Vector2<f64>) -> Option<Vector2<f64>> {
    if is_singular(jtj) {
        return None;
    }
    jtj.try_inverse().map(|inv| inv * jtr)
}

fn is_singular(a: &Matrix2<f64>) -> bool {
    let diag = a[(0, 0)] * a[(1, 1)];
    !(diag > 0.0) || a.determinant() <= SINGULAR_RTOL * diag
}

fn covariance(lin: &Linearization, n: usize) -> Result<Matrix2<f64>, SolveFailure> {
    if is_singular(&lin.jtj) {
        return Err(SolveFailure::SingularJacobian);
    }
    let inv = lin.jtj.try_inverse().ok_or(SolveFailure::SingularJacobian)?;
    if n <= 2 {
        return Ok(Matrix2::from_element(f64::INFINITY));
    }
    Ok(inv * (lin.sse / (n - 2) as f64))
}
