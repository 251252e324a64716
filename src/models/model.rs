//! Model evaluation for T1 / T1rho / T2.
//!
//! The fitter relies on two primitive operations:
//! - predict `y(t)` given `(c0, tau)` (for residuals/plots)
//! - the gradient of `y(t)` with respect to `(c0, tau)` (for the solver's Jacobian)
//!
//! These are implemented here for each built-in law. Any other two-parameter
//! curve can be fitted by wrapping a closure in `CurveFn`.

use crate::domain::{RelaxParams, RelaxationModel};

/// Decay law shared by T2 and T1rho.
pub fn decay(t: f64, c0: f64, tau: f64) -> f64 {
    c0 * (-t / tau).exp()
}

/// Recovery law used for T1.
pub fn recovery(t: f64, c0: f64, tau: f64) -> f64 {
    // 1 - exp(-x) computed as -expm1(-x) to keep precision for small t/tau.
    c0 * -(-t / tau).exp_m1()
}

/// A two-parameter curve `(t, c0, tau) -> y` that the batch fitter can calibrate.
pub trait CurveModel {
    fn eval(&self, t: f64, params: RelaxParams) -> f64;

    /// `(dy/dc0, dy/dtau)` at `t`.
    ///
    /// The default is a forward difference; built-in laws override it with the
    /// closed form.
    fn gradient(&self, t: f64, params: RelaxParams) -> [f64; 2] {
        let y = self.eval(t, params);

        let h_c0 = FD_STEP * params.c0.abs().max(1.0);
        let d_c0 = (self.eval(t, RelaxParams::new(params.c0 + h_c0, params.tau)) - y) / h_c0;

        let h_tau = FD_STEP * params.tau.abs().max(1e-6);
        let d_tau = (self.eval(t, RelaxParams::new(params.c0, params.tau + h_tau)) - y) / h_tau;

        [d_c0, d_tau]
    }

    /// Name of the fitted time constant for titles and reports.
    fn tau_name(&self) -> &str {
        "tau"
    }
}

/// Relative step for forward-difference gradients (`sqrt(f64::EPSILON)`).
const FD_STEP: f64 = 1.490_116_119_384_765_6e-8;

impl CurveModel for RelaxationModel {
    fn eval(&self, t: f64, params: RelaxParams) -> f64 {
        predict(*self, t, params)
    }

    fn gradient(&self, t: f64, params: RelaxParams) -> [f64; 2] {
        let RelaxParams { c0, tau } = params;
        let e = (-t / tau).exp();
        let d_tau = c0 * e * t / (tau * tau);
        match self {
            RelaxationModel::T2 | RelaxationModel::T1rho => [e, d_tau],
            RelaxationModel::T1 => [-(-t / tau).exp_m1(), -d_tau],
        }
    }

    fn tau_name(&self) -> &str {
        RelaxationModel::tau_name(*self)
    }
}

/// Predict `y(t)` for the given relaxation law.
pub fn predict(model: RelaxationModel, t: f64, params: RelaxParams) -> f64 {
    match model {
        RelaxationModel::T2 | RelaxationModel::T1rho => decay(t, params.c0, params.tau),
        RelaxationModel::T1 => recovery(t, params.c0, params.tau),
    }
}

/// Adapter that lets any `Fn(t, c0, tau) -> y` closure act as a `CurveModel`.
#[derive(Debug, Clone, Copy)]
pub struct CurveFn<F>(pub F);

impl<F> CurveModel for CurveFn<F>
where
    F: Fn(f64, f64, f64) -> f64,
{
    fn eval(&self, t: f64, params: RelaxParams) -> f64 {
        (self.0)(t, params.c0, params.tau)
    }
}

/// Sample `model` at `n` evenly spaced points over `[x_min, x_max]`.
pub fn sample_curve<M: CurveModel + ?Sized>(
    model: &M,
    params: RelaxParams,
    x_min: f64,
    x_max: f64,
    n: usize,
) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, model.eval(x, params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_and_recovery_closed_forms() {
        let p = RelaxParams::new(100.0, 2.0);
        assert!((predict(RelaxationModel::T2, 0.0, p) - 100.0).abs() < 1e-12);
        assert!((predict(RelaxationModel::T2, 2.0, p) - 100.0 / std::f64::consts::E).abs() < 1e-9);
        assert_eq!(predict(RelaxationModel::T1rho, 3.0, p), predict(RelaxationModel::T2, 3.0, p));
        assert!(predict(RelaxationModel::T1, 0.0, p).abs() < 1e-12);
        assert!((predict(RelaxationModel::T1, 2.0, p) - 100.0 * (1.0 - (-1.0f64).exp())).abs() < 1e-9);
    }

    #[test]
    fn analytic_gradient_matches_forward_difference() {
        let p = RelaxParams::new(850.0, 1.7);
        for model in [RelaxationModel::T1, RelaxationModel::T1rho, RelaxationModel::T2] {
            let numeric = CurveFn(|t, c0, tau| predict(model, t, RelaxParams::new(c0, tau)));
            for &t in &[0.1, 0.5, 2.0, 6.0] {
                let a = model.gradient(t, p);
                let n = numeric.gradient(t, p);
                assert!((a[0] - n[0]).abs() < 1e-5, "{model:?} dc0 at t={t}: {a:?} vs {n:?}");
                assert!((a[1] - n[1]).abs() < 1e-3 * a[1].abs().max(1.0), "{model:?} dtau at t={t}: {a:?} vs {n:?}");
            }
        }
    }

    #[test]
    fn sample_curve_spans_the_interval() {
        let pts = sample_curve(&RelaxationModel::T2, RelaxParams::new(1.0, 1.0), -0.1, 15.5, 50);
        assert_eq!(pts.len(), 50);
        assert!((pts[0].0 + 0.1).abs() < 1e-12);
        assert!((pts[49].0 - 15.5).abs() < 1e-12);
    }
}
