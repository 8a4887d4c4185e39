//! Levenberg-Marquardt solver for ill-conditioned algebraic systems.

use crate::convergence::{deviation, has_converged, should_abort};
use crate::error::SolverResult;
use crate::linear::solve_dense;
use crate::newton::{check_problem, checked_residual};
use crate::options::SolveOptions;
use crate::report::{SolveReport, SolveStatus};
use ns_core::{all_finite, AeModel, StateVec};
use tracing::{debug, warn};

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;

/// Damping escalation after a rejected step. Strictly increasing, so the
/// damping parameter is monotone non-decreasing across consecutive
/// rejections.
fn escalate(lambda: f64) -> f64 {
    lambda * 10.0
}

/// Damping relaxation after an accepted step.
fn relax(lambda: f64) -> f64 {
    (lambda * 0.1).max(LAMBDA_MIN)
}

/// Levenberg-Marquardt for `0 = F(y)`.
///
/// Solves the damped normal equations `(J^T J + lambda I) d = -J^T F` each
/// iteration, increasing `lambda` until a step does not increase the
/// residual norm. Accepted steps therefore never increase the residual;
/// a singular or non-finite trial only escalates damping, and failure is
/// declared when no acceptable step exists within the retry budget.
pub fn lm(model: &impl AeModel, y0: &StateVec, opts: &SolveOptions) -> SolverResult<SolveReport> {
    check_problem(model.dim(), y0, opts)?;

    let dim = model.dim();
    let mut y = y0.data().clone();
    let mut r = checked_residual(model, &y)?;
    let mut lambda = opts.lm_lambda0;
    let mut iterations = 0;

    loop {
        if has_converged(&r, opts.ite_tol) {
            return finish(y0, y, iterations, SolveStatus::Converged, deviation(&r));
        }
        if !all_finite(&r) {
            return finish(y0, y, iterations, SolveStatus::Diverged, f64::NAN);
        }
        if should_abort(iterations, opts.ite_max) {
            warn!(
                iterations,
                residual = deviation(&r),
                "iteration cap reached without convergence"
            );
            return finish(y0, y, iterations, SolveStatus::IterationLimit, deviation(&r));
        }

        let jac = model.jacobian(&y)?;
        jac.check_dims(dim)?;
        if !jac.is_finite() {
            return finish(y0, y, iterations, SolveStatus::Diverged, deviation(&r));
        }
        let j = jac.to_dense();
        let jt = j.transpose();
        let normal = &jt * &j;
        let g = -(&jt * &r);
        let norm = deviation(&r);

        let mut accepted = false;
        let mut saw_non_finite = false;

        for _ in 0..opts.lm_max_retries {
            let mut damped = normal.clone();
            for i in 0..dim {
                damped[(i, i)] += lambda;
            }

            if let Some(d) = solve_dense(damped, &g) {
                let y_try = &y + &d;
                let r_try = checked_residual(model, &y_try)?;
                let norm_try = deviation(&r_try);

                if norm_try.is_finite() && norm_try <= norm {
                    debug!(lambda, residual = norm_try, "LM step accepted");
                    y = y_try;
                    r = r_try;
                    lambda = relax(lambda);
                    accepted = true;
                    break;
                }
                if !norm_try.is_finite() {
                    saw_non_finite = true;
                }
            }

            lambda = escalate(lambda);
            if lambda > LAMBDA_MAX {
                break;
            }
        }

        if !accepted {
            let status = if saw_non_finite {
                SolveStatus::Diverged
            } else {
                SolveStatus::IterationLimit
            };
            warn!(
                iterations,
                lambda,
                residual = norm,
                "LM found no acceptable step"
            );
            return finish(y0, y, iterations, status, norm);
        }

        iterations += 1;
    }
}

fn finish(
    y0: &StateVec,
    y: nalgebra::DVector<f64>,
    iterations: usize,
    status: SolveStatus,
    residual_norm: f64,
) -> SolverResult<SolveReport> {
    Ok(SolveReport {
        y: y0.with_data(y)?,
        iterations,
        status,
        residual_norm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use ns_core::{FnAeModel, Jacobian, StateVec};
    use std::cell::RefCell;

    #[test]
    fn escalation_is_monotone() {
        let mut lambda = 1e-3;
        for _ in 0..10 {
            let next = escalate(lambda);
            assert!(next > lambda);
            lambda = next;
        }
    }

    #[test]
    fn solves_quadratic() {
        let model = FnAeModel::new(
            1,
            |y: &DVector<f64>| Ok(DVector::from_element(1, y[0] * y[0] - 4.0)),
            |y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, 2.0 * y[0]))),
        );
        let report = lm(
            &model,
            &StateVec::from_vec(vec![5.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(report.converged());
        assert_relative_eq!(report.y.data()[0], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn handles_singular_jacobian_at_root() {
        // F(y) = y^2 has a double root at 0: J vanishes at the solution,
        // which breaks plain Newton but is exactly LM territory.
        let model = FnAeModel::new(
            1,
            |y: &DVector<f64>| Ok(DVector::from_element(1, y[0] * y[0])),
            |y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, 2.0 * y[0]))),
        );
        let opts = SolveOptions {
            ite_max: 200,
            ite_tol: 1e-6,
            ..Default::default()
        };
        let report = lm(&model, &StateVec::from_vec(vec![1.0]).unwrap(), &opts).unwrap();
        assert!(report.converged());
        assert!(report.y.data()[0].abs() < 1e-3);
    }

    #[test]
    fn accepted_residuals_never_increase() {
        // Log the residual norm of every accepted iterate through the
        // convergence checks: each outer iteration evaluates the residual
        // at the current accepted point first.
        let accepted_norms = RefCell::new(Vec::new());
        let model = FnAeModel::new(
            2,
            |y: &DVector<f64>| {
                Ok(DVector::from_vec(vec![
                    10.0 * (y[1] - y[0] * y[0]),
                    1.0 - y[0],
                ]))
            },
            |y: &DVector<f64>| {
                Ok(Jacobian::Dense(DMatrix::from_row_slice(
                    2,
                    2,
                    &[-20.0 * y[0], 10.0, -1.0, 0.0],
                )))
            },
        );

        struct Traced<'a, M> {
            inner: &'a M,
            log: &'a RefCell<Vec<f64>>,
        }
        impl<M: ns_core::AeModel> ns_core::AeModel for Traced<'_, M> {
            fn dim(&self) -> usize {
                self.inner.dim()
            }
            fn residual(&self, y: &DVector<f64>) -> ns_core::CoreResult<DVector<f64>> {
                self.inner.residual(y)
            }
            fn jacobian(&self, y: &DVector<f64>) -> ns_core::CoreResult<Jacobian> {
                // A Jacobian evaluation marks the start of an outer
                // iteration at an accepted point.
                let r = self.inner.residual(y)?;
                self.log.borrow_mut().push(ns_core::max_abs(&r));
                self.inner.jacobian(y)
            }
        }

        let traced = Traced {
            inner: &model,
            log: &accepted_norms,
        };
        let report = lm(
            &traced,
            &StateVec::from_vec(vec![-1.2, 1.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(report.converged());

        let norms = accepted_norms.borrow();
        for pair in norms.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12, "residual increased: {pair:?}");
        }
    }

    #[test]
    fn damping_shrinks_rejected_trial_steps() {
        // F(y) = atan(y) from y = 2: the undamped step overshoots badly and
        // raises the residual, so the first outer iteration rejects several
        // trials. Every escalation of the damping must shorten the next
        // trial step taken from the same base point.
        let log = RefCell::new(Vec::new());

        struct Traced<'a> {
            /// (is_jacobian, y) per model evaluation.
            log: &'a RefCell<Vec<(bool, f64)>>,
        }
        impl ns_core::AeModel for Traced<'_> {
            fn dim(&self) -> usize {
                1
            }
            fn residual(&self, y: &DVector<f64>) -> ns_core::CoreResult<DVector<f64>> {
                self.log.borrow_mut().push((false, y[0]));
                Ok(DVector::from_element(1, y[0].atan()))
            }
            fn jacobian(&self, y: &DVector<f64>) -> ns_core::CoreResult<Jacobian> {
                self.log.borrow_mut().push((true, y[0]));
                Ok(Jacobian::Dense(DMatrix::from_element(
                    1,
                    1,
                    1.0 / (1.0 + y[0] * y[0]),
                )))
            }
        }

        let model = Traced { log: &log };
        let report = lm(
            &model,
            &StateVec::from_vec(vec![2.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(report.converged());
        assert!(report.y.data()[0].abs() < 1e-6);

        // Each jacobian evaluation opens an outer iteration at its base
        // point; the residual evaluations that follow are the trial steps
        // of that iteration.
        let log = log.borrow();
        let mut groups: Vec<(f64, Vec<f64>)> = Vec::new();
        for &(is_jacobian, y) in log.iter() {
            if is_jacobian {
                groups.push((y, Vec::new()));
            } else if let Some((base, trials)) = groups.last_mut() {
                trials.push((y - *base).abs());
            }
        }

        assert!(
            groups.iter().any(|(_, trials)| trials.len() > 1),
            "expected at least one rejected trial: {groups:?}"
        );
        for (_, trials) in &groups {
            for pair in trials.windows(2) {
                assert!(pair[1] < pair[0], "trial step grew: {pair:?}");
            }
        }
    }
}
