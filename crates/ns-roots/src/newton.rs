//! Shared Newton iteration core and the NR-family entry points.

use crate::convergence::{deviation, has_converged, should_abort};
use crate::error::{SolverError, SolverResult};
use crate::linear::solve_jacobian;
use crate::options::SolveOptions;
use crate::report::{SolveReport, SolveStatus};
use nalgebra::DVector;
use ns_core::{all_finite, AeModel, StateVec};
use tracing::warn;

/// Correction-step strategy shared by the Newton-type solvers.
pub(crate) enum Correction {
    /// Full Newton step `y <- y - J^-1 F`.
    Plain,
    /// One RK4 step of pseudo-time `dtau` along the Newton flow
    /// `dy/dtau = -J^-1 F` (Davidenko continuation).
    Continuation { dtau: f64 },
}

/// Plain Newton-Raphson for `0 = F(y)`.
///
/// On reaching `ite_max` without convergence the last iterate is returned
/// with [`SolveStatus::IterationLimit`]; treating that as an error is the
/// caller's decision.
pub fn nr_method(
    model: &impl AeModel,
    y0: &StateVec,
    opts: &SolveOptions,
) -> SolverResult<SolveReport> {
    newton_iterate(model, y0, opts, Correction::Plain)
}

/// Continuous (pseudo-transient) Newton-Raphson.
///
/// Relaxes the correction into pseudo-time steps of size `opts.dtau`,
/// trading iteration count for robustness on poorly conditioned systems.
/// Converges to the same fixed point as [`nr_method`] when it converges.
pub fn continuous_nr(
    model: &impl AeModel,
    y0: &StateVec,
    opts: &SolveOptions,
) -> SolverResult<SolveReport> {
    newton_iterate(model, y0, opts, Correction::Continuation { dtau: opts.dtau })
}

/// Validate options and the y0/model dimension agreement.
pub(crate) fn check_problem(
    dim: usize,
    y0: &StateVec,
    opts: &SolveOptions,
) -> SolverResult<()> {
    opts.validate()?;
    if y0.len() != dim {
        return Err(SolverError::Dimension {
            what: "initial state",
            expected: dim,
            got: y0.len(),
        });
    }
    Ok(())
}

/// Evaluate the residual, enforcing the y/F dimension invariant.
pub(crate) fn checked_residual(
    model: &impl AeModel,
    y: &DVector<f64>,
) -> SolverResult<DVector<f64>> {
    let r = model.residual(y)?;
    if r.len() != model.dim() {
        return Err(SolverError::Dimension {
            what: "residual",
            expected: model.dim(),
            got: r.len(),
        });
    }
    Ok(r)
}

/// Newton direction `-J^-1 F` at `y`; `None` on a non-finite evaluation or
/// a singular Jacobian (a divergence outcome, not a fatal error).
fn newton_direction(
    model: &impl AeModel,
    y: &DVector<f64>,
) -> SolverResult<Option<DVector<f64>>> {
    let r = checked_residual(model, y)?;
    if !all_finite(&r) {
        return Ok(None);
    }
    let jac = model.jacobian(y)?;
    jac.check_dims(model.dim())?;
    if !jac.is_finite() {
        return Ok(None);
    }
    Ok(solve_jacobian(&jac, &(-r)))
}

pub(crate) fn newton_iterate(
    model: &impl AeModel,
    y0: &StateVec,
    opts: &SolveOptions,
    correction: Correction,
) -> SolverResult<SolveReport> {
    check_problem(model.dim(), y0, opts)?;
    let outcome = iterate_raw(model, y0.data(), opts, correction)?;
    Ok(SolveReport {
        y: y0.with_data(outcome.y)?,
        iterations: outcome.iterations,
        status: outcome.status,
        residual_norm: outcome.residual_norm,
    })
}

/// Flat-vector result of [`nr_raw`], for callers (the time integrators)
/// that manage their own variable layout.
#[derive(Debug, Clone)]
pub struct IterateOutcome {
    pub y: DVector<f64>,
    pub iterations: usize,
    pub status: SolveStatus,
    pub residual_norm: f64,
}

/// Plain Newton-Raphson on a flat vector, without layout bookkeeping.
///
/// Options are validated and the y0/model dimensions checked exactly as in
/// [`nr_method`].
pub fn nr_raw(
    model: &impl AeModel,
    y0: &DVector<f64>,
    opts: &SolveOptions,
) -> SolverResult<IterateOutcome> {
    opts.validate()?;
    if y0.len() != model.dim() {
        return Err(SolverError::Dimension {
            what: "initial state",
            expected: model.dim(),
            got: y0.len(),
        });
    }
    iterate_raw(model, y0, opts, Correction::Plain)
}

fn iterate_raw(
    model: &impl AeModel,
    y0: &DVector<f64>,
    opts: &SolveOptions,
    correction: Correction,
) -> SolverResult<IterateOutcome> {
    let mut y = y0.clone();
    let mut r = checked_residual(model, &y)?;
    let mut iterations = 0;

    loop {
        // Convergence is tested before any correction, so an exact-root
        // start returns zero iterations and ite_max = 0 returns at once.
        if has_converged(&r, opts.ite_tol) {
            return Ok(outcome(y, iterations, SolveStatus::Converged, &r));
        }
        if !all_finite(&r) {
            return Ok(outcome(y, iterations, SolveStatus::Diverged, &r));
        }
        if should_abort(iterations, opts.ite_max) {
            warn!(
                iterations,
                residual = deviation(&r),
                "iteration cap reached without convergence"
            );
            return Ok(outcome(y, iterations, SolveStatus::IterationLimit, &r));
        }

        match correction {
            Correction::Plain => {
                let Some(dy) = newton_direction(model, &y)? else {
                    return Ok(outcome(y, iterations, SolveStatus::Diverged, &r));
                };
                y += dy;
            }
            Correction::Continuation { dtau } => {
                let Some(k1) = newton_direction(model, &y)? else {
                    return Ok(outcome(y, iterations, SolveStatus::Diverged, &r));
                };
                let Some(k2) = newton_direction(model, &(&y + 0.5 * dtau * &k1))? else {
                    return Ok(outcome(y, iterations, SolveStatus::Diverged, &r));
                };
                let Some(k3) = newton_direction(model, &(&y + 0.5 * dtau * &k2))? else {
                    return Ok(outcome(y, iterations, SolveStatus::Diverged, &r));
                };
                let Some(k4) = newton_direction(model, &(&y + dtau * &k3))? else {
                    return Ok(outcome(y, iterations, SolveStatus::Diverged, &r));
                };
                y += (dtau / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
            }
        }

        iterations += 1;
        r = checked_residual(model, &y)?;
    }
}

fn outcome(
    y: DVector<f64>,
    iterations: usize,
    status: SolveStatus,
    r: &DVector<f64>,
) -> IterateOutcome {
    IterateOutcome {
        y,
        iterations,
        status,
        residual_norm: deviation(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use ns_core::{CoreResult, FnAeModel, Jacobian};

    fn quadratic() -> impl AeModel {
        // y^2 - 4 = 0
        FnAeModel::new(
            1,
            |y: &DVector<f64>| Ok(DVector::from_element(1, y[0] * y[0] - 4.0)),
            |y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, 2.0 * y[0]))),
        )
    }

    fn linear_2x2() -> impl AeModel {
        // A y - b with A = [2 1; 1 3], b = [5; 10]
        FnAeModel::new(
            2,
            |y: &DVector<f64>| {
                Ok(DVector::from_vec(vec![
                    2.0 * y[0] + y[1] - 5.0,
                    y[0] + 3.0 * y[1] - 10.0,
                ]))
            },
            |_y: &DVector<f64>| {
                Ok(Jacobian::Dense(DMatrix::from_row_slice(
                    2,
                    2,
                    &[2.0, 1.0, 1.0, 3.0],
                )))
            },
        )
    }

    #[test]
    fn nr_converges_on_quadratic() {
        let report = nr_method(
            &quadratic(),
            &StateVec::from_vec(vec![3.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(report.converged());
        assert_relative_eq!(report.y.data()[0], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn nr_linear_system_in_one_iteration() {
        // Exact solution y = [1; 3]; Newton is exact for linear residuals.
        let report = nr_method(
            &linear_2x2(),
            &StateVec::from_vec(vec![100.0, -40.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(report.converged());
        assert_eq!(report.iterations, 1);
        assert_relative_eq!(report.y.data()[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(report.y.data()[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn exact_root_start_takes_zero_iterations() {
        let report = nr_method(
            &quadratic(),
            &StateVec::from_vec(vec![2.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert!(report.converged());
        assert_eq!(report.iterations, 0);
        assert!(report.residual_norm <= 1e-8);
    }

    #[test]
    fn ite_max_zero_returns_immediately() {
        let opts = SolveOptions {
            ite_max: 0,
            ..Default::default()
        };
        let report = nr_method(&quadratic(), &StateVec::from_vec(vec![3.0]).unwrap(), &opts)
            .unwrap();
        assert!(!report.converged());
        assert_eq!(report.status, SolveStatus::IterationLimit);
        assert_eq!(report.iterations, 0);
        // The initial iterate comes back untouched.
        assert_eq!(report.y.data()[0], 3.0);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let err = nr_method(
            &quadratic(),
            &StateVec::from_vec(vec![1.0, 2.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::Dimension { .. }));
    }

    #[test]
    fn nan_residual_reports_divergence() {
        let model = FnAeModel::new(
            1,
            |y: &DVector<f64>| -> CoreResult<DVector<f64>> {
                Ok(DVector::from_element(1, (y[0] - 2.0).sqrt()))
            },
            |y: &DVector<f64>| {
                Ok(Jacobian::Dense(DMatrix::from_element(
                    1,
                    1,
                    0.5 / (y[0] - 2.0).sqrt(),
                )))
            },
        );
        // Starting left of 2.0 makes the residual NaN immediately.
        let report = nr_method(
            &model,
            &StateVec::from_vec(vec![0.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert_eq!(report.status, SolveStatus::Diverged);
    }

    #[test]
    fn singular_jacobian_reports_divergence() {
        let model = FnAeModel::new(
            1,
            |y: &DVector<f64>| Ok(DVector::from_element(1, y[0] * y[0] + 1.0)),
            |_y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, 0.0))),
        );
        let report = nr_method(
            &model,
            &StateVec::from_vec(vec![1.0]).unwrap(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert_eq!(report.status, SolveStatus::Diverged);
    }

    #[test]
    fn continuous_nr_reaches_same_root() {
        let opts = SolveOptions {
            ite_max: 500,
            dtau: 0.5,
            ..Default::default()
        };
        let report = continuous_nr(
            &quadratic(),
            &StateVec::from_vec(vec![10.0]).unwrap(),
            &opts,
        )
        .unwrap();
        assert!(report.converged());
        assert_relative_eq!(report.y.data()[0], 2.0, epsilon = 1e-7);
    }

    #[test]
    fn idempotent_across_repeated_calls() {
        let y0 = StateVec::from_vec(vec![3.7]).unwrap();
        let opts = SolveOptions::default();
        let a = nr_method(&quadratic(), &y0, &opts).unwrap();
        let b = nr_method(&quadratic(), &y0, &opts).unwrap();
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.y.data(), b.y.data());
        assert_eq!(a.residual_norm.to_bits(), b.residual_norm.to_bits());
    }
}
