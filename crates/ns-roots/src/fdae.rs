//! Single-step solver for finite-difference-algebraic systems.

use crate::error::SolverResult;
use crate::newton::{newton_iterate, Correction};
use crate::options::SolveOptions;
use crate::report::SolveReport;
use nalgebra::DVector;
use ns_core::{AeModel, CoreResult, FdaeModel, Jacobian, StateVec};

/// An [`FdaeModel`] with its previous-step value frozen, viewed as an
/// algebraic system in `y` alone.
pub struct FrozenPrev<'a, M: FdaeModel> {
    model: &'a M,
    y_prev: &'a DVector<f64>,
}

impl<'a, M: FdaeModel> FrozenPrev<'a, M> {
    pub fn new(model: &'a M, y_prev: &'a DVector<f64>) -> Self {
        Self { model, y_prev }
    }
}

impl<M: FdaeModel> AeModel for FrozenPrev<'_, M> {
    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn residual(&self, y: &DVector<f64>) -> CoreResult<DVector<f64>> {
        self.model.residual(y, self.y_prev)
    }

    fn jacobian(&self, y: &DVector<f64>) -> CoreResult<Jacobian> {
        self.model.jacobian(y, self.y_prev)
    }
}

/// Solve one step `0 = F(y, y_prev)` for `y`, starting the iteration from
/// `y_prev`.
///
/// Used directly for user-declared recurrence models and internally as the
/// step kernel of the implicit time integrators.
pub fn fdae_solver(
    model: &impl FdaeModel,
    y_prev: &StateVec,
    opts: &SolveOptions,
) -> SolverResult<SolveReport> {
    let frozen = FrozenPrev::new(model, y_prev.data());
    newton_iterate(&frozen, y_prev, opts, Correction::Plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use ns_core::FnFdaeModel;

    #[test]
    fn implicit_decay_recurrence() {
        // Backward-Euler style recurrence for y' = -y with h = 0.1:
        // y - y_prev + 0.1 y = 0  =>  y = y_prev / 1.1
        let model = FnFdaeModel::new(
            1,
            |y: &DVector<f64>, y_prev: &DVector<f64>| {
                Ok(DVector::from_element(1, y[0] - y_prev[0] + 0.1 * y[0]))
            },
            |_y: &DVector<f64>, _y_prev: &DVector<f64>| {
                Ok(Jacobian::Dense(DMatrix::from_element(1, 1, 1.1)))
            },
        );

        let y0 = StateVec::from_vec(vec![1.0]).unwrap();
        let report = fdae_solver(&model, &y0, &SolveOptions::default()).unwrap();
        assert!(report.converged());
        assert_relative_eq!(report.y.data()[0], 1.0 / 1.1, epsilon = 1e-10);

        // Iterate the recurrence a second step from the new value.
        let report2 = fdae_solver(&model, &report.y, &SolveOptions::default()).unwrap();
        assert_relative_eq!(report2.y.data()[0], 1.0 / (1.1 * 1.1), epsilon = 1e-10);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let model = FnFdaeModel::new(
            2,
            |y: &DVector<f64>, _p: &DVector<f64>| Ok(y.clone()),
            |_y: &DVector<f64>, _p: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::identity(2, 2))),
        );
        let y0 = StateVec::from_vec(vec![1.0]).unwrap();
        let err = fdae_solver(&model, &y0, &SolveOptions::default()).unwrap_err();
        assert!(matches!(err, crate::SolverError::Dimension { .. }));
    }
}
