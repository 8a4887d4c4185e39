//! One-step implicit methods: backward Euler and the implicit trapezoid.
//!
//! Each step discretizes `M y' = F(t, y)` into an algebraic system in the
//! end-of-step state and hands it to the Newton core. Step-size adaptation
//! is driven by the Newton iteration count rather than an embedded error
//! estimate.

use crate::driver::{StepAttempt, Stepper};
use crate::error::IvpResult;
use nalgebra::{DMatrix, DVector};
use ns_core::{AeModel, CoreResult, DaeModel, Jacobian, MassMatrix};
use ns_roots::{nr_raw, SolveOptions, SolveStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheme {
    BackwardEuler,
    Trapezoid,
}

/// One implicit step viewed as an algebraic system in the end state.
///
/// Backward Euler rows read `m_i (y_i - yp_i) - h F_i(t + h, y)`. The
/// trapezoid averages the differential rows over the step; algebraic rows
/// (zero mass) are pinned at the step endpoint so constraints hold exactly
/// there.
struct DiscretizedStep<'a, M: DaeModel> {
    model: &'a M,
    mass: &'a MassMatrix,
    scheme: Scheme,
    t_new: f64,
    y_prev: &'a DVector<f64>,
    /// `F(t, y_prev)`, present for the trapezoid only.
    f_prev: Option<DVector<f64>>,
    h: f64,
}

impl<M: DaeModel> AeModel for DiscretizedStep<'_, M> {
    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn residual(&self, y: &DVector<f64>) -> CoreResult<DVector<f64>> {
        let f_new = self.model.residual(self.t_new, y)?;
        let n = self.model.dim();
        let mut r = DVector::zeros(n);
        for i in 0..n {
            let m = self.mass.entry(i);
            r[i] = match self.scheme {
                _ if m == 0.0 => -self.h * f_new[i],
                Scheme::BackwardEuler => m * (y[i] - self.y_prev[i]) - self.h * f_new[i],
                Scheme::Trapezoid => {
                    let fp = self.f_prev.as_ref().map_or(0.0, |f| f[i]);
                    m * (y[i] - self.y_prev[i]) - 0.5 * self.h * (f_new[i] + fp)
                }
            };
        }
        Ok(r)
    }

    fn jacobian(&self, y: &DVector<f64>) -> CoreResult<Jacobian> {
        let jf = self.model.jacobian(self.t_new, y)?.to_dense();
        let n = self.model.dim();
        let mut jac = DMatrix::zeros(n, n);
        for i in 0..n {
            let m = self.mass.entry(i);
            let weight = match self.scheme {
                _ if m == 0.0 => self.h,
                Scheme::BackwardEuler => self.h,
                Scheme::Trapezoid => 0.5 * self.h,
            };
            for j in 0..n {
                jac[(i, j)] = -weight * jf[(i, j)];
            }
            jac[(i, i)] += m;
        }
        Ok(Jacobian::Dense(jac))
    }
}

/// Stepper wrapping one implicit scheme around the Newton core.
pub(crate) struct ImplicitStepper<'a> {
    scheme: Scheme,
    solve: &'a SolveOptions,
}

impl<'a> ImplicitStepper<'a> {
    pub(crate) fn new(scheme: Scheme, solve: &'a SolveOptions) -> Self {
        Self { scheme, solve }
    }

    /// Iteration count below which the step is considered easy and the
    /// next step may grow.
    fn easy_threshold(&self) -> usize {
        (self.solve.ite_max / 4).max(2)
    }
}

impl Stepper for ImplicitStepper<'_> {
    fn try_step<M: DaeModel>(
        &mut self,
        model: &M,
        t: f64,
        y: &DVector<f64>,
        h: f64,
    ) -> IvpResult<StepAttempt> {
        let mass = model.mass_matrix();
        let f_prev = if self.scheme == Scheme::Trapezoid {
            Some(model.residual(t, y)?)
        } else {
            None
        };
        let step = DiscretizedStep {
            model,
            mass: &mass,
            scheme: self.scheme,
            t_new: t + h,
            y_prev: y,
            f_prev,
            h,
        };

        let out = nr_raw(&step, y, self.solve)?;
        Ok(match out.status {
            SolveStatus::Converged => StepAttempt::Accepted {
                y_new: out.y,
                newton_iters: out.iterations,
                scale: if out.iterations <= self.easy_threshold() {
                    2.0
                } else {
                    1.0
                },
            },
            SolveStatus::IterationLimit | SolveStatus::Diverged => StepAttempt::Rejected {
                newton_iters: out.iterations,
                scale: 0.5,
            },
        })
    }
}
