//! RODAS4 Rosenbrock stepper for stiff DAEs.
//!
//! Six-stage, order 4(3), stiffly accurate and L-stable, after Hairer &
//! Wanner, "Solving Ordinary Differential Equations II", §IV.7. One
//! Jacobian evaluation and one LU factorization per step attempt; each
//! stage is a back-substitution. The embedded third-order solution shares
//! all weights but the last, so the error estimate is the sixth stage
//! vector itself.

use crate::driver::{StepAttempt, Stepper};
use crate::error::IvpResult;
use nalgebra::DVector;
use ns_core::{all_finite, DaeModel};
use ns_roots::DenseFactor;
use tracing::debug;

const STAGES: usize = 6;
const GAMMA: f64 = 0.25;

const ALPHA: [f64; STAGES] = [0.0, 0.386, 0.21, 0.63, 1.0, 1.0];

#[rustfmt::skip]
const A: [[f64; STAGES]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.544, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.9466785280815826, 0.2557011698983284, 0.0, 0.0, 0.0, 0.0],
    [3.314825187068521, 2.896124015972201, 0.9986419139977817, 0.0, 0.0, 0.0],
    [1.221224509226641, 6.019134481288629, 12.53708332932087, -0.687886036105895, 0.0, 0.0],
    [1.221224509226641, 6.019134481288629, 12.53708332932087, -0.687886036105895, 1.0, 0.0],
];

#[rustfmt::skip]
const C: [[f64; STAGES]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-5.6688, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-2.430093356833875, -0.2063599157091915, 0.0, 0.0, 0.0, 0.0],
    [-0.1073529058151375, -9.594562251023355, -20.47028614809616, 0.0, 0.0, 0.0],
    [7.496443313967647, -10.24680431464352, -33.99990352819905, 11.7089089320616, 0.0, 0.0],
    [8.083246795921522, -7.981132988064893, -31.52159432874371, 16.31930543123136, -6.058818238834054, 0.0],
];

// Row sums of the full Gamma matrix, scaling the df/dt term per stage.
const GAMMA_SUM: [f64; STAGES] = [0.25, -0.1043, 0.1035, -0.03620000000000023, 0.0, 0.0];

// Fourth-order solution weights. Stiffly accurate: the embedded
// third-order weights drop only the last entry.
const M_WEIGHTS: [f64; STAGES] = [
    1.221224509226641,
    6.019134481288629,
    12.53708332932087,
    -0.687886036105895,
    1.0,
    1.0,
];

const SAFETY: f64 = 0.9;
const SCALE_MIN: f64 = 0.2;
const SCALE_MAX: f64 = 5.0;

pub(crate) struct RodasStepper {
    rtol: f64,
    atol: f64,
    /// Growth is suppressed on the first accept after a rejection.
    last_rejected: bool,
}

impl RodasStepper {
    pub(crate) fn new(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            last_rejected: false,
        }
    }

    fn reject(&mut self, scale: f64) -> StepAttempt {
        self.last_rejected = true;
        StepAttempt::Rejected {
            newton_iters: 0,
            scale,
        }
    }

    /// Weighted RMS norm of the error estimate against the larger of the
    /// old and new state magnitudes.
    fn error_norm(&self, err: &DVector<f64>, y: &DVector<f64>, y_new: &DVector<f64>) -> f64 {
        let n = err.len();
        let mut sum = 0.0;
        for i in 0..n {
            let w = self.atol + self.rtol * y[i].abs().max(y_new[i].abs());
            let e = err[i] / w;
            sum += e * e;
        }
        (sum / n as f64).sqrt()
    }
}

impl Stepper for RodasStepper {
    fn try_step<M: DaeModel>(
        &mut self,
        model: &M,
        t: f64,
        y: &DVector<f64>,
        h: f64,
    ) -> IvpResult<StepAttempt> {
        let n = model.dim();
        let mass = model.mass_matrix();

        let f0 = model.residual(t, y)?;
        if !all_finite(&f0) {
            return Ok(self.reject(SCALE_MIN));
        }
        let jac = model.jacobian(t, y)?;
        jac.check_dims(n)?;
        if !jac.is_finite() {
            return Ok(self.reject(SCALE_MIN));
        }

        // df/dt by forward difference, scaled to the step.
        let dt = f64::EPSILON.sqrt() * t.abs().max(h.abs());
        let f_t = if dt > 0.0 {
            let f_shift = model.residual(t + dt, y)?;
            (f_shift - &f0) / dt
        } else {
            DVector::zeros(n)
        };
        if !all_finite(&f_t) {
            return Ok(self.reject(SCALE_MIN));
        }

        // W = M / (h gamma) - J, factored once per attempt.
        let mut w = -jac.to_dense();
        for i in 0..n {
            w[(i, i)] += mass.entry(i) / (h * GAMMA);
        }
        let factor = DenseFactor::new(w);

        let mut k: Vec<DVector<f64>> = Vec::with_capacity(STAGES);
        for i in 0..STAGES {
            let f_i = if i == 0 {
                f0.clone()
            } else {
                let mut y_stage = y.clone();
                for (j, kj) in k.iter().enumerate() {
                    y_stage += A[i][j] * kj;
                }
                model.residual(t + ALPHA[i] * h, &y_stage)?
            };
            if !all_finite(&f_i) {
                return Ok(self.reject(SCALE_MIN));
            }

            let mut rhs = f_i;
            if i > 0 {
                let mut csum = DVector::zeros(n);
                for (j, kj) in k.iter().enumerate() {
                    csum += C[i][j] * kj;
                }
                rhs += mass.mul_vec(&csum) / h;
            }
            if GAMMA_SUM[i] != 0.0 {
                rhs += h * GAMMA_SUM[i] * &f_t;
            }

            let Some(ki) = factor.solve(&rhs) else {
                debug!(t, h, "singular stage matrix");
                return Ok(self.reject(0.5));
            };
            k.push(ki);
        }

        let mut y_new = y.clone();
        for (j, kj) in k.iter().enumerate() {
            y_new += M_WEIGHTS[j] * kj;
        }
        if !all_finite(&y_new) {
            return Ok(self.reject(SCALE_MIN));
        }

        // Embedded error: y_new - y_hat = k_6.
        let err = self.error_norm(&k[STAGES - 1], y, &y_new);
        if !err.is_finite() {
            return Ok(self.reject(SCALE_MIN));
        }

        let mut scale = (SAFETY * err.powf(-0.25)).clamp(SCALE_MIN, SCALE_MAX);
        if err <= 1.0 {
            if self.last_rejected {
                scale = scale.min(1.0);
            }
            self.last_rejected = false;
            Ok(StepAttempt::Accepted {
                y_new,
                newton_iters: 0,
                scale,
            })
        } else {
            debug!(t, h, err, "step rejected by error estimate");
            Ok(self.reject(scale))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use ns_core::{FnDaeModel, Jacobian, MassMatrix};

    fn decay() -> impl DaeModel {
        FnDaeModel::new(
            1,
            |_t, y: &DVector<f64>| Ok(-y.clone()),
            |_t, _y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, -1.0))),
        )
    }

    #[test]
    fn single_step_is_fourth_order_accurate() {
        let model = decay();
        let mut stepper = RodasStepper::new(1e-6, 1e-9);
        let y = DVector::from_element(1, 1.0);
        let h = 0.1;
        let attempt = stepper.try_step(&model, 0.0, &y, h).unwrap();
        let StepAttempt::Accepted { y_new, .. } = attempt else {
            panic!("step rejected");
        };
        // Local error of an order-4 method at h = 0.1 sits around h^5.
        assert_relative_eq!(y_new[0], (-h).exp(), epsilon = 1e-6);
    }

    #[test]
    fn error_estimate_rejects_a_huge_step() {
        // Stiff decay with a step far past the accuracy range.
        let model = FnDaeModel::new(
            1,
            |t: f64, y: &DVector<f64>| {
                Ok(DVector::from_element(1, -50.0 * y[0] + 50.0 * t.sin()))
            },
            |_t, _y: &DVector<f64>| Ok(Jacobian::Dense(DMatrix::from_element(1, 1, -50.0))),
        );
        let mut stepper = RodasStepper::new(1e-8, 1e-10);
        let y = DVector::from_element(1, 1.0);
        let attempt = stepper.try_step(&model, 0.0, &y, 5.0).unwrap();
        assert!(matches!(attempt, StepAttempt::Rejected { .. }));
    }

    #[test]
    fn growth_suppressed_after_rejection() {
        let model = decay();
        let mut stepper = RodasStepper::new(1e-6, 1e-9);
        stepper.last_rejected = true;
        let y = DVector::from_element(1, 1.0);
        let attempt = stepper.try_step(&model, 0.0, &y, 0.01).unwrap();
        let StepAttempt::Accepted { scale, .. } = attempt else {
            panic!("step rejected");
        };
        assert!(scale <= 1.0);
    }

    #[test]
    fn semi_explicit_dae_constraint_holds() {
        // y0' = -y0, 0 = y1 - y0^2. Stiffly accurate methods land on the
        // constraint manifold at the step endpoint.
        let model = FnDaeModel::new(
            2,
            |_t, y: &DVector<f64>| Ok(DVector::from_vec(vec![-y[0], y[1] - y[0] * y[0]])),
            |_t, y: &DVector<f64>| {
                Ok(Jacobian::Dense(DMatrix::from_row_slice(
                    2,
                    2,
                    &[-1.0, 0.0, -2.0 * y[0], 1.0],
                )))
            },
        )
        .with_mass_matrix(MassMatrix::Diagonal(DVector::from_vec(vec![1.0, 0.0])));

        let mut stepper = RodasStepper::new(1e-8, 1e-10);
        let y = DVector::from_vec(vec![1.0, 1.0]);
        let attempt = stepper.try_step(&model, 0.0, &y, 0.05).unwrap();
        let StepAttempt::Accepted { y_new, .. } = attempt else {
            panic!("step rejected");
        };
        assert_relative_eq!(y_new[1], y_new[0] * y_new[0], epsilon = 1e-7);
    }
}
