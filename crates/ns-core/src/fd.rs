//! Finite-difference Jacobians for residual-only models.
//!
//! Column `j` is perturbed by `epsilon * max(|y[j]|, 1)`, so the step
//! scales with the state without collapsing near zero. The result comes
//! back as a [`Jacobian`] value, ready to hand to any solver.

use crate::error::CoreResult;
use crate::matrix::Jacobian;
use nalgebra::{DMatrix, DVector};

/// Differencing scheme for [`fd_jacobian`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdScheme {
    /// One residual evaluation per column, first-order truncation error.
    Forward,
    /// Two evaluations per column, second-order truncation error.
    Central,
}

/// Approximate `dF/dy` at `y` column by column.
pub fn fd_jacobian<F>(
    y: &DVector<f64>,
    f: F,
    epsilon: f64,
    scheme: FdScheme,
) -> CoreResult<Jacobian>
where
    F: Fn(&DVector<f64>) -> CoreResult<DVector<f64>>,
{
    let n = y.len();
    let f0 = f(y)?;
    let mut jac = DMatrix::zeros(f0.len(), n);
    let mut shifted = y.clone();

    for j in 0..n {
        let dy = epsilon * y[j].abs().max(1.0);
        let col = match scheme {
            FdScheme::Forward => {
                shifted[j] = y[j] + dy;
                let f_plus = f(&shifted)?;
                (f_plus - &f0) / dy
            }
            FdScheme::Central => {
                shifted[j] = y[j] + dy;
                let f_plus = f(&shifted)?;
                shifted[j] = y[j] - dy;
                let f_minus = f(&shifted)?;
                (f_plus - f_minus) / (2.0 * dy)
            }
        };
        shifted[j] = y[j];
        jac.set_column(j, &col);
    }

    Ok(Jacobian::Dense(jac))
}
