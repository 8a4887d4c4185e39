//! Consistent initialization of algebraic variables.
//!
//! Before a DAE run starts, the algebraic components of the initial state
//! must satisfy their constraint rows. Differential components are taken
//! as given; a damped Newton iteration on the algebraic block adjusts the
//! rest. A weak line search (a few halvings of the step) guards against
//! overshooting from a poor guess.

use crate::error::{IvpError, IvpResult};
use nalgebra::{DMatrix, DVector};
use ns_core::DaeModel;
use ns_roots::DenseFactor;
use tracing::debug;

const MAX_ITERS: usize = 15;
const LINE_SEARCH_PROBES: usize = 3;
/// Residual level below which the initial values count as consistent
/// without any correction.
const ALGEBRAIC_TOL: f64 = 1e-6;

fn alg_norm(f: &DVector<f64>, alg: &[usize]) -> f64 {
    alg.iter().map(|&i| f[i] * f[i]).sum::<f64>().sqrt()
}

fn algebraic_block(j: &DMatrix<f64>, alg: &[usize]) -> DMatrix<f64> {
    let m = alg.len();
    let mut out = DMatrix::zeros(m, m);
    for (r, &i) in alg.iter().enumerate() {
        for (c, &k) in alg.iter().enumerate() {
            out[(r, c)] = j[(i, k)];
        }
    }
    out
}

/// Correct the algebraic components of `y0` so the constraint rows hold at
/// `t0`. Differential components are never modified.
pub(crate) fn consistent_initial_values<M: DaeModel>(
    model: &M,
    t0: f64,
    y0: &DVector<f64>,
    rtol: f64,
) -> IvpResult<DVector<f64>> {
    let n = model.dim();
    let mass = model.mass_matrix();
    let alg: Vec<usize> = (0..n).filter(|&i| mass.is_algebraic_row(i)).collect();
    if alg.is_empty() {
        return Ok(y0.clone());
    }

    let mut y = y0.clone();
    let mut f = model.residual(t0, &y)?;
    let mut res = alg_norm(&f, &alg);
    let tol = ALGEBRAIC_TOL.max(1e-3 * rtol * y.norm().max(1.0));
    if res <= ALGEBRAIC_TOL {
        return Ok(y);
    }
    debug!(t = t0, residual = res, "correcting initial algebraic values");

    for _ in 0..MAX_ITERS {
        let j = model.jacobian(t0, &y)?.to_dense();
        let ja = algebraic_block(&j, &alg);
        let fa = DVector::from_iterator(alg.len(), alg.iter().map(|&i| -f[i]));
        let Some(dy) = DenseFactor::new(ja).solve(&fa) else {
            return Err(IvpError::InconsistentInitialValues { t: t0 });
        };

        let mut lambda = 1.0;
        let mut accepted = false;
        for _ in 0..LINE_SEARCH_PROBES {
            let mut y_try = y.clone();
            for (slot, &i) in alg.iter().enumerate() {
                y_try[i] += lambda * dy[slot];
            }
            let f_try = model.residual(t0, &y_try)?;
            let res_try = alg_norm(&f_try, &alg);
            if res_try.is_finite() && res_try < res {
                y = y_try;
                f = f_try;
                res = res_try;
                accepted = true;
                break;
            }
            lambda *= 0.5;
        }
        if !accepted {
            return Err(IvpError::InconsistentInitialValues { t: t0 });
        }
        if res <= tol {
            return Ok(y);
        }
    }

    Err(IvpError::InconsistentInitialValues { t: t0 })
}
