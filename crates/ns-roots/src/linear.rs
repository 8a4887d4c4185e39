//! Linear solve adapter used by every Newton-type step.
//!
//! All factorizations go through dense LU; sparse Jacobians are assembled
//! to dense first. This module is the single seam where a sparse
//! factorization backend could be swapped in. Working buffers are scoped
//! to the call and released on return.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use ns_core::Jacobian;

/// A reusable dense LU factorization.
///
/// `None` from [`DenseFactor::solve`] means the matrix is singular to
/// working precision; solver cores map that to a divergence outcome.
pub struct DenseFactor {
    lu: LU<f64, Dyn, Dyn>,
}

impl DenseFactor {
    pub fn new(a: DMatrix<f64>) -> Self {
        Self { lu: a.lu() }
    }

    pub fn solve(&self, b: &DVector<f64>) -> Option<DVector<f64>> {
        self.lu.solve(b)
    }
}

/// One-shot dense solve `A x = b`.
pub fn solve_dense(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    DenseFactor::new(a).solve(b)
}

/// Solve `J x = b` for either Jacobian representation.
pub fn solve_jacobian(jac: &Jacobian, b: &DVector<f64>) -> Option<DVector<f64>> {
    solve_dense(jac.to_dense(), b)
}
