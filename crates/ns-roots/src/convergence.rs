//! Convergence control shared by all iterative solvers.
//!
//! Pure with respect to its inputs: norms and predicates only. The
//! iteration-cap warning is emitted by the solver cores through `tracing`,
//! never as console output.

use nalgebra::DVector;
use ns_core::max_abs;

/// Scalar deviation measure of a residual: the max-abs norm.
pub fn deviation(residual: &DVector<f64>) -> f64 {
    max_abs(residual)
}

/// True when the residual deviation is at or below `tol`.
///
/// A non-finite deviation (NaN/Inf anywhere in the residual) never
/// converges.
pub fn has_converged(residual: &DVector<f64>, tol: f64) -> bool {
    let dev = deviation(residual);
    dev.is_finite() && dev <= tol
}

/// True when the iteration count has reached the cap.
pub fn should_abort(iteration: usize, ite_max: usize) -> bool {
    iteration >= ite_max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converged_at_tolerance_boundary() {
        let r = DVector::from_vec(vec![1e-8, -1e-9]);
        assert!(has_converged(&r, 1e-8));
        assert!(!has_converged(&r, 1e-9));
    }

    #[test]
    fn nan_never_converges() {
        let r = DVector::from_vec(vec![f64::NAN]);
        assert!(!has_converged(&r, 1e300));
        let r = DVector::from_vec(vec![f64::INFINITY]);
        assert!(!has_converged(&r, 1e300));
    }

    #[test]
    fn abort_at_cap() {
        assert!(should_abort(100, 100));
        assert!(!should_abort(99, 100));
        assert!(should_abort(0, 0));
    }
}
