//! Solver result reporting.

use ns_core::StateVec;

/// How an iterative solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Residual norm dropped below `ite_tol`.
    Converged,
    /// Iteration cap reached; `y` is the best-effort iterate.
    IterationLimit,
    /// Non-finite residual/Jacobian or a singular linear solve.
    Diverged,
}

/// Result of an AE/FDAE solve.
///
/// Non-convergence is data, not an error: the caller receives the last
/// iterate plus the iteration count and decides whether to treat a
/// non-`Converged` status as fatal.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Final (best-effort) state.
    pub y: StateVec,
    /// Correction steps taken.
    pub iterations: usize,
    pub status: SolveStatus,
    /// Max-abs norm of the final residual (NaN after divergence).
    pub residual_norm: f64,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}
