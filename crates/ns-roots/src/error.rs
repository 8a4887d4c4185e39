//! Error types for root-finding solvers.

use ns_core::CoreError;
use thiserror::Error;

/// Fatal errors raised by the AE/FDAE solvers.
///
/// Convergence failure and divergence are not errors; they are carried in
/// the returned report.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Model evaluation error: {0}")]
    Model(#[from] CoreError),

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid options: {what}")]
    InvalidOptions { what: &'static str },
}

pub type SolverResult<T> = Result<T, SolverError>;
