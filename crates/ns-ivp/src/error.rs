//! Error types for time integration.

use ns_core::CoreError;
use ns_results::Trajectory;
use ns_roots::SolverError;
use thiserror::Error;

/// Fatal errors raised by the DAE integrators.
///
/// Convergence trouble inside a step is handled by step rejection; only
/// configuration problems and step-size exhaustion abort a run. Step-size
/// exhaustion carries the partial trajectory up to the last accepted step.
#[derive(Error, Debug)]
pub enum IvpError {
    #[error("Model evaluation error: {0}")]
    Model(#[from] CoreError),

    #[error("Inner solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Invalid options: {what}")]
    InvalidOptions { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid time span: [{t0}, {t_end}]")]
    InvalidTimeSpan { t0: f64, t_end: f64 },

    #[error("Step size fell below h_min at t = {t}")]
    StepSizeExhausted { t: f64, trajectory: Box<Trajectory> },

    #[error("No consistent initial values found at t = {t}")]
    InconsistentInitialValues { t: f64 },
}

pub type IvpResult<T> = Result<T, IvpError>;
