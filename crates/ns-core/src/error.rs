use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Fatal configuration errors shared across the workspace.
///
/// These are raised immediately and never retried; non-fatal outcomes
/// (convergence failure, divergence) are reported as data in solver
/// reports, not as errors.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown variable block: {name}")]
    UnknownVar { name: String },

    #[error("Duplicate variable block: {name}")]
    DuplicateVar { name: String },
}
