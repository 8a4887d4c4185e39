//! Solver configuration.

use crate::error::{SolverError, SolverResult};

/// Options for the AE/FDAE solver family.
///
/// Passed by shared reference and never mutated by any solver.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Convergence tolerance on the max-abs residual norm.
    pub ite_tol: f64,
    /// Iteration cap.
    pub ite_max: usize,
    /// Record diagnostic counters.
    pub stats: bool,
    /// Pseudo-time step for `continuous_nr`.
    pub dtau: f64,
    /// Initial Levenberg-Marquardt damping.
    pub lm_lambda0: f64,
    /// Damping-increase retries per LM iteration before giving up.
    pub lm_max_retries: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            ite_tol: 1e-8,
            ite_max: 100,
            stats: true,
            dtau: 1.0,
            lm_lambda0: 1e-3,
            lm_max_retries: 20,
        }
    }
}

impl SolveOptions {
    pub fn validate(&self) -> SolverResult<()> {
        if !self.ite_tol.is_finite() || self.ite_tol <= 0.0 {
            return Err(SolverError::InvalidOptions {
                what: "ite_tol must be positive and finite",
            });
        }
        if !self.dtau.is_finite() || self.dtau <= 0.0 {
            return Err(SolverError::InvalidOptions {
                what: "dtau must be positive and finite",
            });
        }
        if !self.lm_lambda0.is_finite() || self.lm_lambda0 <= 0.0 {
            return Err(SolverError::InvalidOptions {
                what: "lm_lambda0 must be positive and finite",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SolveOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_tolerance() {
        let opts = SolveOptions {
            ite_tol: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            opts.validate().unwrap_err(),
            SolverError::InvalidOptions { .. }
        ));

        let opts = SolveOptions {
            ite_tol: f64::NAN,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
