//! Integration options and step-size control.

use crate::error::{IvpError, IvpResult};
use crate::events::EventSpec;
use ns_roots::SolveOptions;

/// Step-size policy for the integrators.
#[derive(Debug, Clone, Copy)]
pub enum StepControl {
    /// March with a constant step, clipped only at the horizon.
    Fixed { h: f64 },
    /// Adapt the step within `[h_min, h_max]`. `h0` defaults to a
    /// method-chosen fraction of the span when `None`.
    Adaptive {
        h0: Option<f64>,
        h_min: f64,
        h_max: f64,
    },
}

impl Default for StepControl {
    fn default() -> Self {
        StepControl::Adaptive {
            h0: None,
            h_min: 1e-12,
            h_max: f64::INFINITY,
        }
    }
}

/// Options for the DAE time integrators.
///
/// `solve` configures the inner Newton iterations; `rtol`/`atol` drive the
/// embedded-error controller of the Rosenbrock method and are ignored by
/// the iteration-count controller of the one-step implicit methods.
pub struct IvpOptions {
    pub solve: SolveOptions,
    pub step: StepControl,
    pub rtol: f64,
    pub atol: f64,
    /// Consecutive rejections tolerated at one step before the run aborts.
    pub max_rejects: usize,
    pub event: Option<EventSpec>,
    /// Relative time tolerance for event crossing refinement.
    pub event_tol: f64,
}

impl Default for IvpOptions {
    fn default() -> Self {
        Self {
            solve: SolveOptions::default(),
            step: StepControl::default(),
            rtol: 1e-3,
            atol: 1e-6,
            max_rejects: 10,
            event: None,
            event_tol: 1e-12,
        }
    }
}

impl IvpOptions {
    pub fn validate(&self) -> IvpResult<()> {
        self.solve.validate()?;
        match self.step {
            StepControl::Fixed { h } => {
                if !(h > 0.0 && h.is_finite()) {
                    return Err(IvpError::InvalidOptions {
                        what: "fixed step h must be positive and finite",
                    });
                }
            }
            StepControl::Adaptive { h0, h_min, h_max } => {
                if !(h_min > 0.0 && h_min.is_finite()) {
                    return Err(IvpError::InvalidOptions {
                        what: "h_min must be positive and finite",
                    });
                }
                if !(h_max >= h_min) {
                    return Err(IvpError::InvalidOptions {
                        what: "h_max must be at least h_min",
                    });
                }
                if let Some(h0) = h0 {
                    if !(h0 > 0.0 && h0.is_finite()) {
                        return Err(IvpError::InvalidOptions {
                            what: "h0 must be positive and finite",
                        });
                    }
                }
            }
        }
        if !(self.rtol > 0.0 && self.rtol.is_finite()) {
            return Err(IvpError::InvalidOptions {
                what: "rtol must be positive and finite",
            });
        }
        if !(self.atol > 0.0 && self.atol.is_finite()) {
            return Err(IvpError::InvalidOptions {
                what: "atol must be positive and finite",
            });
        }
        if !(self.event_tol > 0.0 && self.event_tol.is_finite()) {
            return Err(IvpError::InvalidOptions {
                what: "event_tol must be positive and finite",
            });
        }
        if self.max_rejects == 0 {
            return Err(IvpError::InvalidOptions {
                what: "max_rejects must be at least 1",
            });
        }
        Ok(())
    }
}
