//! Root-finding solvers for algebraic and finite-difference-algebraic
//! systems.
//!
//! Three Newton-type solvers share one iteration core with a pluggable
//! correction step:
//! - [`nr_method`]: plain Newton-Raphson
//! - [`continuous_nr`]: pseudo-transient relaxation of the Newton flow
//! - [`lm`]: Levenberg-Marquardt with adaptive damping
//!
//! [`fdae_solver`] solves one step of a recurrence system `0 = F(y, y_prev)`
//! by freezing `y_prev` and dispatching to the same core.
//!
//! Fatal configuration errors (dimension mismatch, malformed options) are
//! `Err`; convergence failure and divergence are reported in the returned
//! [`SolveReport`] so callers can decide how to react.

pub mod convergence;
pub mod error;
pub mod fdae;
pub mod linear;
pub mod lm;
pub mod newton;
pub mod options;
pub mod report;

pub use error::{SolverError, SolverResult};
pub use fdae::fdae_solver;
pub use linear::DenseFactor;
pub use lm::lm;
pub use newton::{continuous_nr, nr_method, nr_raw, IterateOutcome};
pub use options::SolveOptions;
pub use report::{SolveReport, SolveStatus};
