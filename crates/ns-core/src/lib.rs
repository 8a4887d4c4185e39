//! ns-core: stable foundation for numsolve.
//!
//! Contains:
//! - error (shared fatal configuration errors)
//! - numeric (Real + float helpers)
//! - fd (finite-difference Jacobians)
//! - layout (named variable blocks + state vectors)
//! - params (read-only parameter bundles)
//! - matrix (Jacobian and mass-matrix value types)
//! - model (AE/FDAE/DAE capability traits + closure adapters)

pub mod error;
pub mod fd;
pub mod layout;
pub mod matrix;
pub mod model;
pub mod numeric;
pub mod params;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use fd::{fd_jacobian, FdScheme};
pub use layout::{StateVec, VarLayout};
pub use matrix::{Jacobian, MassMatrix};
pub use model::{AeModel, DaeModel, FdAeModel, FdaeModel, FnAeModel, FnDaeModel, FnFdaeModel};
pub use numeric::*;
pub use params::Params;
