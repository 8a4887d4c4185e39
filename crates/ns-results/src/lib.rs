//! Solution assembly for numsolve: trajectories, run statistics, and export.
//!
//! A [`TrajectoryBuilder`] accumulates accepted steps during integration;
//! [`TrajectoryBuilder::finish`] freezes the result into an immutable
//! [`Trajectory`] with stable named-variable slicing.

pub mod export;
pub mod trajectory;

pub use export::TrajectoryExport;
pub use trajectory::{EventRecord, SolveStats, Termination, Trajectory, TrajectoryBuilder};
