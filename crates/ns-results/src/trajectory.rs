//! Trajectory accumulation and named-variable access.

use nalgebra::{DMatrix, DVector};
use ns_core::error::{CoreError, CoreResult};
use ns_core::layout::VarLayout;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Diagnostic counters for a solver run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SolveStats {
    /// Step attempts (accepted + rejected).
    pub steps: usize,
    /// Accepted steps.
    pub accepted: usize,
    /// Rejected steps.
    pub rejected: usize,
    /// Total inner Newton iterations across all steps.
    pub newton_iters: usize,
}

/// Why an integration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Termination {
    /// Reached the end of the requested time span.
    HorizonReached,
    /// A terminal event fired; `t` is the refined crossing time.
    TerminalEvent { slot: usize, t: f64 },
    /// The adaptive controller could not shrink the step below `h_min`.
    StepSizeExhausted { t: f64 },
}

/// A located event crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event slot index in the caller's event function.
    pub slot: usize,
    /// Crossing time (refined, or the step endpoint when `approximate`).
    pub t: f64,
    /// State at the crossing, interpolated within the step.
    pub y: Vec<f64>,
    /// Whether the slot is terminal.
    pub terminal: bool,
    /// True when localization hit its iteration cap and fell back to the
    /// step endpoint.
    pub approximate: bool,
}

/// Immutable solution trajectory: time grid, state snapshots, diagnostics.
#[derive(Debug, Clone)]
pub struct Trajectory {
    layout: Arc<VarLayout>,
    t: Vec<f64>,
    y: Vec<DVector<f64>>,
    stats: SolveStats,
    termination: Termination,
    events: Vec<EventRecord>,
}

impl Trajectory {
    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn states(&self) -> &[DVector<f64>] {
        &self.y
    }

    pub fn layout(&self) -> &Arc<VarLayout> {
        &self.layout
    }

    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Last recorded `(time, state)` pair.
    pub fn last(&self) -> Option<(f64, &DVector<f64>)> {
        self.t.last().map(|&t| (t, self.y.last().unwrap()))
    }

    /// Time history of a named variable block as a (time x components)
    /// matrix. The same name resolves to the same indices in every row.
    pub fn var(&self, name: &str) -> CoreResult<DMatrix<f64>> {
        let (offset, len) = self.layout.block(name)?;
        let mut out = DMatrix::zeros(self.t.len(), len);
        for (row, y) in self.y.iter().enumerate() {
            for col in 0..len {
                out[(row, col)] = y[offset + col];
            }
        }
        Ok(out)
    }
}

/// Append-only accumulator for an in-progress integration.
///
/// Single-threaded by construction; `finish` freezes the trajectory.
#[derive(Debug)]
pub struct TrajectoryBuilder {
    layout: Arc<VarLayout>,
    t: Vec<f64>,
    y: Vec<DVector<f64>>,
    stats: SolveStats,
    events: Vec<EventRecord>,
}

impl TrajectoryBuilder {
    pub fn new(layout: Arc<VarLayout>) -> Self {
        Self {
            layout,
            t: Vec::new(),
            y: Vec::new(),
            stats: SolveStats::default(),
            events: Vec::new(),
        }
    }

    /// Append an accepted `(time, state)` pair. The state length must match
    /// the layout; times must be recorded in order.
    pub fn push(&mut self, t: f64, y: DVector<f64>) -> CoreResult<()> {
        if y.len() != self.layout.dim() {
            return Err(CoreError::Dimension {
                what: "trajectory state",
                expected: self.layout.dim(),
                got: y.len(),
            });
        }
        if let Some(&last) = self.t.last() {
            if t < last {
                return Err(CoreError::InvalidArg {
                    what: "trajectory times must be non-decreasing",
                });
            }
        }
        self.t.push(t);
        self.y.push(y);
        Ok(())
    }

    pub fn record_event(&mut self, event: EventRecord) {
        self.events.push(event);
    }

    pub fn stats_mut(&mut self) -> &mut SolveStats {
        &mut self.stats
    }

    pub fn last(&self) -> Option<(f64, &DVector<f64>)> {
        self.t.last().map(|&t| (t, self.y.last().unwrap()))
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Freeze into an immutable [`Trajectory`].
    pub fn finish(self, termination: Termination) -> Trajectory {
        Trajectory {
            layout: self.layout,
            t: self.t,
            y: self.y,
            stats: self.stats,
            termination,
            events: self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Arc<VarLayout> {
        VarLayout::new(vec![("h", 1), ("v", 1)]).unwrap()
    }

    #[test]
    fn push_and_slice_by_name() {
        let mut b = TrajectoryBuilder::new(layout());
        b.push(0.0, DVector::from_vec(vec![0.0, 20.0])).unwrap();
        b.push(0.5, DVector::from_vec(vec![8.8, 15.1])).unwrap();
        let traj = b.finish(Termination::HorizonReached);

        assert_eq!(traj.len(), 2);
        let h = traj.var("h").unwrap();
        assert_eq!(h.nrows(), 2);
        assert_eq!(h.ncols(), 1);
        assert_eq!(h[(1, 0)], 8.8);
        let v = traj.var("v").unwrap();
        assert_eq!(v[(0, 0)], 20.0);
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut b = TrajectoryBuilder::new(layout());
        let err = b.push(0.0, DVector::zeros(3)).unwrap_err();
        assert!(matches!(err, CoreError::Dimension { .. }));
    }

    #[test]
    fn out_of_order_times_rejected() {
        let mut b = TrajectoryBuilder::new(layout());
        b.push(1.0, DVector::zeros(2)).unwrap();
        let err = b.push(0.5, DVector::zeros(2)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArg { .. }));
    }

    #[test]
    fn unknown_var_rejected() {
        let b = TrajectoryBuilder::new(layout());
        let traj = b.finish(Termination::HorizonReached);
        assert!(matches!(
            traj.var("x").unwrap_err(),
            CoreError::UnknownVar { .. }
        ));
    }

    #[test]
    fn events_and_stats_survive_finish() {
        let mut b = TrajectoryBuilder::new(layout());
        b.push(0.0, DVector::zeros(2)).unwrap();
        b.stats_mut().accepted = 1;
        b.record_event(EventRecord {
            slot: 0,
            t: 0.0,
            y: vec![0.0, 20.0],
            terminal: false,
            approximate: false,
        });
        let traj = b.finish(Termination::HorizonReached);
        assert_eq!(traj.stats().accepted, 1);
        assert_eq!(traj.events().len(), 1);
        assert_eq!(traj.events()[0].y, vec![0.0, 20.0]);
    }
}
