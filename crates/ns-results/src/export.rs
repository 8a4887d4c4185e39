//! Serializable trajectory snapshot.

use crate::trajectory::{EventRecord, SolveStats, Termination, Trajectory};
use serde::{Deserialize, Serialize};

/// Plain-data view of a [`Trajectory`] for persistence and tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryExport {
    /// Variable block names in layout order.
    pub variables: Vec<String>,
    /// Time grid.
    pub t: Vec<f64>,
    /// State snapshots, one row per time point.
    pub y: Vec<Vec<f64>>,
    pub stats: SolveStats,
    pub termination: Termination,
    pub events: Vec<EventRecord>,
}

impl TrajectoryExport {
    pub fn from_trajectory(traj: &Trajectory) -> Self {
        Self {
            variables: traj.layout().names().map(str::to_string).collect(),
            t: traj.times().to_vec(),
            y: traj
                .states()
                .iter()
                .map(|y| y.iter().copied().collect())
                .collect(),
            stats: *traj.stats(),
            termination: *traj.termination(),
            events: traj.events().to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::TrajectoryBuilder;
    use nalgebra::DVector;
    use ns_core::layout::VarLayout;

    #[test]
    fn export_roundtrips_through_json() {
        let layout = VarLayout::new(vec![("h", 1)]).unwrap();
        let mut b = TrajectoryBuilder::new(layout);
        b.push(0.0, DVector::from_vec(vec![1.0])).unwrap();
        b.push(1.0, DVector::from_vec(vec![0.5])).unwrap();
        let traj = b.finish(Termination::HorizonReached);

        let export = TrajectoryExport::from_trajectory(&traj);
        let json = export.to_json().unwrap();
        let back: TrajectoryExport = serde_json::from_str(&json).unwrap();

        assert_eq!(back.variables, vec!["h".to_string()]);
        assert_eq!(back.t, vec![0.0, 1.0]);
        assert_eq!(back.y[1], vec![0.5]);
        assert!(matches!(back.termination, Termination::HorizonReached));
    }
}
