//! Event detection on accepted integration steps.
//!
//! Event functions return one value per slot; a crossing is a sign change
//! of a slot value across an accepted step, filtered by that slot's
//! declared direction. Crossing times are refined by bisection on a linear
//! interpolation of the state within the step.

use nalgebra::DVector;
use tracing::warn;

/// Bisection iteration cap; past it the step endpoint is reported with the
/// `approximate` flag set.
const MAX_BISECT: usize = 80;

/// Which sign changes of a slot count as crossings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Negative to non-negative.
    Rising,
    /// Positive to non-positive.
    Falling,
    /// Either.
    Any,
}

/// Per-slot event declaration, fixed for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct EventSlot {
    pub direction: Direction,
    /// Terminal slots stop the integration at the crossing.
    pub terminal: bool,
}

/// A vector-valued event function with per-slot direction and terminal
/// declarations.
pub struct EventSpec {
    g: Box<dyn Fn(f64, &DVector<f64>) -> Vec<f64>>,
    slots: Vec<EventSlot>,
}

impl EventSpec {
    pub fn new(
        g: impl Fn(f64, &DVector<f64>) -> Vec<f64> + 'static,
        slots: Vec<EventSlot>,
    ) -> Self {
        Self {
            g: Box::new(g),
            slots,
        }
    }

    pub fn slots(&self) -> &[EventSlot] {
        &self.slots
    }

    /// Evaluate all slots at `(t, y)`.
    pub fn eval(&self, t: f64, y: &DVector<f64>) -> Vec<f64> {
        (self.g)(t, y)
    }
}

/// A located crossing within one accepted step.
#[derive(Debug, Clone)]
pub struct Crossing {
    pub slot: usize,
    pub t: f64,
    /// State at the crossing, linearly interpolated within the step.
    pub y: DVector<f64>,
    pub terminal: bool,
    /// True when bisection gave up and fell back to the step endpoint.
    pub approximate: bool,
}

fn crossed(direction: Direction, ga: f64, gb: f64) -> bool {
    match direction {
        Direction::Rising => ga < 0.0 && gb >= 0.0,
        Direction::Falling => ga > 0.0 && gb <= 0.0,
        Direction::Any => (ga < 0.0 && gb >= 0.0) || (ga > 0.0 && gb <= 0.0),
    }
}

fn interp(t0: f64, y0: &DVector<f64>, t1: f64, y1: &DVector<f64>, t: f64) -> DVector<f64> {
    let theta = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
    y0 + (y1 - y0) * theta
}

/// Scan one accepted step `[t0, t1]` for crossings, given the slot values
/// `g0` at the step start. Crossing times are refined until the bracket
/// width drops below `event_tol`, relative to the step times. Returns
/// crossings sorted by time.
pub fn locate_crossings(
    spec: &EventSpec,
    event_tol: f64,
    t0: f64,
    y0: &DVector<f64>,
    g0: &[f64],
    t1: f64,
    y1: &DVector<f64>,
) -> Vec<Crossing> {
    let g1 = spec.eval(t1, y1);
    let mut found = Vec::new();

    for (slot, decl) in spec.slots().iter().enumerate() {
        let (ga, gb) = match (g0.get(slot), g1.get(slot)) {
            (Some(&a), Some(&b)) => (a, b),
            _ => {
                warn!(slot, "event function returned too few values");
                continue;
            }
        };
        if !crossed(decl.direction, ga, gb) {
            continue;
        }
        found.push(refine(spec, slot, decl, event_tol, t0, y0, ga, t1, y1));
    }

    found.sort_by(|a, b| a.t.total_cmp(&b.t));
    found
}

#[allow(clippy::too_many_arguments)]
fn refine(
    spec: &EventSpec,
    slot: usize,
    decl: &EventSlot,
    event_tol: f64,
    t0: f64,
    y0: &DVector<f64>,
    g0: f64,
    t1: f64,
    y1: &DVector<f64>,
) -> Crossing {
    let tol = event_tol * t0.abs().max(t1.abs()).max(1.0);
    let mut a = t0;
    let mut ga = g0;
    let mut b = t1;
    let mut iters = 0;

    while b - a > tol && iters < MAX_BISECT {
        let mid = 0.5 * (a + b);
        let ym = interp(t0, y0, t1, y1, mid);
        let gm = spec
            .eval(mid, &ym)
            .get(slot)
            .copied()
            .unwrap_or(f64::NAN);
        if !gm.is_finite() {
            warn!(slot, t = mid, "non-finite event value during bisection");
            return Crossing {
                slot,
                t: t1,
                y: y1.clone(),
                terminal: decl.terminal,
                approximate: true,
            };
        }
        if crossed(decl.direction, ga, gm) {
            b = mid;
        } else {
            a = mid;
            ga = gm;
        }
        iters += 1;
    }

    let approximate = b - a > tol;
    let t = if approximate { t1 } else { b };
    Crossing {
        slot,
        t,
        y: interp(t0, y0, t1, y1, t),
        terminal: decl.terminal,
        approximate,
    }
}
