//! Shared integration loop for the implicit and Rosenbrock steppers.

use crate::daeic::consistent_initial_values;
use crate::error::{IvpError, IvpResult};
use crate::events::locate_crossings;
use crate::options::{IvpOptions, StepControl};
use nalgebra::DVector;
use ns_core::{DaeModel, StateVec};
use ns_results::{EventRecord, Termination, Trajectory, TrajectoryBuilder};
use tracing::{debug, warn};

/// Outcome of a single step attempt.
pub(crate) enum StepAttempt {
    Accepted {
        y_new: DVector<f64>,
        newton_iters: usize,
        /// Suggested multiplier for the next step size.
        scale: f64,
    },
    Rejected {
        newton_iters: usize,
        /// Multiplier for the retry step size.
        scale: f64,
    },
}

/// One-step method plugged into [`integrate`].
pub(crate) trait Stepper {
    fn try_step<M: DaeModel>(
        &mut self,
        model: &M,
        t: f64,
        y: &DVector<f64>,
        h: f64,
    ) -> IvpResult<StepAttempt>;
}

fn initial_step(step: &StepControl, span: f64) -> f64 {
    match *step {
        StepControl::Fixed { h } => h,
        StepControl::Adaptive { h0, h_min, h_max } => h0
            .unwrap_or(span / 100.0)
            .clamp(h_min, h_max)
            .min(span),
    }
}

/// March a stepper across `[t0, t_end]`, accumulating the trajectory,
/// adapting the step size, and intercepting event crossings.
pub(crate) fn integrate<M: DaeModel, S: Stepper>(
    model: &M,
    y0: &StateVec,
    t_span: (f64, f64),
    opts: &IvpOptions,
    stepper: &mut S,
) -> IvpResult<Trajectory> {
    opts.validate()?;
    let (t0, t_end) = t_span;
    if !(t0.is_finite() && t_end.is_finite() && t_end >= t0) {
        return Err(IvpError::InvalidTimeSpan { t0, t_end });
    }
    let dim = model.dim();
    if y0.len() != dim {
        return Err(IvpError::Dimension {
            what: "initial state",
            expected: dim,
            got: y0.len(),
        });
    }
    let mass = model.mass_matrix();
    mass.check_dims(dim)?;

    let mut y = y0.data().clone();
    if mass.has_algebraic_rows(dim) {
        y = consistent_initial_values(model, t0, &y, opts.rtol)?;
    }

    let mut builder = TrajectoryBuilder::new(y0.layout().clone());
    builder.push(t0, y.clone())?;

    let span = t_end - t0;
    let t_eps = 1e-10 * span.abs().max(1.0);
    if span <= t_eps {
        return Ok(builder.finish(Termination::HorizonReached));
    }

    let mut g_prev = opts.event.as_ref().map(|spec| spec.eval(t0, &y));
    let mut t = t0;
    let mut h = initial_step(&opts.step, span);
    let mut consecutive_rejects = 0usize;

    while t_end - t > t_eps {
        let h_try = h.min(t_end - t);
        let attempt = stepper.try_step(model, t, &y, h_try)?;
        if opts.solve.stats {
            builder.stats_mut().steps += 1;
        }

        match attempt {
            StepAttempt::Accepted {
                y_new,
                newton_iters,
                scale,
            } => {
                consecutive_rejects = 0;
                let mut t_new = t + h_try;
                if (t_end - t_new).abs() <= t_eps {
                    t_new = t_end;
                }

                if let Some(spec) = &opts.event {
                    let g0 = g_prev.as_deref().unwrap_or(&[]);
                    let crossings =
                        locate_crossings(spec, opts.event_tol, t, &y, g0, t_new, &y_new);
                    for crossing in &crossings {
                        builder.record_event(EventRecord {
                            slot: crossing.slot,
                            t: crossing.t,
                            y: crossing.y.iter().copied().collect(),
                            terminal: crossing.terminal,
                            approximate: crossing.approximate,
                        });
                        if crossing.terminal {
                            // Stop at the crossing; later crossings within
                            // this step never happen.
                            builder.push(crossing.t, crossing.y.clone())?;
                            if opts.solve.stats {
                                builder.stats_mut().accepted += 1;
                                builder.stats_mut().newton_iters += newton_iters;
                            }
                            debug!(slot = crossing.slot, t = crossing.t, "terminal event");
                            return Ok(builder.finish(Termination::TerminalEvent {
                                slot: crossing.slot,
                                t: crossing.t,
                            }));
                        }
                    }
                    g_prev = Some(spec.eval(t_new, &y_new));
                }

                builder.push(t_new, y_new.clone())?;
                if opts.solve.stats {
                    builder.stats_mut().accepted += 1;
                    builder.stats_mut().newton_iters += newton_iters;
                }
                t = t_new;
                y = y_new;

                if let StepControl::Adaptive { h_min, h_max, .. } = opts.step {
                    h = (h_try * scale).clamp(h_min, h_max);
                }
            }
            StepAttempt::Rejected {
                newton_iters,
                scale,
            } => {
                if opts.solve.stats {
                    builder.stats_mut().rejected += 1;
                    builder.stats_mut().newton_iters += newton_iters;
                }
                consecutive_rejects += 1;

                let h_min = match opts.step {
                    StepControl::Fixed { .. } => {
                        // No room to shrink with a fixed step.
                        warn!(t, h = h_try, "step rejected under fixed step control");
                        return Err(exhausted(builder, t));
                    }
                    StepControl::Adaptive { h_min, .. } => h_min,
                };

                let h_new = h_try * scale;
                if h_new < h_min || consecutive_rejects > opts.max_rejects {
                    warn!(
                        t,
                        h = h_new,
                        rejects = consecutive_rejects,
                        "step size control exhausted"
                    );
                    return Err(exhausted(builder, t));
                }
                h = h_new;
            }
        }
    }

    Ok(builder.finish(Termination::HorizonReached))
}

fn exhausted(builder: TrajectoryBuilder, t: f64) -> IvpError {
    IvpError::StepSizeExhausted {
        t,
        trajectory: Box::new(builder.finish(Termination::StepSizeExhausted { t })),
    }
}
