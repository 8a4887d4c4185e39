use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use nalgebra::DVector;
use ns_core::{AeModel, DaeModel, StateVec};
use ns_ivp::{
    backward_euler, implicit_trapezoid, rodas, Direction, EventSlot, EventSpec, IvpOptions,
    StepControl, Termination, Trajectory,
};
use ns_roots::{continuous_nr, lm, nr_method, SolveOptions, SolveReport};
use ns_results::TrajectoryExport;

mod problems;

#[derive(Parser)]
#[command(name = "ns-cli")]
#[command(about = "numsolve CLI - algebraic and DAE solver benchmarks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a built-in algebraic system
    Solve {
        /// Problem to solve
        #[arg(long, value_enum)]
        problem: AeProblem,
        /// Solver method
        #[arg(long, value_enum, default_value_t = AeMethod::Nr)]
        method: AeMethod,
        /// Convergence tolerance on the residual
        #[arg(long, default_value_t = 1e-8)]
        tol: f64,
        /// Iteration cap
        #[arg(long, default_value_t = 100)]
        max_iters: usize,
    },
    /// Integrate a built-in DAE over a time span
    Integrate {
        /// Problem to integrate
        #[arg(long, value_enum)]
        problem: IvpProblem,
        /// Integration method
        #[arg(long, value_enum, default_value_t = IvpMethod::Rodas)]
        method: IvpMethod,
        /// End time in seconds
        #[arg(long)]
        t_end: f64,
        /// Fixed step size; adaptive control when omitted
        #[arg(long)]
        h: Option<f64>,
        /// Relative tolerance for the error controller
        #[arg(long, default_value_t = 1e-3)]
        rtol: f64,
        /// Absolute tolerance for the error controller
        #[arg(long, default_value_t = 1e-6)]
        atol: f64,
        /// Write the trajectory as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write a CSV time series instead of JSON
        #[arg(long)]
        csv: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AeProblem {
    /// Circle-hyperbola intersection
    Circle,
    /// Powell's badly scaled system
    Powell,
}

#[derive(Clone, Copy, ValueEnum)]
enum AeMethod {
    /// Plain Newton-Raphson
    Nr,
    /// Continuous (pseudo-transient) Newton
    Cnr,
    /// Levenberg-Marquardt
    Lm,
}

#[derive(Clone, Copy, ValueEnum)]
enum IvpProblem {
    /// Exponential decay y' = -y
    Decay,
    /// Van der Pol oscillator, mu = 1000
    Vanderpol,
    /// Robertson kinetics as a semi-explicit DAE
    Robertson,
    /// Free fall with a terminal ground-contact event
    Ball,
}

#[derive(Clone, Copy, ValueEnum)]
enum IvpMethod {
    /// Backward Euler
    Be,
    /// Implicit trapezoid
    Trap,
    /// RODAS4 Rosenbrock
    Rodas,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Solve {
            problem,
            method,
            tol,
            max_iters,
        } => cmd_solve(problem, method, tol, max_iters),
        Commands::Integrate {
            problem,
            method,
            t_end,
            h,
            rtol,
            atol,
            output,
            csv,
        } => cmd_integrate(problem, method, t_end, h, rtol, atol, output.as_deref(), csv),
    }
}

fn cmd_solve(
    problem: AeProblem,
    method: AeMethod,
    tol: f64,
    max_iters: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let opts = SolveOptions {
        ite_tol: tol,
        ite_max: max_iters,
        ..Default::default()
    };

    let start = Instant::now();
    let (report, y0) = match problem {
        AeProblem::Circle => {
            let (model, y0) = problems::circle()?;
            (run_ae(&model, &y0, method, &opts)?, y0)
        }
        AeProblem::Powell => {
            let (model, y0) = problems::powell()?;
            (run_ae(&model, &y0, method, &opts)?, y0)
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    if report.converged() {
        println!("✓ Converged in {} iterations ({:.3}s)", report.iterations, elapsed);
    } else {
        println!(
            "✗ Did not converge: {:?} after {} iterations",
            report.status, report.iterations
        );
    }
    println!("  Residual norm: {:.3e}", report.residual_norm);
    for name in y0.layout().names() {
        let block = report.y.get(name)?;
        println!("  {} = {:?}", name, block);
    }
    Ok(())
}

fn run_ae<M: AeModel>(
    model: &M,
    y0: &StateVec,
    method: AeMethod,
    opts: &SolveOptions,
) -> Result<SolveReport, Box<dyn std::error::Error>> {
    Ok(match method {
        AeMethod::Nr => nr_method(model, y0, opts)?,
        AeMethod::Cnr => continuous_nr(model, y0, opts)?,
        AeMethod::Lm => lm(model, y0, opts)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn cmd_integrate(
    problem: IvpProblem,
    method: IvpMethod,
    t_end: f64,
    h: Option<f64>,
    rtol: f64,
    atol: f64,
    output: Option<&Path>,
    csv: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let step = match h {
        Some(h) => StepControl::Fixed { h },
        None => StepControl::default(),
    };
    let mut opts = IvpOptions {
        step,
        rtol,
        atol,
        ..Default::default()
    };
    if matches!(problem, IvpProblem::Ball) {
        // Stop when the height crosses zero from above.
        opts.event = Some(EventSpec::new(
            |_t, y: &DVector<f64>| vec![y[0]],
            vec![EventSlot {
                direction: Direction::Falling,
                terminal: true,
            }],
        ));
    }

    let start = Instant::now();
    let traj = match problem {
        IvpProblem::Decay => {
            let (model, y0) = problems::decay()?;
            run_ivp(&model, &y0, method, t_end, &opts)?
        }
        IvpProblem::Vanderpol => {
            let (model, y0) = problems::vanderpol()?;
            run_ivp(&model, &y0, method, t_end, &opts)?
        }
        IvpProblem::Robertson => {
            let (model, y0) = problems::robertson()?;
            run_ivp(&model, &y0, method, t_end, &opts)?
        }
        IvpProblem::Ball => {
            let (model, y0) = problems::ball()?;
            run_ivp(&model, &y0, method, t_end, &opts)?
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    print_run_summary(&traj, elapsed);

    if let Some(path) = output {
        if csv {
            std::fs::write(path, render_csv(&traj))?;
        } else {
            let export = TrajectoryExport::from_trajectory(&traj);
            std::fs::write(path, export.to_json()?)?;
        }
        println!("✓ Exported {} time points to {}", traj.len(), path.display());
    } else if csv {
        print!("{}", render_csv(&traj));
        io::stdout().flush()?;
    }
    Ok(())
}

fn run_ivp<M: DaeModel>(
    model: &M,
    y0: &StateVec,
    method: IvpMethod,
    t_end: f64,
    opts: &IvpOptions,
) -> Result<Trajectory, Box<dyn std::error::Error>> {
    Ok(match method {
        IvpMethod::Be => backward_euler(model, (0.0, t_end), y0, opts)?,
        IvpMethod::Trap => implicit_trapezoid(model, (0.0, t_end), y0, opts)?,
        IvpMethod::Rodas => rodas(model, (0.0, t_end), y0, opts)?,
    })
}

fn print_run_summary(traj: &Trajectory, elapsed: f64) {
    match traj.termination() {
        Termination::HorizonReached => println!("✓ Reached horizon ({elapsed:.3}s)"),
        Termination::TerminalEvent { slot, t } => {
            println!("✓ Terminal event (slot {slot}) at t = {t:.6} ({elapsed:.3}s)")
        }
        Termination::StepSizeExhausted { t } => {
            println!("✗ Step size exhausted at t = {t:.6} ({elapsed:.3}s)")
        }
    }
    let stats = traj.stats();
    println!("  Time points: {}", traj.len());
    println!(
        "  Steps: {} accepted, {} rejected, {} Newton iterations",
        stats.accepted, stats.rejected, stats.newton_iters
    );
    for event in traj.events() {
        println!(
            "  Event: slot {} at t = {:.6}{}",
            event.slot,
            event.t,
            if event.approximate { " (approximate)" } else { "" }
        );
    }
    if let Some((t, y)) = traj.last() {
        println!("  Final state at t = {:.6}:", t);
        for name in traj.layout().names() {
            if let Ok((offset, len)) = traj.layout().block(name) {
                let vals: Vec<f64> = (0..len).map(|i| y[offset + i]).collect();
                println!("    {} = {:?}", name, vals);
            }
        }
    }
}

fn render_csv(traj: &Trajectory) -> String {
    let mut header = String::from("time_s");
    for name in traj.layout().names() {
        if let Ok((_, len)) = traj.layout().block(name) {
            if len == 1 {
                header.push_str(&format!(",{name}"));
            } else {
                for i in 0..len {
                    header.push_str(&format!(",{name}[{i}]"));
                }
            }
        }
    }
    let mut csv = header;
    csv.push('\n');
    for (t, y) in traj.times().iter().zip(traj.states()) {
        csv.push_str(&format!("{t}"));
        for v in y.iter() {
            csv.push_str(&format!(",{v}"));
        }
        csv.push('\n');
    }
    csv
}
