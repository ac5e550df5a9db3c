//! caracal: bit-level safety model checking for And-Inverter Graphs.

use argh::FromArgs;
use caracal_engine::{
    witness_path, write_cex, write_witness_aig, Bmc, BranchingMode, Car,
    CheckResult, Direction, EngineKind, Ic3, SatBackend, Settings, Trace,
};
use caracal_ir::{Aig, Cube, EqStrategy, Model, ModelOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(FromArgs)]
/// caracal: a bit-level safety model checker for AIGER circuits
struct Opts {
    /// input AIG file (.aag or .aig)
    #[argh(positional)]
    file: PathBuf,

    /// witness output directory
    #[argh(option, short = 'w')]
    witness: Option<PathBuf>,

    /// engine: fcar | bcar | bmc | ic3 (default fcar)
    #[argh(option, short = 'a', default = "String::from(\"fcar\")")]
    algorithm: String,

    /// SAT back-end: minicore (default)
    #[argh(option, short = 's', default = "String::from(\"minicore\")")]
    solver: String,

    /// BMC bound, -1 = unbounded (default)
    #[argh(option, short = 'k', default = "-1")]
    bound: i64,

    /// branching mode 0..3 (default 1)
    #[argh(option, long = "br", default = "1")]
    branching: u32,

    /// random ordering seed (default 0 = off)
    #[argh(option, long = "seed", default = "0")]
    seed: u64,

    /// enable refer-skipping
    #[argh(switch, long = "rs")]
    refer_skipping: bool,

    /// enable internal signals (innards)
    #[argh(switch, long = "is")]
    internal_signals: bool,

    /// enable the restart loop
    #[argh(switch, long = "restart")]
    restart: bool,

    /// unsat-core count before the first restart (default 128)
    #[argh(option, default = "128")]
    restart_threshold: u32,

    /// geometric growth of the restart threshold (default 1.5)
    #[argh(option, default = "1.5")]
    restart_growth_rate: f64,

    /// use the Luby restart schedule
    #[argh(switch, long = "luby")]
    luby: bool,

    /// equivalence strategy: 0 off, 1 ternary+random, 2 ternary, 3 random
    #[argh(option, long = "eq", default = "1")]
    eq: u32,

    /// verbosity 0..3 (default 0)
    #[argh(option, short = 'v', default = "0")]
    verbosity: u32,

    /// soft time limit in seconds
    #[argh(option, long = "timelimit")]
    timelimit: Option<u64>,
}

const EXIT_BAD_ARGS: u8 = 3;

fn main() -> ExitCode {
    let opts: Opts = argh::from_env();

    let level = match opts.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    match run(opts) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("caracal: {e}");
            ExitCode::from(EXIT_BAD_ARGS)
        }
    }
}

fn run(opts: Opts) -> Result<ExitCode, String> {
    let engine = match opts.algorithm.as_str() {
        "fcar" => EngineKind::Fcar,
        "bcar" => EngineKind::Bcar,
        "bmc" => EngineKind::Bmc,
        "ic3" => EngineKind::Ic3,
        other => return Err(format!("unknown engine `{other}'")),
    };
    let backend = match opts.solver.as_str() {
        "minicore" => SatBackend::Minicore,
        other => return Err(format!("unknown SAT back-end `{other}'")),
    };
    let eq = match opts.eq {
        0 => EqStrategy::Off,
        1 => EqStrategy::TernaryThenRandom,
        2 => EqStrategy::Ternary,
        3 => EqStrategy::Random,
        other => return Err(format!("unknown equivalence strategy `{other}'")),
    };
    let branching = BranchingMode::from_index(opts.branching)
        .ok_or_else(|| format!("unknown branching mode `{}'", opts.branching))?;

    let settings = Settings {
        aig_path: opts.file.clone(),
        witness_dir: opts.witness.clone(),
        engine,
        backend,
        bmc_k: opts.bound,
        branching,
        seed: opts.seed,
        refer_skipping: opts.refer_skipping,
        internal_signals: opts.internal_signals,
        restart: opts.restart,
        restart_threshold: opts.restart_threshold,
        restart_growth_rate: opts.restart_growth_rate,
        luby: opts.luby,
        eq,
        verbosity: opts.verbosity,
        timelimit: opts.timelimit,
        ..Default::default()
    };
    let model_opts = ModelOptions {
        eq,
        internal_signals: opts.internal_signals,
        sim_seed: if opts.seed > 0 { opts.seed } else { 42 },
    };

    let aig = Aig::from_file(&settings.aig_path).map_err(|e| e.to_string())?;
    let model =
        Rc::new(Model::new(aig, model_opts).map_err(|e| e.to_string())?);

    let outcome = dispatch(&settings, model.clone());

    match outcome.result {
        CheckResult::Safe => println!("Safe"),
        CheckResult::Unsafe => println!("Unsafe"),
        CheckResult::Unknown => println!("Unknown"),
    }

    if let Some(dir) = &settings.witness_dir {
        emit_witness(&settings, &model, dir, &outcome).map_err(|e| e.to_string())?;
    }

    Ok(ExitCode::from(match outcome.result {
        CheckResult::Safe => 0,
        CheckResult::Unsafe => 1,
        CheckResult::Unknown => 2,
    }))
}

struct Outcome {
    result: CheckResult,
    trace: Option<Trace>,
    invariant: Option<Vec<Vec<Rc<Cube>>>>,
}

fn dispatch(settings: &Settings, model: Rc<Model>) -> Outcome {
    match settings.engine {
        EngineKind::Fcar | EngineKind::Bcar => {
            let direction = if settings.engine == EngineKind::Fcar {
                Direction::Forward
            } else {
                Direction::Backward
            };
            let mut car = Car::new(settings.clone(), model, direction);
            let result = car.run();
            // Backward frames block successor states, not the reachable
            // region; the frame-union witness formula only fits the
            // forward direction. A backward Safe writes the circuit
            // unchanged.
            let invariant = if direction == Direction::Forward {
                car.invariant_frames().cloned()
            } else {
                None
            };
            Outcome {
                result,
                trace: car.counterexample().map(clone_trace),
                invariant,
            }
        }
        EngineKind::Ic3 => {
            let mut ic3 = Ic3::new(settings.clone(), model);
            let result = ic3.run();
            Outcome {
                result,
                trace: ic3.counterexample().map(clone_trace),
                invariant: ic3.invariant_frames().cloned(),
            }
        }
        EngineKind::Bmc => {
            let mut bmc = Bmc::new(settings.clone(), model);
            let result = bmc.run();
            Outcome {
                result,
                trace: bmc.counterexample().map(clone_trace),
                invariant: None,
            }
        }
    }
}

fn clone_trace(t: &Trace) -> Trace {
    Trace {
        init_latches: t.init_latches.clone(),
        input_steps: t.input_steps.clone(),
    }
}

fn emit_witness(
    settings: &Settings,
    model: &Model,
    dir: &std::path::Path,
    outcome: &Outcome,
) -> caracal_utils::CaracalResult<()> {
    match outcome.result {
        CheckResult::Unsafe => {
            if let Some(trace) = &outcome.trace {
                let path = witness_path(&settings.aig_path, dir, "cex");
                log::info!("writing counterexample to {}", path.display());
                write_cex(model, trace, path)?;
            }
        }
        CheckResult::Safe => {
            let frames = outcome.invariant.clone().unwrap_or_default();
            let path = witness_path(&settings.aig_path, dir, "w.aag");
            log::info!("writing witness circuit to {}", path.display());
            write_witness_aig(model, &frames, path)?;
        }
        CheckResult::Unknown => {}
    }
    Ok(())
}
