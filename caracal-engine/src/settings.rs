//! Run configuration shared by the engines.

use crate::branching::BranchingMode;
use caracal_ir::EqStrategy;
use std::path::PathBuf;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EngineKind {
    /// Forward CAR.
    #[default]
    Fcar,
    /// Backward CAR.
    Bcar,
    /// Bounded model checking.
    Bmc,
    /// IC3/PDR.
    Ic3,
}

/// SAT back-end selection. The vendored incremental CDCL solver is the
/// only back-end this build ships.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SatBackend {
    #[default]
    Minicore,
}

/// Search direction of the CAR engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Forward,
    Backward,
}

/// Everything the driver decides up front. Engines take this by value and
/// never consult globals.
#[derive(Clone, Debug)]
pub struct Settings {
    pub aig_path: PathBuf,
    pub witness_dir: Option<PathBuf>,
    pub engine: EngineKind,
    pub backend: SatBackend,

    /// BMC bound; -1 means unbounded.
    pub bmc_k: i64,
    /// Bounds batched per solver rebuild in step-mode BMC.
    pub bmc_step: usize,

    pub branching: BranchingMode,
    /// Nonzero seeds a deterministic shuffle of generalization orders.
    pub seed: u64,
    pub refer_skipping: bool,
    pub internal_signals: bool,

    pub restart: bool,
    pub restart_threshold: u32,
    pub restart_growth_rate: f64,
    pub luby: bool,

    pub eq: EqStrategy,
    pub verbosity: u32,
    /// Soft wall-clock limit in seconds, checked at loop boundaries.
    pub timelimit: Option<u64>,

    /// Run the clause-propagation pass between CAR frames.
    pub propagation: bool,
    /// Seed the CAR task stack deepest-first instead of shallowest-first.
    pub deep_first: bool,
    /// Reuse the previous frame's successful assumption ordering.
    pub rotate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            aig_path: PathBuf::new(),
            witness_dir: None,
            engine: EngineKind::default(),
            backend: SatBackend::default(),
            bmc_k: -1,
            bmc_step: 1,
            branching: BranchingMode::Sum,
            seed: 0,
            refer_skipping: false,
            internal_signals: false,
            restart: false,
            restart_threshold: 128,
            restart_growth_rate: 1.5,
            luby: false,
            eq: EqStrategy::TernaryThenRandom,
            verbosity: 0,
            timelimit: None,
            propagation: true,
            deep_first: false,
            rotate: false,
        }
    }
}
