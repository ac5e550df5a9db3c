//! The model-checking engines: IC3/PDR, forward and backward CAR, and BMC,
//! together with the SAT facade, frame sequences, and witness emission they
//! share.

mod bmc;
mod branching;
mod car;
mod frames;
mod ic3;
mod restart;
mod settings;
mod solver;
mod state;
mod stats;
mod witness;

pub use bmc::Bmc;
pub use branching::{Branching, BranchingMode};
pub use car::Car;
pub use frames::OverSequence;
pub use ic3::Ic3;
pub use restart::{Luby, RestartSchedule};
pub use settings::{Direction, EngineKind, SatBackend, Settings};
pub use solver::{Assignment, StartSolver, TransSolver};
pub use state::{Obligation, State, Task, UnderSequence};
pub use stats::Statistics;
pub use witness::{witness_path, write_cex, write_witness_aig, Trace};

/// Verdict of a checking run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CheckResult {
    /// The bad signal is unreachable; an inductive invariant exists.
    Safe,
    /// A concrete input sequence drives the circuit into the bad state.
    Unsafe,
    /// No verdict (bound exhausted or time limit hit).
    Unknown,
}
