//! Circuit representation for the caracal model checker.
//!
//! The pipeline in this crate runs once at startup: an AIG file is parsed
//! into a typed gate graph ([`CircuitGraph`]), equivalent signals are
//! discovered by simulation and confirmed by SAT, and the result is compiled
//! into the [`Model`] the checking engines consume: initial state, prime
//! (next-state) variable maps, and the transition relation in CNF.

mod aig;
mod equiv;
mod graph;
mod model;
mod sig;
mod sim;
mod ternary;

pub use aig::{Aig, AigAnd, AigLatch};
pub use equiv::EquivalenceManager;
pub use graph::{CircuitGraph, Gate, GateKind};
pub use model::{sat_lit, EqStrategy, Model, ModelOptions};
pub use sig::{
    cube_canonical_cmp, cube_cmp, order_cube, subsumes, Clause, Cube, Sig,
};
pub use sim::{RandomSimulator, TernarySimulator, SIG_WORDS};
pub use ternary::Tern;
