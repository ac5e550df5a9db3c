//! An incremental CDCL SAT solver.
//!
//! This is the solving core the model-checking engines sit on: a
//! MiniSat-shaped solver with two-literal watches, first-UIP conflict
//! analysis, VSIDS branching with phase saving, Luby restarts, learnt-clause
//! reduction, and assumption-based solving with final-conflict extraction
//! (the unsat cores the engines generalize from).
//!
//! The solver knows nothing about circuits. Callers map their signal ids
//! onto [`Var`]/[`Lit`] and interpret models and cores on their side.

mod heap;
mod solver;
mod types;

pub use solver::{Solver, SolverStats};
pub use types::{Lbool, Lit, Var};
