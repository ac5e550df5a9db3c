//! The model-aware SAT facade.
//!
//! A [`TransSolver`] owns one CDCL instance loaded with some slice of the
//! transition relation and speaks in signed signal ids: assumptions and
//! clauses go in as [`Sig`]s, models come back as input/latch cubes, and
//! unsat cores come back as canonical cubes, reverse-mapped through the
//! prime maps when the query was over next-state variables.

use ahash::AHashSet;
use caracal_ir::{order_cube, sat_lit, Cube, Model, Sig};
use caracal_sat::{Lbool, Lit, Solver};
use std::rc::Rc;

/// A SAT model split into the pieces the engines consume.
pub struct Assignment {
    pub inputs: Cube,
    pub latches: Cube,
    pub innards: Cube,
    /// Next-step input literals, as primed variables.
    pub prime_inputs: Cube,
}

fn sig_of_sat(l: Lit) -> Sig {
    let var = l.var().0 as i32 + 1;
    if l.is_pos() { Sig::new(var) } else { Sig::new(-var) }
}

pub struct TransSolver {
    model: Rc<Model>,
    solver: Solver,
    assumptions: Vec<Sig>,
    frame_flags: Vec<Sig>,
    temp_flag: Option<Sig>,
    forward: bool,
}

impl TransSolver {
    pub fn new(model: Rc<Model>, forward: bool) -> Self {
        TransSolver {
            model,
            solver: Solver::new(),
            assumptions: Vec::new(),
            frame_flags: Vec::new(),
            temp_flag: None,
            forward,
        }
    }

    /// Load the simplified transition CNF.
    pub fn load_trans(&mut self) {
        let clauses = self.model.simp_clauses().to_vec();
        for c in &clauses {
            self.add_clause(c);
        }
    }

    /// Load the transition CNF together with its one-step primed copy, so
    /// next-state gates (including the primed bad signal and primed
    /// inputs) are constrained. IC3-style solvers need this; CAR solvers
    /// only ever assume next-state function ids and do not.
    pub fn load_trans_primed(&mut self) {
        self.load_trans();
        let primed = self.model.clauses_at(1);
        for c in &primed {
            self.add_clause(c);
        }
    }

    /// Binding clauses for latches whose reset is an internal signal.
    pub fn load_initial_clauses(&mut self) {
        let clauses = self.model.initial_clauses().to_vec();
        for c in &clauses {
            self.add_clause(c);
        }
    }

    pub fn add_clause(&mut self, cls: &[Sig]) {
        let lits: Vec<Lit> = cls.iter().map(|&l| sat_lit(l)).collect();
        self.solver.add_clause(&lits);
    }

    /// Clause asserting the property in the current state.
    pub fn add_property_clause(&mut self) {
        self.add_clause(&[self.model.property()]);
    }

    pub fn push_assumption(&mut self, s: Sig) {
        self.assumptions.push(s);
    }

    pub fn pop_assumption(&mut self) -> Option<Sig> {
        self.assumptions.pop()
    }

    pub fn clear_assumptions(&mut self) {
        self.assumptions.clear();
    }

    /// Solve under the accumulated assumptions (plus the activation
    /// literal of the temporary clause, if one is armed).
    pub fn solve(&mut self) -> bool {
        let mut assumps: Vec<Lit> =
            self.assumptions.iter().map(|&s| sat_lit(s)).collect();
        if let Some(t) = self.temp_flag {
            assumps.push(sat_lit(t));
        }
        self.solver.solve(&assumps)
    }

    pub fn solve_under(&mut self, cube: &[Sig]) -> bool {
        self.assumptions.clear();
        self.assumptions.extend_from_slice(cube);
        self.solve()
    }

    /// Solve with the frame-`lvl` activation flag plus `cube`.
    pub fn solve_frame(&mut self, cube: &[Sig], lvl: usize) -> bool {
        self.assumptions.clear();
        let flag = self.frame_flag(lvl);
        self.assumptions.push(flag);
        self.assumptions.extend_from_slice(cube);
        self.solve()
    }

    fn frame_flag(&mut self, lvl: usize) -> Sig {
        while self.frame_flags.len() <= lvl {
            self.frame_flags.push(self.model.new_var());
        }
        self.frame_flags[lvl]
    }

    /// Install a blocking cube as a frame clause: `!flag | !c` (forward)
    /// or `!flag | !c'` (backward, over next-state variables).
    pub fn add_uc(&mut self, uc: &[Sig], lvl: usize) {
        let flag = self.frame_flag(lvl);
        let mut cls: Vec<Sig> = Vec::with_capacity(uc.len() + 1);
        cls.push(-flag);
        if self.forward {
            cls.extend(uc.iter().map(|&l| -l));
        } else {
            cls.extend(uc.iter().map(|&l| -self.model.prime(l)));
        }
        self.add_clause(&cls);
    }

    /// Arm a clause valid for the following solves, until released.
    /// Exactly one may be armed at a time.
    pub fn add_temp_clause(&mut self, cls: &[Sig]) {
        assert!(self.temp_flag.is_none(), "temporary clause already armed");
        let flag = self.model.new_var();
        let mut guarded = cls.to_vec();
        guarded.push(-flag);
        self.add_clause(&guarded);
        self.temp_flag = Some(flag);
    }

    pub fn release_temp_clause(&mut self) {
        let flag = self.temp_flag.take().expect("no temporary clause armed");
        self.solver.release_var(sat_lit(-flag));
    }

    pub fn model_value_lbool(&self, s: Sig) -> Lbool {
        self.solver.model_value(sat_lit(s))
    }

    /// Model value of a signal; undetermined variables read as false.
    pub fn model_value(&self, s: Sig) -> bool {
        self.model_value_lbool(s) == Lbool::True
    }

    /// Assumption literals the last unsat verdict depends on.
    pub fn failed_set(&self) -> AHashSet<Sig> {
        self.solver
            .failed_assumptions()
            .iter()
            .map(|&l| sig_of_sat(l))
            .collect()
    }

    /// Whether the last core is empty (the query was unsat regardless of
    /// assumptions).
    pub fn core_is_empty(&self) -> bool {
        self.solver.failed_assumptions().is_empty()
    }

    /// The subset of `cube` the core retains. When `primed`, `cube` was
    /// assumed through the prime map and is reverse-mapped here.
    pub fn core_from_cube(&self, cube: &[Sig], primed: bool) -> Cube {
        let failed = self.failed_set();
        let mut out: Cube = cube
            .iter()
            .copied()
            .filter(|&l| {
                let assumed = if primed { self.model.prime(l) } else { l };
                failed.contains(&assumed)
            })
            .collect();
        order_cube(&mut out);
        out
    }

    /// Core for backward-style queries: the latch literals among the
    /// failed assumptions, optionally dropping one designated literal.
    pub fn core_filter_latches(&self, exclude: Option<Sig>) -> Cube {
        let mut out: Cube = self
            .failed_set()
            .into_iter()
            .filter(|&l| self.model.is_latch(l) && Some(l) != exclude)
            .collect();
        order_cube(&mut out);
        out
    }

    /// Core for forward-CAR queries: failed next-state assumptions mapped
    /// back onto the latches they drive.
    pub fn core_previous(&self) -> Cube {
        let mut out: Cube = Vec::new();
        for f in self.failed_set() {
            out.extend(self.model.previous(f));
        }
        order_cube(&mut out);
        out.dedup();
        out
    }

    /// Extract the model restricted to the circuit interface. With
    /// `prime`, latch values are read from the next-state variables.
    pub fn assignment(&self, prime: bool) -> Assignment {
        let mut inputs = Vec::with_capacity(self.model.model_inputs().len());
        for &i in self.model.model_inputs() {
            inputs.push(if self.model_value(i) { i } else { -i });
        }
        let mut latches = Vec::with_capacity(self.model.model_latches().len());
        for &l in self.model.model_latches() {
            let probe = if prime { self.model.prime(l) } else { l };
            latches.push(if self.model_value(probe) { l } else { -l });
        }
        Assignment {
            inputs,
            latches,
            innards: Vec::new(),
            prime_inputs: Vec::new(),
        }
    }

    /// Like [`TransSolver::assignment`], additionally extracting innard
    /// values and the next-step input vector. Only meaningful on solvers
    /// loaded with the primed CNF.
    pub fn assignment_full(&self) -> Assignment {
        let mut a = self.assignment(false);
        for &g in self.model.innards() {
            a.innards.push(if self.model_value(g) { g } else { -g });
        }
        for &i in self.model.model_inputs() {
            let pi = self.model.prime(i);
            a.prime_inputs.push(if self.model_value(pi) { pi } else { -pi });
        }
        a
    }

    pub fn simplify(&mut self) {
        self.solver.simplify();
    }

    // ---- invariant-check constraint encoding ----

    /// Assert that the state lies inside some cube of `frame`. An empty
    /// frame asserts nothing (rather than the empty clause).
    pub fn add_constraint_or(&mut self, frame: &[Rc<Cube>]) {
        if frame.is_empty() {
            return;
        }
        let mut cls: Vec<Sig> = Vec::with_capacity(frame.len());
        for cube in frame {
            let flag = self.model.new_var();
            cls.push(flag);
            for &l in cube.iter() {
                self.add_clause(&[-flag, l]);
            }
        }
        self.add_clause(&cls);
    }

    /// Assume that the state avoids every cube of `frame`.
    pub fn add_constraint_and(&mut self, frame: &[Rc<Cube>]) {
        let flag = self.model.new_var();
        for cube in frame {
            let mut cls: Vec<Sig> = cube.iter().map(|&l| -l).collect();
            cls.push(-flag);
            self.add_clause(&cls);
        }
        self.push_assumption(flag);
    }

    /// Retire the assumption armed by the last
    /// [`TransSolver::add_constraint_and`].
    pub fn flip_last_constraint(&mut self) {
        let flag = self.pop_assumption().expect("a constraint is armed");
        self.solver.release_var(sat_lit(-flag));
    }
}

/// Enumerates start states for forward CAR: full assignments satisfying
/// the bad signal, filtered by the blocking cubes installed under the
/// current activation flag. Each emitted state is forbidden from coming
/// back before the flag rotates.
pub struct StartSolver {
    inner: TransSolver,
    flag: Option<Sig>,
}

impl StartSolver {
    pub fn new(model: Rc<Model>, bad: Sig) -> Self {
        let mut inner = TransSolver::new(model, true);
        inner.load_trans();
        inner.push_assumption(bad);
        StartSolver { inner, flag: None }
    }

    /// Rotate the activation flag when the frontier advances: clauses
    /// guarded by the old flag are retired by assuming its negation.
    pub fn update_flag(&mut self) {
        match self.flag.take() {
            None => {}
            Some(old) => {
                self.inner.pop_assumption();
                self.inner.push_assumption(-old);
            }
        }
        let fresh = self.inner.model.new_var();
        self.inner.push_assumption(fresh);
        self.flag = Some(fresh);
    }

    /// Block `uc` for as long as the current flag is active.
    pub fn add_blocking(&mut self, uc: &[Sig]) {
        let flag = self.flag.expect("flag installed before blocking");
        let mut cls: Vec<Sig> = Vec::with_capacity(uc.len() + 1);
        cls.push(-flag);
        cls.extend(uc.iter().map(|&l| -l));
        self.inner.add_clause(&cls);
    }

    /// The next start state, or `None` when the current frontier admits
    /// no further ones.
    pub fn next_state(&mut self) -> Option<(Cube, Cube)> {
        if !self.inner.solve() {
            return None;
        }
        let a = self.inner.assignment(false);
        // Forbid this exact state until the flag rotates.
        let latches = a.latches.clone();
        self.add_blocking(&latches);
        Some((a.inputs, a.latches))
    }
}
