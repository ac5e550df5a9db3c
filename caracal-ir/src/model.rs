//! The compiled model the checking engines consume.
//!
//! Compilation happens once, at startup: discover equivalent signals by
//! simulation (confirmed by SAT where needed), rewrite the circuit through
//! the equivalence classes, collect the initial state and the prime
//! (next-state) variable maps, and emit the transition relation as CNF.

use crate::aig::Aig;
use crate::equiv::EquivalenceManager;
use crate::graph::{CircuitGraph, Gate, GateKind};
use crate::sig::{cube_cmp, Clause, Cube, Sig};
use crate::sim::{RandomSimulator, TernarySimulator, SIG_WORDS};
use ahash::{AHashMap, AHashSet};
use caracal_utils::CaracalResult;
use itertools::Itertools;
use std::cell::RefCell;

/// How equivalent-signal discovery runs before compilation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EqStrategy {
    /// No equivalence discovery.
    Off,
    /// Ternary simulation; fall back to random simulation when it finds
    /// nothing.
    #[default]
    TernaryThenRandom,
    /// Ternary simulation only.
    Ternary,
    /// Random simulation (with SAT confirmation) only.
    Random,
}

#[derive(Clone, Copy, Debug)]
pub struct ModelOptions {
    pub eq: EqStrategy,
    /// Give qualifying gates prime variables so they can appear in state
    /// cubes ("innards").
    pub internal_signals: bool,
    /// Seed for the random-simulation lanes.
    pub sim_seed: u64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            eq: EqStrategy::default(),
            internal_signals: false,
            sim_seed: 42,
        }
    }
}

struct PrimeState {
    /// `maps[k]` renames signals `k + 1` steps into the future. `maps[0]`
    /// sends latches to their next-state functions and other signals to
    /// fresh ids allocated on demand.
    maps: Vec<AHashMap<i32, i32>>,
    max_id: i32,
}

/// The compiled transition system.
pub struct Model {
    opts: ModelOptions,
    aig: Aig,
    graph: CircuitGraph,
    equiv: RefCell<EquivalenceManager>,

    bad: Sig,
    initial_state: Cube,
    initial_clauses: Vec<Clause>,
    clauses: Vec<Clause>,
    simp_clauses: Vec<Clause>,

    primes: RefCell<PrimeState>,
    /// `|next-state id| -> latches it drives`, signed by the next function.
    previous_map: AHashMap<i32, Vec<Sig>>,
    /// Direct fanin variables of each model gate in the property cone.
    dependency: AHashMap<i32, Vec<i32>>,

    innards: AHashSet<i32>,
    innards_vec: Vec<Sig>,
    innard_level: AHashMap<i32, i32>,
}

impl Model {
    pub fn new(aig: Aig, opts: ModelOptions) -> CaracalResult<Model> {
        let graph = CircuitGraph::from_aig(&aig)?;
        log::info!(
            "model loaded: {} inputs, {} latches, {} gates, {} constraints",
            graph.num_inputs,
            graph.num_latches,
            graph.ands.len(),
            graph.constraints.len()
        );
        let max_id = graph.true_id.var();
        let mut model = Model {
            opts,
            aig,
            graph,
            equiv: RefCell::new(EquivalenceManager::new()),
            bad: Sig::new(1),
            initial_state: Vec::new(),
            initial_clauses: Vec::new(),
            clauses: Vec::new(),
            simp_clauses: Vec::new(),
            primes: RefCell::new(PrimeState {
                maps: vec![AHashMap::new()],
                max_id,
            }),
            previous_map: AHashMap::new(),
            dependency: AHashMap::new(),
            innards: AHashSet::new(),
            innards_vec: Vec::new(),
            innard_level: AHashMap::new(),
        };

        match opts.eq {
            EqStrategy::Off => {}
            EqStrategy::TernaryThenRandom => {
                if !model.discover_by_ternary() || model.equiv.borrow().is_empty() {
                    model.discover_by_random();
                }
            }
            EqStrategy::Ternary => {
                model.discover_by_ternary();
            }
            EqStrategy::Random => {
                model.discover_by_random();
            }
        }

        model.apply_equivalence();
        model.update_dependency_map();
        model.collect_initial_state();
        model.bad = model.find(model.graph.bad[0]);
        model.collect_next_value_mapping();
        if opts.internal_signals {
            model.collect_innards();
        }
        model.collect_clauses();
        model.simp_clauses = simplify_clauses(&model.clauses);
        model.build_previous_map();

        log::info!(
            "model reduced: {} inputs, {} latches, {} gates; {} clauses ({} simplified)",
            model.graph.model_inputs.len(),
            model.graph.model_latches.len(),
            model.graph.model_gates.len(),
            model.clauses.len(),
            model.simp_clauses.len()
        );
        Ok(model)
    }

    // ---- queries ----

    pub fn num_inputs(&self) -> usize {
        self.graph.num_inputs
    }

    pub fn num_latches(&self) -> usize {
        self.graph.num_latches
    }

    pub fn aig(&self) -> &Aig {
        &self.aig
    }

    pub fn true_sig(&self) -> Sig {
        self.graph.true_id
    }

    /// The representative of the constant-true class.
    pub fn true_rep(&self) -> Sig {
        self.find(self.graph.true_id)
    }

    pub fn bad(&self) -> Sig {
        self.bad
    }

    pub fn property(&self) -> Sig {
        -self.bad
    }

    pub fn find(&self, s: Sig) -> Sig {
        self.equiv.borrow_mut().find(s)
    }

    pub fn is_true(&self, s: Sig) -> bool {
        self.find(s) == self.true_rep()
    }

    pub fn is_false(&self, s: Sig) -> bool {
        self.find(s) == -self.true_rep()
    }

    pub fn is_constant(&self, s: Sig) -> bool {
        self.is_true(s) || self.is_false(s)
    }

    pub fn is_latch(&self, s: Sig) -> bool {
        self.graph.is_latch(s)
    }

    pub fn is_input(&self, s: Sig) -> bool {
        self.graph.is_input(s)
    }

    pub fn is_and(&self, s: Sig) -> bool {
        self.graph.is_and(s)
    }

    pub fn is_innard(&self, s: Sig) -> bool {
        self.opts.internal_signals && self.innards.contains(&s.var())
    }

    pub fn innards(&self) -> &[Sig] {
        &self.innards_vec
    }

    pub fn innard_level(&self, s: Sig) -> i32 {
        self.innard_level.get(&s.var()).copied().unwrap_or(0)
    }

    pub fn model_inputs(&self) -> &[Sig] {
        &self.graph.model_inputs
    }

    pub fn model_latches(&self) -> &[Sig] {
        &self.graph.model_latches
    }

    pub fn model_gates(&self) -> &[Sig] {
        &self.graph.model_gates
    }

    pub fn property_coi_inputs(&self) -> &[Sig] {
        &self.graph.property_coi_inputs
    }

    pub fn constraints(&self) -> &[Sig] {
        &self.graph.constraints
    }

    pub fn initial_state(&self) -> &Cube {
        &self.initial_state
    }

    /// Binding clauses for latches whose reset is an internal signal.
    pub fn initial_clauses(&self) -> &[Clause] {
        &self.initial_clauses
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn simp_clauses(&self) -> &[Clause] {
        &self.simp_clauses
    }

    /// The clause set with every literal renamed `k` steps ahead.
    pub fn clauses_at(&self, k: usize) -> Vec<Clause> {
        self.simp_clauses
            .iter()
            .map(|c| c.iter().map(|&l| self.prime_k(l, k)).collect())
            .collect()
    }

    /// A fresh variable above everything allocated so far. Shared by prime
    /// renaming, solver flags, and witness construction so ids never clash.
    pub fn new_var(&self) -> Sig {
        let mut primes = self.primes.borrow_mut();
        assert!(
            primes.max_id < i32::MAX,
            "variable id space exhausted (last id {})",
            primes.max_id
        );
        primes.max_id += 1;
        Sig::new(primes.max_id)
    }

    /// The next-state rename of `s`: latches go to their next functions,
    /// constants stay put, anything else gets a stable fresh id.
    pub fn prime(&self, s: Sig) -> Sig {
        self.prime_k(s, 1)
    }

    /// Rename `s` to its copy `k` steps ahead, allocating fresh ids for
    /// signals first seen at that depth.
    pub fn prime_k(&self, s: Sig, k: usize) -> Sig {
        if k == 0 || s.var() == self.graph.true_id.var() {
            return s;
        }
        if self.is_latch(s) {
            let next = {
                let primes = self.primes.borrow();
                Sig::new(primes.maps[0][&s.var()])
            };
            return self.prime_k(s.apply_sign(next), k - 1);
        }
        let mut primes = self.primes.borrow_mut();
        while primes.maps.len() < k {
            primes.maps.push(AHashMap::new());
        }
        if let Some(&p) = primes.maps[k - 1].get(&s.var()) {
            return s.apply_sign(Sig::new(p));
        }
        assert!(
            primes.max_id < i32::MAX,
            "variable id space exhausted (last id {})",
            primes.max_id
        );
        primes.max_id += 1;
        let fresh = primes.max_id;
        primes.maps[k - 1].insert(s.var(), fresh);
        s.apply_sign(Sig::new(fresh))
    }

    /// Latch literals whose next-state function is the variable of `s`.
    pub fn previous(&self, s: Sig) -> Vec<Sig> {
        match self.previous_map.get(&s.var()) {
            None => Vec::new(),
            Some(lits) => lits.iter().map(|&l| s.apply_sign(l)).collect(),
        }
    }

    /// Innard literals of a state assignment whose cone bottoms out in the
    /// latches of `cube` (no inputs, no latches outside the cube). These
    /// are the signals worth adding when re-generalizing a lemma.
    pub fn relevant_innards(&self, cube: &Cube, state_innards: &Cube) -> Cube {
        let latch_vars: AHashSet<i32> =
            cube.iter().filter(|s| self.is_latch(**s)).map(|s| s.var()).collect();
        let mut out = Vec::new();
        'candidates: for &inn in state_innards {
            let mut todo = vec![inn.var()];
            let mut seen: AHashSet<i32> = AHashSet::new();
            while let Some(v) = todo.pop() {
                if !seen.insert(v) {
                    continue;
                }
                let s = Sig::new(v);
                if self.is_input(s) {
                    continue 'candidates;
                }
                if self.is_latch(s) {
                    if !latch_vars.contains(&v) {
                        continue 'candidates;
                    }
                    continue;
                }
                if let Some(deps) = self.dependency.get(&v) {
                    todo.extend(deps.iter().copied());
                }
            }
            out.push(inn);
        }
        out
    }

    // ---- compilation passes ----

    fn apply_equivalence(&mut self) {
        let true_var = self.graph.true_id.var();
        let mut latches = std::mem::take(&mut self.graph.model_latches);
        latches.retain(|l| {
            let reset = self.find(self.graph.latch_reset[&l.var()]);
            self.graph.latch_reset.insert(l.var(), reset);
            let next = self.find(self.graph.latch_next[&l.var()]);
            self.graph.latch_next.insert(l.var(), next);
            !self.equiv.borrow().has_equivalence(*l)
        });
        self.graph.model_latches = latches;

        let mut gates = std::mem::take(&mut self.graph.model_gates);
        gates.retain(|g| {
            // Primed innard copies are synthetic; they never carry
            // equivalences of their own.
            if g.var() > true_var {
                return true;
            }
            if self.equiv.borrow().has_equivalence(*g) {
                return false;
            }
            let mut gate = self.graph.gates[&g.var()].clone();
            for fanin in gate.fanins.iter_mut() {
                *fanin = self.find(*fanin);
            }
            self.graph.gates.insert(g.var(), gate);
            true
        });
        self.graph.model_gates = gates;

        for i in 0..self.graph.bad.len() {
            self.graph.bad[i] = self.find(self.graph.bad[i]);
        }
        for i in 0..self.graph.constraints.len() {
            self.graph.constraints[i] = self.find(self.graph.constraints[i]);
        }
    }

    fn update_dependency_map(&mut self) {
        let mut coi: AHashSet<i32> = AHashSet::new();
        let mut pcoi: AHashSet<i32> = AHashSet::new();
        for l in &self.graph.model_latches {
            coi.insert(l.var());
            coi.insert(self.graph.latch_next[&l.var()].var());
        }
        for s in self.graph.constraints.iter().chain(self.graph.bad.iter()) {
            coi.insert(s.var());
            pcoi.insert(s.var());
        }
        self.dependency.clear();
        for g in self.graph.model_gates.iter().rev() {
            if let Some(gate) = self.graph.gates.get(&g.var()) {
                if coi.contains(&g.var()) {
                    let mut deps = Vec::with_capacity(gate.fanins.len());
                    for fanin in &gate.fanins {
                        coi.insert(fanin.var());
                        deps.push(fanin.var());
                    }
                    self.dependency.insert(g.var(), deps);
                }
                if pcoi.contains(&g.var()) {
                    for fanin in &gate.fanins {
                        pcoi.insert(fanin.var());
                    }
                }
            }
        }
        self.graph.model_inputs = self
            .graph
            .inputs
            .iter()
            .copied()
            .filter(|s| coi.contains(&s.var()))
            .collect();
        self.graph.model_inputs.sort();
        self.graph.property_coi_inputs = self
            .graph
            .inputs
            .iter()
            .copied()
            .filter(|s| pcoi.contains(&s.var()))
            .collect();
        self.graph.property_coi_inputs.sort();
    }

    fn collect_initial_state(&mut self) {
        self.initial_state.clear();
        self.initial_clauses.clear();
        let true_rep = self.true_rep();
        for l in &self.graph.model_latches {
            let reset = self.graph.latch_reset[&l.var()];
            if reset == true_rep {
                self.initial_state.push(*l);
            } else if reset == -true_rep {
                self.initial_state.push(-*l);
            } else if reset != *l && self.graph.is_and(reset) {
                self.initial_clauses.push(vec![*l, -reset]);
                self.initial_clauses.push(vec![-*l, reset]);
            }
        }
    }

    fn collect_next_value_mapping(&mut self) {
        let mut primes = self.primes.borrow_mut();
        primes.maps.clear();
        primes.maps.push(AHashMap::new());
        primes.max_id = self.graph.true_id.var();
        for l in &self.graph.latches {
            let next = self.graph.latch_next[&l.var()];
            primes.maps[0].insert(l.var(), next.0);
        }
    }

    fn innard_level_dfs(&mut self, var: i32) -> i32 {
        if let Some(&lvl) = self.innard_level.get(&var) {
            return lvl;
        }
        let mut lvl = 0;
        if self.graph.is_and(Sig::new(var)) {
            let fanins: Vec<i32> = self.graph.gates[&var]
                .fanins
                .iter()
                .map(|f| f.var())
                .collect();
            for fanin in fanins {
                lvl = lvl.max(self.innard_level_dfs(fanin) + 1);
            }
        }
        self.innard_level.insert(var, lvl);
        lvl
    }

    /// A gate all of whose fanins are constants, latches, or earlier
    /// innards gets a prime variable and a duplicated gate definition over
    /// the primed fanins, so it can appear in both state and next-state
    /// cubes.
    fn collect_innards(&mut self) {
        let true_rep = self.true_rep();
        let gate_list = self.graph.model_gates.clone();
        for g in gate_list {
            let gate = self.graph.gates[&g.var()].clone();
            let is_innard = gate.fanins.iter().all(|f| {
                self.is_constant(*f)
                    || self.is_latch(*f)
                    || self.innards.contains(&f.var())
            });
            if !is_innard {
                continue;
            }
            self.innards.insert(g.var());
            self.innard_level_dfs(g.var());

            let p_fanout = self.prime(g.abs());
            debug_assert!(p_fanout.is_pos());
            let mut p_fanins = gate.fanins.clone();
            for fanin in p_fanins.iter_mut() {
                *fanin = if self.is_constant(*fanin) {
                    if self.is_true(*fanin) { true_rep } else { -true_rep }
                } else {
                    self.prime(*fanin)
                };
            }
            self.graph.gates.insert(
                p_fanout.var(),
                Gate {
                    kind: gate.kind,
                    fanout: p_fanout,
                    fanins: p_fanins,
                },
            );
        }
        let primed: Vec<Sig> = self
            .innards
            .iter()
            .map(|&v| self.prime(Sig::new(v)))
            .sorted()
            .collect();
        self.graph.model_gates.extend(primed);
        self.innards_vec = self.innards.iter().map(|&v| Sig::new(v)).sorted().collect();
        log::info!("collected {} internal signals", self.innards_vec.len());
    }

    fn collect_clauses(&mut self) {
        self.clauses.clear();
        for g in &self.graph.model_gates {
            let gate = &self.graph.gates[&g.var()];
            let out = gate.fanout;
            let f = &gate.fanins;
            match gate.kind {
                GateKind::And => {
                    self.clauses.push(vec![out, -f[0], -f[1]]);
                    self.clauses.push(vec![-out, f[0]]);
                    self.clauses.push(vec![-out, f[1]]);
                }
                GateKind::Xor => {
                    self.clauses.push(vec![out, -f[0], f[1]]);
                    self.clauses.push(vec![out, f[0], -f[1]]);
                    self.clauses.push(vec![-out, f[0], f[1]]);
                    self.clauses.push(vec![-out, -f[0], -f[1]]);
                }
                GateKind::Ite => {
                    self.clauses.push(vec![out, -f[0], -f[1]]);
                    self.clauses.push(vec![out, f[0], -f[2]]);
                    self.clauses.push(vec![-out, -f[0], f[1]]);
                    self.clauses.push(vec![-out, f[0], f[2]]);
                }
            }
        }
        for i in 0..self.graph.constraints.len() {
            let c = self.graph.constraints[i];
            self.clauses.push(vec![c]);
        }
        self.clauses.push(vec![self.true_rep()]);
    }

    fn build_previous_map(&mut self) {
        self.previous_map.clear();
        for l in &self.graph.model_latches {
            let next = self.graph.latch_next[&l.var()];
            self.previous_map
                .entry(next.var())
                .or_default()
                .push(next.apply_sign(*l));
        }
    }

    // ---- equivalence discovery ----

    fn discover_by_ternary(&mut self) -> bool {
        log::info!("equivalence discovery by ternary simulation");
        let (states, gate_states, cycled) = {
            let mut sim = TernarySimulator::new(&self.graph);
            sim.simulate(250);
            (
                sim.states().to_vec(),
                sim.gate_states().to_vec(),
                sim.cycle_reached(),
            )
        };
        if !cycled {
            return false;
        }
        let latch_found = self.merge_signature_groups(signature_groups(&states));
        log::info!("found {latch_found} equivalent latches");
        let gate_found = self.merge_signature_groups(signature_groups(&gate_states));
        log::info!("found {gate_found} equivalent gates");
        true
    }

    fn merge_signature_groups(&mut self, groups: Vec<Vec<Sig>>) -> usize {
        let mut found = 0;
        for mut group in groups {
            {
                let eq = self.equiv.borrow();
                if eq.has_equivalence(group[0]) || eq.has_equivalence(group[1]) {
                    continue;
                }
            }
            group.sort_by(cube_cmp);
            let first = group[0];
            for &other in &group[1..] {
                self.equiv.borrow_mut().add_equivalence(first, other);
                found += 1;
            }
        }
        found
    }

    fn discover_by_random(&mut self) {
        log::info!("equivalence discovery by random simulation");
        let sim = RandomSimulator::run(&self.graph, self.opts.sim_seed);
        let mut confirm = ConfirmationSolver::default();

        let latches = self.graph.model_latches.clone();
        let (eq, may) = self.confirm_group(&sim, &latches, &mut confirm, true);
        log::info!("confirmed {eq}/{may} equivalent latch candidates");

        let gates: Vec<Sig> = self
            .graph
            .model_gates
            .iter()
            .copied()
            .filter(|g| self.graph.gates.contains_key(&g.var()))
            .collect();
        let (eq, may) = self.confirm_group(&sim, &gates, &mut confirm, false);
        log::info!("confirmed {eq}/{may} equivalent gate candidates");
    }

    fn confirm_group(
        &mut self,
        sim: &RandomSimulator,
        signals: &[Sig],
        confirm: &mut ConfirmationSolver,
        latch_rule: bool,
    ) -> (usize, usize) {
        let mut by_signature: AHashMap<[u64; SIG_WORDS], Vec<Sig>> = AHashMap::new();
        for s in signals {
            let sig = *sim.signature(s.var());
            by_signature.entry(sig).or_default().push(s.abs());
            let complement = sig.map(|w| !w);
            by_signature.entry(complement).or_default().push(-s.abs());
        }
        let mut processed: AHashSet<[u64; SIG_WORDS]> = AHashSet::new();
        let mut candidates = 0;
        let mut confirmed = 0;
        let mut signatures: Vec<_> = by_signature.keys().copied().collect();
        signatures.sort();
        for sig in signatures {
            let group = &by_signature[&sig];
            if group.len() < 2 || processed.contains(&sig) {
                continue;
            }
            let mut group = group.clone();
            group.sort_by(cube_cmp);
            for i in 1..group.len() {
                candidates += 1;
                let (a, b) = (group[0], group[i]);
                if self.equiv.borrow_mut().is_equivalent(a, b) {
                    continue;
                }
                let ok = if latch_rule {
                    self.confirm_latch_pair(confirm, a, b)
                } else {
                    self.confirm_gate_pair(confirm, a, b)
                };
                if ok {
                    confirmed += 1;
                    self.equiv.borrow_mut().add_equivalence(a, b);
                }
            }
            processed.insert(sig);
            processed.insert(sig.map(|w| !w));
        }
        (confirmed, candidates)
    }

    fn confirm_latch_pair(
        &mut self,
        confirm: &mut ConfirmationSolver,
        a: Sig,
        b: Sig,
    ) -> bool {
        let (Some(&reset_a), Some(&reset_b)) = (
            self.graph.latch_reset.get(&a.var()),
            self.graph.latch_reset.get(&b.var()),
        ) else {
            return false;
        };
        if a.apply_sign(reset_a) != b.apply_sign(reset_b) {
            return false;
        }
        confirm.refresh(self);
        // (a <-> b) & !(a' <-> b') must be unsatisfiable.
        let a_next = a.apply_sign(self.graph.latch_next[&a.var()]);
        let b_next = b.apply_sign(self.graph.latch_next[&b.var()]);
        let w = self.new_var();
        confirm.add_clause(&[-w, a, -b]);
        confirm.add_clause(&[-w, -a, b]);
        confirm.add_clause(&[-w, a_next, b_next]);
        confirm.add_clause(&[-w, -a_next, -b_next]);
        let sat = confirm.solve(&[w]);
        if !sat {
            confirm.add_clause(&[a, -b]);
            confirm.add_clause(&[-a, b]);
            confirm.unsats += 1;
        }
        !sat
    }

    fn confirm_gate_pair(
        &mut self,
        confirm: &mut ConfirmationSolver,
        a: Sig,
        b: Sig,
    ) -> bool {
        confirm.refresh(self);
        // !(a <-> b) must be unsatisfiable under the transition CNF.
        let w = self.new_var();
        confirm.add_clause(&[-w, a, b]);
        confirm.add_clause(&[-w, -a, -b]);
        let sat = confirm.solve(&[w]);
        if !sat {
            confirm.add_clause(&[a, -b]);
            confirm.add_clause(&[-a, b]);
            confirm.unsats += 1;
        }
        !sat
    }
}

/// Map a signed signal onto a solver literal (variable `|s| - 1`).
pub fn sat_lit(s: Sig) -> caracal_sat::Lit {
    caracal_sat::Lit::new(caracal_sat::Var((s.var() - 1) as u32), s.is_pos())
}

/// The SAT context used to confirm simulation candidates. Rebuilt after
/// 2000 unsat confirmations to discharge the accumulated clauses.
#[derive(Default)]
struct ConfirmationSolver {
    solver: Option<caracal_sat::Solver>,
    unsats: u32,
}

const CONFIRM_SOLVER_RECYCLE: u32 = 2000;

impl ConfirmationSolver {
    fn refresh(&mut self, model: &mut Model) {
        if self.solver.is_some() && self.unsats <= CONFIRM_SOLVER_RECYCLE {
            return;
        }
        model.apply_equivalence();
        model.collect_next_value_mapping();
        model.collect_clauses();
        let mut solver = caracal_sat::Solver::new();
        for clause in &model.clauses {
            let lits: Vec<_> = clause.iter().map(|&l| sat_lit(l)).collect();
            solver.add_clause(&lits);
        }
        self.solver = Some(solver);
        self.unsats = 0;
    }

    fn add_clause(&mut self, lits: &[Sig]) {
        let lits: Vec<_> = lits.iter().map(|&l| sat_lit(l)).collect();
        self.solver.as_mut().expect("refreshed").add_clause(&lits);
    }

    fn solve(&mut self, assumptions: &[Sig]) -> bool {
        let assumps: Vec<_> = assumptions.iter().map(|&l| sat_lit(l)).collect();
        self.solver.as_mut().expect("refreshed").solve(&assumps)
    }
}

/// Group signals by their determined-value trajectory. A signal's location
/// vector records, for every reached step, whether it was true or false;
/// signals undetermined at any step are left out.
fn signature_groups(states: &[Vec<Sig>]) -> Vec<Vec<Sig>> {
    let n = states.len();
    let mut locations: AHashMap<i32, Vec<i32>> = AHashMap::new();
    for (i, state) in states.iter().enumerate() {
        for &v in state {
            locations.entry(v.0).or_default().push(i as i32 + 1);
            locations.entry(-v.0).or_default().push(-(i as i32) - 1);
        }
    }
    locations.retain(|_, locs| locs.len() == n);
    let mut by_signature: AHashMap<Vec<i32>, Vec<Sig>> = AHashMap::new();
    for (signal, locs) in locations {
        by_signature.entry(locs).or_default().push(Sig::new(signal));
    }
    let mut groups: Vec<Vec<Sig>> = by_signature
        .into_values()
        .filter(|g| g.len() > 1)
        .collect();
    for g in groups.iter_mut() {
        g.sort_by(cube_cmp);
    }
    groups.sort();
    groups
}

/// Propagate top-level units to a fixpoint, dropping satisfied clauses and
/// false literals. Derived units stay in the output as unit clauses.
fn simplify_clauses(clauses: &[Clause]) -> Vec<Clause> {
    let mut units: AHashMap<i32, bool> = AHashMap::new();
    let mut work: Vec<Clause> = clauses.to_vec();
    let mut changed = true;
    while changed {
        changed = false;
        let mut kept: Vec<Clause> = Vec::with_capacity(work.len());
        'clauses: for clause in work.drain(..) {
            let mut reduced: Clause = Vec::with_capacity(clause.len());
            for &lit in &clause {
                match units.get(&lit.var()) {
                    Some(&v) if v == lit.is_pos() => continue 'clauses,
                    Some(_) => {}
                    None => reduced.push(lit),
                }
            }
            match reduced.len() {
                0 => {
                    // Inconsistent transition CNF; surface it unchanged so
                    // the solver reports unsat rather than losing clauses.
                    return clauses.to_vec();
                }
                1 => {
                    units.insert(reduced[0].var(), reduced[0].is_pos());
                    changed = true;
                }
                _ => kept.push(reduced),
            }
        }
        work = kept;
    }
    let mut out: Vec<Clause> = units
        .iter()
        .sorted()
        .map(|(&v, &pos)| vec![if pos { Sig::new(v) } else { Sig::new(-v) }])
        .collect();
    out.extend(work);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(text: &str, opts: ModelOptions) -> Model {
        let aig = Aig::from_bytes(text.as_bytes()).unwrap();
        Model::new(aig, opts).unwrap()
    }

    // in v1; latch v2 with next = input; bad = latch.
    const ONE_STEP: &str = "aag 2 1 1 1 0\n2\n4 2\n4\n";

    #[test]
    fn prime_of_latch_is_next() {
        let m = model(ONE_STEP, ModelOptions::default());
        let latch = Sig::new(2);
        assert_eq!(m.prime(latch), Sig::new(1));
        assert_eq!(m.prime(-latch), Sig::new(-1));
    }

    #[test]
    fn prime_negation_commutes_and_is_stable() {
        let m = model(ONE_STEP, ModelOptions::default());
        let input = Sig::new(1);
        let p = m.prime(input);
        assert_eq!(m.prime(-input), -p);
        assert_eq!(m.prime(input), p);
        assert!(p.var() > m.true_sig().var());
    }

    #[test]
    fn prime_k_unrolls_through_latches() {
        let m = model(ONE_STEP, ModelOptions::default());
        let latch = Sig::new(2);
        // latch' = input, latch'' = input one step later: a fresh id.
        let p1 = m.prime_k(latch, 1);
        let p2 = m.prime_k(latch, 2);
        assert_eq!(p1, Sig::new(1));
        assert_ne!(p2, p1);
        assert_eq!(m.prime_k(latch, 2), p2);
        assert_eq!(m.prime_k(m.true_sig(), 3), m.true_sig());
    }

    #[test]
    fn initial_state_from_constant_resets() {
        // Latch 1 resets to 0, latch 2 resets to 1.
        let m = model(
            "aag 3 0 2 1 1\n2 2\n4 4 1\n6\n6 2 4\n",
            ModelOptions { eq: EqStrategy::Off, ..Default::default() },
        );
        assert_eq!(m.initial_state(), &vec![Sig::new(-1), Sig::new(2)]);
    }

    #[test]
    fn and_gate_cnf_shape() {
        let m = model(
            "aag 4 2 0 1 1\n2\n4\n8\n8 4 2\n",
            ModelOptions { eq: EqStrategy::Off, ..Default::default() },
        );
        // One AND gate: three Tseitin clauses plus the constant-true unit.
        assert_eq!(m.clauses().len(), 4);
        assert!(m.clauses().contains(&vec![m.true_rep()]));
    }

    #[test]
    fn equivalent_latches_collapse() {
        // Two latches both following the input; bad = l1 & !l2 becomes
        // constant false once l2 is rewritten to l1.
        let text = "aag 4 1 2 1 1\n2\n4 2\n6 2\n8\n8 4 7\n";
        for eq in [EqStrategy::TernaryThenRandom, EqStrategy::Random] {
            let m = model(text, ModelOptions { eq, ..Default::default() });
            assert_eq!(m.model_latches().len(), 1, "strategy {eq:?}");
            // The bad gate's fanins collapse to l1 & !l1 after rewriting.
            let bad = m.bad();
            assert!(
                m.clauses().contains(&vec![-bad, Sig::new(2)])
                    && m.clauses().contains(&vec![-bad, Sig::new(-2)]),
                "strategy {eq:?}"
            );
        }
    }

    #[test]
    fn constant_latch_found_by_ternary() {
        // A latch stuck at 0 is equivalent to constant false; bad = latch
        // becomes constant false.
        let m = model(
            "aag 1 0 1 1 0\n2 2\n2\n",
            ModelOptions { eq: EqStrategy::Ternary, ..Default::default() },
        );
        assert!(m.is_false(m.bad()));
    }

    #[test]
    fn innards_get_primed_copies() {
        // Gate over two latches qualifies as an innard.
        let m = model(
            "aag 4 1 2 1 1\n2\n4 8\n6 2\n8\n8 6 4\n",
            ModelOptions {
                eq: EqStrategy::Off,
                internal_signals: true,
                ..Default::default()
            },
        );
        let innards = m.innards().to_vec();
        assert_eq!(innards, vec![Sig::new(4)]);
        assert_eq!(m.innard_level(Sig::new(4)), 1);
        let primed = m.prime(Sig::new(4));
        assert!(primed.var() > m.true_sig().var());
        // The primed copy has its own gate definition in the CNF.
        assert!(m.model_gates().contains(&primed));
    }

    #[test]
    fn simplify_propagates_units() {
        let clauses = vec![
            vec![Sig::new(1)],
            vec![Sig::new(-1), Sig::new(2)],
            vec![Sig::new(-2), Sig::new(3), Sig::new(4)],
            vec![Sig::new(1), Sig::new(5)],
        ];
        let simplified = simplify_clauses(&clauses);
        assert!(simplified.contains(&vec![Sig::new(1)]));
        assert!(simplified.contains(&vec![Sig::new(2)]));
        assert!(simplified.contains(&vec![Sig::new(3), Sig::new(4)]));
        assert_eq!(simplified.len(), 3);
    }

    #[test]
    fn previous_maps_next_ids_back() {
        let m = model(ONE_STEP, ModelOptions::default());
        // The input drives the latch.
        assert_eq!(m.previous(Sig::new(1)), vec![Sig::new(2)]);
        assert_eq!(m.previous(Sig::new(-1)), vec![Sig::new(-2)]);
    }
}
