//! IC3/PDR: property-directed reachability with per-frame solvers.

use crate::frames::{overlay_cube, OrdCube};
use crate::settings::Settings;
use crate::solver::TransSolver;
use crate::state::{Obligation, State};
use crate::stats::Statistics;
use crate::witness::Trace;
use crate::CheckResult;
use ahash::AHashSet;
use caracal_ir::{order_cube, Clause, Cube, Model, Sig};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::rc::Rc;

struct Ic3Frame {
    /// Cubes whose highest blocked level is this frame.
    cubes: BTreeSet<OrdCube>,
    solver: TransSolver,
}

pub struct Ic3 {
    settings: Settings,
    model: Rc<Model>,
    stats: Statistics,

    frames: Vec<Ic3Frame>,
    k: usize,
    lift: TransSolver,
    init_lits: AHashSet<Sig>,

    obligation_seq: u64,
    trivial: bool,
    earliest: usize,
    timed_out: bool,

    trace: Option<Trace>,
    invariant: Option<Vec<Vec<Rc<Cube>>>>,
}

impl Ic3 {
    pub fn new(settings: Settings, model: Rc<Model>) -> Self {
        let stats = Statistics::new(settings.timelimit);
        let mut lift = TransSolver::new(model.clone(), true);
        lift.load_trans_primed();
        let init_lits = model.initial_state().iter().copied().collect();
        Ic3 {
            settings,
            model,
            stats,
            frames: Vec::new(),
            k: 0,
            lift,
            init_lits,
            obligation_seq: 0,
            trivial: true,
            earliest: 0,
            timed_out: false,
            trace: None,
            invariant: None,
        }
    }

    pub fn counterexample(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// On Safe: the invariant rendered as frame cube-sets for the witness.
    pub fn invariant_frames(&self) -> Option<&Vec<Vec<Rc<Cube>>>> {
        self.invariant.as_ref()
    }

    /// Snapshot of the frame sequence; each cube sits at the highest level
    /// it was blocked at, and holds at every level below it.
    pub fn frames(&self) -> Vec<Vec<Rc<Cube>>> {
        self.frames
            .iter()
            .map(|f| f.cubes.iter().map(|c| c.0.clone()).collect())
            .collect()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn run(&mut self) -> CheckResult {
        let result = self.check();
        self.stats.report();
        match result {
            CheckResult::Safe => log::info!("result: safe"),
            CheckResult::Unsafe => log::info!("result: unsafe"),
            CheckResult::Unknown => log::info!("result: unknown"),
        }
        result
    }

    fn check(&mut self) -> CheckResult {
        let bad = self.model.bad();
        if self.model.is_true(bad) {
            self.trace = Some(Trace {
                init_latches: self.model.initial_state().clone(),
                input_steps: vec![Vec::new()],
            });
            return CheckResult::Unsafe;
        }
        if self.model.is_false(bad) {
            self.invariant = Some(Vec::new());
            return CheckResult::Safe;
        }

        if let Some(trace) = self.base_cases() {
            self.trace = Some(trace);
            return CheckResult::Unsafe;
        }
        log::info!("base cases passed, entering the main loop");

        // F0 is exactly the initial states.
        self.add_new_frame();
        let init: Cube = self.model.initial_state().clone();
        for &lit in &init {
            self.frames[0].solver.add_clause(&[lit]);
            self.add_blocking_cube(Rc::new(vec![-lit]), 0);
        }
        self.frames[0].solver.load_initial_clauses();

        self.k = 1;
        loop {
            log::info!("==== k = {} ==== {}", self.k, self.frames_info());
            if self.stats.is_timeout() {
                log::warn!("time limit reached");
                return CheckResult::Unknown;
            }
            while self.frames.len() <= self.k + 1 {
                self.add_new_frame();
            }
            if !self.strengthen() {
                return CheckResult::Unsafe;
            }
            if self.timed_out {
                return CheckResult::Unknown;
            }
            if self.propagate() {
                return CheckResult::Safe;
            }
            self.k += 1;
        }
    }

    /// 0-step (`I & bad`) and 1-step (`I & T & bad'`) reachability.
    fn base_cases(&mut self) -> Option<Trace> {
        let bad = self.model.bad();
        let init: Cube = self.model.initial_state().clone();

        let mut solver = TransSolver::new(self.model.clone(), true);
        solver.load_trans();
        solver.load_initial_clauses();
        let mut assumption = init.clone();
        assumption.push(bad);
        self.stats.tick();
        let sat = solver.solve_under(&assumption);
        self.stats.stat_main_solver();
        if sat {
            log::info!("property fails in the initial states");
            let a = solver.assignment(false);
            return Some(Trace {
                init_latches: a.latches,
                input_steps: vec![a.inputs],
            });
        }

        let mut solver = TransSolver::new(self.model.clone(), true);
        solver.load_trans_primed();
        solver.load_initial_clauses();
        let mut assumption = init;
        assumption.push(self.model.prime(bad));
        self.stats.tick();
        let sat = solver.solve_under(&assumption);
        self.stats.stat_main_solver();
        if sat {
            log::info!("property fails after one step");
            let a = solver.assignment(false);
            return Some(Trace {
                init_latches: a.latches,
                input_steps: vec![a.inputs],
            });
        }
        None
    }

    fn add_new_frame(&mut self) {
        log::debug!("adding frame F{}", self.frames.len());
        let mut solver = TransSolver::new(self.model.clone(), true);
        solver.load_trans_primed();
        solver.add_property_clause();
        self.frames.push(Ic3Frame {
            cubes: BTreeSet::new(),
            solver,
        });
    }

    fn add_blocking_cube(&mut self, cube: Rc<Cube>, level: usize) {
        if !self.frames[level].cubes.insert(OrdCube(cube.clone())) {
            return;
        }
        self.earliest = self.earliest.min(level);
        log::trace!("F{level} += {cube:?}");
        let lemma: Clause = cube.iter().map(|&l| -l).collect();
        for i in 1..=level {
            self.frames[i].solver.add_clause(&lemma);
        }
    }

    fn strengthen(&mut self) -> bool {
        self.trivial = true;
        self.earliest = self.k + 1;
        let bad_prime = self.model.prime(self.model.bad());
        loop {
            if self.stats.is_timeout() {
                self.timed_out = true;
                return true;
            }
            self.stats.tick();
            let sat = self.frames[self.k].solver.solve_under(&[bad_prime]);
            self.stats.stat_main_solver();
            if !sat {
                log::debug!("no more CTIs at level {}", self.k);
                return true;
            }
            self.trivial = false;

            let a = self.frames[self.k].solver.assignment_full();
            let mut latches = a.latches;
            self.stats.tick();
            self.lift_state(&mut latches, &a.inputs, &a.prime_inputs, None);
            self.stats.stat_lift();
            let cti = State::with_assignment(
                None,
                a.inputs,
                latches,
                a.innards,
                a.prime_inputs,
                1,
            );

            let mut obligations: BTreeSet<Obligation> = BTreeSet::new();
            self.obligation_seq += 1;
            obligations.insert(Obligation {
                state: cti,
                level: self.k - 1,
                depth: 1,
                seq: self.obligation_seq,
            });
            if !self.handle_obligations(&mut obligations) {
                return false;
            }
            if self.timed_out {
                return true;
            }
        }
    }

    fn handle_obligations(&mut self, obligations: &mut BTreeSet<Obligation>) -> bool {
        while let Some(ob) = obligations.first().cloned() {
            if self.stats.is_timeout() {
                self.timed_out = true;
                return true;
            }
            log::debug!(
                "obligation at level {} depth {} ({} pending)",
                ob.level,
                ob.depth,
                obligations.len()
            );
            let state_cube = ob.state.latch_cube();
            let cti_prime: Cube =
                state_cube.iter().map(|&l| self.model.prime(l)).collect();
            self.stats.tick();
            let sat = self.frames[ob.level].solver.solve_under(&cti_prime);
            self.stats.stat_main_solver();

            if !sat {
                obligations.pop_first();
                self.stats.tick();
                let core = self.frames[ob.level]
                    .solver
                    .core_from_cube(&state_cube, true);
                let mut cube = if self.initiation_check(&core) {
                    core
                } else {
                    state_cube.clone()
                };
                self.generalize(&mut cube, ob.level);
                order_cube(&mut cube);
                let push_level = self.push_lemma_forward(&cube, ob.level + 1);
                self.stats.stat_update_uc();
                log::debug!("learned cube {cube:?} at F{push_level}");
                self.add_blocking_cube(Rc::new(cube.clone()), push_level);

                if push_level <= self.k {
                    self.obligation_seq += 1;
                    obligations.insert(Obligation {
                        state: ob.state.clone(),
                        level: push_level,
                        depth: ob.depth,
                        seq: self.obligation_seq,
                    });
                }

                if self.settings.internal_signals {
                    self.innards_pass(&cube, &ob, push_level);
                }
            } else {
                let a = self.frames[ob.level].solver.assignment_full();
                if ob.level == 0 {
                    // The predecessor sits in the initial states: a real
                    // counterexample.
                    let pred = State::with_assignment(
                        None,
                        a.inputs,
                        a.latches,
                        a.innards,
                        a.prime_inputs,
                        ob.depth + 1,
                    );
                    *pred.next.borrow_mut() = Some(ob.state.clone());
                    log::info!("counterexample of depth {}", ob.depth + 1);
                    self.trace = Some(self.build_trace(&pred));
                    return false;
                }
                let mut latches = a.latches;
                self.stats.tick();
                self.lift_state(
                    &mut latches,
                    &a.inputs,
                    &a.prime_inputs,
                    Some(&state_cube),
                );
                self.stats.stat_lift();
                let pred = State::with_assignment(
                    None,
                    a.inputs,
                    latches,
                    a.innards,
                    a.prime_inputs,
                    ob.depth + 1,
                );
                *pred.next.borrow_mut() = Some(ob.state.clone());
                self.obligation_seq += 1;
                obligations.insert(Obligation {
                    state: pred,
                    level: ob.level - 1,
                    depth: ob.depth + 1,
                    seq: self.obligation_seq,
                });
            }
        }
        true
    }

    /// Re-generalize the freshly learned cube with the related innards of
    /// the blocked state; keep the stronger lemma only when its latch
    /// projection strictly shrinks.
    fn innards_pass(&mut self, cube: &Cube, ob: &Obligation, push_level: usize) {
        let innards = self.model.relevant_innards(cube, &ob.state.innards);
        if innards.is_empty() {
            return;
        }
        let mut extended = cube.clone();
        extended.extend(innards);
        self.generalize(&mut extended, push_level.saturating_sub(1));
        order_cube(&mut extended);
        let latch_projection =
            extended.iter().filter(|&&l| self.model.is_latch(l)).count();
        if latch_projection < cube.len() {
            let level = self.push_lemma_forward(&extended, push_level);
            log::debug!("innard lemma {extended:?} at F{level}");
            self.add_blocking_cube(Rc::new(extended), level);
        }
    }

    /// MIC: drop literals while initiation and consecution still hold.
    fn generalize(&mut self, cube: &mut Cube, level: usize) {
        let mut r#gen = cube.clone();
        self.order_assumption(&mut r#gen);
        let mut tried: AHashSet<Sig> = AHashSet::new();

        let mut i = r#gen.len() as i64 - 1;
        while i >= 0 {
            if i as usize >= r#gen.len() {
                i = r#gen.len() as i64 - 1;
            }
            let lit = r#gen[i as usize];
            if tried.contains(&lit) {
                i -= 1;
                continue;
            }
            let mut candidate: Cube = Vec::with_capacity(r#gen.len() - 1);
            for (j, &l) in r#gen.iter().enumerate() {
                if j != i as usize {
                    candidate.push(l);
                }
            }
            if !self.initiation_check(&candidate) {
                tried.insert(lit);
                i -= 1;
                continue;
            }

            let lemma: Clause = candidate.iter().map(|&l| -l).collect();
            self.frames[level].solver.add_temp_clause(&lemma);
            let mut ordered = candidate.clone();
            self.order_assumption(&mut ordered);
            let primed: Cube =
                ordered.iter().map(|&l| self.model.prime(l)).collect();
            self.stats.tick();
            let sat = self.frames[level].solver.solve_under(&primed);
            self.stats.stat_main_solver();
            if !sat {
                let core = self.frames[level].solver.core_from_cube(&ordered, true);
                self.frames[level].solver.release_temp_clause();
                r#gen = if self.initiation_check(&core) {
                    core
                } else {
                    candidate
                };
                self.order_assumption(&mut r#gen);
            } else {
                self.frames[level].solver.release_temp_clause();
                tried.insert(lit);
            }
            i -= 1;
        }
        *cube = r#gen;
    }

    /// Whether the cube avoids the initial states: syntactic against the
    /// initial literals, by SAT when innards are involved.
    fn initiation_check(&mut self, cube: &Cube) -> bool {
        if cube.iter().any(|&l| self.model.is_innard(l)) {
            self.stats.tick();
            let sat = self.frames[0].solver.solve_under(cube);
            self.stats.stat_main_solver();
            return !sat;
        }
        cube.iter().any(|l| self.init_lits.contains(&-*l))
    }

    /// Minimize a concrete predecessor against its successor cube (or the
    /// primed bad signal) with iterated unsat cores over the lift solver.
    fn lift_state(
        &mut self,
        latches: &mut Cube,
        inputs: &Cube,
        prime_inputs: &Cube,
        successor: Option<&Cube>,
    ) {
        let negated: Clause = match successor {
            Some(succ) => succ.iter().map(|&l| -self.model.prime(l)).collect(),
            None => vec![-self.model.prime(self.model.bad())],
        };
        self.lift.add_temp_clause(&negated);
        loop {
            let mut assumption = latches.clone();
            assumption.extend(inputs.iter().copied());
            assumption.extend(prime_inputs.iter().copied());
            let sat = self.lift.solve_under(&assumption);
            if sat {
                // The query is unsat by construction; bail out rather than
                // trust a partial lift.
                debug_assert!(!sat, "lift query returned sat");
                break;
            }
            let core = self.lift.core_from_cube(latches, false);
            log::trace!("lift: {} -> {} literals", latches.len(), core.len());
            if core.len() >= latches.len() || core.is_empty() {
                break;
            }
            *latches = core;
        }
        self.lift.release_temp_clause();
    }

    /// Push the lemma as long as it stays inductive relative to the next
    /// frame; returns the first level it no longer holds at.
    fn push_lemma_forward(&mut self, cube: &Cube, start_level: usize) -> usize {
        let mut level = start_level;
        while level <= self.k {
            let primed: Cube = cube.iter().map(|&l| self.model.prime(l)).collect();
            self.stats.tick();
            let sat = self.frames[level].solver.solve_under(&primed);
            self.stats.stat_main_solver();
            if sat {
                break;
            }
            level += 1;
        }
        level
    }

    /// Push every cube that remains inductive one frame up; report Safe
    /// when a frame drains empty.
    fn propagate(&mut self) -> bool {
        log::debug!("propagating clauses ({})", self.frames_info());
        self.stats.tick();

        // A cube stored high implicitly holds below; drop shadowed copies.
        let mut seen: BTreeSet<OrdCube> = BTreeSet::new();
        for i in (self.earliest..=self.k + 1).rev() {
            let frame = &mut self.frames[i].cubes;
            frame.retain(|c| !seen.contains(c));
            seen.extend(frame.iter().cloned());
        }

        let from = if self.trivial { self.k } else { 1 };
        for i in from..=self.k {
            let cubes: Vec<Rc<Cube>> =
                self.frames[i].cubes.iter().map(|c| c.0.clone()).collect();
            let mut moved = 0usize;
            for cube in &cubes {
                let primed: Cube =
                    cube.iter().map(|&l| self.model.prime(l)).collect();
                let sat = self.frames[i].solver.solve_under(&primed);
                self.stats.main_solver_calls += 1;
                if !sat {
                    let core = self.frames[i].solver.core_from_cube(cube, true);
                    let smaller = if !core.is_empty() && self.initiation_check(&core)
                    {
                        core
                    } else {
                        (**cube).clone()
                    };
                    self.add_blocking_cube(Rc::new(smaller), i + 1);
                    self.frames[i].cubes.remove(&OrdCube(cube.clone()));
                    moved += 1;
                }
            }
            log::debug!("frame {i}: {moved}/{} cubes propagated", cubes.len());

            if self.frames[i].cubes.is_empty() {
                log::info!("frame F{i} is an inductive invariant");
                let mut invariant: Vec<Rc<Cube>> = Vec::new();
                for j in (i + 1)..self.frames.len() {
                    invariant.extend(self.frames[j].cubes.iter().map(|c| c.0.clone()));
                }
                self.invariant = Some(vec![invariant]);
                self.stats.stat_propagation();
                return true;
            }
        }

        for i in 1..self.frames.len() {
            self.frames[i].solver.simplify();
        }
        self.lift.simplify();
        self.stats.stat_propagation();
        false
    }

    fn order_assumption(&self, cube: &mut Cube) {
        if self.settings.seed > 0 {
            let mut rng = StdRng::seed_from_u64(self.settings.seed);
            cube.shuffle(&mut rng);
            return;
        }
        if self.settings.internal_signals {
            let model = &self.model;
            cube.sort_by(|a, b| {
                model.innard_level(*b).cmp(&model.innard_level(*a))
            });
        }
    }

    fn build_trace(&self, deepest: &Rc<State>) -> Trace {
        let init_latches =
            overlay_cube(self.model.initial_state(), &deepest.latch_cube());
        let mut input_steps = Vec::new();
        let mut cur = Some(deepest.clone());
        while let Some(s) = cur {
            input_steps.push(s.inputs.clone());
            cur = s.next.borrow().clone();
        }
        Trace {
            init_latches,
            input_steps,
        }
    }

    fn frames_info(&self) -> String {
        let frames = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| format!("F{i}[{}]", f.cubes.len()))
            .join(" ");
        format!("frames: {frames}")
    }
}
