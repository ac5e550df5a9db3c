//! Complementary Approximate Reachability, forward and backward.
//!
//! The over-sequence O0, O1, ... over-approximates states that can reach
//! the bad signal (forward mode) or that are reachable from the initial
//! state (backward mode); the under-sequence holds the concrete states
//! discovered while chasing counterexamples. A task stack drives the
//! interplay: locate a state against the over-sequence, then either expand
//! it with a SAT model or discharge it with an unsat core.

use crate::branching::{Branching, BranchingMode};
use crate::frames::{overlay_cube, OverSequence};
use crate::restart::RestartSchedule;
use crate::settings::{Direction, Settings};
use crate::solver::{StartSolver, TransSolver};
use crate::state::{State, Task, UnderSequence};
use crate::stats::Statistics;
use crate::witness::Trace;
use crate::CheckResult;
use ahash::AHashSet;
use caracal_ir::{order_cube, Cube, Model, Sig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::rc::Rc;

/// A canonical cube holding two literals of the same variable denotes the
/// empty state set.
fn contradictory(uc: &Cube) -> bool {
    uc.windows(2).any(|w| w[0].var() == w[1].var())
}

pub struct Car {
    settings: Settings,
    model: Rc<Model>,
    stats: Statistics,
    direction: Direction,

    over: OverSequence,
    under: UnderSequence,
    main: TransSolver,
    lift: Option<TransSolver>,
    start: Option<StartSolver>,
    branching: Branching,
    restart: Option<RestartSchedule>,

    effective_level: i32,
    min_update_level: i32,
    init_state: Rc<State>,
    last_uc: Cube,

    trace: Option<Trace>,
    invariant: Option<Vec<Vec<Rc<Cube>>>>,
}

impl Car {
    pub fn new(settings: Settings, model: Rc<Model>, direction: Direction) -> Self {
        let stats = Statistics::new(settings.timelimit);
        let init_state =
            State::new(None, Vec::new(), model.initial_state().clone(), 0);
        let over = OverSequence::new(model.clone());
        let main = TransSolver::new(model.clone(), direction == Direction::Forward);
        let branching = Branching::new(settings.branching);
        let restart = settings.restart.then(|| RestartSchedule::new(&settings));
        Car {
            settings,
            model,
            stats,
            direction,
            over,
            under: UnderSequence::new(),
            main,
            lift: None,
            start: None,
            branching,
            restart,
            effective_level: 0,
            min_update_level: 0,
            init_state,
            last_uc: Vec::new(),
            trace: None,
            invariant: None,
        }
    }

    pub fn counterexample(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn invariant_frames(&self) -> Option<&Vec<Vec<Rc<Cube>>>> {
        self.invariant.as_ref()
    }

    /// Snapshot of the over-sequence, frame by frame.
    pub fn frames(&self) -> Vec<Vec<Rc<Cube>>> {
        (0..self.over.len()).map(|i| self.over.frame(i)).collect()
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

    fn forward(&self) -> bool {
        self.direction == Direction::Forward
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

        self.main.load_trans();
        let mut assumption = self.model.initial_state().clone();
        assumption.push(bad);
        self.stats.tick();
        let sat = self.main.solve_under(&assumption);
        self.stats.stat_main_solver();
        if sat {
            let a = self.main.assignment(false);
            self.trace = Some(Trace {
                init_latches: overlay_cube(self.model.initial_state(), &a.latches),
                input_steps: vec![a.inputs],
            });
            return CheckResult::Unsafe;
        }

        match self.direction {
            Direction::Forward => {
                self.main.add_clause(&[self.model.property()]);
                let init: Cube = self.model.initial_state().clone();
                for &lit in &init {
                    let cube = Rc::new(vec![-lit]);
                    self.over.insert(cube.clone(), 0);
                    self.main.add_uc(&cube, 0);
                }
                let mut lift = TransSolver::new(self.model.clone(), true);
                lift.load_trans();
                self.lift = Some(lift);
                let mut start = StartSolver::new(self.model.clone(), bad);
                start.update_flag();
                self.start = Some(start);
            }
            Direction::Backward => {
                // The failed initial assumptions seed frame 0.
                let uc = self.main.core_filter_latches(Some(bad));
                if uc.is_empty() {
                    self.invariant = Some(Vec::new());
                    return CheckResult::Safe;
                }
                self.add_uc(uc, 0);
                self.under.push(self.init_state.clone());
            }
        }
        self.effective_level = 0;

        let mut frame_step: i32 = 0;
        loop {
            log::info!("{}", self.over.frames_info());
            self.min_update_level = self.over.len() as i32;
            let mut stack = self.seed_stack(frame_step);

            if self.forward() {
                self.stats.tick();
                let mut next = self.start.as_mut().and_then(|s| s.next_state());
                self.stats.stat_start_solver();
                if next.is_none() {
                    // At a fresh frontier every old activation flag is
                    // retired, so an empty enumeration means the bad
                    // signal is unsatisfiable under the transition CNF.
                    // The property alone is the invariant; emitting the
                    // frame union here would not be inductive.
                    self.over.set_invariant_level(frame_step);
                    self.invariant = Some(Vec::new());
                    return CheckResult::Safe;
                }
                while let Some((inputs, latches)) = next {
                    let state = State::new(None, inputs, latches, 0);
                    stack.push(Task::new(state, frame_step, true));
                    if let Some(result) = self.process_stack(&mut stack) {
                        return result;
                    }
                    self.stats.tick();
                    next = self.start.as_mut().and_then(|s| s.next_state());
                    self.stats.stat_start_solver();
                }
            } else if let Some(result) = self.process_stack(&mut stack) {
                return result;
            }

            frame_step += 1;
            if self.settings.propagation {
                self.stats.tick();
                self.propagate_frames();
                self.stats.stat_propagation();
            }
            self.main.simplify();
            self.effective_level += 1;
            if let Some(start) = self.start.as_mut() {
                start.update_flag();
            }

            if let Some(found) = self.find_invariant() {
                log::info!("proof at frame {found}");
                self.over.set_invariant_level(found as i32 - 1);
                self.invariant = Some(self.collect_frames(found as i32 - 1));
                return CheckResult::Safe;
            }
        }
    }

    fn seed_stack(&self, frame_step: i32) -> Vec<Task> {
        let mut stack = Vec::new();
        if self.settings.deep_first {
            for depth in (0..self.under.num_depths()).rev() {
                for state in self.under.at_depth(depth).iter().rev() {
                    stack.push(Task::new(state.clone(), frame_step, false));
                }
            }
        } else {
            for depth in 0..self.under.num_depths() {
                for state in self.under.at_depth(depth) {
                    stack.push(Task::new(state.clone(), frame_step, false));
                }
            }
        }
        stack
    }

    fn process_stack(&mut self, stack: &mut Vec<Task>) -> Option<CheckResult> {
        while !stack.is_empty() {
            if self.stats.is_timeout() {
                log::warn!("time limit reached");
                self.over.set_invariant_level(-1);
                return Some(CheckResult::Unknown);
            }

            let (state, located, stacked_level) = {
                let task = stack.last().expect("nonempty stack");
                (task.state.clone(), task.located, task.frame_level)
            };
            let mut frame_level = stacked_level;
            if !located {
                self.stats.tick();
                frame_level = self.get_new_level(&state, stacked_level + 1);
                self.stats.stat_get_new_level();
                if frame_level > self.effective_level {
                    stack.pop();
                    continue;
                }
            }
            {
                let task = stack.last_mut().expect("nonempty stack");
                task.located = false;
                task.frame_level = frame_level;
            }

            if frame_level == -1 {
                match self.direction {
                    Direction::Forward => {
                        self.trace = Some(self.forward_trace(&state));
                        return Some(CheckResult::Unsafe);
                    }
                    Direction::Backward => {
                        let mut assumption = state.latch_cube();
                        self.order_assumption(&mut assumption);
                        assumption.push(self.model.bad());
                        self.stats.tick();
                        let sat = self.main.solve_under(&assumption);
                        self.stats.stat_main_solver();
                        if sat {
                            // The state itself satisfies the bad signal.
                            self.trace = Some(self.backward_trace(&state));
                            return Some(CheckResult::Unsafe);
                        }
                        let uc =
                            self.main.core_filter_latches(Some(self.model.bad()));
                        if uc.is_empty() {
                            self.invariant =
                                Some(self.collect_frames(self.effective_level));
                            return Some(CheckResult::Safe);
                        }
                        self.record_uc(uc, 0);
                        if self.maybe_restart(stack) {
                            continue;
                        }
                        let task = stack.last_mut().expect("nonempty stack");
                        task.frame_level += 1;
                        continue;
                    }
                }
            }

            let mut assumption = state.latch_cube();
            self.order_assumption(&mut assumption);
            if self.forward() {
                for l in assumption.iter_mut() {
                    *l = self.model.prime(*l);
                }
            }
            self.stats.tick();
            let sat = self.main.solve_frame(&assumption, frame_level as usize);
            self.stats.stat_main_solver();

            if sat {
                let a = self.main.assignment(!self.forward());
                let mut latches = a.latches;
                if self.forward() {
                    self.stats.tick();
                    self.lift_predecessor(&mut latches, &a.inputs, &state);
                    self.stats.stat_lift();
                }
                let new_state = State::new(
                    Some(state.clone()),
                    a.inputs,
                    latches,
                    state.depth + 1,
                );
                self.under.push(new_state.clone());
                self.stats.tick();
                let new_level = self.get_new_level(&new_state, 0);
                self.stats.stat_get_new_level();
                stack.push(Task::new(new_state, new_level, true));
            } else {
                let mut uc = if self.forward() {
                    self.main.core_previous()
                } else {
                    self.main.core_filter_latches(None)
                };
                if uc.is_empty() {
                    // Unsat regardless of the state: the frontier can never
                    // reach this query, so the property holds outright.
                    self.invariant = Some(self.collect_frames(self.effective_level));
                    return Some(CheckResult::Safe);
                }
                if contradictory(&uc) {
                    // Two latches sharing a next-state function can map a
                    // core back onto complementary literals. Such a state
                    // has no predecessor at all; block the state itself.
                    uc = state.latch_cube();
                }
                let uc = self.trim_with_reference(uc, frame_level);
                self.record_uc(uc, frame_level + 1);
                if self.maybe_restart(stack) {
                    continue;
                }
                let task = stack.last_mut().expect("nonempty stack");
                task.frame_level += 1;
            }
        }
        None
    }

    /// Record a discharged core: branching bump, frame insert, solver
    /// clause, single-cube propagation.
    fn record_uc(&mut self, uc: Cube, level: i32) {
        self.branching.update(&uc);
        self.last_uc = uc.clone();
        self.stats.tick();
        self.add_uc(uc.clone(), level);
        if self.settings.propagation {
            self.propagate_uc_from(uc, level);
        }
        self.stats.stat_update_uc();
        if let Some(r) = self.restart.as_mut() {
            r.record_uc();
        }
    }

    fn add_uc(&mut self, uc: Cube, level: i32) {
        debug_assert!(level >= 0);
        let rc = Rc::new(uc);
        self.over.insert(rc.clone(), level as usize);
        self.min_update_level = self.min_update_level.min(level);
        self.main.add_uc(&rc, level as usize);
        if level > self.effective_level {
            if let Some(start) = self.start.as_mut() {
                start.add_blocking(&rc);
            }
        }
    }

    /// Push a freshly learned cube further up while it stays consistent
    /// with the frames it would strengthen.
    fn propagate_uc_from(&mut self, mut uc: Cube, level: i32) {
        let mut lvl = level;
        while lvl < self.effective_level {
            let assumption: Cube = if self.forward() {
                uc.iter().map(|&l| self.model.prime(l)).collect()
            } else {
                uc.clone()
            };
            let sat = self.main.solve_frame(&assumption, lvl as usize);
            self.stats.main_solver_calls += 1;
            if sat {
                break;
            }
            let core = if self.forward() {
                self.main.core_previous()
            } else {
                self.main.core_filter_latches(None)
            };
            if core.is_empty() || contradictory(&core) {
                break;
            }
            self.add_uc(core.clone(), lvl + 1);
            uc = core;
            lvl += 1;
        }
    }

    /// Refer-skipping: try shrinking the core to its overlap with the
    /// previous one; keep the shrunk version when it still discharges.
    fn trim_with_reference(&mut self, uc: Cube, frame_level: i32) -> Cube {
        if !self.settings.refer_skipping || self.last_uc.is_empty() {
            return uc;
        }
        let reference: AHashSet<Sig> = self.last_uc.iter().copied().collect();
        let mut trimmed: Cube =
            uc.iter().copied().filter(|l| reference.contains(l)).collect();
        if trimmed.is_empty() || trimmed.len() == uc.len() {
            return uc;
        }
        order_cube(&mut trimmed);
        let assumption: Cube = if self.forward() {
            trimmed.iter().map(|&l| self.model.prime(l)).collect()
        } else {
            trimmed.clone()
        };
        self.stats.tick();
        let sat = self.main.solve_frame(&assumption, frame_level as usize);
        self.stats.stat_main_solver();
        if sat {
            return uc;
        }
        let core = if self.forward() {
            self.main.core_previous()
        } else {
            self.main.core_filter_latches(None)
        };
        if core.is_empty() || contradictory(&core) {
            uc
        } else {
            core
        }
    }

    fn maybe_restart(&mut self, stack: &mut Vec<Task>) -> bool {
        let due = self.restart.as_ref().is_some_and(|r| r.should_restart());
        if !due {
            return false;
        }
        log::info!("restarting: rebuilding solvers, clearing the task stack");
        self.rebuild_solvers();
        *stack = self.seed_stack(self.effective_level);
        if let Some(r) = self.restart.as_mut() {
            r.advance();
        }
        self.stats.count_restart();
        true
    }

    /// Rebuild the incremental solvers from the surviving frame sequence.
    fn rebuild_solvers(&mut self) {
        let mut main =
            TransSolver::new(self.model.clone(), self.forward());
        main.load_trans();
        if self.forward() {
            main.add_clause(&[self.model.property()]);
        }
        for lvl in 0..self.over.len() {
            for cube in self.over.frame(lvl) {
                main.add_uc(&cube, lvl);
            }
        }
        self.main = main;
        if self.forward() {
            let mut lift = TransSolver::new(self.model.clone(), true);
            lift.load_trans();
            self.lift = Some(lift);
            let mut start = StartSolver::new(self.model.clone(), self.model.bad());
            start.update_flag();
            self.start = Some(start);
        }
    }

    /// Minimize a predecessor against the successor it was discovered
    /// from, fixing the inputs.
    fn lift_predecessor(&mut self, latches: &mut Cube, inputs: &Cube, succ: &Rc<State>) {
        let lift = self.lift.as_mut().expect("forward mode has a lift solver");
        let negated: Vec<Sig> = succ
            .latch_cube()
            .iter()
            .map(|&l| -self.model.prime(l))
            .collect();
        lift.add_temp_clause(&negated);
        loop {
            let mut assumption = latches.clone();
            assumption.extend(inputs.iter().copied());
            let sat = lift.solve_under(&assumption);
            if sat {
                debug_assert!(!sat, "lift query returned sat");
                break;
            }
            let core = lift.core_from_cube(latches, false);
            if core.len() >= latches.len() || core.is_empty() {
                break;
            }
            *latches = core;
        }
        lift.release_temp_clause();
    }

    /// Smallest frame the state is not blocked by, minus one.
    fn get_new_level(&mut self, state: &Rc<State>, start: i32) -> i32 {
        let latches = state.latch_cube();
        let start = start.max(0);
        for i in start..self.over.len() as i32 {
            if !self.over.blocked(&latches, i as usize) {
                return i - 1;
            }
        }
        self.over.len() as i32 - 1
    }

    /// The frame-by-frame propagation pass: move cubes one frame up when
    /// they stay consistent.
    fn propagate_frames(&mut self) {
        for lvl in self.min_update_level.max(1)..self.effective_level + 1 {
            let cubes = self.over.frame(lvl as usize);
            for cube in cubes {
                self.propagate_uc_from((*cube).clone(), lvl);
            }
        }
    }

    /// CAR's fixpoint test: frame `i` is an invariant when every state
    /// blocked by all earlier frames is blocked by it too.
    fn find_invariant(&mut self) -> Option<usize> {
        let mut inv = TransSolver::new(self.model.clone(), self.forward());
        for c in self.model.clauses().to_vec() {
            inv.add_clause(&c);
        }
        let mut found = None;
        for i in 0..self.over.len() {
            let frame = self.over.frame(i);
            if (i as i32) < self.min_update_level {
                inv.add_constraint_or(&frame);
                continue;
            }
            inv.add_constraint_and(&frame);
            self.stats.tick();
            let sat = inv.solve();
            self.stats.stat_inv_solver();
            inv.flip_last_constraint();
            inv.add_constraint_or(&frame);
            if !sat {
                found = Some(i);
                break;
            }
        }
        found
    }

    fn collect_frames(&self, up_to: i32) -> Vec<Vec<Rc<Cube>>> {
        let mut frames = Vec::new();
        for i in 0..=up_to {
            frames.push(self.over.frame(i as usize));
        }
        frames
    }

    fn order_assumption(&self, cube: &mut Cube) {
        if self.settings.seed > 0 {
            let mut rng = StdRng::seed_from_u64(self.settings.seed);
            cube.shuffle(&mut rng);
            return;
        }
        if self.settings.internal_signals {
            let model = &self.model;
            cube.sort_by(|a, b| model.innard_level(*b).cmp(&model.innard_level(*a)));
            return;
        }
        if self.branching.mode() != BranchingMode::Off {
            let branching = &self.branching;
            cube.sort_by(|a, b| {
                branching
                    .priority_of(*b)
                    .partial_cmp(&branching.priority_of(*a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if self.settings.rotate && !self.last_uc.is_empty() {
            let reference: AHashSet<Sig> = self.last_uc.iter().copied().collect();
            let (mut hot, cold): (Cube, Cube) =
                cube.iter().copied().partition(|l| reference.contains(l));
            hot.extend(cold);
            *cube = hot;
        }
    }

    /// Forward CEX: the task state sits in the initial region; its `pre`
    /// chain walks toward the bad start state.
    fn forward_trace(&self, state: &Rc<State>) -> Trace {
        let init_latches =
            overlay_cube(self.model.initial_state(), &state.latch_cube());
        let mut input_steps = Vec::new();
        let mut cur = Some(state.clone());
        while let Some(s) = cur {
            input_steps.push(s.inputs.clone());
            cur = s.pre.clone();
        }
        // The final entry is the bad-state frame itself; its inputs do not
        // drive a transition.
        if input_steps.len() > 1 {
            input_steps.pop();
        }
        Trace {
            init_latches,
            input_steps,
        }
    }

    /// Backward CEX: walk `pre` links back to the initial state. Each
    /// state after the first carries the inputs of the transition into it;
    /// the bad frame itself contributes no input line.
    fn backward_trace(&self, state: &Rc<State>) -> Trace {
        let mut chain = Vec::new();
        let mut cur = Some(state.clone());
        while let Some(s) = cur {
            chain.push(s.clone());
            cur = s.pre.clone();
        }
        chain.reverse();
        let input_steps: Vec<Cube> = chain
            .iter()
            .skip(1)
            .map(|s| s.inputs.clone())
            .collect();
        Trace {
            init_latches: self.model.initial_state().clone(),
            input_steps,
        }
    }
}
