//! Bounded model checking: a thin unrolling driver over the SAT facade.

use crate::settings::Settings;
use crate::solver::TransSolver;
use crate::stats::Statistics;
use crate::witness::Trace;
use crate::CheckResult;
use caracal_ir::{Cube, Model, Sig};
use std::rc::Rc;

pub struct Bmc {
    settings: Settings,
    model: Rc<Model>,
    stats: Statistics,
    trace: Option<Trace>,
}

impl Bmc {
    pub fn new(settings: Settings, model: Rc<Model>) -> Self {
        let stats = Statistics::new(settings.timelimit);
        Bmc {
            settings,
            model,
            stats,
            trace: None,
        }
    }

    pub fn counterexample(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn run(&mut self) -> CheckResult {
        let result = if self.settings.bmc_step > 1 {
            self.check_step()
        } else {
            self.check_incremental()
        };
        self.stats.report();
        match result {
            CheckResult::Safe => log::info!("result: safe"),
            CheckResult::Unsafe => log::info!("result: unsafe"),
            CheckResult::Unknown => log::info!("result: unknown"),
        }
        result
    }

    fn fresh_solver(&self) -> TransSolver {
        let mut solver = TransSolver::new(self.model.clone(), true);
        for &l in self.model.initial_state() {
            solver.add_clause(&[l]);
        }
        solver.load_initial_clauses();
        solver
    }

    fn bad_at(&self, k: usize) -> Sig {
        self.model.prime_k(self.model.bad(), k)
    }

    fn constraints_at(&self, k: usize) -> Cube {
        self.model
            .constraints()
            .iter()
            .map(|&c| self.model.prime_k(c, k))
            .collect()
    }

    /// One incremental solver, growing by one unrolling per bound.
    fn check_incremental(&mut self) -> CheckResult {
        let mut solver = self.fresh_solver();
        let mut k = 0usize;
        loop {
            if self.stats.is_timeout() {
                log::warn!("time limit reached");
                return CheckResult::Unknown;
            }
            log::info!("bmc bound {k}");
            for c in self.model.clauses_at(k) {
                solver.add_clause(&c);
            }
            let k_bad = self.bad_at(k);
            let mut assumption = vec![k_bad];
            assumption.extend(self.constraints_at(k));
            self.stats.tick();
            let sat = solver.solve_under(&assumption);
            self.stats.stat_main_solver();
            if sat {
                self.trace = Some(self.extract_trace(&solver, k));
                return CheckResult::Unsafe;
            }
            for c in self.constraints_at(k) {
                solver.add_clause(&[c]);
            }
            solver.add_clause(&[-k_bad]);
            k += 1;
            if self.settings.bmc_k != -1 && k as i64 > self.settings.bmc_k {
                return CheckResult::Unknown;
            }
        }
    }

    /// Batch several bounds per one-shot solver: unroll `bmc_step` frames,
    /// assert the disjunction of their bad literals, and rebuild on miss.
    fn check_step(&mut self) -> CheckResult {
        let step = self.settings.bmc_step;
        let mut stored: Vec<Cube> = Vec::new();
        let mut k = 0usize;
        loop {
            let mut solver = self.fresh_solver();
            for c in &stored {
                solver.add_clause(c);
            }
            let mut batch_bads: Vec<Sig> = Vec::new();
            let mut batch_from = k;
            for _ in 0..step {
                if self.stats.is_timeout() {
                    log::warn!("time limit reached");
                    return CheckResult::Unknown;
                }
                log::info!("bmc bound {k}");
                for c in self.model.clauses_at(k) {
                    solver.add_clause(&c);
                    stored.push(c);
                }
                let k_bad = self.bad_at(k);
                batch_bads.push(k_bad);
                stored.push(vec![-k_bad]);
                k += 1;
                if self.settings.bmc_k != -1 && k as i64 > self.settings.bmc_k {
                    break;
                }
            }
            solver.add_clause(&batch_bads);
            self.stats.tick();
            let sat = solver.solve_under(&[]);
            self.stats.stat_main_solver();
            if sat {
                // Find the frame whose bad literal fired.
                let hit = batch_bads
                    .iter()
                    .position(|&b| solver.model_value(b))
                    .unwrap_or(0);
                batch_from += hit;
                self.trace = Some(self.extract_trace(&solver, batch_from));
                return CheckResult::Unsafe;
            }
            if self.settings.bmc_k != -1 && k as i64 > self.settings.bmc_k {
                return CheckResult::Unknown;
            }
        }
    }

    /// Read the counterexample out of the unrolled model: initial latch
    /// values at frame 0 and one input vector per transition (one vector
    /// total when the property already fails at frame 0).
    fn extract_trace(&self, solver: &TransSolver, k: usize) -> Trace {
        let mut init_latches: Cube = Vec::new();
        for &l in self.model.model_latches() {
            init_latches.push(if solver.model_value(l) { l } else { -l });
        }
        let steps = if k == 0 { 1 } else { k };
        let mut input_steps = Vec::with_capacity(steps);
        for j in 0..steps {
            let mut inputs: Cube = Vec::new();
            for &i in self.model.model_inputs() {
                let at_j = self.model.prime_k(i, j);
                inputs.push(if solver.model_value(at_j) { i } else { -i });
            }
            input_steps.push(inputs);
        }
        Trace {
            init_latches,
            input_steps,
        }
    }
}
