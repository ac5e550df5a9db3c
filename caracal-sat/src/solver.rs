//! The CDCL search core.

use crate::heap::VarHeap;
use crate::types::{Lbool, Lit, Var};

/// Reference to a clause in the solver's slab.
type CRef = u32;

#[derive(Debug)]
struct Clause {
    lits: Vec<Lit>,
    activity: f32,
    learnt: bool,
}

#[derive(Clone, Copy)]
struct Watcher {
    cref: CRef,
    /// A literal of the clause other than the watched one; if it is already
    /// true the clause is satisfied and the watcher list scan can move on.
    blocker: Lit,
}

#[derive(Clone, Copy)]
struct VarData {
    reason: Option<CRef>,
    level: u32,
}

/// Running counters, readable between solves.
#[derive(Default, Debug, Clone, Copy)]
pub struct SolverStats {
    pub solves: u64,
    pub starts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
}

const VAR_DECAY: f64 = 0.95;
const CLA_DECAY: f64 = 0.999;
const RESTART_FIRST: u64 = 100;
const ACTIVITY_RESCALE: f64 = 1e100;
const CLA_RESCALE: f32 = 1e20;

/// An incremental CDCL solver.
///
/// Clauses are added at the top level; [`Solver::solve`] searches under a set
/// of assumption literals. After an unsatisfiable solve,
/// [`Solver::failed_assumptions`] holds the subset of assumptions the
/// conflict depends on, in the order they appear on the trail.
pub struct Solver {
    slab: Vec<Option<Clause>>,
    free: Vec<CRef>,
    problem: Vec<CRef>,
    learnts: Vec<CRef>,

    watches: Vec<Vec<Watcher>>,
    assigns: Vec<Lbool>,
    vardata: Vec<VarData>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,

    activity: Vec<f64>,
    var_inc: f64,
    cla_inc: f32,
    order: VarHeap,
    saved_phase: Vec<bool>,

    seen: Vec<bool>,
    ok: bool,
    model: Vec<Lbool>,
    conflict: Vec<Lit>,

    max_learnts: f64,
    stats: SolverStats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            slab: Vec::new(),
            free: Vec::new(),
            problem: Vec::new(),
            learnts: Vec::new(),
            watches: Vec::new(),
            assigns: Vec::new(),
            vardata: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: Vec::new(),
            var_inc: 1.0,
            cla_inc: 1.0,
            order: VarHeap::new(),
            saved_phase: Vec::new(),
            seen: Vec::new(),
            ok: true,
            model: Vec::new(),
            conflict: Vec::new(),
            max_learnts: 0.0,
            stats: SolverStats::default(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.assigns.len()
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// FALSE means the clause set is already unsatisfiable at the top level.
    pub fn okay(&self) -> bool {
        self.ok
    }

    pub fn new_var(&mut self) -> Var {
        let v = Var(self.assigns.len() as u32);
        self.assigns.push(Lbool::Undef);
        self.vardata.push(VarData {
            reason: None,
            level: 0,
        });
        self.activity.push(0.0);
        self.saved_phase.push(false);
        self.seen.push(false);
        self.watches.push(Vec::new());
        self.watches.push(Vec::new());
        self.order.insert(v, &self.activity);
        v
    }

    /// Grow the variable space so `v` is valid.
    pub fn ensure_var(&mut self, v: Var) {
        while self.num_vars() <= v.index() {
            self.new_var();
        }
    }

    #[inline]
    fn lit_value(assigns: &[Lbool], l: Lit) -> Lbool {
        assigns[l.var().index()].negate_if(!l.is_pos())
    }

    #[inline]
    fn value(&self, l: Lit) -> Lbool {
        Self::lit_value(&self.assigns, l)
    }

    /// Model value of a literal after a satisfiable solve.
    pub fn model_value(&self, l: Lit) -> Lbool {
        if l.var().index() >= self.model.len() {
            return Lbool::Undef;
        }
        self.model[l.var().index()].negate_if(!l.is_pos())
    }

    /// Assumption literals responsible for the last unsatisfiable solve.
    /// Empty when the clause set is unsatisfiable on its own.
    pub fn failed_assumptions(&self) -> &[Lit] {
        &self.conflict
    }

    #[inline]
    fn level(&self, v: Var) -> u32 {
        self.vardata[v.index()].level
    }

    #[inline]
    fn reason(&self, v: Var) -> Option<CRef> {
        self.vardata[v.index()].reason
    }

    #[inline]
    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    /// Add a clause. Returns false when the solver became (or already was)
    /// unsatisfiable at the top level.
    pub fn add_clause(&mut self, lits: &[Lit]) -> bool {
        debug_assert_eq!(self.decision_level(), 0);
        if !self.ok {
            return false;
        }
        let mut ps: Vec<Lit> = lits.to_vec();
        for &l in &ps {
            self.ensure_var(l.var());
        }
        ps.sort();
        ps.dedup();
        // Drop tautologies and literals already false at the top level.
        let mut i = 0;
        while i < ps.len() {
            if i + 1 < ps.len() && ps[i] == !ps[i + 1] {
                return true;
            }
            match self.value(ps[i]) {
                Lbool::True => return true,
                Lbool::False => {
                    ps.remove(i);
                }
                Lbool::Undef => i += 1,
            }
        }
        match ps.len() {
            0 => {
                self.ok = false;
                false
            }
            1 => {
                self.unchecked_enqueue(ps[0], None);
                self.ok = self.propagate().is_none();
                self.ok
            }
            _ => {
                let cref = self.alloc_clause(ps, false);
                self.problem.push(cref);
                self.attach_clause(cref);
                true
            }
        }
    }

    /// Permanently assert `l`. Used to retire activation variables once a
    /// scoped clause is released.
    pub fn release_var(&mut self, l: Lit) -> bool {
        self.add_clause(&[l])
    }

    fn alloc_clause(&mut self, lits: Vec<Lit>, learnt: bool) -> CRef {
        let clause = Clause {
            lits,
            activity: 0.0,
            learnt,
        };
        if let Some(cref) = self.free.pop() {
            self.slab[cref as usize] = Some(clause);
            cref
        } else {
            self.slab.push(Some(clause));
            (self.slab.len() - 1) as CRef
        }
    }

    fn clause(&self, cref: CRef) -> &Clause {
        self.slab[cref as usize].as_ref().expect("live clause")
    }

    fn attach_clause(&mut self, cref: CRef) {
        let (l0, l1) = {
            let c = self.clause(cref);
            debug_assert!(c.lits.len() >= 2);
            (c.lits[0], c.lits[1])
        };
        self.watches[(!l0).index()].push(Watcher { cref, blocker: l1 });
        self.watches[(!l1).index()].push(Watcher { cref, blocker: l0 });
    }

    fn detach_clause(&mut self, cref: CRef) {
        let (l0, l1) = {
            let c = self.clause(cref);
            (c.lits[0], c.lits[1])
        };
        self.watches[(!l0).index()].retain(|w| w.cref != cref);
        self.watches[(!l1).index()].retain(|w| w.cref != cref);
    }

    fn remove_clause(&mut self, cref: CRef) {
        self.detach_clause(cref);
        // A removed clause must not stay the recorded reason of its first
        // literal.
        let first = self.clause(cref).lits[0];
        if self.reason(first.var()) == Some(cref) {
            self.vardata[first.var().index()].reason = None;
        }
        self.slab[cref as usize] = None;
        self.free.push(cref);
    }

    fn locked(&self, cref: CRef) -> bool {
        let first = self.clause(cref).lits[0];
        self.value(first) == Lbool::True && self.reason(first.var()) == Some(cref)
    }

    fn unchecked_enqueue(&mut self, l: Lit, reason: Option<CRef>) {
        debug_assert_eq!(self.value(l), Lbool::Undef);
        self.assigns[l.var().index()] = Lbool::from_bool(l.is_pos());
        self.vardata[l.var().index()] = VarData {
            reason,
            level: self.decision_level() as u32,
        };
        self.trail.push(l);
    }

    fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let bound = self.trail_lim[level];
        for i in (bound..self.trail.len()).rev() {
            let l = self.trail[i];
            let v = l.var();
            self.saved_phase[v.index()] = l.is_pos();
            self.assigns[v.index()] = Lbool::Undef;
            if !self.order.contains(v) {
                self.order.insert(v, &self.activity);
            }
        }
        self.trail.truncate(bound);
        self.trail_lim.truncate(level);
        self.qhead = self.trail.len();
    }

    /// Propagate all enqueued facts. Returns the conflicting clause, if any.
    fn propagate(&mut self) -> Option<CRef> {
        let mut confl = None;
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.stats.propagations += 1;

            let mut ws = std::mem::take(&mut self.watches[p.index()]);
            let mut kept = 0;
            let mut i = 0;
            'watchers: while i < ws.len() {
                let w = ws[i];
                i += 1;
                if Self::lit_value(&self.assigns, w.blocker) == Lbool::True {
                    ws[kept] = w;
                    kept += 1;
                    continue;
                }
                let cref = w.cref;
                // Normalize so the false literal sits at index 1.
                let (first, unit) = {
                    let c = self.slab[cref as usize].as_mut().expect("live clause");
                    if c.lits[0] == !p {
                        c.lits.swap(0, 1);
                    }
                    debug_assert_eq!(c.lits[1], !p);
                    let first = c.lits[0];
                    if first != w.blocker
                        && Self::lit_value(&self.assigns, first) == Lbool::True
                    {
                        ws[kept] = Watcher {
                            cref,
                            blocker: first,
                        };
                        kept += 1;
                        continue 'watchers;
                    }
                    // Look for a new literal to watch.
                    let mut replacement = None;
                    for k in 2..c.lits.len() {
                        if Self::lit_value(&self.assigns, c.lits[k]) != Lbool::False {
                            replacement = Some(k);
                            break;
                        }
                    }
                    if let Some(k) = replacement {
                        c.lits.swap(1, k);
                        let new_watch = c.lits[1];
                        self.watches[(!new_watch).index()].push(Watcher {
                            cref,
                            blocker: first,
                        });
                        continue 'watchers;
                    }
                    // Clause is unit or conflicting under the current trail.
                    ws[kept] = Watcher {
                        cref,
                        blocker: first,
                    };
                    kept += 1;
                    (first, Self::lit_value(&self.assigns, first) != Lbool::False)
                };
                if unit {
                    self.unchecked_enqueue(first, Some(cref));
                } else {
                    confl = Some(cref);
                    self.qhead = self.trail.len();
                    // Keep the remaining watchers untouched.
                    while i < ws.len() {
                        ws[kept] = ws[i];
                        kept += 1;
                        i += 1;
                    }
                }
            }
            ws.truncate(kept);
            self.watches[p.index()] = ws;
            if confl.is_some() {
                break;
            }
        }
        confl
    }

    fn bump_var(&mut self, v: Var) {
        self.activity[v.index()] += self.var_inc;
        if self.activity[v.index()] > ACTIVITY_RESCALE {
            for a in self.activity.iter_mut() {
                *a *= 1.0 / ACTIVITY_RESCALE;
            }
            self.var_inc *= 1.0 / ACTIVITY_RESCALE;
        }
        self.order.bumped(v, &self.activity);
    }

    fn bump_clause(&mut self, cref: CRef) {
        let inc = self.cla_inc;
        let c = self.slab[cref as usize].as_mut().expect("live clause");
        c.activity += inc;
        if c.activity > CLA_RESCALE {
            for &lr in self.learnts.iter() {
                if let Some(lc) = self.slab[lr as usize].as_mut() {
                    lc.activity *= 1.0 / CLA_RESCALE;
                }
            }
            self.cla_inc *= 1.0 / CLA_RESCALE;
        }
    }

    /// First-UIP conflict analysis. Returns the learnt clause (asserting
    /// literal first) and the backtrack level.
    fn analyze(&mut self, mut confl: CRef) -> (Vec<Lit>, usize) {
        let mut learnt: Vec<Lit> = vec![Lit::new(Var(0), true)];
        let mut to_clear: Vec<Var> = Vec::new();
        let mut path_count = 0usize;
        let mut p: Option<Lit> = None;
        let mut index = self.trail.len();

        loop {
            if self.clause(confl).learnt {
                self.bump_clause(confl);
            }
            let start = usize::from(p.is_some());
            let lits: Vec<Lit> = self.clause(confl).lits[start..].to_vec();
            for q in lits {
                let v = q.var();
                if !self.seen[v.index()] && self.level(v) > 0 {
                    self.seen[v.index()] = true;
                    to_clear.push(v);
                    self.bump_var(v);
                    if self.level(v) as usize >= self.decision_level() {
                        path_count += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }
            // Walk back to the next marked literal on the trail.
            loop {
                index -= 1;
                if self.seen[self.trail[index].var().index()] {
                    break;
                }
            }
            let pl = self.trail[index];
            self.seen[pl.var().index()] = false;
            path_count -= 1;
            p = Some(pl);
            if path_count == 0 {
                learnt[0] = !pl;
                break;
            }
            confl = self.reason(pl.var()).expect("non-decision on conflict path");
        }

        // Conflict-clause minimization: drop literals whose reason clause is
        // entirely covered by the rest of the learnt clause.
        let mut j = 1;
        for i in 1..learnt.len() {
            let q = learnt[i];
            let redundant = match self.reason(q.var()) {
                None => false,
                Some(r) => self.clause(r).lits[1..].iter().all(|&l| {
                    self.seen[l.var().index()] || self.level(l.var()) == 0
                }),
            };
            if !redundant {
                learnt[j] = q;
                j += 1;
            }
        }
        learnt.truncate(j);

        for v in to_clear {
            self.seen[v.index()] = false;
        }

        // Find the backtrack level and move its literal to the watch slot.
        let bt_level = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for i in 2..learnt.len() {
                if self.level(learnt[i].var()) > self.level(learnt[max_i].var()) {
                    max_i = i;
                }
            }
            learnt.swap(1, max_i);
            self.level(learnt[1].var()) as usize
        };
        (learnt, bt_level)
    }

    /// Walk the implication graph of a failed assumption and collect the
    /// assumption literals it depends on.
    fn analyze_final(&mut self, failed: Lit) {
        self.conflict.clear();
        self.conflict.push(failed);
        if self.decision_level() == 0 {
            return;
        }
        self.seen[failed.var().index()] = true;
        for i in (self.trail_lim[0]..self.trail.len()).rev() {
            let v = self.trail[i].var();
            if !self.seen[v.index()] {
                continue;
            }
            match self.reason(v) {
                None => self.conflict.push(self.trail[i]),
                Some(r) => {
                    let lits: Vec<Lit> = self.clause(r).lits[1..].to_vec();
                    for l in lits {
                        if self.level(l.var()) > 0 {
                            self.seen[l.var().index()] = true;
                        }
                    }
                }
            }
            self.seen[v.index()] = false;
        }
        self.seen[failed.var().index()] = false;
    }

    fn pick_branch_lit(&mut self) -> Option<Lit> {
        while let Some(v) = self.order.pop_max(&self.activity) {
            if self.assigns[v.index()] == Lbool::Undef {
                return Some(Lit::new(v, self.saved_phase[v.index()]));
            }
        }
        None
    }

    fn reduce_db(&mut self) {
        let slab = &self.slab;
        self.learnts.sort_by(|&a, &b| {
            let ca = slab[a as usize].as_ref().expect("live clause");
            let cb = slab[b as usize].as_ref().expect("live clause");
            ca.activity
                .partial_cmp(&cb.activity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let keep_from = self.learnts.len() / 2;
        let mut kept = Vec::with_capacity(self.learnts.len() - keep_from + 2);
        for i in 0..self.learnts.len() {
            let cref = self.learnts[i];
            let len = self.clause(cref).lits.len();
            if i < keep_from && len > 2 && !self.locked(cref) {
                self.remove_clause(cref);
            } else {
                kept.push(cref);
            }
        }
        self.learnts = kept;
    }

    /// Top-level simplification: propagate pending facts and drop satisfied
    /// clauses. Returns false when the clause set became unsatisfiable.
    pub fn simplify(&mut self) -> bool {
        debug_assert_eq!(self.decision_level(), 0);
        if !self.ok {
            return false;
        }
        if self.propagate().is_some() {
            self.ok = false;
            return false;
        }
        for list in [true, false] {
            let refs = if list {
                std::mem::take(&mut self.learnts)
            } else {
                std::mem::take(&mut self.problem)
            };
            let mut kept = Vec::with_capacity(refs.len());
            for cref in refs {
                let satisfied = self
                    .clause(cref)
                    .lits
                    .iter()
                    .any(|&l| self.value(l) == Lbool::True);
                if satisfied && !self.locked(cref) {
                    self.remove_clause(cref);
                } else {
                    kept.push(cref);
                }
            }
            if list {
                self.learnts = kept;
            } else {
                self.problem = kept;
            }
        }
        true
    }

    fn search(&mut self, assumptions: &[Lit], mut budget: u64) -> Lbool {
        loop {
            if let Some(confl) = self.propagate() {
                self.stats.conflicts += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    self.conflict.clear();
                    return Lbool::False;
                }
                let (learnt, bt_level) = self.analyze(confl);
                self.cancel_until(bt_level);
                if learnt.len() == 1 {
                    self.unchecked_enqueue(learnt[0], None);
                } else {
                    let asserting = learnt[0];
                    let cref = self.alloc_clause(learnt, true);
                    self.learnts.push(cref);
                    self.attach_clause(cref);
                    self.bump_clause(cref);
                    self.unchecked_enqueue(asserting, Some(cref));
                }
                self.var_inc *= 1.0 / VAR_DECAY;
                self.cla_inc *= 1.0 / CLA_DECAY as f32;
                budget -= 1;
                if budget == 0 {
                    self.cancel_until(0);
                    return Lbool::Undef;
                }
            } else {
                if self.learnts.len() as f64 - self.trail.len() as f64
                    >= self.max_learnts
                {
                    self.reduce_db();
                    self.max_learnts *= 1.1;
                }
                let mut next = None;
                while self.decision_level() < assumptions.len() {
                    let p = assumptions[self.decision_level()];
                    match self.value(p) {
                        Lbool::True => self.new_decision_level(),
                        Lbool::False => {
                            self.analyze_final(p);
                            return Lbool::False;
                        }
                        Lbool::Undef => {
                            next = Some(p);
                            break;
                        }
                    }
                }
                let decision = match next {
                    Some(p) => p,
                    None => match self.pick_branch_lit() {
                        Some(p) => {
                            self.stats.decisions += 1;
                            p
                        }
                        None => return Lbool::True,
                    },
                };
                self.new_decision_level();
                self.unchecked_enqueue(decision, None);
            }
        }
    }

    /// Search for a model respecting the assumptions. True means
    /// satisfiable; the model is readable through [`Solver::model_value`].
    /// False leaves the failed assumption subset in
    /// [`Solver::failed_assumptions`].
    pub fn solve(&mut self, assumptions: &[Lit]) -> bool {
        self.stats.solves += 1;
        self.model.clear();
        self.conflict.clear();
        if !self.ok {
            return false;
        }
        for &l in assumptions {
            self.ensure_var(l.var());
        }
        if self.max_learnts < 1.0 {
            self.max_learnts = (self.problem.len() as f64 / 3.0).max(100.0);
        }
        let mut restarts = 0u32;
        let status = loop {
            self.stats.starts += 1;
            let budget = luby(restarts) * RESTART_FIRST;
            match self.search(assumptions, budget) {
                Lbool::Undef => restarts += 1,
                done => break done,
            }
        };
        if status == Lbool::True {
            self.model = self.assigns.clone();
        }
        self.cancel_until(0);
        log::trace!(
            "solve #{}: {:?} ({} conflicts total)",
            self.stats.solves,
            status,
            self.stats.conflicts
        );
        status == Lbool::True
    }
}

/// The Luby restart series: 1 1 2 1 1 2 4 1 1 2 1 1 2 4 8 ...
fn luby(i: u32) -> u64 {
    let mut size = 1u32;
    let mut seq = 0u32;
    while size < i + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    let mut i = i;
    let mut size = size;
    while size - 1 != i {
        size = (size - 1) >> 1;
        seq -= 1;
        i %= size;
    }
    1u64 << seq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: i32) -> Lit {
        let v = Var((n.unsigned_abs() - 1) as u32);
        Lit::new(v, n > 0)
    }

    fn clause(solver: &mut Solver, lits: &[i32]) -> bool {
        let c: Vec<Lit> = lits.iter().map(|&n| lit(n)).collect();
        solver.add_clause(&c)
    }

    #[test]
    fn trivially_sat() {
        let mut s = Solver::new();
        clause(&mut s, &[1, 2]);
        clause(&mut s, &[-1, 2]);
        assert!(s.solve(&[]));
        assert_eq!(s.model_value(lit(2)), Lbool::True);
    }

    #[test]
    fn trivially_unsat() {
        let mut s = Solver::new();
        clause(&mut s, &[1]);
        clause(&mut s, &[-1]);
        assert!(!s.solve(&[]));
        assert!(s.failed_assumptions().is_empty());
        assert!(!s.okay());
    }

    #[test]
    fn xor_chain_unsat() {
        // x1 ^ x2, x2 ^ x3, x1 ^ x3 has no solution with odd parity forced.
        let mut s = Solver::new();
        for (a, b) in [(1, 2), (2, 3), (3, 1)] {
            clause(&mut s, &[a, b]);
            clause(&mut s, &[-a, -b]);
        }
        assert!(!s.solve(&[]));
    }

    #[test]
    fn assumption_core() {
        let mut s = Solver::new();
        clause(&mut s, &[-1, -2]);
        clause(&mut s, &[3, 4]);
        // Assuming 1 and 2 contradicts the first clause; 5 is irrelevant.
        assert!(!s.solve(&[lit(5), lit(1), lit(2)]));
        let core: Vec<Lit> = s.failed_assumptions().to_vec();
        assert!(core.contains(&lit(1)));
        assert!(core.contains(&lit(2)));
        assert!(!core.contains(&lit(5)));
        // Still satisfiable without the conflicting assumptions.
        assert!(s.solve(&[lit(5), lit(1)]));
    }

    #[test]
    fn incremental_clause_addition() {
        let mut s = Solver::new();
        clause(&mut s, &[1, 2, 3]);
        assert!(s.solve(&[lit(-1), lit(-2)]));
        assert_eq!(s.model_value(lit(3)), Lbool::True);
        clause(&mut s, &[-3]);
        assert!(!s.solve(&[lit(-1), lit(-2)]));
        assert!(s.solve(&[lit(-1)]));
    }

    #[test]
    fn activation_literal_scoping() {
        // The temp-clause protocol used by the engines: a clause guarded by
        // an activation variable, enabled by assumption, retired by a unit.
        let mut s = Solver::new();
        clause(&mut s, &[1, 2]);
        let act = lit(10);
        clause(&mut s, &[-1, -10]); // (!x1) while act holds
        assert!(!s.solve(&[act, lit(1)]));
        assert!(s.solve(&[lit(1)]));
        s.release_var(!act);
        assert!(s.solve(&[lit(1)]));
        assert_eq!(s.model_value(act), Lbool::False);
    }

    #[test]
    fn pigeonhole_three_into_two() {
        // 3 pigeons, 2 holes: p(i,j) = var 2i + j + 1.
        let mut s = Solver::new();
        let p = |i: i32, j: i32| 2 * i + j + 1;
        for i in 0..3 {
            clause(&mut s, &[p(i, 0), p(i, 1)]);
        }
        for j in 0..2 {
            for i1 in 0..3 {
                for i2 in (i1 + 1)..3 {
                    clause(&mut s, &[-p(i1, j), -p(i2, j)]);
                }
            }
        }
        assert!(!s.solve(&[]));
    }

    #[test]
    fn simplify_keeps_answers() {
        let mut s = Solver::new();
        clause(&mut s, &[1]);
        clause(&mut s, &[-1, 2]);
        clause(&mut s, &[-2, 3, 4]);
        assert!(s.solve(&[]));
        assert!(s.simplify());
        assert!(s.solve(&[lit(-3)]));
        assert_eq!(s.model_value(lit(4)), Lbool::True);
        assert!(!s.solve(&[lit(-3), lit(-4)]));
    }

    #[test]
    fn luby_series() {
        let series: Vec<u64> = (0..15).map(luby).collect();
        assert_eq!(series, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }
}
