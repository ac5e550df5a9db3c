//! The over-approximation frame sequence.

use crate::solver::TransSolver;
use caracal_ir::{cube_canonical_cmp, subsumes, Cube, Model, Sig};
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Instant;

/// Shared cube ordered the way frames keep them: shorter first, then
/// lexicographic on the canonical literal order.
#[derive(Clone)]
pub struct OrdCube(pub Rc<Cube>);

impl PartialEq for OrdCube {
    fn eq(&self, other: &Self) -> bool {
        cube_canonical_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for OrdCube {}

impl PartialOrd for OrdCube {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdCube {
    fn cmp(&self, other: &Self) -> Ordering {
        cube_canonical_cmp(&self.0, &other.0)
    }
}

/// How a frame answers blocked-state queries. Starts on the linear scan;
/// after enough traffic on a large frame, both paths are timed once and
/// the loser is dropped for good.
#[derive(Clone, Copy, PartialEq)]
enum BlockStrategy {
    Counting(u32),
    Sat,
}

const BLOCK_TIMING_QUERIES: u32 = 1000;
const BLOCK_LARGE_FRAME: usize = 3000;

/// Frames F0, F1, ... of blocking cubes, with a dedicated solver carrying
/// each frame's clauses behind an activation flag.
pub struct OverSequence {
    frames: Vec<BTreeSet<OrdCube>>,
    block_solver: TransSolver,
    strategy: Vec<BlockStrategy>,
    invariant_level: i32,
}

impl OverSequence {
    pub fn new(model: Rc<Model>) -> Self {
        OverSequence {
            frames: Vec::new(),
            block_solver: TransSolver::new(model, true),
            strategy: Vec::new(),
            invariant_level: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn set_invariant_level(&mut self, lvl: i32) {
        self.invariant_level = lvl;
    }

    pub fn invariant_level(&self) -> i32 {
        self.invariant_level
    }

    fn ensure(&mut self, lvl: usize) {
        while self.frames.len() <= lvl {
            self.frames.push(BTreeSet::new());
            self.strategy.push(BlockStrategy::Counting(0));
        }
    }

    /// Insert a blocking cube. Silently refuses cubes subsumed by an
    /// existing one; drops existing cubes the new one subsumes. Returns
    /// whether the cube went in.
    pub fn insert(&mut self, uc: Rc<Cube>, lvl: usize) -> bool {
        self.ensure(lvl);
        let frame = &mut self.frames[lvl];
        if frame.iter().any(|c| subsumes(&c.0, &uc)) {
            return false;
        }
        frame.retain(|c| !subsumes(&uc, &c.0));
        frame.insert(OrdCube(uc.clone()));
        self.block_solver.add_uc(&uc, lvl);
        true
    }

    /// The cubes of a frame, in frame order.
    pub fn frame(&self, lvl: usize) -> Vec<Rc<Cube>> {
        match self.frames.get(lvl) {
            None => Vec::new(),
            Some(frame) => frame.iter().map(|c| c.0.clone()).collect(),
        }
    }

    pub fn frame_sizes(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.len()).collect()
    }

    /// Whether some cube of frame `lvl` covers the state. The state cube
    /// must be canonical; partial (lifted) cubes are fine.
    pub fn blocked(&mut self, latches: &Cube, lvl: usize) -> bool {
        self.ensure(lvl);
        match self.strategy[lvl] {
            BlockStrategy::Sat => self.blocked_by_sat(latches, lvl),
            BlockStrategy::Counting(n) => {
                if self.frames[lvl].len() > BLOCK_LARGE_FRAME {
                    self.strategy[lvl] = BlockStrategy::Counting(n + 1);
                }
                if n > BLOCK_TIMING_QUERIES {
                    self.race_strategies(latches, lvl)
                } else {
                    self.blocked_by_scan(latches, lvl)
                }
            }
        }
    }

    fn blocked_by_scan(&self, latches: &Cube, lvl: usize) -> bool {
        self.frames[lvl].iter().any(|c| subsumes(&c.0, latches))
    }

    fn blocked_by_sat(&mut self, latches: &Cube, lvl: usize) -> bool {
        !self.block_solver.solve_frame(latches, lvl)
    }

    /// The cubes of frame `lvl` that cover the state, in frame order.
    pub fn blockers(&self, latches: &Cube, lvl: usize) -> Vec<Rc<Cube>> {
        match self.frames.get(lvl) {
            None => Vec::new(),
            Some(frame) => frame
                .iter()
                .filter(|c| subsumes(&c.0, latches))
                .map(|c| c.0.clone())
                .collect(),
        }
    }

    /// Time the SAT path against the linear scan once and commit to the
    /// winner for this frame.
    fn race_strategies(&mut self, latches: &Cube, lvl: usize) -> bool {
        let start = Instant::now();
        self.blocked_by_sat(latches, lvl);
        let sat_time = start.elapsed();
        let start = Instant::now();
        let result = self.blocked_by_scan(latches, lvl);
        let scan_time = start.elapsed();
        self.strategy[lvl] = if sat_time > scan_time {
            BlockStrategy::Counting(0)
        } else {
            log::debug!("frame {lvl}: switching blocked checks to the solver");
            BlockStrategy::Sat
        };
        result
    }

    pub fn frames_info(&self) -> String {
        let frames = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| format!("F{i}[{}]", f.len()))
            .join(" ");
        format!("frames: {frames}")
    }
}

/// Overlay a partial latch cube onto a base cube (both canonical); used
/// when printing states whose latches were generalized away.
pub fn overlay_cube(base: &Cube, partial: &Cube) -> Cube {
    let mut out: Vec<Sig> = Vec::new();
    let mut vals: std::collections::BTreeMap<i32, Sig> = base
        .iter()
        .map(|&l| (l.var(), l))
        .collect();
    for &l in partial {
        vals.insert(l.var(), l);
    }
    out.extend(vals.into_values());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use caracal_ir::{Aig, ModelOptions};

    fn tiny_model() -> Rc<Model> {
        let aig = Aig::from_bytes(b"aag 3 1 2 1 0\n2\n4 2\n6 4\n6\n").unwrap();
        Rc::new(Model::new(aig, ModelOptions::default()).unwrap())
    }

    fn cube(lits: &[i32]) -> Rc<Cube> {
        Rc::new(lits.iter().map(|&l| Sig::new(l)).collect())
    }

    #[test]
    fn insert_subsumption_both_ways() {
        let mut over = OverSequence::new(tiny_model());
        assert!(over.insert(cube(&[2, 3]), 1));
        // Subsumed by the stored cube: rejected.
        assert!(!over.insert(cube(&[2, 3]), 1));
        // Stronger cube replaces the weaker one.
        assert!(over.insert(cube(&[2]), 1));
        assert_eq!(over.frame(1).len(), 1);
        assert_eq!(*over.frame(1)[0], *cube(&[2]));
        // Now weaker cubes bounce off.
        assert!(!over.insert(cube(&[2, -3]), 1));
    }

    #[test]
    fn blocked_matches_scan_and_sat() {
        let mut over = OverSequence::new(tiny_model());
        over.insert(cube(&[2, -3]), 0);
        let state = cube(&[2, -3]);
        let other = cube(&[2, 3]);
        assert!(over.blocked(&state, 0));
        assert!(!over.blocked(&other, 0));
        assert!(!over.blocked_by_sat(&state.clone(), 1));
        // The SAT path agrees with the scan.
        assert!(over.blocked_by_sat(&state, 0));
        assert!(!over.blocked_by_sat(&other, 0));
    }

    #[test]
    fn blockers_lists_covering_cubes() {
        let mut over = OverSequence::new(tiny_model());
        over.insert(cube(&[2]), 0);
        over.insert(cube(&[2, -3]), 1);
        over.insert(cube(&[3]), 1);
        let state = cube(&[2, -3]);
        assert_eq!(over.blockers(&state, 0).len(), 1);
        assert_eq!(over.blockers(&state, 1).len(), 1);
        assert!(over.blockers(&state, 7).is_empty());
    }

    #[test]
    fn frame_order_short_cubes_first() {
        let mut over = OverSequence::new(tiny_model());
        over.insert(cube(&[2, 3]), 0);
        over.insert(cube(&[-3]), 0);
        let frame = over.frame(0);
        assert_eq!(*frame[0], *cube(&[-3]));
    }

    #[test]
    fn overlay_prefers_partial_values() {
        let base = vec![Sig::new(-2), Sig::new(-3)];
        let partial = vec![Sig::new(3)];
        assert_eq!(overlay_cube(&base, &partial), vec![Sig::new(-2), Sig::new(3)]);
    }
}
