//! States, tasks, and proof obligations.

use caracal_ir::Cube;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

/// A state discovered from a SAT model: concrete inputs plus a (possibly
/// lifted, hence partial) latch cube. Immutable except for the one-shot
/// trace links; shared between the under-sequence, outstanding obligations,
/// and its neighbors' links.
pub struct State {
    pub inputs: Cube,
    pub latches: RefCell<Cube>,
    /// Innard literals of the assignment (internal-signals mode only).
    pub innards: Cube,
    /// Next-step input literals, as primed variables.
    pub prime_inputs: Cube,
    pub depth: usize,
    /// CAR: the successor this state was discovered from.
    pub pre: Option<Rc<State>>,
    /// IC3: the successor on the counterexample trace, set exactly once
    /// when the predecessor leaves the obligation queue.
    pub next: RefCell<Option<Rc<State>>>,
}

impl State {
    pub fn new(
        pre: Option<Rc<State>>,
        inputs: Cube,
        latches: Cube,
        depth: usize,
    ) -> Rc<State> {
        Rc::new(State {
            inputs,
            latches: RefCell::new(latches),
            innards: Vec::new(),
            prime_inputs: Vec::new(),
            depth,
            pre,
            next: RefCell::new(None),
        })
    }

    pub fn with_assignment(
        pre: Option<Rc<State>>,
        inputs: Cube,
        latches: Cube,
        innards: Cube,
        prime_inputs: Cube,
        depth: usize,
    ) -> Rc<State> {
        Rc::new(State {
            inputs,
            latches: RefCell::new(latches),
            innards,
            prime_inputs,
            depth,
            pre,
            next: RefCell::new(None),
        })
    }

    pub fn latch_cube(&self) -> Cube {
        self.latches.borrow().clone()
    }
}

/// Discovered states bucketed by their distance from the initial state.
#[derive(Default)]
pub struct UnderSequence {
    buckets: Vec<Vec<Rc<State>>>,
}

impl UnderSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: Rc<State>) {
        while self.buckets.len() <= state.depth {
            self.buckets.push(Vec::new());
        }
        self.buckets[state.depth].push(state);
    }

    pub fn num_depths(&self) -> usize {
        self.buckets.len()
    }

    pub fn at_depth(&self, depth: usize) -> &[Rc<State>] {
        &self.buckets[depth]
    }
}

/// A unit of CAR work: locate the state against the over-sequence, then
/// discharge or expand it.
pub struct Task {
    pub state: Rc<State>,
    pub frame_level: i32,
    pub located: bool,
}

impl Task {
    pub fn new(state: Rc<State>, frame_level: i32, located: bool) -> Self {
        Task {
            state,
            frame_level,
            located,
        }
    }
}

/// An IC3 proof obligation: block `state` relative to frame `level`.
/// Ordered by `(level, depth, seq)`; the insertion sequence number keeps
/// the order total and deterministic.
#[derive(Clone)]
pub struct Obligation {
    pub state: Rc<State>,
    pub level: usize,
    pub depth: usize,
    pub seq: u64,
}

impl PartialEq for Obligation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Obligation {}

impl PartialOrd for Obligation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Obligation {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.level, self.depth, self.seq).cmp(&(other.level, other.depth, other.seq))
    }
}
