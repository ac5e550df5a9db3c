//! Circuit simulation used for equivalence guessing.
//!
//! Two simulators share the gate-evaluation shape: the ternary simulator
//! runs the circuit sequentially from its reset state over {0, 1, X} and
//! watches for a repeated state, while the random simulator runs 64
//! independent boolean lanes per machine word to build per-signal bit
//! signatures.

use crate::graph::{CircuitGraph, GateKind};
use crate::sig::Sig;
use crate::ternary::{ite, Tern};
use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Words per random signature; 16 words = 1024 sampled assignments.
pub const SIG_WORDS: usize = 16;

/// Sequential three-valued simulation from the reset state.
pub struct TernarySimulator<'a> {
    graph: &'a CircuitGraph,
    /// Determined latch literals (plus the true id) per reached step.
    states: Vec<Vec<Sig>>,
    /// Determined gate literals (plus the true id) per reached step.
    gate_states: Vec<Vec<Sig>>,
    cycle_start: Option<usize>,
}

impl<'a> TernarySimulator<'a> {
    pub fn new(graph: &'a CircuitGraph) -> Self {
        TernarySimulator {
            graph,
            states: Vec::new(),
            gate_states: Vec::new(),
            cycle_start: None,
        }
    }

    pub fn cycle_reached(&self) -> bool {
        self.cycle_start.is_some()
    }

    /// States actually reached (the repeated closing state excluded).
    pub fn states(&self) -> &[Vec<Sig>] {
        &self.states
    }

    pub fn gate_states(&self) -> &[Vec<Sig>] {
        &self.gate_states
    }

    fn get(values: &AHashMap<i32, Tern>, s: Sig) -> Tern {
        let v = values[&s.var()];
        if s.is_pos() { v } else { !v }
    }

    fn eval_gates(&self, values: &mut AHashMap<i32, Tern>) {
        for g in &self.graph.model_gates {
            let gate = &self.graph.gates[&g.var()];
            let val = match gate.kind {
                GateKind::And => {
                    Self::get(values, gate.fanins[0]).and(Self::get(values, gate.fanins[1]))
                }
                GateKind::Xor => {
                    Self::get(values, gate.fanins[0]).xor(Self::get(values, gate.fanins[1]))
                }
                GateKind::Ite => ite(
                    Self::get(values, gate.fanins[0]),
                    Self::get(values, gate.fanins[1]),
                    Self::get(values, gate.fanins[2]),
                ),
            };
            values.insert(g.var(), val);
        }
    }

    /// Run up to `max_steps` cycles. Stops early when every latch is X
    /// (nothing to learn) or when a state repeats (the reached-state set is
    /// closed, so equal signatures are sound equivalences).
    pub fn simulate(&mut self, max_steps: usize) {
        log::debug!("ternary simulation for up to {max_steps} steps");
        self.states.clear();
        self.gate_states.clear();
        self.cycle_start = None;

        let mut latch_vals: AHashMap<i32, Tern> = AHashMap::new();
        for l in &self.graph.model_latches {
            let reset = self.graph.latch_reset[&l.var()];
            let val = if reset == self.graph.true_id {
                Tern::TRUE
            } else if reset == -self.graph.true_id {
                Tern::FALSE
            } else {
                Tern::UNDEF
            };
            latch_vals.insert(l.var(), val);
        }

        for step in 0..max_steps {
            let mut values: AHashMap<i32, Tern> = latch_vals.clone();
            values.insert(self.graph.true_id.var(), Tern::TRUE);
            for i in &self.graph.model_inputs {
                values.insert(i.var(), Tern::UNDEF);
            }
            self.eval_gates(&mut values);

            let mut state: Vec<Sig> = Vec::new();
            for l in &self.graph.model_latches {
                let v = values[&l.var()];
                if v.is_known() {
                    state.push(if v.is_true() { *l } else { -*l });
                }
            }
            state.push(self.graph.true_id);

            let mut gate_state: Vec<Sig> = Vec::new();
            for g in &self.graph.model_gates {
                let v = values[&g.var()];
                if v.is_known() {
                    gate_state.push(if v.is_true() { *g } else { -*g });
                }
            }
            gate_state.push(self.graph.true_id);

            if state.len() == 1 {
                log::debug!("ternary simulation: all latches X, stopping");
                self.states.push(state);
                self.gate_states.push(gate_state);
                break;
            }
            if let Some(at) = self.states.iter().position(|s| *s == state) {
                self.cycle_start = Some(at);
                log::debug!("ternary simulation: cycle at step {at} (step {step})");
                break;
            }
            self.states.push(state);
            self.gate_states.push(gate_state);

            let mut next_vals: AHashMap<i32, Tern> = AHashMap::new();
            for l in &self.graph.model_latches {
                let next = self.graph.latch_next[&l.var()];
                next_vals.insert(l.var(), Self::get(&values, next));
            }
            latch_vals = next_vals;
        }
    }
}

/// Word-parallel random simulation: 64 independent traces per word,
/// [`SIG_WORDS`] sequential steps, one `[u64; SIG_WORDS]` signature per
/// signal.
pub struct RandomSimulator {
    signatures: AHashMap<i32, [u64; SIG_WORDS]>,
}

impl RandomSimulator {
    pub fn run(graph: &CircuitGraph, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sigs: AHashMap<i32, [u64; SIG_WORDS]> = AHashMap::new();

        let mut words: AHashMap<i32, u64> = AHashMap::new();
        words.insert(graph.true_id.var(), !0u64);
        for l in &graph.model_latches {
            let reset = graph.latch_reset[&l.var()];
            let w = if reset == graph.true_id {
                !0u64
            } else if reset == -graph.true_id {
                0u64
            } else {
                rng.next_u64()
            };
            words.insert(l.var(), w);
        }

        let get = |words: &AHashMap<i32, u64>, s: Sig| -> u64 {
            let w = words[&s.var()];
            if s.is_pos() { w } else { !w }
        };

        for step in 0..SIG_WORDS {
            for i in &graph.model_inputs {
                words.insert(i.var(), rng.next_u64());
            }
            for g in &graph.model_gates {
                let gate = &graph.gates[&g.var()];
                let w = match gate.kind {
                    GateKind::And => {
                        get(&words, gate.fanins[0]) & get(&words, gate.fanins[1])
                    }
                    GateKind::Xor => {
                        get(&words, gate.fanins[0]) ^ get(&words, gate.fanins[1])
                    }
                    GateKind::Ite => {
                        let c = get(&words, gate.fanins[0]);
                        (c & get(&words, gate.fanins[1]))
                            | (!c & get(&words, gate.fanins[2]))
                    }
                };
                words.insert(g.var(), w);
            }
            for s in graph.model_latches.iter().chain(&graph.model_gates) {
                sigs.entry(s.var()).or_default()[step] = words[&s.var()];
            }
            let mut next_latches: Vec<(i32, u64)> =
                Vec::with_capacity(graph.model_latches.len());
            for l in &graph.model_latches {
                next_latches.push((l.var(), get(&words, graph.latch_next[&l.var()])));
            }
            for (v, w) in next_latches {
                words.insert(v, w);
            }
        }
        RandomSimulator { signatures: sigs }
    }

    /// Signature of a positive signal id.
    pub fn signature(&self, var: i32) -> &[u64; SIG_WORDS] {
        &self.signatures[&var]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::Aig;

    fn graph(text: &str) -> CircuitGraph {
        let aig = Aig::from_bytes(text.as_bytes()).unwrap();
        CircuitGraph::from_aig(&aig).unwrap()
    }

    #[test]
    fn constant_latch_reaches_cycle() {
        // Latch holds itself, reset 0, bad = latch.
        let g = graph("aag 1 0 1 1 0\n2 2\n2\n");
        let mut sim = TernarySimulator::new(&g);
        sim.simulate(250);
        assert!(sim.cycle_reached());
        assert_eq!(sim.states().len(), 1);
        assert_eq!(sim.states()[0][0], Sig::new(-1));
    }

    #[test]
    fn self_reset_latch_gives_up() {
        // Latch with uninitialized reset: everything is X immediately.
        let g = graph("aag 1 0 1 1 0\n2 2 2\n2\n");
        let mut sim = TernarySimulator::new(&g);
        sim.simulate(250);
        assert!(!sim.cycle_reached());
        assert_eq!(sim.states().len(), 1);
    }

    #[test]
    fn equal_latches_share_random_signature() {
        // Two latches driven by the same input; bad = l1 & !l2.
        let g = graph("aag 4 1 2 1 1\n2\n4 2\n6 2\n8\n8 4 7\n");
        let sim = RandomSimulator::run(&g, 42);
        assert_eq!(sim.signature(2), sim.signature(3));
        // The input itself is fresh noise each step, not a latch signature.
        assert_ne!(sim.signature(2), &[0u64; SIG_WORDS]);
    }
}
