//! The typed gate graph built from a raw AIG.
//!
//! AND towers that encode XOR or ITE are recognized and collapsed into
//! multi-input gates; the two absorbed AND gates then drop out of the
//! model during cone-of-influence refinement.

use crate::aig::Aig;
use crate::sig::Sig;
use ahash::{AHashMap, AHashSet};
use caracal_utils::{CaracalResult, Error};
use smallvec::SmallVec;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GateKind {
    And,
    Xor,
    Ite,
}

/// A gate: positive fanout signal and two or three signed fanins.
/// After re-encoding every fanin variable is smaller than the fanout.
#[derive(Clone, Debug)]
pub struct Gate {
    pub kind: GateKind,
    pub fanout: Sig,
    pub fanins: SmallVec<[Sig; 3]>,
}

/// The circuit as signal sets plus per-gate structure. Positive ids
/// `1..=num_inputs` are inputs, the next `num_latches` ids are latches,
/// the rest AND fanouts; `true_id` is one past the last circuit variable.
pub struct CircuitGraph {
    pub num_inputs: usize,
    pub num_latches: usize,
    pub true_id: Sig,

    pub inputs: Vec<Sig>,
    pub latches: Vec<Sig>,
    pub ands: Vec<Sig>,
    pub bad: Vec<Sig>,
    pub constraints: Vec<Sig>,

    inputs_set: AHashSet<i32>,
    latches_set: AHashSet<i32>,
    ands_set: AHashSet<i32>,

    pub latch_next: AHashMap<i32, Sig>,
    pub latch_reset: AHashMap<i32, Sig>,

    /// Gates in the cone of property, constraints, and transition logic.
    pub gates: AHashMap<i32, Gate>,

    /// COI-refined signal lists, sorted ascending.
    pub model_inputs: Vec<Sig>,
    pub model_latches: Vec<Sig>,
    pub model_gates: Vec<Sig>,
    /// Inputs reachable from the property and constraints alone.
    pub property_coi_inputs: Vec<Sig>,
}

impl CircuitGraph {
    /// Translate an AIGER literal into a signed signal id.
    fn sig_of_lit(&self, lit: u32) -> Sig {
        sig_of_lit(self.true_id, lit)
    }

    pub fn is_input(&self, s: Sig) -> bool {
        self.inputs_set.contains(&s.var())
    }

    pub fn is_latch(&self, s: Sig) -> bool {
        self.latches_set.contains(&s.var())
    }

    pub fn is_and(&self, s: Sig) -> bool {
        self.ands_set.contains(&s.var())
    }

    /// Build the typed graph from a re-encoded AIG. Exactly one bad signal
    /// (a `bad` entry or, failing that, an `output`) must be present.
    pub fn from_aig(aig: &Aig) -> CaracalResult<CircuitGraph> {
        let true_id = Sig::new(aig.max_var as i32 + 1);

        let mut graph = CircuitGraph {
            num_inputs: aig.num_inputs(),
            num_latches: aig.num_latches(),
            true_id,
            inputs: Vec::new(),
            latches: Vec::new(),
            ands: Vec::new(),
            bad: Vec::new(),
            constraints: Vec::new(),
            inputs_set: AHashSet::new(),
            latches_set: AHashSet::new(),
            ands_set: AHashSet::new(),
            latch_next: AHashMap::new(),
            latch_reset: AHashMap::new(),
            gates: AHashMap::new(),
            model_inputs: Vec::new(),
            model_latches: Vec::new(),
            model_gates: Vec::new(),
            property_coi_inputs: Vec::new(),
        };

        for k in 0..aig.num_inputs() {
            let s = Sig::new(k as i32 + 1);
            graph.inputs.push(s);
            graph.inputs_set.insert(s.var());
        }
        for lat in &aig.latches {
            let l = graph.sig_of_lit(lat.lit);
            let next = graph.sig_of_lit(lat.next);
            let reset = if lat.reset == lat.lit && lat.reset > 1 {
                l
            } else {
                graph.sig_of_lit(lat.reset)
            };
            graph.latches.push(l);
            graph.latches_set.insert(l.var());
            graph.latch_next.insert(l.var(), next);
            graph.latch_reset.insert(l.var(), reset);
        }
        for &out in aig.outputs.iter().chain(&aig.bads) {
            graph.bad.push(graph.sig_of_lit(out));
        }
        for &cons in &aig.constraints {
            graph.constraints.push(graph.sig_of_lit(cons));
        }
        for and in &aig.ands {
            let s = graph.sig_of_lit(and.lhs);
            graph.ands.push(s);
            graph.ands_set.insert(s.var());
        }

        if graph.bad.len() != 1 {
            return Err(Error::unsupported(format!(
                "expected exactly one bad/output signal, found {}",
                graph.bad.len()
            )));
        }

        graph.build_gates(aig);

        graph.model_inputs = graph.inputs.clone();
        graph.model_latches = graph.latches.clone();
        graph.model_gates = graph.ands.clone();
        graph.coi_refine();
        graph.collect_property_coi_inputs();
        Ok(graph)
    }

    /// Walk the AND list in reverse topological order, recognizing XOR and
    /// ITE idioms on the gates that feed the property, constraints, or
    /// next-state functions.
    fn build_gates(&mut self, aig: &Aig) {
        let defs: AHashMap<u32, (u32, u32)> = aig
            .ands
            .iter()
            .map(|a| (a.lhs, (a.rhs0, a.rhs1)))
            .collect();

        let mut coi_lits: AHashSet<u32> = AHashSet::new();
        for lat in &aig.latches {
            coi_lits.insert(lat.next & !1);
        }
        for &l in aig.constraints.iter().chain(&aig.outputs).chain(&aig.bads) {
            coi_lits.insert(l & !1);
        }

        for and in aig.ands.iter().rev() {
            if !coi_lits.contains(&and.lhs) {
                continue;
            }
            if self.try_make_xor(&defs, and.lhs, &mut coi_lits) {
                continue;
            }
            if self.try_make_ite(&defs, and.lhs, &mut coi_lits) {
                continue;
            }
            let fanout = self.sig_of_lit(and.lhs);
            self.gates.insert(
                fanout.var(),
                Gate {
                    kind: GateKind::And,
                    fanout,
                    fanins: SmallVec::from_slice(&[
                        self.sig_of_lit(and.rhs0),
                        self.sig_of_lit(and.rhs1),
                    ]),
                },
            );
            coi_lits.insert(and.rhs0 & !1);
            coi_lits.insert(and.rhs1 & !1);
        }
    }

    /// `a = !(x & y) & !(!x & !y)` and the commuted variants are XOR.
    fn try_make_xor(
        &mut self,
        defs: &AHashMap<u32, (u32, u32)>,
        lhs: u32,
        coi_lits: &mut AHashSet<u32>,
    ) -> bool {
        let (a0, a1) = defs[&lhs];
        if a0 & 1 == 0 || a1 & 1 == 0 {
            return false;
        }
        let (Some(&(a00, a01)), Some(&(a10, a11))) =
            (defs.get(&(a0 & !1)), defs.get(&(a1 & !1)))
        else {
            return false;
        };
        if a00 == a10 ^ 1 && a01 == a11 ^ 1 {
            if a00 == a01 {
                return false;
            }
            let fanout = self.sig_of_lit(lhs);
            self.gates.insert(
                fanout.var(),
                Gate {
                    kind: GateKind::Xor,
                    fanout,
                    fanins: SmallVec::from_slice(&[
                        self.sig_of_lit(a00),
                        self.sig_of_lit(a01),
                    ]),
                },
            );
            coi_lits.insert(a00 & !1);
            coi_lits.insert(a01 & !1);
            return true;
        }
        false
    }

    /// The four AND-tower signatures of `ite(c, t, e)`.
    fn try_make_ite(
        &mut self,
        defs: &AHashMap<u32, (u32, u32)>,
        lhs: u32,
        coi_lits: &mut AHashSet<u32>,
    ) -> bool {
        let (a0, a1) = defs[&lhs];
        if a0 & 1 == 0 || a1 & 1 == 0 {
            return false;
        }
        let (Some(&(a00, a01)), Some(&(a10, a11))) =
            (defs.get(&(a0 & !1)), defs.get(&(a1 & !1)))
        else {
            return false;
        };
        let ite = if a00 == a10 ^ 1 {
            [a00, a01 ^ 1, a11 ^ 1]
        } else if a00 == a11 ^ 1 {
            [a00, a01 ^ 1, a10 ^ 1]
        } else if a01 == a10 ^ 1 {
            [a01, a00 ^ 1, a11 ^ 1]
        } else if a01 == a11 ^ 1 {
            [a01, a00 ^ 1, a10 ^ 1]
        } else {
            return false;
        };
        let fanout = self.sig_of_lit(lhs);
        self.gates.insert(
            fanout.var(),
            Gate {
                kind: GateKind::Ite,
                fanout,
                fanins: SmallVec::from_slice(&[
                    self.sig_of_lit(ite[0]),
                    self.sig_of_lit(ite[1]),
                    self.sig_of_lit(ite[2]),
                ]),
            },
        );
        for l in ite {
            coi_lits.insert(l & !1);
        }
        true
    }

    /// Restrict the model signal lists to the backward cone of the
    /// property, constraints, and the next-state functions of reached
    /// latches.
    fn coi_refine(&mut self) {
        let mut coi: AHashSet<i32> = AHashSet::new();
        let mut todo: Vec<i32> = Vec::new();
        for s in self.constraints.iter().chain(self.bad.iter()) {
            if coi.insert(s.var()) {
                todo.push(s.var());
            }
        }
        while let Some(id) = todo.pop() {
            if self.ands_set.contains(&id) {
                if let Some(gate) = self.gates.get(&id) {
                    for fanin in &gate.fanins {
                        if coi.insert(fanin.var()) {
                            todo.push(fanin.var());
                        }
                    }
                }
            } else if self.latches_set.contains(&id) {
                let next = self.latch_next[&id];
                if coi.insert(next.var()) {
                    todo.push(next.var());
                }
            }
        }

        self.model_inputs.retain(|s| coi.contains(&s.var()));
        self.model_inputs.sort();
        self.model_latches.retain(|s| coi.contains(&s.var()));
        self.model_latches.sort();
        self.model_gates.retain(|s| coi.contains(&s.var()));
        self.model_gates.sort();
    }

    /// Inputs that reach the property or constraints without going through
    /// a latch boundary.
    fn collect_property_coi_inputs(&mut self) {
        let mut pcoi: AHashSet<i32> = AHashSet::new();
        for s in self.constraints.iter().chain(self.bad.iter()) {
            pcoi.insert(s.var());
        }
        for g in self.model_gates.iter().rev() {
            if pcoi.contains(&g.var()) {
                if let Some(gate) = self.gates.get(&g.var()) {
                    for fanin in &gate.fanins {
                        pcoi.insert(fanin.var());
                    }
                }
            }
        }
        self.property_coi_inputs = self
            .inputs
            .iter()
            .copied()
            .filter(|s| pcoi.contains(&s.var()))
            .collect();
        self.property_coi_inputs.sort();
    }
}

fn sig_of_lit(true_id: Sig, lit: u32) -> Sig {
    match lit {
        0 => -true_id,
        1 => true_id,
        _ => {
            let v = (lit >> 1) as i32;
            if lit & 1 == 0 { Sig::new(v) } else { Sig::new(-v) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(text: &str) -> CircuitGraph {
        let aig = Aig::from_bytes(text.as_bytes()).unwrap();
        CircuitGraph::from_aig(&aig).unwrap()
    }

    #[test]
    fn classifies_signals() {
        // in v1, latch v2 (next = and), and v3 = in & latch, bad = and.
        let g = graph("aag 3 1 1 1 1\n2\n4 6\n6\n6 4 2\n");
        assert!(g.is_input(Sig::new(1)));
        assert!(g.is_latch(Sig::new(-2)));
        assert!(g.is_and(Sig::new(3)));
        assert_eq!(g.true_id, Sig::new(4));
        assert_eq!(g.bad, vec![Sig::new(3)]);
        assert_eq!(g.gates[&3].kind, GateKind::And);
        assert_eq!(g.model_gates, vec![Sig::new(3)]);
    }

    #[test]
    fn recognizes_xor() {
        // x = a ^ b encoded as !(a & b) & !(!a & !b), output x.
        let g = graph(
            "aag 5 2 0 1 3\n2\n4\n10\n6 4 2\n8 5 3\n10 9 7\n",
        );
        let gate = &g.gates[&5];
        assert_eq!(gate.kind, GateKind::Xor);
        let fanins: Vec<i32> = gate.fanins.iter().map(|s| s.var()).collect();
        assert_eq!(fanins, vec![2, 1]);
        // The absorbed AND towers fall out of the refined model.
        assert_eq!(g.model_gates, vec![Sig::new(5)]);
    }

    #[test]
    fn recognizes_ite() {
        // ite(c, t, e) = !(c & !t) & !(!c & !e); c=v1 t=v2 e=v3.
        let g = graph(
            "aag 6 3 0 1 3\n2\n4\n6\n12\n8 5 2\n10 7 3\n12 11 9\n",
        );
        let gate = &g.gates[&6];
        assert_eq!(gate.kind, GateKind::Ite);
        assert_eq!(gate.fanins.len(), 3);
    }

    #[test]
    fn coi_drops_unreachable_latches() {
        // Two latches; only the first feeds the bad output.
        let g = graph("aag 3 1 2 1 0\n2\n4 4\n6 2\n4\n");
        assert_eq!(g.model_latches, vec![Sig::new(2)]);
        // The second latch's input driver also drops out.
        assert!(g.model_inputs.is_empty());
    }

    #[test]
    fn rejects_multiple_bads() {
        let aig = Aig::from_bytes(b"aag 2 2 0 2 0\n2\n4\n2\n4\n").unwrap();
        assert!(CircuitGraph::from_aig(&aig).is_err());
    }
}
