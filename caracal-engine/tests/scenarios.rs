//! End-to-end checks over small hand-written circuits, run across all
//! engines.

use caracal_engine::{
    Bmc, Car, CheckResult, Direction, Ic3, Settings, Trace, TransSolver,
};
use caracal_ir::{Aig, Cube, EqStrategy, Model, ModelOptions, Sig};
use std::rc::Rc;

/// Bad is the constant-true output.
const S1_CONST_BAD: &str = "aag 0 0 0 1 0\n1\n";
/// One latch holding itself, reset 0; bad = latch.
const S2_STUCK_LATCH: &str = "aag 1 0 1 1 0\n2 2\n2\n";
/// Latch follows the input; bad = latch.
const S3_ONE_STEP: &str = "aag 2 1 1 1 0\n2\n4 2\n4\n";
/// Three-bit ripple counter from 000; bad = 111.
const S4_COUNTER: &str = "aag 9 0 3 1 6\n2 3\n4 18\n6 14\n10\n8 4 2\n10 8 6\n12 9 7\n14 13 11\n16 5 3\n18 17 9\n";
/// Two latches following the same input; bad = l1 & !l2.
const S5_TWINS: &str = "aag 4 1 2 1 1\n2\n4 2\n6 2\n8\n8 4 7\n";
/// L := L | input (reset 0), L2 stuck at 0; bad = L2 & !L.
const S6_OR_LATCH: &str = "aag 5 1 2 1 2\n2\n4 9\n6 6\n10\n8 5 3\n10 6 5\n";
/// Two latches swapping each other from 00; bad = a & !b.
const S6_SWAP: &str = "aag 3 0 2 1 1\n2 4\n4 2\n6\n6 2 5\n";

fn build_model(text: &str, eq: EqStrategy, innards: bool) -> Rc<Model> {
    let aig = Aig::from_bytes(text.as_bytes()).unwrap();
    let opts = ModelOptions {
        eq,
        internal_signals: innards,
        sim_seed: 42,
    };
    Rc::new(Model::new(aig, opts).unwrap())
}

fn settings() -> Settings {
    Settings::default()
}

fn run_fcar(text: &str, eq: EqStrategy, s: Settings) -> (CheckResult, Car) {
    let model = build_model(text, eq, s.internal_signals);
    let mut car = Car::new(s, model, Direction::Forward);
    let result = car.run();
    (result, car)
}

fn run_bcar(text: &str, eq: EqStrategy, s: Settings) -> (CheckResult, Car) {
    let model = build_model(text, eq, s.internal_signals);
    let mut car = Car::new(s, model, Direction::Backward);
    let result = car.run();
    (result, car)
}

fn run_ic3(text: &str, eq: EqStrategy, s: Settings) -> (CheckResult, Ic3) {
    let model = build_model(text, eq, s.internal_signals);
    let mut ic3 = Ic3::new(s, model);
    let result = ic3.run();
    (result, ic3)
}

fn fcar_on(model: &Rc<Model>, s: Settings) -> (CheckResult, Car) {
    let mut car = Car::new(s, model.clone(), Direction::Forward);
    let result = car.run();
    (result, car)
}

fn ic3_on(model: &Rc<Model>, s: Settings) -> (CheckResult, Ic3) {
    let mut ic3 = Ic3::new(s, model.clone());
    let result = ic3.run();
    (result, ic3)
}

fn run_bmc(text: &str, bound: i64) -> (CheckResult, Bmc) {
    let model = build_model(text, EqStrategy::Off, false);
    let mut bmc = Bmc::new(
        Settings {
            bmc_k: bound,
            ..settings()
        },
        model,
    );
    let result = bmc.run();
    (result, bmc)
}

/// Replay a counterexample against the raw circuit: simulate the input
/// vectors from the trace's initial state and require the bad signal to
/// fire by the frame after the last vector.
fn replay(text: &str, trace: &Trace) -> bool {
    let aig = Aig::from_bytes(text.as_bytes()).unwrap();
    let ni = aig.num_inputs();
    let nl = aig.num_latches();
    let bad_lit = *aig.bads.first().or(aig.outputs.first()).unwrap();

    let mut latch = vec![false; nl];
    for &l in &trace.init_latches {
        let var = l.var() as usize;
        if var > ni && var <= ni + nl {
            latch[var - ni - 1] = l.is_pos();
        }
    }

    let frames = trace.input_steps.len();
    for f in 0..=frames {
        let mut inputs = vec![false; ni];
        if f < frames {
            for &l in &trace.input_steps[f] {
                let var = l.var() as usize;
                if var >= 1 && var <= ni {
                    inputs[var - 1] = l.is_pos();
                }
            }
        }
        let mut val = vec![false; aig.max_var as usize + 1];
        for (i, &v) in inputs.iter().enumerate() {
            val[i + 1] = v;
        }
        for (i, &v) in latch.iter().enumerate() {
            val[ni + i + 1] = v;
        }
        let lit_val = |val: &[bool], lit: u32| -> bool {
            if lit < 2 {
                lit == 1
            } else {
                val[(lit >> 1) as usize] ^ (lit & 1 == 1)
            }
        };
        for and in &aig.ands {
            val[(and.lhs >> 1) as usize] =
                lit_val(&val, and.rhs0) && lit_val(&val, and.rhs1);
        }
        if lit_val(&val, bad_lit) {
            return true;
        }
        latch = aig
            .latches
            .iter()
            .map(|lat| lit_val(&val, lat.next))
            .collect();
    }
    false
}

fn assert_canonical(cube: &Cube) {
    for w in cube.windows(2) {
        assert!(w[0].var() < w[1].var(), "cube not canonical: {cube:?}");
    }
}

fn negate_cube(cube: &Cube) -> Vec<Sig> {
    cube.iter().map(|&l| -l).collect()
}

/// Constrain the state to satisfy some cube of every listed frame, i.e.
/// to escape each frame's region, over current or next-state variables.
fn require_escape(
    solver: &mut TransSolver,
    model: &Model,
    frames: &[Vec<Rc<Cube>>],
    primed: bool,
) {
    for frame in frames {
        let mut any: Vec<Sig> = Vec::with_capacity(frame.len());
        for cube in frame {
            let d = model.new_var();
            for &l in cube.iter() {
                let lit = if primed { model.prime(l) } else { l };
                solver.add_clause(&[-d, lit]);
            }
            any.push(d);
        }
        solver.add_clause(&any);
    }
}

/// Constrain the state to lie inside some frame's region.
fn require_region(solver: &mut TransSolver, model: &Model, frames: &[Vec<Rc<Cube>>]) {
    let mut any: Vec<Sig> = Vec::with_capacity(frames.len());
    for frame in frames {
        let o = model.new_var();
        for cube in frame {
            let mut cls = negate_cube(cube);
            cls.push(-o);
            solver.add_clause(&cls);
        }
        any.push(o);
    }
    solver.add_clause(&any);
}

/// Prove a Safe verdict before trusting it, the counterpart of `replay`
/// for counterexamples. With P = !bad & (R0 | ... | Rn) over the returned
/// frames, check by SAT that Init => P, that P & T => P', and that P
/// excludes bad. An empty frame list stands for P = !bad alone.
fn assert_inductive_invariant(model: &Rc<Model>, frames: &[Vec<Rc<Cube>>]) {
    let whole;
    let frames = if frames.is_empty() {
        whole = vec![Vec::new()];
        &whole[..]
    } else {
        frames
    };

    // Init excludes bad (P's !bad conjunct).
    let mut solver = TransSolver::new(model.clone(), true);
    solver.load_trans();
    solver.load_initial_clauses();
    let mut assumption = model.initial_state().clone();
    assumption.push(model.bad());
    assert!(!solver.solve_under(&assumption), "initial state hits bad");

    // Init escapes no frame region.
    let mut solver = TransSolver::new(model.clone(), true);
    solver.load_trans();
    solver.load_initial_clauses();
    require_escape(&mut solver, model, frames, false);
    assert!(
        !solver.solve_under(model.initial_state()),
        "initial state outside the invariant"
    );

    // No P-state steps into bad.
    let mut solver = TransSolver::new(model.clone(), true);
    solver.load_trans_primed();
    solver.add_property_clause();
    require_region(&mut solver, model, frames);
    assert!(
        !solver.solve_under(&[model.prime(model.bad())]),
        "invariant reaches bad in one step"
    );

    // No P-state steps outside every frame region.
    let mut solver = TransSolver::new(model.clone(), true);
    solver.load_trans_primed();
    solver.add_property_clause();
    require_region(&mut solver, model, frames);
    require_escape(&mut solver, model, frames, true);
    assert!(
        !solver.solve_under(&[]),
        "invariant is not closed under the transition relation"
    );
}

/// Consecution: every blocking cube is unreachable in one step from the
/// frame below it. IC3 reads its sequence cumulatively (a cube stored at
/// level j holds at every level up to j), CAR frames stand alone.
fn assert_frame_consecution(
    model: &Rc<Model>,
    frames: &[Vec<Rc<Cube>>],
    cumulative: bool,
) {
    for i in 1..frames.len() {
        let mut solver = TransSolver::new(model.clone(), true);
        solver.load_trans_primed();
        solver.add_property_clause();
        if cumulative {
            if i == 1 {
                solver.load_initial_clauses();
            }
            for frame in &frames[i - 1..] {
                for cube in frame {
                    solver.add_clause(&negate_cube(cube));
                }
            }
        } else {
            for cube in &frames[i - 1] {
                solver.add_clause(&negate_cube(cube));
            }
        }
        let targets: Vec<Rc<Cube>> = if cumulative {
            frames[i..].iter().flatten().cloned().collect()
        } else {
            frames[i].clone()
        };
        for cube in targets {
            let primed: Cube = cube.iter().map(|&l| model.prime(l)).collect();
            assert!(
                !solver.solve_under(&primed),
                "cube {cube:?} violates consecution at level {i}"
            );
        }
    }
}

/// IC3 frame monotonicity: no state inside F_i satisfies a cube stored
/// above it, so each region contains the next.
fn assert_frames_monotone(model: &Rc<Model>, frames: &[Vec<Rc<Cube>>]) {
    for i in 0..frames.len().saturating_sub(1) {
        let above: Vec<Rc<Cube>> = frames[i + 1..].iter().flatten().cloned().collect();
        if above.is_empty() {
            continue;
        }
        let mut solver = TransSolver::new(model.clone(), true);
        solver.load_trans();
        solver.add_property_clause();
        for frame in &frames[i..] {
            for cube in frame {
                solver.add_clause(&negate_cube(cube));
            }
        }
        let mut any: Vec<Sig> = Vec::with_capacity(above.len());
        for cube in &above {
            let d = model.new_var();
            for &l in cube.iter() {
                solver.add_clause(&[-d, l]);
            }
            any.push(d);
        }
        solver.add_clause(&any);
        assert!(
            !solver.solve_under(&[]),
            "a state of F{i} is blocked at a higher frame"
        );
    }
}

/// The CAR analogue of monotonicity: at the detected fixpoint level the
/// frame's region is covered by the union of the frames below it.
fn assert_fixpoint_covered(model: &Rc<Model>, frames: &[Vec<Rc<Cube>>], level: usize) {
    assert!(level < frames.len(), "fixpoint level out of range");
    let mut solver = TransSolver::new(model.clone(), true);
    for c in model.clauses().to_vec() {
        solver.add_clause(&c);
    }
    for cube in &frames[level] {
        solver.add_clause(&negate_cube(cube));
    }
    require_escape(&mut solver, model, &frames[..level], false);
    assert!(
        !solver.solve_under(&[]),
        "frame {level} escapes the union of the frames below it"
    );
}

// ---- S1 ----

#[test]
fn s1_unsafe_everywhere() {
    for eq in [EqStrategy::Off, EqStrategy::TernaryThenRandom] {
        let (r, car) = run_fcar(S1_CONST_BAD, eq, settings());
        assert_eq!(r, CheckResult::Unsafe);
        let trace = car.counterexample().unwrap();
        assert_eq!(trace.input_steps.len(), 1);
        assert!(replay(S1_CONST_BAD, trace));
    }
    let (r, _) = run_bcar(S1_CONST_BAD, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    let (r, _) = run_ic3(S1_CONST_BAD, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    let (r, bmc) = run_bmc(S1_CONST_BAD, -1);
    assert_eq!(r, CheckResult::Unsafe);
    assert!(replay(S1_CONST_BAD, bmc.counterexample().unwrap()));
}

// ---- S2 ----

#[test]
fn s2_safe_everywhere() {
    for eq in [EqStrategy::Off, EqStrategy::TernaryThenRandom] {
        let (r, _) = run_fcar(S2_STUCK_LATCH, eq, settings());
        assert_eq!(r, CheckResult::Safe, "fcar, {eq:?}");
        let (r, _) = run_bcar(S2_STUCK_LATCH, eq, settings());
        assert_eq!(r, CheckResult::Safe, "bcar, {eq:?}");
        let (r, _) = run_ic3(S2_STUCK_LATCH, eq, settings());
        assert_eq!(r, CheckResult::Safe, "ic3, {eq:?}");
    }
    let (r, _) = run_bmc(S2_STUCK_LATCH, 8);
    assert_eq!(r, CheckResult::Unknown);
}

#[test]
fn s2_witness_retains_property() {
    let dir = std::env::temp_dir();
    let (r, car) = run_fcar(S2_STUCK_LATCH, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Safe);
    let model = build_model(S2_STUCK_LATCH, EqStrategy::Off, false);
    let frames = car.invariant_frames().cloned().unwrap_or_default();
    let path = dir.join("caracal_s2_witness.w.aag");
    caracal_engine::write_witness_aig(&model, &frames, &path).unwrap();
    let witness = Aig::from_file(&path).unwrap();
    // Still a single-property circuit over the same interface.
    assert_eq!(witness.num_inputs(), 0);
    assert_eq!(witness.num_latches(), 1);
    assert_eq!(witness.outputs.len() + witness.bads.len(), 1);
    std::fs::remove_file(&path).ok();
}

// ---- S3 ----

#[test]
fn s3_one_step_failure() {
    for eq in [EqStrategy::Off, EqStrategy::TernaryThenRandom] {
        let (r, car) = run_fcar(S3_ONE_STEP, eq, settings());
        assert_eq!(r, CheckResult::Unsafe);
        let trace = car.counterexample().unwrap();
        assert_eq!(trace.input_steps.len(), 1);
        assert_eq!(trace.input_steps[0], vec![Sig::new(1)]);
        assert!(trace.init_latches.contains(&Sig::new(-2)));
        assert!(replay(S3_ONE_STEP, trace));
    }
    let (r, ic3) = run_ic3(S3_ONE_STEP, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    assert!(replay(S3_ONE_STEP, ic3.counterexample().unwrap()));
    let (r, car) = run_bcar(S3_ONE_STEP, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    assert!(replay(S3_ONE_STEP, car.counterexample().unwrap()));
    let (r, bmc) = run_bmc(S3_ONE_STEP, -1);
    assert_eq!(r, CheckResult::Unsafe);
    assert!(replay(S3_ONE_STEP, bmc.counterexample().unwrap()));
}

// ---- S4 ----

#[test]
fn s4_counter_unsafe_after_seven() {
    let (r, ic3) = run_ic3(S4_COUNTER, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    let trace = ic3.counterexample().unwrap();
    assert_eq!(trace.input_steps.len(), 7, "ic3 trace length");
    assert!(replay(S4_COUNTER, trace));

    let (r, car) = run_fcar(S4_COUNTER, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    let trace = car.counterexample().unwrap();
    assert_eq!(trace.input_steps.len(), 7, "fcar trace length");
    assert!(replay(S4_COUNTER, trace));

    let (r, car) = run_bcar(S4_COUNTER, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    let trace = car.counterexample().unwrap();
    assert_eq!(trace.input_steps.len(), 7, "bcar trace length");
    assert!(replay(S4_COUNTER, trace));
}

#[test]
fn s4_counter_bmc_bounds() {
    let (r, bmc) = run_bmc(S4_COUNTER, 7);
    assert_eq!(r, CheckResult::Unsafe);
    let trace = bmc.counterexample().unwrap();
    assert_eq!(trace.input_steps.len(), 7);
    assert!(replay(S4_COUNTER, trace));

    let (r, _) = run_bmc(S4_COUNTER, 6);
    assert_eq!(r, CheckResult::Unknown);
}

#[test]
fn s4_counter_bmc_step_mode() {
    let model = build_model(S4_COUNTER, EqStrategy::Off, false);
    let mut bmc = Bmc::new(
        Settings {
            bmc_k: 10,
            bmc_step: 3,
            ..settings()
        },
        model,
    );
    assert_eq!(bmc.run(), CheckResult::Unsafe);
    let trace = bmc.counterexample().unwrap();
    assert_eq!(trace.input_steps.len(), 7);
    assert!(replay(S4_COUNTER, trace));
}

#[test]
fn s4_counter_with_heuristics() {
    // Seeded shuffle, refer-skipping, rotation, restarts: the verdict and
    // the trace length must not move.
    let tweaked = Settings {
        seed: 5,
        refer_skipping: true,
        rotate: true,
        restart: true,
        restart_threshold: 2,
        luby: true,
        ..settings()
    };
    let (r, car) = run_fcar(S4_COUNTER, EqStrategy::Off, tweaked.clone());
    assert_eq!(r, CheckResult::Unsafe);
    assert_eq!(car.counterexample().unwrap().input_steps.len(), 7);

    let (r, car) = run_bcar(S4_COUNTER, EqStrategy::Off, tweaked);
    assert_eq!(r, CheckResult::Unsafe);
    assert_eq!(car.counterexample().unwrap().input_steps.len(), 7);
}

// ---- S5 ----

#[test]
fn s5_equivalent_latches_collapse_to_safe() {
    for eq in [
        EqStrategy::TernaryThenRandom,
        EqStrategy::Random,
        EqStrategy::Off,
    ] {
        let (r, _) = run_fcar(S5_TWINS, eq, settings());
        assert_eq!(r, CheckResult::Safe, "fcar, {eq:?}");
        let (r, _) = run_bcar(S5_TWINS, eq, settings());
        assert_eq!(r, CheckResult::Safe, "bcar, {eq:?}");
        let (r, _) = run_ic3(S5_TWINS, eq, settings());
        assert_eq!(r, CheckResult::Safe, "ic3, {eq:?}");
    }
    // The rewritten model keeps a single latch.
    let model = build_model(S5_TWINS, EqStrategy::TernaryThenRandom, false);
    assert_eq!(model.model_latches().len(), 1);
}

// ---- S6 ----

#[test]
fn s6_safe_with_nontrivial_invariant() {
    let model = build_model(S6_OR_LATCH, EqStrategy::Off, false);
    let (r, car) = fcar_on(&model, settings());
    assert_eq!(r, CheckResult::Safe);
    let frames = car.invariant_frames().unwrap();
    assert!(!frames.is_empty());
    // Initiation: every stored cube is disjoint from the initial state.
    let init: Vec<Sig> = model.initial_state().clone();
    for frame in frames {
        for cube in frame {
            assert_canonical(cube);
            assert!(
                cube.iter().any(|l| init.contains(&-*l)),
                "cube {cube:?} intersects the initial state"
            );
        }
    }
    // The Safe verdict must stand up to an independent SAT check.
    assert_inductive_invariant(&model, frames);

    let (r, _) = run_bcar(S6_OR_LATCH, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Safe);
    let (r, ic3) = run_ic3(S6_OR_LATCH, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Safe);
    assert!(ic3.counterexample().is_none());
    // With equivalence discovery on, the stuck latch is folded away up
    // front and the verdict must not change.
    let (r, _) = run_fcar(S6_OR_LATCH, EqStrategy::TernaryThenRandom, settings());
    assert_eq!(r, CheckResult::Safe);
}

#[test]
fn s6_swap_latches_ic3_learns_lemmas() {
    let model = build_model(S6_SWAP, EqStrategy::Off, false);
    let (r, ic3) = ic3_on(&model, settings());
    assert_eq!(r, CheckResult::Safe);
    let frames = ic3.invariant_frames().unwrap();
    let total: usize = frames.iter().map(|f| f.len()).sum();
    assert!(total >= 1, "expected a learned lemma in the invariant");
    for frame in frames {
        for cube in frame {
            assert_canonical(cube);
        }
    }
    assert_inductive_invariant(&model, frames);

    let (r, car) = fcar_on(&model, settings());
    assert_eq!(r, CheckResult::Safe);
    assert_inductive_invariant(&model, car.invariant_frames().unwrap());
    let (r, _) = run_bcar(S6_SWAP, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Safe);
}

// ---- quantified frame properties ----

#[test]
fn invariants_are_inductive_after_safe_runs() {
    // Every Safe verdict's invariant must pass the independent
    // initiation / consecution / safety SAT checks.
    for text in [S2_STUCK_LATCH, S5_TWINS, S6_OR_LATCH, S6_SWAP] {
        let model = build_model(text, EqStrategy::Off, false);
        let (r, car) = fcar_on(&model, settings());
        assert_eq!(r, CheckResult::Safe, "fcar on {text:?}");
        assert_inductive_invariant(&model, car.invariant_frames().unwrap());

        let (r, ic3) = ic3_on(&model, settings());
        assert_eq!(r, CheckResult::Safe, "ic3 on {text:?}");
        assert_inductive_invariant(&model, ic3.invariant_frames().unwrap());
    }
}

#[test]
fn frames_satisfy_consecution() {
    // IC3: each stored cube is blocked relative to the cumulative frame
    // below it, at every level.
    for text in [S2_STUCK_LATCH, S6_SWAP] {
        let model = build_model(text, EqStrategy::Off, false);
        let (r, ic3) = ic3_on(&model, settings());
        assert_eq!(r, CheckResult::Safe);
        assert_frame_consecution(&model, &ic3.frames(), true);
    }
    // CAR: each frame's cubes are unreachable in one step from the frame
    // below, read per level. Holds for safe and unsafe runs alike.
    for text in [S6_OR_LATCH, S6_SWAP] {
        let model = build_model(text, EqStrategy::Off, false);
        let (r, car) = fcar_on(&model, settings());
        assert_eq!(r, CheckResult::Safe);
        assert_frame_consecution(&model, &car.frames(), false);
    }
    let model = build_model(S4_COUNTER, EqStrategy::Off, false);
    let (r, car) = fcar_on(&model, settings());
    assert_eq!(r, CheckResult::Unsafe);
    assert_frame_consecution(&model, &car.frames(), false);
}

#[test]
fn frames_are_monotone() {
    // IC3 frames shrink as the level rises: walk them pairwise and show
    // no F_i state is blocked above.
    for text in [S2_STUCK_LATCH, S5_TWINS, S6_SWAP] {
        let model = build_model(text, EqStrategy::Off, false);
        let (r, ic3) = ic3_on(&model, settings());
        assert_eq!(r, CheckResult::Safe);
        assert_frames_monotone(&model, &ic3.frames());
    }
    // CAR's sequence is not pairwise monotone (frame 0 is exactly the
    // initial cube); its analogue is the fixpoint containment that made
    // the run stop.
    let model = build_model(S6_OR_LATCH, EqStrategy::Off, false);
    let (r, car) = fcar_on(&model, settings());
    assert_eq!(r, CheckResult::Safe);
    let level = car.invariant_frames().unwrap().len();
    let frames = car.frames();
    assert!(level < frames.len());
    assert_fixpoint_covered(&model, &frames, level);

    let model = build_model(S6_SWAP, EqStrategy::Off, false);
    let (r, car) = fcar_on(&model, settings());
    assert_eq!(r, CheckResult::Safe);
    let level = car.invariant_frames().unwrap().len();
    let frames = car.frames();
    assert!(level < frames.len());
    assert_fixpoint_covered(&model, &frames, level);
}

#[test]
fn prime_renaming_matches_literal_unrolling() {
    // Substituting the P[k] names must denote the same functions as
    // unrolling the transition relation step by step: the renamed gate
    // copies agree with a fresh re-encoding over the renamed fanins, and
    // concrete input sequences force the renamed latch values.
    let model = build_model(S6_OR_LATCH, EqStrategy::Off, false);
    let mut solver = TransSolver::new(model.clone(), true);
    for k in 0..3 {
        for c in model.clauses_at(k) {
            solver.add_clause(&c);
        }
    }
    let input = Sig::new(1);
    let latch = Sig::new(2);
    let gate = Sig::new(4); // !L & !input

    for k in 1..3 {
        let g_k = model.prime_k(gate, k);
        let l_k = model.prime_k(latch, k);
        let in_k = model.prime_k(input, k);
        // Fresh Tseitin encoding of the same AND over the renamed fanins.
        let w = model.new_var();
        solver.add_clause(&[w, l_k, in_k]);
        solver.add_clause(&[-w, -l_k]);
        solver.add_clause(&[-w, -in_k]);
        assert!(!solver.solve_under(&[w, -g_k]), "copy differs at step {k}");
        assert!(!solver.solve_under(&[-w, g_k]), "copy differs at step {k}");
    }

    // L := L | input from L = 0: an input at step 0 sets and holds the
    // latch; no inputs keep it clear.
    let l_1 = model.prime_k(latch, 1);
    let l_2 = model.prime_k(latch, 2);
    let in_1 = model.prime_k(input, 1);
    assert!(!solver.solve_under(&[input, -l_1]));
    assert!(!solver.solve_under(&[input, -l_2]));
    assert!(!solver.solve_under(&[-latch, -input, -in_1, l_2]));
}

#[test]
fn innards_mode_smoke() {
    let s = Settings {
        internal_signals: true,
        ..settings()
    };
    let (r, _) = run_ic3(S6_SWAP, EqStrategy::Off, s.clone());
    assert_eq!(r, CheckResult::Safe);
    let (r, car) = run_fcar(S4_COUNTER, EqStrategy::Off, s);
    assert_eq!(r, CheckResult::Unsafe);
    assert_eq!(car.counterexample().unwrap().input_steps.len(), 7);
}

#[test]
fn cex_file_layout() {
    let dir = std::env::temp_dir();
    let (r, car) = run_fcar(S3_ONE_STEP, EqStrategy::Off, settings());
    assert_eq!(r, CheckResult::Unsafe);
    let model = build_model(S3_ONE_STEP, EqStrategy::Off, false);
    let path = dir.join("caracal_s3.cex");
    caracal_engine::write_cex(&model, car.counterexample().unwrap(), &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "1\nb0\n0\n1\n.\n");
    std::fs::remove_file(&path).ok();
}
