//! Counterexample and invariant witness emission.

use caracal_ir::{Aig, Cube, Model, Sig};
use caracal_utils::CaracalResult;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

/// A finished counterexample: the initial latch assignment and the input
/// vector applied at each step. The bad signal fires at the step after
/// the last input vector (or at step 0 for a single-vector trace of a
/// combinationally failing property).
pub struct Trace {
    pub init_latches: Cube,
    pub input_steps: Vec<Cube>,
}

fn bit_line(width: usize, offset: usize, cube: &Cube) -> String {
    let mut bits = vec!['0'; width];
    for &l in cube {
        let var = l.var() as usize;
        if var > offset && var <= offset + width {
            bits[var - offset - 1] = if l.is_pos() { '1' } else { '0' };
        }
    }
    bits.into_iter().collect()
}

/// Write the counterexample in the aiger witness layout:
/// `1`, `b0`, the initial latch bits, one input line per step, `.`.
/// Latches the trace leaves open are printed as `0`.
pub fn write_cex<P: AsRef<Path>>(
    model: &Model,
    trace: &Trace,
    path: P,
) -> CaracalResult<()> {
    let mut out = Vec::new();
    writeln!(out, "1")?;
    writeln!(out, "b0")?;
    writeln!(
        out,
        "{}",
        bit_line(model.num_latches(), model.num_inputs(), &trace.init_latches)
    )?;
    for step in &trace.input_steps {
        writeln!(out, "{}", bit_line(model.num_inputs(), 0, step))?;
    }
    writeln!(out, ".")?;
    std::fs::write(path, out)?;
    Ok(())
}

/// Translate a model signal back into an AIGER literal.
fn aiger_lit(model: &Model, s: Sig) -> u32 {
    if s == model.true_sig() {
        1
    } else if s == -model.true_sig() {
        0
    } else if s.is_pos() {
        (s.0 as u32) << 1
    } else {
        ((s.var() as u32) << 1) | 1
    }
}

/// AND together a list of literals, materializing gates; the empty list
/// is constant true.
fn and_cube(aig: &mut Aig, lits: &[u32]) -> u32 {
    match lits {
        [] => 1,
        [single] => *single,
        _ => {
            let mut acc = lits[0];
            for &l in &lits[1..] {
                acc = aig.push_and(acc, l);
            }
            acc
        }
    }
}

/// Emit the safe-witness circuit: the input AIG with its output replaced
/// by the negation of `!bad & (O_0 | ... | O_n)`, where each `O_j` is a
/// frame rendered as the conjunction of its negated cubes.
pub fn write_witness_aig<P: AsRef<Path>>(
    model: &Model,
    frames: &[Vec<Rc<Cube>>],
    path: P,
) -> CaracalResult<()> {
    let mut aig = model.aig().clone();
    let bad_lit = aiger_lit(model, model.bad());

    if frames.is_empty() {
        let text = aig.to_ascii();
        std::fs::write(path, text)?;
        return Ok(());
    }

    let mut inv_lits: Vec<u32> = Vec::with_capacity(frames.len());
    for frame in frames {
        let mut frame_lits: Vec<u32> = Vec::with_capacity(frame.len());
        for cube in frame {
            let cube_lits: Vec<u32> =
                cube.iter().map(|&l| aiger_lit(model, l)).collect();
            frame_lits.push(and_cube(&mut aig, &cube_lits) ^ 1);
        }
        let o_j = and_cube(&mut aig, &frame_lits);
        inv_lits.push(o_j ^ 1);
    }
    let inv = and_cube(&mut aig, &inv_lits) ^ 1;
    let p_prime = and_cube(&mut aig, &[bad_lit ^ 1, inv]);
    let new_bad = p_prime ^ 1;
    if !aig.bads.is_empty() {
        aig.bads = vec![new_bad];
        aig.outputs.clear();
    } else {
        aig.outputs = vec![new_bad];
    }
    aig.max_var = aig.max_var.max(new_bad >> 1);

    let text = aig.to_ascii();
    std::fs::write(path, text)?;
    Ok(())
}

/// `<output-dir>/<aig-basename>.<ext>`
pub fn witness_path(settings_path: &Path, dir: &Path, ext: &str) -> std::path::PathBuf {
    let stem = settings_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "witness".to_string());
    dir.join(format!("{stem}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_lines_default_to_zero() {
        // 2 inputs, 3 latches; latch vars are 3, 4, 5.
        let latches = vec![Sig::new(4), Sig::new(-5)];
        assert_eq!(bit_line(3, 2, &latches), "010");
        let inputs = vec![Sig::new(-1), Sig::new(2)];
        assert_eq!(bit_line(2, 0, &inputs), "01");
    }
}
