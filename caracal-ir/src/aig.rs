//! Reading and writing AIGER circuits.
//!
//! Both the ASCII (`.aag`) and the binary (`.aig`) formats are accepted.
//! Circuits are re-encoded on load so that input variables occupy
//! `1..=num_inputs`, latch variables follow them, and every AND gate has a
//! larger id than its fanins. Everything downstream (state extraction, the
//! counterexample printer, CNF emission) relies on that layout.

use ahash::AHashMap;
use caracal_utils::{CaracalResult, Error};
use std::io::Write;
use std::path::Path;

/// A latch: current-state literal, next-state function, reset value.
/// `reset` is 0, 1, or the latch's own literal (uninitialized).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AigLatch {
    pub lit: u32,
    pub next: u32,
    pub reset: u32,
}

/// A two-input AND gate over AIGER literals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AigAnd {
    pub lhs: u32,
    pub rhs0: u32,
    pub rhs1: u32,
}

/// An AIGER circuit. Literals use the AIGER convention: `2v` is variable
/// `v`, `2v + 1` its negation, `0`/`1` the boolean constants.
#[derive(Clone, Debug, Default)]
pub struct Aig {
    pub max_var: u32,
    pub inputs: Vec<u32>,
    pub latches: Vec<AigLatch>,
    pub outputs: Vec<u32>,
    pub bads: Vec<u32>,
    pub constraints: Vec<u32>,
    pub ands: Vec<AigAnd>,
}

#[inline]
fn aiger_var(lit: u32) -> u32 {
    lit >> 1
}

#[inline]
fn aiger_sign(lit: u32) -> u32 {
    lit & 1
}

impl Aig {
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_latches(&self) -> usize {
        self.latches.len()
    }

    /// Read a circuit from a file, picking the format from the header
    /// magic, and re-encode it into topological form.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CaracalResult<Aig> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> CaracalResult<Aig> {
        let mut aig = if bytes.starts_with(b"aag ") {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::aiger_parse("file is not valid utf-8"))?;
            Self::parse_ascii(text)?
        } else if bytes.starts_with(b"aig ") {
            Self::parse_binary(bytes)?
        } else {
            return Err(Error::aiger_parse("missing aag/aig header"));
        };
        aig.check()?;
        if !aig.is_reencoded() {
            aig.reencode()?;
        }
        Ok(aig)
    }

    /// Parse the ASCII format. Section order per aiger-1.9: inputs,
    /// latches, outputs, bads, constraints, ands. Justice and fairness
    /// sections are rejected up front.
    pub fn parse_ascii(text: &str) -> CaracalResult<Aig> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::aiger_parse("empty file"))?;
        let fields: Vec<&str> = header.split_ascii_whitespace().collect();
        if fields.first() != Some(&"aag") || fields.len() < 6 {
            return Err(Error::aiger_parse(format!("bad header `{header}'")));
        }
        let nums: Vec<u32> = fields[1..]
            .iter()
            .map(|f| {
                f.parse::<u32>()
                    .map_err(|_| Error::aiger_parse(format!("bad header field `{f}'")))
            })
            .collect::<CaracalResult<_>>()?;
        let (m, i, l, o, a) = (nums[0], nums[1], nums[2], nums[3], nums[4]);
        let b = nums.get(5).copied().unwrap_or(0);
        let c = nums.get(6).copied().unwrap_or(0);
        let j = nums.get(7).copied().unwrap_or(0);
        let f = nums.get(8).copied().unwrap_or(0);
        if j > 0 || f > 0 {
            return Err(Error::unsupported(
                "justice and fairness properties are not handled",
            ));
        }

        let mut next_line = || -> CaracalResult<Vec<u32>> {
            let line = lines
                .next()
                .ok_or_else(|| Error::aiger_parse("unexpected end of file"))?;
            line.split_ascii_whitespace()
                .map(|t| {
                    t.parse::<u32>()
                        .map_err(|_| Error::aiger_parse(format!("bad literal `{t}'")))
                })
                .collect()
        };

        let mut aig = Aig {
            max_var: m,
            ..Aig::default()
        };
        for _ in 0..i {
            let lit = next_line()?;
            if lit.len() != 1 || aiger_sign(lit[0]) != 0 {
                return Err(Error::aiger_parse("malformed input line"));
            }
            aig.inputs.push(lit[0]);
        }
        for _ in 0..l {
            let lat = next_line()?;
            if lat.len() < 2 || lat.len() > 3 || aiger_sign(lat[0]) != 0 {
                return Err(Error::aiger_parse("malformed latch line"));
            }
            aig.latches.push(AigLatch {
                lit: lat[0],
                next: lat[1],
                reset: lat.get(2).copied().unwrap_or(0),
            });
        }
        for _ in 0..o {
            let out = next_line()?;
            if out.len() != 1 {
                return Err(Error::aiger_parse("malformed output line"));
            }
            aig.outputs.push(out[0]);
        }
        for _ in 0..b {
            let bad = next_line()?;
            if bad.len() != 1 {
                return Err(Error::aiger_parse("malformed bad line"));
            }
            aig.bads.push(bad[0]);
        }
        for _ in 0..c {
            let cons = next_line()?;
            if cons.len() != 1 {
                return Err(Error::aiger_parse("malformed constraint line"));
            }
            aig.constraints.push(cons[0]);
        }
        for _ in 0..a {
            let and = next_line()?;
            if and.len() != 3 || aiger_sign(and[0]) != 0 {
                return Err(Error::aiger_parse("malformed and line"));
            }
            aig.ands.push(AigAnd {
                lhs: and[0],
                rhs0: and[1],
                rhs1: and[2],
            });
        }
        Ok(aig)
    }

    /// Parse the binary format: inputs are implicit, latch/output sections
    /// are ASCII lines, and the and-gates are delta-coded byte pairs.
    pub fn parse_binary(bytes: &[u8]) -> CaracalResult<Aig> {
        let mut pos = 0usize;

        let read_line = |bytes: &[u8], pos: &mut usize| -> CaracalResult<String> {
            let start = *pos;
            while *pos < bytes.len() && bytes[*pos] != b'\n' {
                *pos += 1;
            }
            if *pos >= bytes.len() {
                return Err(Error::aiger_parse("unexpected end of file"));
            }
            let line = std::str::from_utf8(&bytes[start..*pos])
                .map_err(|_| Error::aiger_parse("non-ascii header section"))?
                .to_string();
            *pos += 1;
            Ok(line)
        };

        let header = read_line(bytes, &mut pos)?;
        let fields: Vec<&str> = header.split_ascii_whitespace().collect();
        if fields.first() != Some(&"aig") || fields.len() < 6 {
            return Err(Error::aiger_parse(format!("bad header `{header}'")));
        }
        let nums: Vec<u32> = fields[1..]
            .iter()
            .map(|f| {
                f.parse::<u32>()
                    .map_err(|_| Error::aiger_parse(format!("bad header field `{f}'")))
            })
            .collect::<CaracalResult<_>>()?;
        let (m, i, l, o, a) = (nums[0], nums[1], nums[2], nums[3], nums[4]);
        let b = nums.get(5).copied().unwrap_or(0);
        let c = nums.get(6).copied().unwrap_or(0);
        let j = nums.get(7).copied().unwrap_or(0);
        let f = nums.get(8).copied().unwrap_or(0);
        if j > 0 || f > 0 {
            return Err(Error::unsupported(
                "justice and fairness properties are not handled",
            ));
        }
        if m != i + l + a {
            return Err(Error::aiger_parse("binary header must satisfy M = I + L + A"));
        }

        let mut aig = Aig {
            max_var: m,
            ..Aig::default()
        };
        for k in 0..i {
            aig.inputs.push(2 * (k + 1));
        }
        for k in 0..l {
            let line = read_line(bytes, &mut pos)?;
            let parts: Vec<u32> = line
                .split_ascii_whitespace()
                .map(|t| {
                    t.parse::<u32>()
                        .map_err(|_| Error::aiger_parse(format!("bad literal `{t}'")))
                })
                .collect::<CaracalResult<_>>()?;
            if parts.is_empty() || parts.len() > 2 {
                return Err(Error::aiger_parse("malformed latch line"));
            }
            aig.latches.push(AigLatch {
                lit: 2 * (i + k + 1),
                next: parts[0],
                reset: parts.get(1).copied().unwrap_or(0),
            });
        }
        let read_lit_line = |bytes: &[u8], pos: &mut usize| -> CaracalResult<u32> {
            let line = read_line(bytes, pos)?;
            line.trim()
                .parse::<u32>()
                .map_err(|_| Error::aiger_parse(format!("bad literal `{line}'")))
        };
        for _ in 0..o {
            aig.outputs.push(read_lit_line(bytes, &mut pos)?);
        }
        for _ in 0..b {
            aig.bads.push(read_lit_line(bytes, &mut pos)?);
        }
        for _ in 0..c {
            aig.constraints.push(read_lit_line(bytes, &mut pos)?);
        }

        let decode = |pos: &mut usize| -> CaracalResult<u32> {
            let mut x: u64 = 0;
            let mut shift = 0u32;
            loop {
                let byte = *bytes
                    .get(*pos)
                    .ok_or_else(|| Error::aiger_parse("truncated delta code"))?;
                *pos += 1;
                x |= u64::from(byte & 0x7f) << shift;
                if byte & 0x80 == 0 {
                    break;
                }
                shift += 7;
                if shift > 35 {
                    return Err(Error::aiger_parse("delta code out of range"));
                }
            }
            u32::try_from(x).map_err(|_| Error::aiger_parse("delta code out of range"))
        };
        for k in 0..a {
            let lhs = 2 * (i + l + k + 1);
            let delta0 = decode(&mut pos)?;
            let rhs0 = lhs
                .checked_sub(delta0)
                .ok_or_else(|| Error::aiger_parse("and delta underflow"))?;
            let delta1 = decode(&mut pos)?;
            let rhs1 = rhs0
                .checked_sub(delta1)
                .ok_or_else(|| Error::aiger_parse("and delta underflow"))?;
            aig.ands.push(AigAnd { lhs, rhs0, rhs1 });
        }
        Ok(aig)
    }

    /// Validate literal ranges and that every referenced variable is
    /// defined somewhere.
    fn check(&self) -> CaracalResult<()> {
        let mut defined = vec![false; self.max_var as usize + 1];
        defined[0] = true;
        let mut define = |lit: u32, what: &str| -> CaracalResult<()> {
            let v = aiger_var(lit) as usize;
            if v >= defined.len() || defined[v] {
                return Err(Error::aiger_parse(format!(
                    "{what} literal {lit} out of range or redefined"
                )));
            }
            defined[v] = true;
            Ok(())
        };
        for &l in &self.inputs {
            define(l, "input")?;
        }
        for lat in &self.latches {
            define(lat.lit, "latch")?;
        }
        for and in &self.ands {
            define(and.lhs, "and")?;
        }
        let defined = defined;
        let check_ref = |lit: u32| -> CaracalResult<()> {
            let v = aiger_var(lit) as usize;
            if v >= defined.len() || !defined[v] {
                return Err(Error::aiger_parse(format!("undefined literal {lit}")));
            }
            Ok(())
        };
        for lat in &self.latches {
            check_ref(lat.next)?;
            check_ref(lat.reset)?;
            if lat.reset > 1 && lat.reset != lat.lit {
                return Err(Error::aiger_parse(format!(
                    "latch {} has unsupported reset {}",
                    lat.lit, lat.reset
                )));
            }
        }
        for &l in self.outputs.iter().chain(&self.bads).chain(&self.constraints) {
            check_ref(l)?;
        }
        for and in &self.ands {
            check_ref(and.rhs0)?;
            check_ref(and.rhs1)?;
        }
        Ok(())
    }

    /// Whether the circuit already has the canonical variable layout.
    pub fn is_reencoded(&self) -> bool {
        let i = self.inputs.len() as u32;
        let l = self.latches.len() as u32;
        if self.max_var != i + l + self.ands.len() as u32 {
            return false;
        }
        if !self.inputs.iter().enumerate().all(|(k, &lit)| lit == 2 * (k as u32 + 1)) {
            return false;
        }
        if !self
            .latches
            .iter()
            .enumerate()
            .all(|(k, lat)| lat.lit == 2 * (i + k as u32 + 1))
        {
            return false;
        }
        self.ands.iter().enumerate().all(|(k, and)| {
            and.lhs == 2 * (i + l + k as u32 + 1)
                && and.rhs0 < and.lhs
                && and.rhs1 <= and.rhs0
        })
    }

    /// Renumber variables so inputs come first, then latches, then AND
    /// gates in topological order.
    pub fn reencode(&mut self) -> CaracalResult<()> {
        let i = self.inputs.len() as u32;
        let l = self.latches.len() as u32;
        let mut map: AHashMap<u32, u32> = AHashMap::new();
        map.insert(0, 0);
        for (k, &lit) in self.inputs.iter().enumerate() {
            map.insert(aiger_var(lit), k as u32 + 1);
        }
        for (k, lat) in self.latches.iter().enumerate() {
            map.insert(aiger_var(lat.lit), i + k as u32 + 1);
        }
        let and_defs: AHashMap<u32, (u32, u32)> = self
            .ands
            .iter()
            .map(|a| (aiger_var(a.lhs), (a.rhs0, a.rhs1)))
            .collect();

        // Iterative DFS assigning post-order ids to and-gate variables.
        let mut next_id = i + l + 1;
        let mut new_ands: Vec<(u32, u32)> = Vec::with_capacity(self.ands.len());
        let mut on_path: AHashMap<u32, bool> = AHashMap::new();
        for root in self.ands.iter().map(|a| aiger_var(a.lhs)).collect::<Vec<_>>() {
            if map.contains_key(&root) {
                continue;
            }
            let mut stack = vec![(root, false)];
            while let Some((v, expanded)) = stack.pop() {
                if map.contains_key(&v) {
                    continue;
                }
                let (r0, r1) = and_defs[&v];
                if expanded {
                    on_path.remove(&v);
                    map.insert(v, next_id);
                    next_id += 1;
                    new_ands.push((r0, r1));
                } else {
                    if on_path.insert(v, true).is_some() {
                        return Err(Error::aiger_parse("combinational cycle"));
                    }
                    stack.push((v, true));
                    for r in [r0, r1] {
                        let rv = aiger_var(r);
                        if !map.contains_key(&rv) {
                            if !and_defs.contains_key(&rv) {
                                return Err(Error::aiger_parse(format!(
                                    "undefined literal {r}"
                                )));
                            }
                            stack.push((rv, false));
                        }
                    }
                }
            }
        }

        let remap = |lit: u32, map: &AHashMap<u32, u32>| -> u32 {
            2 * map[&aiger_var(lit)] + aiger_sign(lit)
        };
        self.inputs = (1..=i).map(|k| 2 * k).collect();
        for (k, lat) in self.latches.iter_mut().enumerate() {
            let reset = if lat.reset > 1 {
                2 * (i + k as u32 + 1)
            } else {
                lat.reset
            };
            *lat = AigLatch {
                lit: 2 * (i + k as u32 + 1),
                next: remap(lat.next, &map),
                reset,
            };
        }
        for out in self.outputs.iter_mut() {
            *out = remap(*out, &map);
        }
        for bad in self.bads.iter_mut() {
            *bad = remap(*bad, &map);
        }
        for cons in self.constraints.iter_mut() {
            *cons = remap(*cons, &map);
        }
        self.ands = new_ands
            .iter()
            .enumerate()
            .map(|(k, &(r0, r1))| {
                let a = remap(r0, &map);
                let b = remap(r1, &map);
                AigAnd {
                    lhs: 2 * (i + l + k as u32 + 1),
                    rhs0: a.max(b),
                    rhs1: a.min(b),
                }
            })
            .collect();
        self.max_var = i + l + self.ands.len() as u32;
        Ok(())
    }

    /// Append an AND gate with a fresh variable; returns its literal.
    pub fn push_and(&mut self, rhs0: u32, rhs1: u32) -> u32 {
        self.max_var += 1;
        let lhs = 2 * self.max_var;
        self.ands.push(AigAnd {
            lhs,
            rhs0: rhs0.max(rhs1),
            rhs1: rhs0.min(rhs1),
        });
        lhs
    }

    /// Write the circuit in ASCII form.
    pub fn write_ascii<W: Write>(&self, w: &mut W) -> CaracalResult<()> {
        let mut tail = vec![self.bads.len(), self.constraints.len()];
        while tail.last() == Some(&0) {
            tail.pop();
        }
        write!(
            w,
            "aag {} {} {} {} {}",
            self.max_var,
            self.inputs.len(),
            self.latches.len(),
            self.outputs.len(),
            self.ands.len()
        )?;
        for n in tail {
            write!(w, " {n}")?;
        }
        writeln!(w)?;
        for &l in &self.inputs {
            writeln!(w, "{l}")?;
        }
        for lat in &self.latches {
            if lat.reset == 0 {
                writeln!(w, "{} {}", lat.lit, lat.next)?;
            } else {
                writeln!(w, "{} {} {}", lat.lit, lat.next, lat.reset)?;
            }
        }
        for &l in &self.outputs {
            writeln!(w, "{l}")?;
        }
        for &l in &self.bads {
            writeln!(w, "{l}")?;
        }
        for &l in &self.constraints {
            writeln!(w, "{l}")?;
        }
        for and in &self.ands {
            writeln!(w, "{} {} {}", and.lhs, and.rhs0, and.rhs1)?;
        }
        Ok(())
    }

    pub fn to_ascii(&self) -> String {
        let mut buf = Vec::new();
        self.write_ascii(&mut buf).expect("write to vec");
        String::from_utf8(buf).expect("ascii output")
    }
}
