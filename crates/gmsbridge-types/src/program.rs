//! Decoded opcode programs.
//!
//! An [`OpcodeProgram`] holds every equation of one opcode file in a single
//! flat instruction array. Equation `i` starts at `equation_offsets[i]` with a
//! `Header` instruction whose operand is the length of the block, header
//! included. Pool-referencing instructions index into `pool`.

use gmsbridge_error::{BridgeError, Result};

use crate::opcode::{Instruction, Opcode};

/// A fully decoded opcode file.
///
/// Immutable once built; only the decoder and [`ProgramBuilder`] create one.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpcodeProgram {
    instructions: Vec<Instruction>,
    equation_offsets: Vec<usize>,
    pool: Vec<f64>,
    min_pool_len: u32,
}

impl OpcodeProgram {
    /// Assemble a program from already-validated parts.
    ///
    /// The decoder is the intended caller: it has checked the framing while
    /// reading, so only the cheap header invariant is asserted here.
    #[must_use]
    pub fn from_parts(
        instructions: Vec<Instruction>,
        equation_offsets: Vec<usize>,
        pool: Vec<f64>,
        min_pool_len: u32,
    ) -> Self {
        debug_assert!(
            equation_offsets
                .iter()
                .all(|&off| instructions.get(off).map(|i| i.opcode) == Some(Opcode::Header))
        );
        Self {
            instructions,
            equation_offsets,
            pool,
            min_pool_len,
        }
    }

    /// The flat instruction stream.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Start offset of each equation in [`instructions`](Self::instructions).
    #[must_use]
    pub fn equation_offsets(&self) -> &[usize] {
        &self.equation_offsets
    }

    /// The constant pool.
    #[must_use]
    pub fn pool(&self) -> &[f64] {
        &self.pool
    }

    /// Largest referenced pool index plus one.
    #[must_use]
    pub fn min_pool_len(&self) -> u32 {
        self.min_pool_len
    }

    /// Number of equations in the program.
    #[must_use]
    pub fn equation_count(&self) -> usize {
        self.equation_offsets.len()
    }

    /// Whether the program holds no equation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equation_offsets.is_empty()
    }

    /// The instruction block of equation `index`, header included.
    #[must_use]
    pub fn equation(&self, index: usize) -> Option<&[Instruction]> {
        let start = *self.equation_offsets.get(index)?;
        let end = self
            .equation_offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.instructions.len());
        self.instructions.get(start..end)
    }

    /// Iterate over every equation block in file order.
    pub fn equations(&self) -> impl Iterator<Item = &[Instruction]> + '_ {
        (0..self.equation_count()).filter_map(|i| self.equation(i))
    }

    /// Check that the pool covers every referenced constant.
    pub fn validate_pool(&self) -> Result<()> {
        let referenced = usize::try_from(self.min_pool_len).unwrap_or(usize::MAX);
        if referenced > self.pool.len() {
            return Err(BridgeError::pool(format!(
                "instructions reference {referenced} constants but the pool holds {}",
                self.pool.len()
            )));
        }
        Ok(())
    }

    /// Check the framing invariant: every offset points at a `Header` whose
    /// operand spans exactly up to the next header (or the end), and no
    /// framing opcode appears inside a block.
    pub fn validate_framing(&self) -> Result<()> {
        let mut expected_start = 0_usize;
        for (eq, &start) in self.equation_offsets.iter().enumerate() {
            if start != expected_start {
                return Err(BridgeError::EncodeInvariant {
                    detail: format!("equation {eq} starts at {start}, expected {expected_start}"),
                });
            }
            let header = self.instructions.get(start).ok_or_else(|| {
                BridgeError::EncodeInvariant {
                    detail: format!("equation {eq} offset {start} is past the instruction stream"),
                }
            })?;
            if header.opcode != Opcode::Header || header.operand == 0 {
                return Err(BridgeError::EncodeInvariant {
                    detail: format!("equation {eq} does not start with a non-empty Header"),
                });
            }
            let len = usize::try_from(header.operand).unwrap_or(usize::MAX);
            let end = start.saturating_add(len);
            let body = self
                .instructions
                .get(start + 1..end)
                .ok_or_else(|| BridgeError::EncodeInvariant {
                    detail: format!("equation {eq} block of length {len} overruns the stream"),
                })?;
            if let Some(bad) = body.iter().find(|i| i.opcode.is_framing()) {
                return Err(BridgeError::EncodeInvariant {
                    detail: format!("equation {eq} contains a {} inside its block", bad.opcode),
                });
            }
            expected_start = end;
        }
        if expected_start != self.instructions.len() {
            return Err(BridgeError::EncodeInvariant {
                detail: format!(
                    "{} trailing instructions belong to no equation",
                    self.instructions.len() - expected_start
                ),
            });
        }
        Ok(())
    }

    /// Take the program apart into instructions, offsets and pool.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Instruction>, Vec<usize>, Vec<f64>) {
        (self.instructions, self.equation_offsets, self.pool)
    }

    /// Render the program as a human-readable listing, one instruction per
    /// line, grouped by equation.
    #[must_use]
    pub fn listing(&self) -> String {
        use std::fmt::Write;

        let mut out = String::with_capacity(self.instructions.len() * 32);
        for (eq, block) in self.equations().enumerate() {
            writeln!(&mut out, "equation {eq}:").expect("write to string");
            for instr in block {
                let pool_value = if instr.opcode.references_pool() {
                    usize::try_from(instr.operand)
                        .ok()
                        .and_then(|i| self.pool.get(i))
                        .map(|v| format!("  ; {v:e}"))
                        .unwrap_or_default()
                } else {
                    String::new()
                };
                writeln!(
                    &mut out,
                    "  {:<9} {:>8}{pool_value}",
                    instr.opcode.name(),
                    instr.operand
                )
                .expect("write to string");
            }
        }
        writeln!(&mut out, "pool: {} constants", self.pool.len()).expect("write to string");
        out
    }
}

/// An opcode program under construction.
///
/// `begin_equation` opens a block whose header length is patched on the next
/// `begin_equation` or on [`finish`](Self::finish), the way forward labels are
/// resolved in a code generator.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
    equation_offsets: Vec<usize>,
    min_pool_len: u32,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new equation block.
    pub fn begin_equation(&mut self) -> &mut Self {
        self.close_block();
        self.equation_offsets.push(self.instructions.len());
        self.instructions.push(Instruction::new(Opcode::Header, 0));
        self
    }

    /// Append one instruction to the current equation.
    ///
    /// # Panics
    ///
    /// Panics when no equation is open or when `opcode` is a framing opcode;
    /// both are programming errors in the caller.
    pub fn emit(&mut self, opcode: Opcode, operand: u32) -> &mut Self {
        assert!(
            !self.equation_offsets.is_empty(),
            "emit() called before begin_equation()"
        );
        assert!(!opcode.is_framing(), "framing opcodes are emitted implicitly");
        if opcode.references_pool() {
            self.min_pool_len = self.min_pool_len.max(operand.saturating_add(1));
        }
        self.instructions.push(Instruction::new(opcode, operand));
        self
    }

    /// Seal the last block and attach the constant pool.
    #[must_use]
    pub fn finish(mut self, pool: Vec<f64>) -> OpcodeProgram {
        self.close_block();
        OpcodeProgram::from_parts(
            self.instructions,
            self.equation_offsets,
            pool,
            self.min_pool_len,
        )
    }

    #[allow(clippy::cast_possible_truncation)]
    fn close_block(&mut self) {
        if let Some(&start) = self.equation_offsets.last() {
            let len = self.instructions.len() - start;
            self.instructions[start].operand = len as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_equations() -> OpcodeProgram {
        let mut b = ProgramBuilder::new();
        b.begin_equation()
            .emit(Opcode::PushV, 1)
            .emit(Opcode::MulI, 0)
            .emit(Opcode::Store, 3);
        b.begin_equation()
            .emit(Opcode::PushI, 1)
            .emit(Opcode::Store, 4);
        b.finish(vec![2.0, 0.5])
    }

    #[test]
    fn builder_patches_header_lengths() {
        let p = two_equations();
        assert_eq!(p.equation_offsets(), &[0, 4]);
        assert_eq!(p.instructions()[0], Instruction::new(Opcode::Header, 4));
        assert_eq!(p.instructions()[4], Instruction::new(Opcode::Header, 3));
        assert_eq!(p.min_pool_len(), 2);
        p.validate_framing().expect("builder output is well framed");
        p.validate_pool().expect("pool covers references");
    }

    #[test]
    fn equation_slices() {
        let p = two_equations();
        assert_eq!(p.equation_count(), 2);
        assert_eq!(p.equation(0).map(<[_]>::len), Some(4));
        assert_eq!(
            p.equation(1),
            Some(
                &[
                    Instruction::new(Opcode::Header, 3),
                    Instruction::new(Opcode::PushI, 1),
                    Instruction::new(Opcode::Store, 4),
                ][..]
            )
        );
        assert!(p.equation(2).is_none());
        assert_eq!(p.equations().count(), 2);
    }

    #[test]
    fn pool_check_flags_short_pool() {
        let mut b = ProgramBuilder::new();
        b.begin_equation().emit(Opcode::PushI, 4).emit(Opcode::Store, 0);
        let p = b.finish(vec![1.0; 4]);
        assert_eq!(p.min_pool_len(), 5);
        let err = p.validate_pool().unwrap_err();
        assert!(matches!(err, BridgeError::PoolInconsistency { .. }));
    }

    #[test]
    fn framing_check_rejects_overrun() {
        let p = OpcodeProgram::from_parts(
            vec![
                Instruction::new(Opcode::Header, 5),
                Instruction::new(Opcode::PushV, 1),
            ],
            vec![0],
            vec![1.0],
            0,
        );
        assert!(matches!(
            p.validate_framing(),
            Err(BridgeError::EncodeInvariant { .. })
        ));
    }

    #[test]
    fn framing_check_rejects_orphans() {
        let p = OpcodeProgram::from_parts(
            vec![
                Instruction::new(Opcode::Header, 1),
                Instruction::new(Opcode::PushV, 1),
            ],
            vec![0],
            vec![1.0],
            0,
        );
        assert!(p.validate_framing().is_err());
    }

    #[test]
    fn listing_shows_pool_values() {
        let listing = two_equations().listing();
        assert!(listing.starts_with("equation 0:\n"));
        assert!(listing.contains("MulI"));
        assert!(listing.contains("; 2e0"));
        assert!(listing.ends_with("pool: 2 constants\n"));
    }
}
