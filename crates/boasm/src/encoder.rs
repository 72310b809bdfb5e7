//! Instruction encoding: operand model, form selection, and the byte-emitter
//! engine driven by the [`Isa`](crate::isa::Isa) table.
//!
//! The encoder knows nothing about symbols beyond their names: when a form
//! references a package-level var it emits a RIP-relative placeholder and
//! records a [`Relocation`] for whoever owns the byte stream.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::error::Error;
use crate::isa::{Emitter, Field, Form, Isa, OpKind};
use crate::reg::Register;

// ─── Immediates ─────────────────────────────────────────────────────────

/// A sized integer operand.
///
/// The variant records both width and signedness, which drive form matching
/// (an `imm16` slot takes any 8/16-bit integer) and widening (signed values
/// sign-extend, unsigned values zero-extend).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Imm {
    /// Unsigned 8-bit.
    U8(u8),
    /// Signed 8-bit.
    I8(i8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Signed 16-bit.
    I16(i16),
    /// Unsigned 32-bit.
    U32(u32),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 64-bit.
    I64(i64),
}

impl Imm {
    /// Wrap an integer in the smallest width that fits: unsigned for
    /// non-negative values, signed for negative ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImmediateOverflow`] when the value does not fit in
    /// 64 bits.
    pub fn int(value: i128) -> Result<Imm, Error> {
        if value >= 0 {
            if value <= u8::MAX as i128 {
                Ok(Imm::U8(value as u8))
            } else if value <= u16::MAX as i128 {
                Ok(Imm::U16(value as u16))
            } else if value <= u32::MAX as i128 {
                Ok(Imm::U32(value as u32))
            } else if value <= u64::MAX as i128 {
                Ok(Imm::U64(value as u64))
            } else {
                Err(Error::ImmediateOverflow { value, width: 8 })
            }
        } else if value >= i8::MIN as i128 {
            Ok(Imm::I8(value as i8))
        } else if value >= i16::MIN as i128 {
            Ok(Imm::I16(value as i16))
        } else if value >= i32::MIN as i128 {
            Ok(Imm::I32(value as i32))
        } else if value >= i64::MIN as i128 {
            Ok(Imm::I64(value as i64))
        } else {
            Err(Error::ImmediateOverflow { value, width: 8 })
        }
    }

    /// Width of the wrapped integer in bits.
    #[must_use]
    pub fn size_bits(self) -> u16 {
        match self {
            Imm::U8(_) | Imm::I8(_) => 8,
            Imm::U16(_) | Imm::I16(_) => 16,
            Imm::U32(_) | Imm::I32(_) => 32,
            Imm::U64(_) | Imm::I64(_) => 64,
        }
    }

    /// Whether the variant is one of the signed widths.
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(self, Imm::I8(_) | Imm::I16(_) | Imm::I32(_) | Imm::I64(_))
    }

    /// The wrapped value, widened to `i128`.
    #[must_use]
    pub fn value(self) -> i128 {
        match self {
            Imm::U8(v) => v as i128,
            Imm::I8(v) => v as i128,
            Imm::U16(v) => v as i128,
            Imm::I16(v) => v as i128,
            Imm::U32(v) => v as i128,
            Imm::I32(v) => v as i128,
            Imm::U64(v) => v as i128,
            Imm::I64(v) => v as i128,
        }
    }
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

// ─── Memory operands ────────────────────────────────────────────────────

/// A `[base + offset]` memory operand.
///
/// A base of [`Register::Rip`] selects RIP-relative addressing, where the
/// displacement is resolved by relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Indirect {
    /// Base register (must be 64-bit).
    pub base: Register,
    /// Signed byte displacement.
    pub off: i32,
    /// Size in bits of the datum at the address; 0 when unspecified.
    pub size: u16,
}

impl Indirect {
    /// An unsized `[base + off]` operand.
    #[must_use]
    pub fn new(base: Register, off: i32) -> Self {
        Self { base, off, size: 0 }
    }

    /// A `[base + off]` operand carrying the datum width.
    #[must_use]
    pub fn sized(base: Register, off: i32, size: u16) -> Self {
        Self { base, off, size }
    }
}

impl fmt::Display for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.off == 0 {
            write!(f, "[{}]", self.base)
        } else if self.off < 0 {
            write!(f, "[{}-{:#x}]", self.base, -(self.off as i64))
        } else {
            write!(f, "[{}+{:#x}]", self.base, self.off)
        }
    }
}

// ─── Operands ───────────────────────────────────────────────────────────

/// A concrete operand handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// A register.
    Reg(Register),
    /// An immediate integer.
    Imm(Imm),
    /// A memory operand.
    Mem(Indirect),
    /// A package-level var or data reference, by symbol name.  Encoded
    /// RIP-relative with a relocation.
    Var(String),
}

impl From<Register> for Operand {
    fn from(r: Register) -> Self {
        Operand::Reg(r)
    }
}

impl From<Imm> for Operand {
    fn from(i: Imm) -> Self {
        Operand::Imm(i)
    }
}

impl From<Indirect> for Operand {
    fn from(m: Indirect) -> Self {
        Operand::Mem(m)
    }
}

impl Operand {
    /// A var-reference operand.
    #[must_use]
    pub fn var(name: &str) -> Operand {
        Operand::Var(name.into())
    }
}

// ─── Relocations ────────────────────────────────────────────────────────

/// How a relocation patches its four bytes once the symbol resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelocKind {
    /// `i32` displacement relative to the end of the patched field
    /// (x86-64 RIP-relative and near-branch semantics).
    #[default]
    Rel32,
    /// Absolute 32-bit value.
    Abs32,
}

impl RelocKind {
    /// Stable wire value for object-file serialization.
    #[must_use]
    pub fn wire(self) -> u32 {
        match self {
            RelocKind::Rel32 => 0,
            RelocKind::Abs32 => 1,
        }
    }

    /// Decode the wire value.
    #[must_use]
    pub fn from_wire(v: u32) -> Option<RelocKind> {
        match v {
            0 => Some(RelocKind::Rel32),
            1 => Some(RelocKind::Abs32),
            _ => None,
        }
    }
}

/// A pending four-byte patch at `offset`, naming a symbol whose address is
/// resolved later — by the function for local labels, by the linker for
/// everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relocation {
    /// Byte offset of the patched field inside its instruction stream.
    pub offset: u32,
    /// Patch semantics.
    pub kind: RelocKind,
    /// The referenced symbol.
    pub symbol: String,
    /// Constant added to the resolved value.
    pub addend: i32,
}

impl Relocation {
    /// A relative relocation with no addend.
    #[must_use]
    pub fn rel32(offset: u32, symbol: &str) -> Self {
        Self {
            offset,
            kind: RelocKind::Rel32,
            symbol: symbol.into(),
            addend: 0,
        }
    }

    /// Patch `buf` with the resolved `value`.
    ///
    /// For [`RelocKind::Rel32`] the written displacement is
    /// `value + addend - offset - 4`: relative offsets on x86-64 count from
    /// the end of the four-byte field.
    pub fn apply(&self, buf: &mut [u8], value: i32) {
        let target = match self.kind {
            RelocKind::Rel32 => value
                .wrapping_add(self.addend)
                .wrapping_sub(self.offset as i32)
                .wrapping_sub(4),
            RelocKind::Abs32 => value.wrapping_add(self.addend),
        };
        let at = self.offset as usize;
        buf[at..at + 4].copy_from_slice(&target.to_le_bytes());
    }
}

// ─── Form matching ──────────────────────────────────────────────────────

fn mem_matches(ind: &Indirect, size: u16) -> bool {
    if size != 0 && ind.size != 0 && ind.size != size {
        return false;
    }
    ind.base.size_bits() == 64
}

fn kind_matches(kind: OpKind, op: &Operand) -> bool {
    match kind {
        OpKind::Imm8 => matches!(op, Operand::Imm(i) if i.size_bits() <= 8),
        OpKind::Imm16 => matches!(op, Operand::Imm(i) if i.size_bits() <= 16),
        OpKind::Imm32 => matches!(op, Operand::Imm(i) if i.size_bits() <= 32),
        OpKind::Imm64 => matches!(op, Operand::Imm(_)),
        OpKind::R8 => matches!(op, Operand::Reg(r) if r.size_bits() == 8),
        OpKind::R16 => matches!(op, Operand::Reg(r) if r.size_bits() == 16),
        OpKind::R32 => matches!(op, Operand::Reg(r) if r.size_bits() == 32),
        OpKind::R64 => {
            matches!(op, Operand::Reg(r) if r.size_bits() == 64 && *r != Register::Rip)
        }
        OpKind::M => match op {
            Operand::Mem(ind) => mem_matches(ind, 0),
            Operand::Var(_) => true,
            _ => false,
        },
        OpKind::M8 => match op {
            Operand::Mem(ind) => mem_matches(ind, 8),
            Operand::Var(_) => true,
            _ => false,
        },
        OpKind::M16 => match op {
            Operand::Mem(ind) => mem_matches(ind, 16),
            Operand::Var(_) => true,
            _ => false,
        },
        OpKind::M32 => match op {
            Operand::Mem(ind) => mem_matches(ind, 32),
            Operand::Var(_) => true,
            _ => false,
        },
        OpKind::M64 => match op {
            Operand::Mem(ind) => mem_matches(ind, 64),
            Operand::Var(_) => true,
            _ => false,
        },
        OpKind::Moffs32 => matches!(op, Operand::Mem(ind) if mem_matches(ind, 32)),
        OpKind::Moffs64 => matches!(op, Operand::Mem(ind) if mem_matches(ind, 64)),
        OpKind::Rel8 => matches!(op, Operand::Imm(Imm::I8(_))),
        OpKind::Rel32 => matches!(op, Operand::Imm(Imm::I32(_))),
    }
}

// ─── Emission ───────────────────────────────────────────────────────────

fn op_at<'a>(ops: &'a [Operand], i: u8) -> Result<&'a Operand, String> {
    ops.get(i as usize)
        .ok_or_else(|| "form references a missing operand".to_string())
}

/// The register an operand contributes to a REX/opcode/ModR/M field, if any.
fn op_register(ops: &[Operand], i: u8) -> Option<Register> {
    match ops.get(i as usize)? {
        Operand::Reg(r) => Some(*r),
        Operand::Mem(ind) => Some(ind.base),
        _ => None,
    }
}

/// Like [`op_register`], but for the REX `X` bit: an R12 base encodes via
/// SIB, where the absent index must read as RBP so the extension bit stays
/// clear.
fn rex_x_register(ops: &[Operand], i: u8) -> Option<Register> {
    match ops.get(i as usize)? {
        Operand::Reg(r) => Some(*r),
        Operand::Mem(ind) => {
            if ind.base == Register::R12 {
                Some(Register::Rbp)
            } else {
                Some(ind.base)
            }
        }
        _ => None,
    }
}

fn require_register(ops: &[Operand], i: u8) -> Result<Register, String> {
    op_register(ops, i).ok_or_else(|| "register operand expected".to_string())
}

fn require_imm(ops: &[Operand], i: u8) -> Result<Imm, String> {
    match op_at(ops, i)? {
        Operand::Imm(imm) => Ok(*imm),
        _ => Err("immediate operand expected".to_string()),
    }
}

fn push_modrm(buf: &mut Vec<u8>, mode: u8, reg: u8, rm: u8) {
    buf.push(((mode & 0b11) << 6) | ((reg & 0b111) << 3) | (rm & 0b111));
}

fn rex_hi(r: Option<Register>) -> u8 {
    r.map_or(0, |r| (r.code() >> 3) & 1)
}

/// Widen an immediate into `size` bytes, little-endian: signed values
/// sign-extend, unsigned values zero-extend, and anything wider than the
/// slot is rejected (the caller falls through to the next form).
fn push_imm(buf: &mut Vec<u8>, imm: Imm, size: u8) -> Result<(), String> {
    let too_wide = || "immediate wider than the operand slot".to_string();
    match size {
        1 => match imm {
            Imm::U8(v) => buf.push(v),
            Imm::I8(v) => buf.push(v as u8),
            _ => return Err(too_wide()),
        },
        2 => {
            let v: u16 = match imm {
                Imm::U8(v) => v as u16,
                Imm::I8(v) => v as i16 as u16,
                Imm::U16(v) => v,
                Imm::I16(v) => v as u16,
                _ => return Err(too_wide()),
            };
            buf.extend_from_slice(&v.to_le_bytes());
        }
        4 => {
            let v: u32 = match imm {
                Imm::U8(v) => v as u32,
                Imm::I8(v) => v as i32 as u32,
                Imm::U16(v) => v as u32,
                Imm::I16(v) => v as i32 as u32,
                Imm::U32(v) => v,
                Imm::I32(v) => v as u32,
                _ => return Err(too_wide()),
            };
            buf.extend_from_slice(&v.to_le_bytes());
        }
        8 => {
            let v: u64 = match imm {
                Imm::U8(v) => v as u64,
                Imm::I8(v) => v as i64 as u64,
                Imm::U16(v) => v as u64,
                Imm::I16(v) => v as i64 as u64,
                Imm::U32(v) => v as u64,
                Imm::I32(v) => v as i64 as u64,
                Imm::U64(v) => v,
                Imm::I64(v) => v as u64,
            };
            buf.extend_from_slice(&v.to_le_bytes());
        }
        _ => return Err("unsupported immediate width".to_string()),
    }
    Ok(())
}

fn emit_form(
    form: &Form,
    buf: &mut Vec<u8>,
    ops: &[Operand],
) -> Result<Vec<Relocation>, String> {
    let mut relocations = Vec::new();
    for emitter in &form.enc {
        match *emitter {
            Emitter::Prefix(b) => buf.push(b),
            Emitter::Rex {
                mandatory,
                w,
                r,
                x,
                b,
            } => {
                let rr = r.and_then(|i| op_register(ops, i));
                let xr = x.and_then(|i| rex_x_register(ops, i));
                let br = b.and_then(|i| op_register(ops, i));
                let needed = mandatory
                    || w
                    || rr.is_some_and(Register::needs_rex)
                    || xr.is_some_and(Register::needs_rex)
                    || br.is_some_and(Register::needs_rex);
                if needed {
                    buf.push(
                        0x40 | (u8::from(w) << 3)
                            | (rex_hi(rr) << 2)
                            | (rex_hi(xr) << 1)
                            | rex_hi(br),
                    );
                }
            }
            Emitter::Opcode { byte, addend } => {
                let mut b = byte;
                if let Some(i) = addend {
                    b = b.wrapping_add(require_register(ops, i)?.code() & 0b111);
                }
                buf.push(b);
            }
            Emitter::ModRm { mode, reg, rm } => {
                let mut do_sib = false;
                let mut indirect: Option<Indirect> = None;
                let mut xmod = match mode {
                    Field::Lit(m) => m,
                    Field::Op(i) => match op_at(ops, i)? {
                        Operand::Mem(ind) => {
                            if ind.base == Register::Rsp || ind.base == Register::R12 {
                                do_sib = true;
                            }
                            indirect = Some(*ind);
                            if ind.off != 0 {
                                0b10
                            } else {
                                0b00
                            }
                        }
                        Operand::Var(name) => {
                            // RIP-relative load of a package symbol: the
                            // four displacement bytes right after this
                            // ModR/M byte get patched by the linker.
                            indirect = Some(Indirect::sized(Register::Rip, 0, 64));
                            relocations.push(Relocation::rel32(buf.len() as u32 + 1, name));
                            0b00
                        }
                        _ => return Err("memory or var operand expected".to_string()),
                    },
                };
                let xreg = match reg {
                    Field::Lit(v) => v,
                    Field::Op(i) => require_register(ops, i)?.code(),
                };
                if do_sib {
                    // Base RSP/R12: ModR/M alone cannot express the base,
                    // so emit the no-index SIB byte (scale 0, index none).
                    push_modrm(buf, xmod, xreg, 0b100);
                    buf.push(0x24);
                    if xmod != 0 {
                        let ind = indirect.expect("SIB implies a memory operand");
                        buf.extend_from_slice(&ind.off.to_le_bytes());
                    }
                } else {
                    let rm_reg = match indirect {
                        Some(ind) => ind.base,
                        None => require_register(ops, rm)?,
                    };
                    let low = rm_reg.code() & 0b111;
                    match indirect {
                        Some(ind) if xmod != 0 || low == 0b101 => {
                            // rm=101 with mod=00 means RIP-relative, so a
                            // plain [rbp]/[r13] must take the disp32 path.
                            if ind.base == Register::Rbp || ind.base == Register::R13 {
                                xmod = 0b10;
                            }
                            push_modrm(buf, xmod, xreg, low);
                            buf.extend_from_slice(&ind.off.to_le_bytes());
                        }
                        _ => push_modrm(buf, xmod, xreg, low),
                    }
                }
            }
            Emitter::Imm { size, op } => {
                let imm = require_imm(ops, op)?;
                push_imm(buf, imm, size)?;
            }
            Emitter::CodeOffset { size, op } => match (size, require_imm(ops, op)?) {
                (1, Imm::I8(v)) => buf.push(v as u8),
                (2, Imm::I16(v)) => buf.extend_from_slice(&v.to_le_bytes()),
                (4, Imm::I32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
                (8, Imm::I64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
                _ => return Err("signed code offset of exact width expected".to_string()),
            },
            Emitter::DataOffset { size, op } => match (size, require_imm(ops, op)?) {
                (1, Imm::U8(v)) => buf.push(v),
                (2, Imm::U16(v)) => buf.extend_from_slice(&v.to_le_bytes()),
                (4, Imm::U32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
                (8, Imm::U64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
                _ => return Err("unsigned data offset of exact width expected".to_string()),
            },
        }
    }
    Ok(relocations)
}

impl Isa {
    /// Encode one instruction at the end of `buf`.
    ///
    /// Forms are tried in table order: the first whose operand pattern
    /// matches and whose pipeline emits cleanly wins.  A failed pipeline is
    /// rolled back before the next candidate runs, so `buf` only ever grows
    /// by exactly one instruction.
    ///
    /// Returns the relocations the emission introduced, with offsets
    /// relative to the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMnemonic`] for an unknown mnemonic,
    /// [`Error::NoMatchingForm`] when every form is exhausted.
    pub fn encode(
        &self,
        buf: &mut Vec<u8>,
        mnemonic: &str,
        ops: &[Operand],
    ) -> Result<Vec<Relocation>, Error> {
        let insn = self
            .instruction(mnemonic)
            .ok_or_else(|| Error::UnknownMnemonic {
                mnemonic: mnemonic.into(),
            })?;
        let mut last_fail = String::new();
        'forms: for form in &insn.forms {
            if form.ops.len() != ops.len() {
                continue;
            }
            for (kind, op) in form.ops.iter().zip(ops) {
                if !kind_matches(*kind, op) {
                    continue 'forms;
                }
            }
            let start = buf.len();
            match emit_form(form, buf, ops) {
                Ok(relocations) => return Ok(relocations),
                Err(detail) => {
                    buf.truncate(start);
                    last_fail = detail;
                }
            }
        }
        Err(Error::NoMatchingForm {
            mnemonic: insn.name.clone(),
            detail: last_fail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use crate::reg::Register::*;

    fn encode(mnemonic: &str, ops: &[Operand]) -> Vec<u8> {
        let isa = Isa::load();
        let mut buf = Vec::new();
        isa.encode(&mut buf, mnemonic, ops)
            .unwrap_or_else(|e| panic!("failed to encode {mnemonic}: {e}"));
        buf
    }

    #[test]
    fn imm_picks_smallest_width() {
        assert_eq!(Imm::int(0).unwrap(), Imm::U8(0));
        assert_eq!(Imm::int(255).unwrap(), Imm::U8(255));
        assert_eq!(Imm::int(256).unwrap(), Imm::U16(256));
        assert_eq!(Imm::int(-1).unwrap(), Imm::I8(-1));
        assert_eq!(Imm::int(-129).unwrap(), Imm::I16(-129));
        assert_eq!(Imm::int(1 << 40).unwrap(), Imm::U64(1 << 40));
        assert!(Imm::int(i128::MAX).is_err());
    }

    #[test]
    fn mov_reg_reg() {
        assert_eq!(encode("mov", &[Rax.into(), Rbx.into()]), [0x48, 0x89, 0xD8]);
        assert_eq!(encode("mov", &[Eax.into(), Ebx.into()]), [0x89, 0xD8]);
        assert_eq!(encode("mov", &[Al.into(), Bl.into()]), [0x88, 0xD8]);
        assert_eq!(encode("MOV", &[R15.into(), Rdi.into()]), [0x49, 0x89, 0xFF]);
    }

    #[test]
    fn mov_imm_forms() {
        // 64-bit destination with a small immediate takes C7 /0 id.
        assert_eq!(
            encode("mov", &[Rax.into(), Imm::U8(5).into()]),
            [0x48, 0xC7, 0xC0, 0x05, 0x00, 0x00, 0x00]
        );
        // Full 64-bit immediate falls through to B8+r io.
        assert_eq!(
            encode("mov", &[Rax.into(), Imm::U64(0x1122334455667788).into()]),
            [0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(
            encode("mov", &[Ecx.into(), Imm::U32(0x12345678).into()]),
            [0xB9, 0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(encode("mov", &[Ah.into(), Imm::U8(7).into()]), [0xB4, 0x07]);
    }

    #[test]
    fn mov_memory_disp32() {
        // [rbp-8] always takes a 32-bit displacement.
        assert_eq!(
            encode("mov", &[Rax.into(), Indirect::new(Rbp, -8).into()]),
            [0x48, 0x8B, 0x85, 0xF8, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            encode("mov", &[Indirect::new(Rbp, -8).into(), Rbx.into()]),
            [0x48, 0x89, 0x9D, 0xF8, 0xFF, 0xFF, 0xFF]
        );
        // [rax] needs no displacement.
        assert_eq!(
            encode("mov", &[Rcx.into(), Indirect::new(Rax, 0).into()]),
            [0x48, 0x8B, 0x08]
        );
    }

    #[test]
    fn rbp_and_r13_bases_force_disp32() {
        assert_eq!(
            encode("mov", &[Rax.into(), Indirect::new(Rbp, 0).into()]),
            [0x48, 0x8B, 0x85, 0x00, 0x00, 0x00, 0x00]
        );
        // R13 shares the rm=101 slot; REX.X tracks the memory operand, so
        // W|X|B all set.
        assert_eq!(
            encode("mov", &[Rax.into(), Indirect::new(R13, 0).into()]),
            [0x4B, 0x8B, 0x85, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn rsp_and_r12_bases_emit_sib() {
        assert_eq!(
            encode("mov", &[Rax.into(), Indirect::new(Rsp, 0).into()]),
            [0x48, 0x8B, 0x04, 0x24]
        );
        assert_eq!(
            encode("mov", &[Rax.into(), Indirect::new(Rsp, 8).into()]),
            [0x48, 0x8B, 0x84, 0x24, 0x08, 0x00, 0x00, 0x00]
        );
        // R12 sets REX.B; REX.X stays clear (the absent index reads as RBP).
        assert_eq!(
            encode("mov", &[Rax.into(), Indirect::new(R12, 0).into()]),
            [0x49, 0x8B, 0x04, 0x24]
        );
    }

    #[test]
    fn var_reference_is_rip_relative_with_relocation() {
        let isa = Isa::load();
        let mut buf = Vec::new();
        let relocs = isa
            .encode(&mut buf, "lea", &[Rax.into(), Operand::var("__str0")])
            .unwrap();
        assert_eq!(buf, [0x48, 0x8D, 0x05, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(relocs, vec![Relocation::rel32(3, "__str0")]);
    }

    #[test]
    fn var_relocation_offset_tracks_stream_position() {
        let isa = Isa::load();
        let mut buf = Vec::new();
        isa.encode(&mut buf, "nop", &[]).unwrap();
        isa.encode(&mut buf, "nop", &[]).unwrap();
        let relocs = isa
            .encode(&mut buf, "lea", &[R10.into(), Operand::var("msg")])
            .unwrap();
        // nop nop REX 8D modrm — displacement starts at byte 5.
        assert_eq!(relocs[0].offset, 5);
        assert_eq!(buf[..2], [0x90, 0x90]);
    }

    #[test]
    fn alu_imm8_beats_imm32() {
        assert_eq!(
            encode("cmp", &[Rax.into(), Imm::U8(3).into()]),
            [0x48, 0x83, 0xF8, 0x03]
        );
        assert_eq!(
            encode("cmp", &[Rax.into(), Imm::U32(0x12345678).into()]),
            [0x48, 0x81, 0xF8, 0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(
            encode("sub", &[Rsp.into(), Imm::U32(0).into()]),
            [0x48, 0x81, 0xEC, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode("add", &[Rbx.into(), Rcx.into()]),
            [0x48, 0x01, 0xCB]
        );
    }

    #[test]
    fn push_pop_use_opcode_addend() {
        assert_eq!(encode("push", &[Rbp.into()]), [0x55]);
        assert_eq!(encode("push", &[Rbx.into()]), [0x53]);
        assert_eq!(encode("push", &[R12.into()]), [0x41, 0x54]);
        assert_eq!(encode("pop", &[R15.into()]), [0x41, 0x5F]);
        assert_eq!(encode("pop", &[Rbp.into()]), [0x5D]);
    }

    #[test]
    fn control_flow_encodings() {
        assert_eq!(
            encode("call", &[Imm::I32(0).into()]),
            [0xE8, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode("jmp", &[Imm::I32(-5).into()]),
            [0xE9, 0xFB, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(encode("jmp", &[Imm::I8(-2).into()]), [0xEB, 0xFE]);
        assert_eq!(
            encode("jne", &[Imm::I32(0x10).into()]),
            [0x0F, 0x85, 0x10, 0x00, 0x00, 0x00]
        );
        assert_eq!(encode("ret", &[]), [0xC3]);
    }

    #[test]
    fn assorted_goldens() {
        assert_eq!(encode("syscall", &[]), [0x0F, 0x05]);
        assert_eq!(encode("cqo", &[]), [0x48, 0x99]);
        assert_eq!(encode("inc", &[Rax.into()]), [0x48, 0xFF, 0xC0]);
        assert_eq!(encode("neg", &[Rax.into()]), [0x48, 0xF7, 0xD8]);
        assert_eq!(encode("div", &[Rbx.into()]), [0x48, 0xF7, 0xF3]);
        assert_eq!(
            encode("imul", &[Rax.into(), Rbx.into()]),
            [0x48, 0x0F, 0xAF, 0xC3]
        );
        assert_eq!(
            encode("shl", &[Rax.into(), Imm::U8(4).into()]),
            [0x48, 0xC1, 0xE0, 0x04]
        );
        assert_eq!(
            encode("movzx", &[Eax.into(), Cl.into()]),
            [0x0F, 0xB6, 0xC1]
        );
        assert_eq!(encode("test", &[Rax.into(), Rax.into()]), [0x48, 0x85, 0xC0]);
        assert_eq!(encode("sete", &[Al.into()]), [0x0F, 0x94, 0xC0]);
    }

    #[test]
    fn unknown_mnemonic_and_form_errors() {
        let isa = Isa::load();
        let mut buf = Vec::new();
        assert!(matches!(
            isa.encode(&mut buf, "frob", &[]),
            Err(Error::UnknownMnemonic { .. })
        ));
        // LEA with two registers matches no form.
        let err = isa
            .encode(&mut buf, "lea", &[Operand::Reg(Rax), Operand::Reg(Rbx)])
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingForm { .. }));
        assert!(buf.is_empty(), "failed encodings must not leave bytes");
    }

    #[test]
    fn relocation_apply_math() {
        let mut buf = vec![0u8; 16];
        let rel = Relocation::rel32(4, "target");
        rel.apply(&mut buf, 0x40);
        let got = i32::from_le_bytes(buf[4..8].try_into().unwrap());
        assert_eq!(got, 0x40 - 4 - 4);
    }

    #[test]
    fn relocation_addend_applies() {
        let mut buf = vec![0u8; 8];
        let rel = Relocation {
            offset: 0,
            kind: RelocKind::Rel32,
            symbol: "t".into(),
            addend: 8,
        };
        rel.apply(&mut buf, 0x10);
        let got = i32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(got, 0x10 + 8 - 0 - 4);
    }
}
