//! The x86-64 general-purpose register set.
//!
//! Every variant knows its 4-bit ModR/M encoding index (low three bits plus
//! the REX extension bit), its width, and the 64-bit register that contains
//! it.  The legacy high-byte registers (AH/BH/CH/DH) are modeled as
//! "brothers" of the corresponding low-byte registers: both halves can be
//! live inside one 64-bit container at the same time, while any wider use
//! excludes them both.

use core::fmt;

use crate::error::Error;

/// An x86-64 general-purpose register (plus RIP for RIP-relative addressing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Register {
    /// Low byte of RAX.
    Al,
    /// High byte of AX.
    Ah,
    /// 16-bit accumulator.
    Ax,
    /// 32-bit accumulator.
    Eax,
    /// 64-bit accumulator.
    Rax,
    /// Low byte of RBX.
    Bl,
    /// High byte of BX.
    Bh,
    /// 16-bit base.
    Bx,
    /// 32-bit base.
    Ebx,
    /// 64-bit base.
    Rbx,
    /// Low byte of RCX.
    Cl,
    /// High byte of CX.
    Ch,
    /// 16-bit counter.
    Cx,
    /// 32-bit counter.
    Ecx,
    /// 64-bit counter.
    Rcx,
    /// Low byte of RDX.
    Dl,
    /// High byte of DX.
    Dh,
    /// 16-bit data.
    Dx,
    /// 32-bit data.
    Edx,
    /// 64-bit data.
    Rdx,
    /// 16-bit stack pointer.
    Sp,
    /// 32-bit stack pointer.
    Esp,
    /// 64-bit stack pointer.
    Rsp,
    /// 16-bit frame pointer.
    Bp,
    /// 32-bit frame pointer.
    Ebp,
    /// 64-bit frame pointer.
    Rbp,
    /// 16-bit source index.
    Si,
    /// 32-bit source index.
    Esi,
    /// 64-bit source index.
    Rsi,
    /// 16-bit destination index.
    Di,
    /// 32-bit destination index.
    Edi,
    /// 64-bit destination index.
    Rdi,
    /// Extended 64-bit register (requires REX).
    R8,
    /// Extended 64-bit register (requires REX).
    R9,
    /// Extended 64-bit register (requires REX).
    R10,
    /// Extended 64-bit register (requires REX).
    R11,
    /// Extended 64-bit register (requires REX).
    R12,
    /// Extended 64-bit register (requires REX).
    R13,
    /// Extended 64-bit register (requires REX).
    R14,
    /// Extended 64-bit register (requires REX).
    R15,
    /// Instruction pointer — only valid as the base of a memory operand,
    /// where it selects RIP-relative addressing.
    Rip,
}

use Register::*;

impl Register {
    /// The 4-bit register index: low three bits for the ModR/M field, high
    /// bit for the matching REX extension.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Al | Ax | Eax | Rax => 0b000,
            Cl | Cx | Ecx | Rcx => 0b001,
            Dl | Dx | Edx | Rdx => 0b010,
            Bl | Bx | Ebx | Rbx => 0b011,
            Ah | Sp | Esp | Rsp => 0b100,
            Ch | Bp | Ebp | Rbp | Rip => 0b101,
            Dh | Si | Esi | Rsi => 0b110,
            Bh | Di | Edi | Rdi => 0b111,
            R8 => 0b1000,
            R9 => 0b1001,
            R10 => 0b1010,
            R11 => 0b1011,
            R12 => 0b1100,
            R13 => 0b1101,
            R14 => 0b1110,
            R15 => 0b1111,
        }
    }

    /// Register width in bits.
    #[must_use]
    pub fn size_bits(self) -> u16 {
        match self {
            Al | Ah | Bl | Bh | Cl | Ch | Dl | Dh => 8,
            Ax | Bx | Cx | Dx | Sp | Bp | Si | Di => 16,
            Eax | Ebx | Ecx | Edx | Esp | Ebp | Esi | Edi => 32,
            Rax | Rbx | Rcx | Rdx | Rsp | Rbp | Rsi | Rdi | Rip => 64,
            R8 | R9 | R10 | R11 | R12 | R13 | R14 | R15 => 64,
        }
    }

    /// The enclosing 64-bit register.
    #[must_use]
    pub fn full(self) -> Register {
        match self {
            Al | Ah | Ax | Eax | Rax => Rax,
            Bl | Bh | Bx | Ebx | Rbx => Rbx,
            Cl | Ch | Cx | Ecx | Rcx => Rcx,
            Dl | Dh | Dx | Edx | Rdx => Rdx,
            Sp | Esp | Rsp => Rsp,
            Bp | Ebp | Rbp => Rbp,
            Si | Esi | Rsi => Rsi,
            Di | Edi | Rdi => Rdi,
            R8 => R8,
            R9 => R9,
            R10 => R10,
            R11 => R11,
            R12 => R12,
            R13 => R13,
            R14 => R14,
            R15 => R15,
            Rip => Rip,
        }
    }

    /// The other 8-bit register sharing this register's 64-bit container
    /// (AL↔AH, BL↔BH, CL↔CH, DL↔DH).  `None` for anything wider.
    #[must_use]
    pub fn brother8(self) -> Option<Register> {
        match self {
            Al => Some(Ah),
            Ah => Some(Al),
            Bl => Some(Bh),
            Bh => Some(Bl),
            Cl => Some(Ch),
            Ch => Some(Cl),
            Dl => Some(Dh),
            Dh => Some(Dl),
            _ => None,
        }
    }

    /// Both 8-bit sub-registers of a 64-bit container, when it has them.
    #[must_use]
    pub fn sub_registers8(self) -> Option<[Register; 2]> {
        match self.full() {
            Rax => Some([Al, Ah]),
            Rbx => Some([Bl, Bh]),
            Rcx => Some([Cl, Ch]),
            Rdx => Some([Dl, Dh]),
            _ => None,
        }
    }

    /// The sub-register of the given width inside this 64-bit register.
    ///
    /// Only meaningful on 64-bit registers.  8-bit requests return `None`
    /// because the choice between the two brothers is ambiguous; R8–R15
    /// only exist at 64 bits here.
    #[must_use]
    pub fn partial(self, bits: u16) -> Option<Register> {
        let narrow = |r16: Register, r32: Register, r64: Register| match bits {
            16 => Some(r16),
            32 => Some(r32),
            64 => Some(r64),
            _ => None,
        };
        match self {
            Rax => narrow(Ax, Eax, Rax),
            Rbx => narrow(Bx, Ebx, Rbx),
            Rcx => narrow(Cx, Ecx, Rcx),
            Rdx => narrow(Dx, Edx, Rdx),
            Rsp => narrow(Sp, Esp, Rsp),
            Rbp => narrow(Bp, Ebp, Rbp),
            Rsi => narrow(Si, Esi, Rsi),
            Rdi => narrow(Di, Edi, Rdi),
            R8 | R9 | R10 | R11 | R12 | R13 | R14 | R15 => {
                if bits == 64 {
                    Some(self)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Whether using this register forces a REX prefix (R8–R15).
    #[must_use]
    pub fn needs_rex(self) -> bool {
        matches!(self, R8 | R9 | R10 | R11 | R12 | R13 | R14 | R15)
    }

    /// Parse a canonical register name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRegister`] for unrecognized spellings.
    pub fn parse(name: &str) -> Result<Register, Error> {
        let mut upper = [0u8; 3];
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > 3 {
            return Err(Error::UnknownRegister { name: name.into() });
        }
        for (i, b) in bytes.iter().enumerate() {
            upper[i] = b.to_ascii_uppercase();
        }
        let reg = match &upper[..bytes.len()] {
            b"AL" => Al,
            b"AH" => Ah,
            b"AX" => Ax,
            b"EAX" => Eax,
            b"RAX" => Rax,
            b"BL" => Bl,
            b"BH" => Bh,
            b"BX" => Bx,
            b"EBX" => Ebx,
            b"RBX" => Rbx,
            b"CL" => Cl,
            b"CH" => Ch,
            b"CX" => Cx,
            b"ECX" => Ecx,
            b"RCX" => Rcx,
            b"DL" => Dl,
            b"DH" => Dh,
            b"DX" => Dx,
            b"EDX" => Edx,
            b"RDX" => Rdx,
            b"SP" => Sp,
            b"ESP" => Esp,
            b"RSP" => Rsp,
            b"BP" => Bp,
            b"EBP" => Ebp,
            b"RBP" => Rbp,
            b"SI" => Si,
            b"ESI" => Esi,
            b"RSI" => Rsi,
            b"DI" => Di,
            b"EDI" => Edi,
            b"RDI" => Rdi,
            b"R8" => R8,
            b"R9" => R9,
            b"R10" => R10,
            b"R11" => R11,
            b"R12" => R12,
            b"R13" => R13,
            b"R14" => R14,
            b"R15" => R15,
            b"RIP" => Rip,
            _ => return Err(Error::UnknownRegister { name: name.into() }),
        };
        Ok(reg)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Al => "al",
            Ah => "ah",
            Ax => "ax",
            Eax => "eax",
            Rax => "rax",
            Bl => "bl",
            Bh => "bh",
            Bx => "bx",
            Ebx => "ebx",
            Rbx => "rbx",
            Cl => "cl",
            Ch => "ch",
            Cx => "cx",
            Ecx => "ecx",
            Rcx => "rcx",
            Dl => "dl",
            Dh => "dh",
            Dx => "dx",
            Edx => "edx",
            Rdx => "rdx",
            Sp => "sp",
            Esp => "esp",
            Rsp => "rsp",
            Bp => "bp",
            Ebp => "ebp",
            Rbp => "rbp",
            Si => "si",
            Esi => "esi",
            Rsi => "rsi",
            Di => "di",
            Edi => "edi",
            Rdi => "rdi",
            R8 => "r8",
            R9 => "r9",
            R10 => "r10",
            R11 => "r11",
            R12 => "r12",
            R13 => "r13",
            R14 => "r14",
            R15 => "r15",
            Rip => "rip",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn codes_cover_modrm_indices() {
        assert_eq!(Rax.code(), 0);
        assert_eq!(Rcx.code(), 1);
        assert_eq!(Rdx.code(), 2);
        assert_eq!(Rbx.code(), 3);
        assert_eq!(Rsp.code(), 4);
        assert_eq!(Rbp.code(), 5);
        assert_eq!(Rsi.code(), 6);
        assert_eq!(Rdi.code(), 7);
        assert_eq!(R8.code(), 8);
        assert_eq!(R15.code(), 15);
    }

    #[test]
    fn high_byte_codes() {
        // AH/CH/DH/BH occupy the 4..=7 slots of the byte-register file.
        assert_eq!(Ah.code(), 0b100);
        assert_eq!(Ch.code(), 0b101);
        assert_eq!(Dh.code(), 0b110);
        assert_eq!(Bh.code(), 0b111);
    }

    #[test]
    fn widths() {
        assert_eq!(Al.size_bits(), 8);
        assert_eq!(Ax.size_bits(), 16);
        assert_eq!(Eax.size_bits(), 32);
        assert_eq!(Rax.size_bits(), 64);
        assert_eq!(R13.size_bits(), 64);
    }

    #[test]
    fn full_register_family() {
        for r in [Al, Ah, Ax, Eax, Rax] {
            assert_eq!(r.full(), Rax);
        }
        assert_eq!(Di.full(), Rdi);
        assert_eq!(R12.full(), R12);
    }

    #[test]
    fn brothers_pair_up() {
        assert_eq!(Al.brother8(), Some(Ah));
        assert_eq!(Ah.brother8(), Some(Al));
        assert_eq!(Dh.brother8(), Some(Dl));
        assert_eq!(Rax.brother8(), None);
        assert_eq!(Si.brother8(), None);
    }

    #[test]
    fn partial_narrowing() {
        assert_eq!(Rax.partial(16), Some(Ax));
        assert_eq!(Rax.partial(32), Some(Eax));
        assert_eq!(Rax.partial(64), Some(Rax));
        assert_eq!(Rax.partial(8), None);
        assert_eq!(R9.partial(32), None);
        assert_eq!(R9.partial(64), Some(R9));
    }

    #[test]
    fn rex_requirement() {
        assert!(R8.needs_rex());
        assert!(R15.needs_rex());
        assert!(!Rax.needs_rex());
        assert!(!Ah.needs_rex());
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(Register::parse("rax").unwrap(), Rax);
        assert_eq!(Register::parse("RAX").unwrap(), Rax);
        assert_eq!(Register::parse("r13").unwrap(), R13);
        assert_eq!(Register::parse("Ah").unwrap(), Ah);
        assert!(Register::parse("xmm0").is_err());
        assert!(Register::parse("").is_err());
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(format!("{}", Rdi), "rdi");
        assert_eq!(format!("{}", R10), "r10");
    }
}
