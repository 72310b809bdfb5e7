//! Declarative x86-64 instruction table.
//!
//! Each mnemonic carries an ordered list of forms; each form pairs an
//! operand-type pattern with the byte-emitter pipeline that encodes it.
//! [`Isa::load`] compiles the description once into the lookup structure the
//! encoder dispatches over — regular families (ALU, conditional jumps,
//! SETcc, the `F7` unary group) are expanded programmatically, irregular
//! instructions are written out by hand.
//!
//! The pipeline vocabulary follows the x86-64 encoding model: optional
//! legacy prefixes, an optional REX byte, one or more opcode bytes
//! (optionally carrying a register in the low three bits), a ModR/M byte
//! with its SIB/displacement machinery, and trailing immediate or
//! code-offset bytes.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

// ─── Form vocabulary ────────────────────────────────────────────────────

/// Operand type pattern for one position of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// 8-bit immediate (`u8` or `i8`).
    Imm8,
    /// Up-to-16-bit immediate.
    Imm16,
    /// Up-to-32-bit immediate.
    Imm32,
    /// Up-to-64-bit immediate.
    Imm64,
    /// 8-bit register.
    R8,
    /// 16-bit register.
    R16,
    /// 32-bit register.
    R32,
    /// 64-bit register.
    R64,
    /// Memory operand of unspecified width (also matches a var reference).
    M,
    /// 8-bit memory operand.
    M8,
    /// 16-bit memory operand.
    M16,
    /// 32-bit memory operand.
    M32,
    /// 64-bit memory operand.
    M64,
    /// 32-bit absolute memory offset (legacy accumulator forms).
    Moffs32,
    /// 64-bit absolute memory offset (legacy accumulator forms).
    Moffs64,
    /// 8-bit signed code-relative displacement.
    Rel8,
    /// 32-bit signed code-relative displacement.
    Rel32,
}

/// A ModR/M field that is either a literal value from the form description
/// or resolved from the operand at the given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Fixed field value (e.g. mode `0b11`, or a `/digit` reg field).
    Lit(u8),
    /// Field resolved from operand `#n`.
    Op(u8),
}

/// One step of a form's byte-emitter pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitter {
    /// A fixed legacy-prefix byte (`0x66` operand-size override, …).
    Prefix(u8),
    /// The REX byte `0100WRXB`.  Omitted unless mandatory, `W` is set, or
    /// any of the referenced operands resolve to an extended register.
    /// `r`/`x`/`b` name operand positions; `x` reads the memory operand for
    /// the SIB index extension.
    Rex {
        /// Emit even when no bit is set.
        mandatory: bool,
        /// 64-bit operand size.
        w: bool,
        /// Operand position supplying the ModR/M reg extension.
        r: Option<u8>,
        /// Operand position supplying the SIB index extension.
        x: Option<u8>,
        /// Operand position supplying the ModR/M rm / opcode-reg extension.
        b: Option<u8>,
    },
    /// An opcode byte, optionally adding the low three bits of the register
    /// operand at position `addend`.
    Opcode {
        /// Base opcode byte.
        byte: u8,
        /// Operand position whose register is added into the low bits.
        addend: Option<u8>,
    },
    /// The ModR/M byte plus any SIB byte and displacement it implies.
    ModRm {
        /// Addressing mode: literal, or derived from the memory operand.
        mode: Field,
        /// The reg field: a `/digit` literal or a register operand.
        reg: Field,
        /// Operand position supplying the rm register when no memory
        /// operand drives the byte.
        rm: u8,
    },
    /// `size`-byte little-endian immediate from operand `op`, widening
    /// smaller integers (sign-extending signed, zero-extending unsigned).
    Imm {
        /// Width in bytes (1, 2, 4, or 8).
        size: u8,
        /// Operand position.
        op: u8,
    },
    /// `size`-byte signed code-relative displacement from operand `op`.
    /// No widening: the operand must be exactly this width.
    CodeOffset {
        /// Width in bytes.
        size: u8,
        /// Operand position.
        op: u8,
    },
    /// `size`-byte unsigned absolute data offset from operand `op`.
    /// No widening.
    DataOffset {
        /// Width in bytes.
        size: u8,
        /// Operand position.
        op: u8,
    },
}

/// One operand-type combination of an instruction, with its emitter
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    /// Explicit operand pattern, in Intel (destination-first) order.
    pub ops: Vec<OpKind>,
    /// The ordered byte-emitter pipeline.
    pub enc: Vec<Emitter>,
}

/// A mnemonic with all its encodable forms, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Lowercase mnemonic.
    pub name: String,
    /// One-line description.
    pub summary: String,
    /// Candidate forms, in selection order.
    pub forms: Vec<Form>,
}

/// The loaded instruction set.  Immutable after [`load`](Isa::load); shared
/// by every function built against it.
#[derive(Debug, Clone)]
pub struct Isa {
    name: &'static str,
    instrs: BTreeMap<String, Instruction>,
}

// ─── Table construction ─────────────────────────────────────────────────

use Emitter::{CodeOffset, DataOffset, Imm, ModRm, Opcode, Prefix};
use Field::{Lit, Op};
use OpKind::*;

/// REX with the given W bit and operand references (not mandatory).
const fn rex(w: bool, r: Option<u8>, x: Option<u8>, b: Option<u8>) -> Emitter {
    Emitter::Rex {
        mandatory: false,
        w,
        r,
        x,
        b,
    }
}

/// The always-emitted `REX.W` byte (sign-extension idioms like CQO).
const REX_W: Emitter = Emitter::Rex {
    mandatory: true,
    w: true,
    r: None,
    x: None,
    b: None,
};

fn form(ops: &[OpKind], enc: &[Emitter]) -> Form {
    Form {
        ops: ops.to_vec(),
        enc: enc.to_vec(),
    }
}

struct TableBuilder {
    instrs: BTreeMap<String, Instruction>,
}

impl TableBuilder {
    fn insn(&mut self, name: &str, summary: &str, forms: Vec<Form>) {
        self.instrs.insert(
            name.to_string(),
            Instruction {
                name: name.to_string(),
                summary: summary.to_string(),
                forms,
            },
        );
    }

    /// The classic two-opcode ALU family (`ADD`, `SUB`, `CMP`, …):
    /// `op_mr` is the `r/m, r` opcode, `op_rm` the `r, r/m` opcode, and
    /// `digit` the `/n` reg field of the `0x80/0x81/0x83` immediate group.
    fn alu(&mut self, name: &str, summary: &str, op_mr: u8, op_rm: u8, digit: u8) {
        self.insn(
            name,
            summary,
            vec![
                // Sign-extended imm8 group first: shortest encoding wins.
                form(
                    &[R64, Imm8],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0x83,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 1, op: 1 },
                    ],
                ),
                form(
                    &[R32, Imm8],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0x83,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 1, op: 1 },
                    ],
                ),
                form(
                    &[R64, Imm32],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0x81,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                form(
                    &[R32, Imm32],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0x81,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                form(
                    &[R64, R64],
                    &[
                        rex(true, Some(1), None, Some(0)),
                        Opcode {
                            byte: op_mr,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R32, R32],
                    &[
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: op_mr,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R64, M64],
                    &[
                        rex(true, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: op_rm,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[M64, R64],
                    &[
                        rex(true, Some(1), Some(0), Some(0)),
                        Opcode {
                            byte: op_mr,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[M64, Imm32],
                    &[
                        rex(true, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0x81,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
            ],
        );
    }

    /// Conditional jump pair: `0x70+cc` rel8 and `0x0F 0x80+cc` rel32.
    fn jcc(&mut self, names: &[&str], summary: &str, cc: u8) {
        for name in names {
            self.insn(
                name,
                summary,
                vec![
                    form(
                        &[Rel8],
                        &[
                            Opcode {
                                byte: 0x70 + cc,
                                addend: None,
                            },
                            CodeOffset { size: 1, op: 0 },
                        ],
                    ),
                    form(
                        &[Rel32],
                        &[
                            Opcode {
                                byte: 0x0F,
                                addend: None,
                            },
                            Opcode {
                                byte: 0x80 + cc,
                                addend: None,
                            },
                            CodeOffset { size: 4, op: 0 },
                        ],
                    ),
                ],
            );
        }
    }

    /// SETcc on an 8-bit register or memory byte: `0x0F 0x90+cc /0`.
    fn setcc(&mut self, names: &[&str], summary: &str, cc: u8) {
        for name in names {
            self.insn(
                name,
                summary,
                vec![
                    form(
                        &[R8],
                        &[
                            rex(false, None, None, Some(0)),
                            Opcode {
                                byte: 0x0F,
                                addend: None,
                            },
                            Opcode {
                                byte: 0x90 + cc,
                                addend: None,
                            },
                            ModRm {
                                mode: Lit(0b11),
                                reg: Lit(0),
                                rm: 0,
                            },
                        ],
                    ),
                    form(
                        &[M8],
                        &[
                            rex(false, None, Some(0), Some(0)),
                            Opcode {
                                byte: 0x0F,
                                addend: None,
                            },
                            Opcode {
                                byte: 0x90 + cc,
                                addend: None,
                            },
                            ModRm {
                                mode: Op(0),
                                reg: Lit(0),
                                rm: 0,
                            },
                        ],
                    ),
                ],
            );
        }
    }

    /// The `F7 /digit` unary group (`NEG`, `NOT`, `MUL`, `DIV`, …).
    fn unary_f7(&mut self, name: &str, summary: &str, digit: u8) {
        self.insn(
            name,
            summary,
            vec![
                form(
                    &[R64],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0xF7,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R32],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xF7,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[M64],
                    &[
                        rex(true, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xF7,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(digit),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );
    }

    /// Shift by immediate: `C1 /digit ib`.
    fn shift(&mut self, name: &str, summary: &str, digit: u8) {
        self.insn(
            name,
            summary,
            vec![
                form(
                    &[R64, Imm8],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0xC1,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 1, op: 1 },
                    ],
                ),
                form(
                    &[R32, Imm8],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xC1,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(digit),
                            rm: 0,
                        },
                        Imm { size: 1, op: 1 },
                    ],
                ),
            ],
        );
    }

    /// Zero/sign extension: `0F B6/B7` (MOVZX) or `0F BE/BF` (MOVSX).
    fn extend(&mut self, name: &str, summary: &str, op8: u8, op16: u8) {
        let wide = |w: bool, src: OpKind, op: u8| {
            form(
                &[if w { R64 } else { R32 }, src],
                &[
                    rex(w, Some(0), None, Some(1)),
                    Opcode {
                        byte: 0x0F,
                        addend: None,
                    },
                    Opcode {
                        byte: op,
                        addend: None,
                    },
                    ModRm {
                        mode: Lit(0b11),
                        reg: Op(0),
                        rm: 1,
                    },
                ],
            )
        };
        self.insn(
            name,
            summary,
            vec![
                wide(false, R8, op8),
                wide(true, R8, op8),
                wide(false, R16, op16),
                wide(true, R16, op16),
            ],
        );
    }
}

impl Isa {
    /// Load and compile the embedded x86-64 instruction description.
    #[must_use]
    pub fn load() -> Isa {
        let mut t = TableBuilder {
            instrs: BTreeMap::new(),
        };

        // ── MOV ───────────────────────────────────────────────────────
        t.insn(
            "mov",
            "Move",
            vec![
                form(
                    &[R8, R8],
                    &[
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x88,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R16, R16],
                    &[
                        Prefix(0x66),
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x89,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R32, R32],
                    &[
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x89,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R64, R64],
                    &[
                        rex(true, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x89,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R8, M8],
                    &[
                        rex(false, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x8A,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[R16, M16],
                    &[
                        Prefix(0x66),
                        rex(false, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x8B,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[R32, M32],
                    &[
                        rex(false, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x8B,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[R64, M64],
                    &[
                        rex(true, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x8B,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[M8, R8],
                    &[
                        rex(false, Some(1), Some(0), Some(0)),
                        Opcode {
                            byte: 0x88,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[M16, R16],
                    &[
                        Prefix(0x66),
                        rex(false, Some(1), Some(0), Some(0)),
                        Opcode {
                            byte: 0x89,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[M32, R32],
                    &[
                        rex(false, Some(1), Some(0), Some(0)),
                        Opcode {
                            byte: 0x89,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[M64, R64],
                    &[
                        rex(true, Some(1), Some(0), Some(0)),
                        Opcode {
                            byte: 0x89,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R8, Imm8],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xB0,
                            addend: Some(0),
                        },
                        Imm { size: 1, op: 1 },
                    ],
                ),
                form(
                    &[R16, Imm16],
                    &[
                        Prefix(0x66),
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xB8,
                            addend: Some(0),
                        },
                        Imm { size: 2, op: 1 },
                    ],
                ),
                form(
                    &[R32, Imm32],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xB8,
                            addend: Some(0),
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                form(
                    &[R64, Imm32],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0xC7,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                form(
                    &[R64, Imm64],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0xB8,
                            addend: Some(0),
                        },
                        Imm { size: 8, op: 1 },
                    ],
                ),
                form(
                    &[M8, Imm8],
                    &[
                        rex(false, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xC6,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 1, op: 1 },
                    ],
                ),
                form(
                    &[M16, Imm16],
                    &[
                        Prefix(0x66),
                        rex(false, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xC7,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 2, op: 1 },
                    ],
                ),
                form(
                    &[M32, Imm32],
                    &[
                        rex(false, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xC7,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                form(
                    &[M64, Imm32],
                    &[
                        rex(true, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xC7,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                // Legacy absolute accumulator forms.  Their data-offset
                // stage only accepts a plain integer, so they fall through
                // for every operand the builder can produce; kept for
                // completeness of the description.
                form(
                    &[R64, Moffs64],
                    &[
                        rex(true, None, None, None),
                        Opcode {
                            byte: 0xA1,
                            addend: None,
                        },
                        DataOffset { size: 8, op: 1 },
                    ],
                ),
                form(
                    &[Moffs64, R64],
                    &[
                        rex(true, None, None, None),
                        Opcode {
                            byte: 0xA3,
                            addend: None,
                        },
                        DataOffset { size: 8, op: 0 },
                    ],
                ),
            ],
        );

        // ── LEA ───────────────────────────────────────────────────────
        t.insn(
            "lea",
            "Load effective address",
            vec![
                form(
                    &[R64, M],
                    &[
                        rex(true, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x8D,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[R32, M],
                    &[
                        rex(false, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x8D,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
            ],
        );

        // ── ALU families ──────────────────────────────────────────────
        t.alu("add", "Add", 0x01, 0x03, 0);
        t.alu("or", "Logical inclusive or", 0x09, 0x0B, 1);
        t.alu("adc", "Add with carry", 0x11, 0x13, 2);
        t.alu("sbb", "Subtract with borrow", 0x19, 0x1B, 3);
        t.alu("and", "Logical and", 0x21, 0x23, 4);
        t.alu("sub", "Subtract", 0x29, 0x2B, 5);
        t.alu("xor", "Logical exclusive or", 0x31, 0x33, 6);
        t.alu("cmp", "Compare", 0x39, 0x3B, 7);

        // ── TEST ──────────────────────────────────────────────────────
        t.insn(
            "test",
            "Logical compare",
            vec![
                form(
                    &[R8, R8],
                    &[
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x84,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R32, R32],
                    &[
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x85,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R64, R64],
                    &[
                        rex(true, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x85,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R64, Imm32],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0xF7,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
                form(
                    &[R32, Imm32],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xF7,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(0),
                            rm: 0,
                        },
                        Imm { size: 4, op: 1 },
                    ],
                ),
            ],
        );

        // ── XCHG ──────────────────────────────────────────────────────
        t.insn(
            "xchg",
            "Exchange",
            vec![
                form(
                    &[R64, R64],
                    &[
                        rex(true, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x87,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[R32, R32],
                    &[
                        rex(false, Some(1), None, Some(0)),
                        Opcode {
                            byte: 0x87,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(1),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );

        // ── INC / DEC ─────────────────────────────────────────────────
        for (name, summary, digit) in [("inc", "Increment", 0u8), ("dec", "Decrement", 1u8)] {
            t.insn(
                name,
                summary,
                vec![
                    form(
                        &[R64],
                        &[
                            rex(true, None, None, Some(0)),
                            Opcode {
                                byte: 0xFF,
                                addend: None,
                            },
                            ModRm {
                                mode: Lit(0b11),
                                reg: Lit(digit),
                                rm: 0,
                            },
                        ],
                    ),
                    form(
                        &[R32],
                        &[
                            rex(false, None, None, Some(0)),
                            Opcode {
                                byte: 0xFF,
                                addend: None,
                            },
                            ModRm {
                                mode: Lit(0b11),
                                reg: Lit(digit),
                                rm: 0,
                            },
                        ],
                    ),
                    form(
                        &[M64],
                        &[
                            rex(true, None, Some(0), Some(0)),
                            Opcode {
                                byte: 0xFF,
                                addend: None,
                            },
                            ModRm {
                                mode: Op(0),
                                reg: Lit(digit),
                                rm: 0,
                            },
                        ],
                    ),
                ],
            );
        }

        // ── F7 unary group ────────────────────────────────────────────
        t.unary_f7("not", "One's complement negation", 2);
        t.unary_f7("neg", "Two's complement negation", 3);
        t.unary_f7("mul", "Unsigned multiply", 4);
        t.unary_f7("div", "Unsigned divide", 6);
        t.unary_f7("idiv", "Signed divide", 7);

        // ── IMUL (two-operand) ────────────────────────────────────────
        t.insn(
            "imul",
            "Signed multiply",
            vec![
                form(
                    &[R64, R64],
                    &[
                        rex(true, Some(0), None, Some(1)),
                        Opcode {
                            byte: 0x0F,
                            addend: None,
                        },
                        Opcode {
                            byte: 0xAF,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[R32, R32],
                    &[
                        rex(false, Some(0), None, Some(1)),
                        Opcode {
                            byte: 0x0F,
                            addend: None,
                        },
                        Opcode {
                            byte: 0xAF,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                form(
                    &[R64, M64],
                    &[
                        rex(true, Some(0), Some(1), Some(1)),
                        Opcode {
                            byte: 0x0F,
                            addend: None,
                        },
                        Opcode {
                            byte: 0xAF,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(1),
                            reg: Op(0),
                            rm: 1,
                        },
                    ],
                ),
                // One-operand RDX:RAX form.
                form(
                    &[R64],
                    &[
                        rex(true, None, None, Some(0)),
                        Opcode {
                            byte: 0xF7,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(5),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );

        // ── Shifts ────────────────────────────────────────────────────
        t.shift("shl", "Shift left", 4);
        t.shift("shr", "Logical shift right", 5);
        t.shift("sar", "Arithmetic shift right", 7);

        // ── MOVZX / MOVSX ─────────────────────────────────────────────
        t.extend("movzx", "Move with zero extension", 0xB6, 0xB7);
        t.extend("movsx", "Move with sign extension", 0xBE, 0xBF);
        t.insn(
            "movsxd",
            "Move doubleword with sign extension",
            vec![form(
                &[R64, R32],
                &[
                    rex(true, Some(0), None, Some(1)),
                    Opcode {
                        byte: 0x63,
                        addend: None,
                    },
                    ModRm {
                        mode: Lit(0b11),
                        reg: Op(0),
                        rm: 1,
                    },
                ],
            )],
        );

        // ── PUSH / POP ────────────────────────────────────────────────
        t.insn(
            "push",
            "Push onto the stack",
            vec![
                form(
                    &[R64],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0x50,
                            addend: Some(0),
                        },
                    ],
                ),
                form(
                    &[Imm8],
                    &[
                        Opcode {
                            byte: 0x6A,
                            addend: None,
                        },
                        Imm { size: 1, op: 0 },
                    ],
                ),
                form(
                    &[Imm32],
                    &[
                        Opcode {
                            byte: 0x68,
                            addend: None,
                        },
                        Imm { size: 4, op: 0 },
                    ],
                ),
                form(
                    &[M64],
                    &[
                        rex(false, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xFF,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(6),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );
        t.insn(
            "pop",
            "Pop off the stack",
            vec![
                form(
                    &[R64],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0x58,
                            addend: Some(0),
                        },
                    ],
                ),
                form(
                    &[M64],
                    &[
                        rex(false, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0x8F,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(0),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );

        // ── Control flow ──────────────────────────────────────────────
        t.insn(
            "call",
            "Call procedure",
            vec![
                form(
                    &[Rel32],
                    &[
                        Opcode {
                            byte: 0xE8,
                            addend: None,
                        },
                        CodeOffset { size: 4, op: 0 },
                    ],
                ),
                form(
                    &[R64],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xFF,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(2),
                            rm: 0,
                        },
                    ],
                ),
                form(
                    &[M64],
                    &[
                        rex(false, None, Some(0), Some(0)),
                        Opcode {
                            byte: 0xFF,
                            addend: None,
                        },
                        ModRm {
                            mode: Op(0),
                            reg: Lit(2),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );
        t.insn(
            "jmp",
            "Jump",
            vec![
                form(
                    &[Rel8],
                    &[
                        Opcode {
                            byte: 0xEB,
                            addend: None,
                        },
                        CodeOffset { size: 1, op: 0 },
                    ],
                ),
                form(
                    &[Rel32],
                    &[
                        Opcode {
                            byte: 0xE9,
                            addend: None,
                        },
                        CodeOffset { size: 4, op: 0 },
                    ],
                ),
                form(
                    &[R64],
                    &[
                        rex(false, None, None, Some(0)),
                        Opcode {
                            byte: 0xFF,
                            addend: None,
                        },
                        ModRm {
                            mode: Lit(0b11),
                            reg: Lit(4),
                            rm: 0,
                        },
                    ],
                ),
            ],
        );
        t.insn(
            "ret",
            "Return from procedure",
            vec![
                form(
                    &[],
                    &[Opcode {
                        byte: 0xC3,
                        addend: None,
                    }],
                ),
                form(
                    &[Imm16],
                    &[
                        Opcode {
                            byte: 0xC2,
                            addend: None,
                        },
                        Imm { size: 2, op: 0 },
                    ],
                ),
            ],
        );

        t.jcc(&["jo"], "Jump if overflow", 0x0);
        t.jcc(&["jno"], "Jump if not overflow", 0x1);
        t.jcc(&["jb", "jc", "jnae"], "Jump if below", 0x2);
        t.jcc(&["jae", "jnc", "jnb"], "Jump if above or equal", 0x3);
        t.jcc(&["je", "jz"], "Jump if equal", 0x4);
        t.jcc(&["jne", "jnz"], "Jump if not equal", 0x5);
        t.jcc(&["jbe", "jna"], "Jump if below or equal", 0x6);
        t.jcc(&["ja", "jnbe"], "Jump if above", 0x7);
        t.jcc(&["js"], "Jump if sign", 0x8);
        t.jcc(&["jns"], "Jump if not sign", 0x9);
        t.jcc(&["jp", "jpe"], "Jump if parity", 0xA);
        t.jcc(&["jnp", "jpo"], "Jump if not parity", 0xB);
        t.jcc(&["jl", "jnge"], "Jump if less", 0xC);
        t.jcc(&["jge", "jnl"], "Jump if greater or equal", 0xD);
        t.jcc(&["jle", "jng"], "Jump if less or equal", 0xE);
        t.jcc(&["jg", "jnle"], "Jump if greater", 0xF);

        t.setcc(&["seto"], "Set byte if overflow", 0x0);
        t.setcc(&["setno"], "Set byte if not overflow", 0x1);
        t.setcc(&["setb", "setc"], "Set byte if below", 0x2);
        t.setcc(&["setae", "setnc"], "Set byte if above or equal", 0x3);
        t.setcc(&["sete", "setz"], "Set byte if equal", 0x4);
        t.setcc(&["setne", "setnz"], "Set byte if not equal", 0x5);
        t.setcc(&["setbe"], "Set byte if below or equal", 0x6);
        t.setcc(&["seta"], "Set byte if above", 0x7);
        t.setcc(&["sets"], "Set byte if sign", 0x8);
        t.setcc(&["setns"], "Set byte if not sign", 0x9);
        t.setcc(&["setl"], "Set byte if less", 0xC);
        t.setcc(&["setge"], "Set byte if greater or equal", 0xD);
        t.setcc(&["setle"], "Set byte if less or equal", 0xE);
        t.setcc(&["setg"], "Set byte if greater", 0xF);

        // ── Fixed encodings ───────────────────────────────────────────
        for (name, summary, bytes) in [
            ("nop", "No operation", &[0x90u8][..]),
            ("int3", "Breakpoint trap", &[0xCC][..]),
            ("leave", "High-level procedure exit", &[0xC9][..]),
            ("syscall", "Fast system call", &[0x0F, 0x05][..]),
            ("cdq", "Sign-extend EAX into EDX:EAX", &[0x99][..]),
        ] {
            let enc: Vec<Emitter> = bytes
                .iter()
                .map(|&b| Opcode {
                    byte: b,
                    addend: None,
                })
                .collect();
            t.insn(name, summary, vec![Form {
                ops: Vec::new(),
                enc,
            }]);
        }
        t.insn(
            "cqo",
            "Sign-extend RAX into RDX:RAX",
            vec![form(
                &[],
                &[
                    REX_W,
                    Opcode {
                        byte: 0x99,
                        addend: None,
                    },
                ],
            )],
        );

        Isa {
            name: "x86_64",
            instrs: t.instrs,
        }
    }

    /// The architecture name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Look up a mnemonic, case-insensitively.
    #[must_use]
    pub fn instruction(&self, mnemonic: &str) -> Option<&Instruction> {
        let lower: String = mnemonic.to_ascii_lowercase();
        self.instrs.get(&lower)
    }

    /// Number of mnemonics in the table.
    #[must_use]
    pub fn mnemonic_count(&self) -> usize {
        self.instrs.len()
    }

    /// Iterate all instructions in mnemonic order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instrs.values()
    }
}
