//! # boasm — x86-64 assembler back-end and static ELF linker
//!
//! `boasm` turns streams of structured assembly directives into `.bo`
//! object files and links them into ELF-64 executables for the
//! AMD64/System V ABI.
//!
//! The pipeline: a front-end feeds directives to a [`FunctionBuilder`],
//! which drives the table-driven [encoder](crate::encoder) and the
//! per-function [register allocator](crate::arena); finished functions are
//! collected into an [`OFile`]; the [linker](crate::linker) gathers every
//! function reachable from `start`, lays out `.text`/`.data`/`.bss`,
//! patches relocations, and emits the executable.
//!
//! ## Quick Start
//!
//! ```rust
//! use boasm::{FunctionBuilder, Isa, OFile, link_executable};
//!
//! let isa = Isa::load();
//! let mut f = FunctionBuilder::new(&isa, "demo.bas", 1, "start");
//! f.prologue()?;
//! f.epilogue()?;
//! f.instr("ret", &[])?;
//!
//! let mut object = OFile::new("demo.bo", "demo");
//! object.add_function(f.finish()?)?;
//!
//! let elf = link_executable(&[object])?;
//! assert_eq!(&elf[..4], b"\x7FELF");
//! # Ok::<(), boasm::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Table-driven encoder** — the ISA is a declarative description
//!   compiled once into byte-emitter pipelines (REX, ModR/M, SIB,
//!   displacements, immediates).
//! - **Per-function register allocation** — named locals move between
//!   registers and stable frame slots with LRU eviction and System V
//!   caller/callee-saved discipline.
//! - **Relocations as first-class values** — symbolic references recorded
//!   at encode time flow through object files into the linker's patch
//!   pass.
//! - **`no_std` + `alloc`** — the core has no platform dependencies; file
//!   I/O helpers sit behind the default `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ────────────────────────────────────────────────
// An assembler is wall-to-wall narrowing casts and dense hex literals;
// the lints below are expected and acceptable in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::uninlined_format_args,
    clippy::too_many_lines,
    clippy::return_self_not_must_use
)]

extern crate alloc;

/// Per-function allocation arena: named values, frame slots, LRU.
pub mod arena;
/// ELF-64 executable emission.
pub mod elf;
/// Instruction encoding: operands, relocations, form selection.
pub mod encoder;
/// Error types.
pub mod error;
/// Function building: directives in, body + relocations out.
pub mod function;
/// The declarative x86-64 instruction table.
pub mod isa;
/// Static linking and image layout.
pub mod linker;
/// `.bo` object files and their serialization.
pub mod object;
/// Register pool with System V register classes.
pub mod pool;
/// The general-purpose register set.
pub mod reg;

// Re-exports
pub use arena::{AllocArena, Allocation, Loc};
pub use elf::{write_elf, Section, SectionSymbol, SymKind};
pub use encoder::{Imm, Indirect, Operand, RelocKind, Relocation};
pub use error::Error;
pub use function::{Arg, Function, FunctionBuilder, Symbol};
pub use isa::{Emitter, Field, Form, Instruction, Isa, OpKind};
pub use linker::{link, link_executable, LinkedImage, ENTRY_ADDR};
pub use object::{OFile, TypeDescr, Var};
pub use pool::{RegisterPool, ARG_REGISTERS, CALLEE_SAVED, CALLER_SAVED};
pub use reg::Register;
