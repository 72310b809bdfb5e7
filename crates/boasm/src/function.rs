//! Function building: a stream of directives drives the encoder and the
//! allocation arena, accumulating encoded bytes, intra-function jumps, and
//! inter-object relocations.
//!
//! The builder owns the per-function register pool and arena; the shared
//! [`Isa`] table is borrowed.  Every spill and reload is an ordinary MOV/LEA
//! emitted through the same encoder as user instructions.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::mem;

use crate::arena::{AllocArena, Loc};
use crate::encoder::{Imm, Indirect, Operand, Relocation};
use crate::error::Error;
use crate::isa::Isa;
use crate::object::Var;
use crate::pool::{RegisterPool, ARG_REGISTERS, CALLER_SAVED};
use crate::reg::Register;

/// Bytes between the established RBP and the last stack-passed argument:
/// the six callee-saved pushes of the prologue.
const BASE_POINTER_OFF: i32 = 6 * 8;

/// An additional exported location within a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// Symbol name.
    pub name: String,
    /// Byte offset within the function body.
    pub offset: u32,
}

/// A finished function: the resolved body plus everything the object file
/// carries about it.  Intra-function jumps are already patched; the
/// relocation list holds only inter-object references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    /// Function name (unique within the package).
    pub name: String,
    /// Opaque type signature, interpreted by front-ends.
    pub type_sig: String,
    /// Source file the function came from.
    pub src_file: String,
    /// Source line the function came from.
    pub src_line: u64,
    /// Argument metadata.
    pub args: Vec<Var>,
    /// Extra exported locations.
    pub symbols: Vec<Symbol>,
    /// Unresolved references into other functions, vars, and data.
    pub relocations: Vec<Relocation>,
    /// Encoded machine code.
    pub body: Vec<u8>,
}

/// A builder-level operand: anything the encoder accepts, plus named
/// locals/arguments owned by the function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A register.
    Reg(Register),
    /// An immediate.
    Imm(Imm),
    /// A memory operand.
    Mem(Indirect),
    /// A package-level var or data symbol.
    Var(String),
    /// A local or argument of this function, by name.  Lowered to its
    /// current register when live, its frame slot otherwise.
    Local(String),
}

impl From<Register> for Arg {
    fn from(r: Register) -> Self {
        Arg::Reg(r)
    }
}

impl From<Imm> for Arg {
    fn from(i: Imm) -> Self {
        Arg::Imm(i)
    }
}

impl From<Indirect> for Arg {
    fn from(m: Indirect) -> Self {
        Arg::Mem(m)
    }
}

impl Arg {
    /// Reference a local or argument by name.
    #[must_use]
    pub fn local(name: &str) -> Arg {
        Arg::Local(name.into())
    }

    /// Reference a package-level var or data symbol.
    #[must_use]
    pub fn var(name: &str) -> Arg {
        Arg::Var(name.into())
    }
}

/// Builds one function from a stream of directives.
///
/// Encoding errors accumulate and surface at [`body`](Self::body) /
/// [`finish`](Self::finish), so a front-end can feed the whole directive
/// stream without checking every call.
#[derive(Debug)]
pub struct FunctionBuilder<'a> {
    isa: &'a Isa,
    name: String,
    type_sig: String,
    src_file: String,
    src_line: u64,
    args_meta: Vec<Var>,
    symbols: Vec<Symbol>,
    relocations: Vec<Relocation>,
    buf: Vec<u8>,
    labels: BTreeMap<String, u32>,
    jumps: Vec<Relocation>,
    errors: Vec<Error>,
    locals_patch: Option<usize>,
    resolved: bool,
    pool: RegisterPool,
    arena: AllocArena,
}

impl<'a> FunctionBuilder<'a> {
    /// Start building a function.
    #[must_use]
    pub fn new(isa: &'a Isa, src_file: &str, src_line: u64, name: &str) -> Self {
        Self {
            isa,
            name: name.into(),
            type_sig: String::new(),
            src_file: src_file.into(),
            src_line,
            args_meta: Vec::new(),
            symbols: Vec::new(),
            relocations: Vec::new(),
            buf: Vec::new(),
            labels: BTreeMap::new(),
            jumps: Vec::new(),
            errors: Vec::new(),
            locals_patch: None,
            resolved: false,
            pool: RegisterPool::new(),
            arena: AllocArena::new(),
        }
    }

    /// Record the function's type signature.
    pub fn set_type_sig(&mut self, sig: &str) {
        self.type_sig = sig.into();
    }

    /// Append argument metadata (name and type, as the front-end declares
    /// them).
    pub fn declare_arg(&mut self, arg: Var) {
        self.args_meta.push(arg);
    }

    /// Current body offset, in bytes.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Offset of a defined label, if any.
    #[must_use]
    pub fn label_offset(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }

    // ── Register pool pass-throughs ─────────────────────────────────────

    /// Reserve a specific register against the allocator.
    pub fn use_reg(&mut self, r: Register) -> bool {
        self.pool.reserve(r)
    }

    /// Return a [`use_reg`](Self::use_reg)d or acquired register.
    pub fn release_reg(&mut self, r: Register) {
        self.pool.release(r)
    }

    /// Reserve any free register of the given width.
    pub fn get_reg(&mut self, bits: u16) -> Option<Register> {
        self.pool.get(bits)
    }

    // ── Allocation directives ───────────────────────────────────────────

    /// Declare a register-loadable local of `bits` size.
    pub fn new_local(&mut self, name: &str, bits: u32) -> Result<(), Error> {
        self.arena.new_local(name, bits)
    }

    /// Declare a raw stack buffer of `size` bytes.
    pub fn alloc_bytes(&mut self, name: &str, size: u32) -> Result<(), Error> {
        self.arena.alloc_bytes(name, size)
    }

    /// Bind `name` to an argument arriving in `reg`.
    pub fn arg(&mut self, name: &str, reg: Register) -> Result<(), Error> {
        self.arena.bind_arg(name, reg)?;
        self.pool.reserve(reg);
        Ok(())
    }

    /// Bind `name` to integer argument `i` per the System V convention:
    /// RDI, RSI, RDX, RCX, R8, R9, then the stack.
    pub fn arg_i(&mut self, name: &str, i: u32) -> Result<(), Error> {
        match ARG_REGISTERS.get(i as usize) {
            Some(&reg) => self.arg(name, reg),
            None => self.stack_arg(name, i - ARG_REGISTERS.len() as u32),
        }
    }

    /// Bind `name` to the `stacki`-th stack-passed argument.
    pub fn stack_arg(&mut self, name: &str, stacki: u32) -> Result<(), Error> {
        self.arena.stack_arg(name, stacki, BASE_POINTER_OFF)
    }

    /// Drop a local, returning its frame slot and any register it held.
    pub fn forget(&mut self, name: &str) -> Result<(), Error> {
        if let Some(reg) = self.arena.forget(name)? {
            self.pool.release(reg);
        }
        Ok(())
    }

    /// Look up an allocation.
    #[must_use]
    pub fn allocation(&self, name: &str) -> Option<&crate::arena::Allocation> {
        self.arena.get(name)
    }

    // ── Emission helpers ────────────────────────────────────────────────

    /// Encode and record errors/relocations; used for compiler-introduced
    /// instructions (spills, reloads, prologue) and plain user operands.
    fn encode_raw(&mut self, mnemonic: &str, ops: &[Operand]) -> Result<(), Error> {
        match self.isa.encode(&mut self.buf, mnemonic, ops) {
            Ok(relocations) => {
                self.relocations.extend(relocations);
                Ok(())
            }
            Err(e) => {
                self.errors.push(e.clone());
                Err(e)
            }
        }
    }

    /// Store the named allocation back to its frame slot and free its
    /// register.  No-op when it is not register-resident.
    fn spill(&mut self, name: &str) -> Result<(), Error> {
        let Some(alloc) = self.arena.get(name) else {
            return Err(Error::UnknownAllocation { name: name.into() });
        };
        let (current, regable, slot) = (alloc.register(), alloc.fits_in_register(), alloc.slot());
        let Some(reg) = current else {
            return Ok(());
        };
        if regable {
            self.encode_raw("mov", &[slot.into(), reg.into()])?;
            self.arena.note_evicted(name, true);
        } else {
            // A buffer's register only held its address; nothing to store.
            self.arena.note_evicted(name, false);
        }
        self.pool.release(reg);
        Ok(())
    }

    /// Bring the named allocation into a register, evicting the
    /// least-recently-used holder if the pool is dry.  Reloads from the
    /// frame slot when the value lives in memory.
    pub fn register_for(&mut self, name: &str) -> Result<Register, Error> {
        let Some(alloc) = self.arena.get(name) else {
            let e = Error::UnknownAllocation { name: name.into() };
            self.errors.push(e.clone());
            return Err(e);
        };
        let current = alloc.register();
        let regable = alloc.fits_in_register();
        let in_mem = alloc.in_memory();
        let slot = alloc.slot();
        let want = alloc.reg_size();
        if let Some(reg) = current {
            self.arena.touch(reg.full());
            return Ok(reg);
        }

        let reg = loop {
            if let Some(reg) = self.pool.get(want) {
                // One allocation per 64-bit container: displace a resident
                // brother before adopting the register.
                if let Some(holder) = self.arena.occupant(reg.full()).map(ToString::to_string) {
                    self.spill(&holder)?;
                }
                break reg;
            }
            let Some(victim) = self.arena.victim() else {
                let e = Error::RegisterExhausted { width: want };
                self.errors.push(e.clone());
                return Err(e);
            };
            let holder = self
                .arena
                .occupant(victim)
                .map(ToString::to_string)
                .expect("LRU entries always have an occupant");
            self.spill(&holder)?;
        };

        if !regable {
            // Buffers load their address.
            self.encode_raw(
                "lea",
                &[reg.into(), Indirect::new(Register::Rbp, slot.off).into()],
            )?;
        } else if in_mem {
            self.encode_raw("mov", &[reg.into(), slot.into()])?;
        }
        self.arena.note_loaded(name, reg);
        Ok(reg)
    }

    /// Spill whatever allocation holds `r` (or any alias of it).  Manually
    /// reserved registers are left alone.
    pub fn evict(&mut self, r: Register) {
        for conflict in self.pool.conflicts(r) {
            if let Some(holder) = self
                .arena
                .occupant(conflict.full())
                .map(ToString::to_string)
            {
                let _ = self.spill(&holder);
            }
        }
    }

    /// Spill every register-resident allocation.  Control-flow joins cannot
    /// assume any particular register state.
    pub fn evict_all(&mut self) {
        for full in self.arena.resident() {
            if let Some(holder) = self.arena.occupant(full).map(ToString::to_string) {
                let _ = self.spill(&holder);
            }
        }
    }

    /// Spill the caller-saved registers; callee-saved contents survive a
    /// call by ABI.
    pub fn evict_for_call(&mut self) {
        for &r in CALLER_SAVED {
            self.evict(r);
        }
    }

    /// Evict any occupant of `r` and reserve it for scratch use.  Must be
    /// paired with [`release_reg`](Self::release_reg).
    pub fn acquire(&mut self, r: Register) -> Result<(), Error> {
        for conflict in self.pool.conflicts(r) {
            match self
                .arena
                .occupant(conflict.full())
                .map(ToString::to_string)
            {
                Some(holder) => self.spill(&holder)?,
                None => {
                    return Err(Error::RegisterBusy {
                        register: r.to_string(),
                    })
                }
            }
        }
        if !self.pool.reserve(r) {
            return Err(Error::RegisterBusy {
                register: r.to_string(),
            });
        }
        Ok(())
    }

    /// Rebind `name` to `reg` immediately, adopting whatever value the
    /// register holds.  Any other allocation in `reg` is evicted first.
    fn takeover(&mut self, name: &str, reg: Register) -> Result<(), Error> {
        if self.arena.get(name).is_none() {
            return Err(Error::UnknownAllocation { name: name.into() });
        }
        if let Some(old) = self.arena.get(name).and_then(|a| a.register()) {
            // The value is about to be overwritten; drop the old binding
            // without a store.
            self.arena.note_evicted(name, false);
            self.pool.release(old);
        }
        if let Some(holder) = self.arena.occupant(reg.full()).map(ToString::to_string) {
            self.spill(&holder)?;
        }
        self.pool.reserve(reg);
        self.arena.note_loaded(name, reg);
        Ok(())
    }

    // ── Structural directives ───────────────────────────────────────────

    /// Emit the function prologue: reserve the implicit `__retvalue` slot,
    /// save the callee-saved registers, establish RBP, and leave a patch
    /// site for the frame size.
    pub fn prologue(&mut self) -> Result<(), Error> {
        self.new_local("__retvalue", 64)?;
        self.pool.reserve(Register::Rbp);
        self.pool.reserve(Register::Rsp);
        for r in [
            Register::Rbp,
            Register::Rbx,
            Register::R12,
            Register::R13,
            Register::R14,
            Register::R15,
        ] {
            self.encode_raw("push", &[r.into()])?;
        }
        self.encode_raw("mov", &[Register::Rbp.into(), Register::Rsp.into()])?;
        self.encode_raw("sub", &[Register::Rsp.into(), Imm::U32(0).into()])?;
        self.locals_patch = Some(self.buf.len() - 4);
        Ok(())
    }

    /// Emit the epilogue: patch the prologue's frame reservation and
    /// restore the saved registers in reverse.
    pub fn epilogue(&mut self) -> Result<(), Error> {
        if let Some(at) = self.locals_patch {
            let size = self.arena.frame_size();
            self.buf[at..at + 4].copy_from_slice(&size.to_le_bytes());
        }
        self.pool.release(Register::Rbp);
        self.pool.release(Register::Rsp);
        self.encode_raw("mov", &[Register::Rsp.into(), Register::Rbp.into()])?;
        for r in [
            Register::R15,
            Register::R14,
            Register::R13,
            Register::R12,
            Register::Rbx,
            Register::Rbp,
        ] {
            self.encode_raw("pop", &[r.into()])?;
        }
        Ok(())
    }

    /// Define a label at the current offset.  Labels are branch targets, so
    /// every live register is spilled first.
    pub fn label(&mut self, name: &str) -> Result<(), Error> {
        self.evict_all();
        if self.labels.contains_key(name) {
            let e = Error::DuplicateLabel {
                label: name.into(),
            };
            self.errors.push(e.clone());
            return Err(e);
        }
        self.labels.insert(name.into(), self.buf.len() as u32);
        Ok(())
    }

    /// Export the current offset under `name` in the object file's symbol
    /// list.
    pub fn symbol(&mut self, name: &str) {
        self.symbols.push(Symbol {
            name: name.into(),
            offset: self.buf.len() as u32,
        });
    }

    /// Emit a jump-family instruction (`jmp`, `jne`, `call`, …) to a label
    /// or function name, recording the patch site.
    ///
    /// `call` spills only the caller-saved registers and rebinds
    /// `__retvalue` to RAX; everything else is a control-flow join and
    /// spills all.
    pub fn jump(&mut self, mnemonic: &str, target: &str) -> Result<(), Error> {
        if mnemonic.eq_ignore_ascii_case("call") {
            self.evict_for_call();
            // Absent __retvalue (no prologue yet) is tolerated.
            let _ = self.takeover("__retvalue", Register::Rax);
        } else {
            self.evict_all();
        }
        self.encode_raw(mnemonic, &[Imm::I32(0).into()])?;
        self.jumps
            .push(Relocation::rel32(self.buf.len() as u32 - 4, target));
        Ok(())
    }

    /// Encode one instruction.  Allocation operands lower to their current
    /// location; when no form takes the memory operand, the allocation is
    /// forced into a register and encoding retries.
    pub fn instr(&mut self, mnemonic: &str, args: &[Arg]) -> Result<(), Error> {
        // `lea mem, var` cannot encode (there is no LEA m64, imm64); route
        // the address through a scratch register.
        if mnemonic.eq_ignore_ascii_case("lea") && args.len() == 2 {
            if let (Arg::Mem(dst), Arg::Var(var)) = (&args[0], &args[1]) {
                let dst = *dst;
                let var = var.clone();
                return self.lea_var_into_mem(dst, &var);
            }
        }

        let mut ops = Vec::with_capacity(args.len());
        for arg in args {
            ops.push(self.lower(arg)?);
        }
        loop {
            let attempt = self.isa.encode(&mut self.buf, mnemonic, &ops);
            match attempt {
                Ok(relocations) => {
                    self.relocations.extend(relocations);
                    return Ok(());
                }
                Err(e) => {
                    let mut promoted = false;
                    for (i, arg) in args.iter().enumerate() {
                        if let (Operand::Mem(_), Arg::Local(name)) = (&ops[i], arg) {
                            let reg = self.register_for(name)?;
                            ops[i] = Operand::Reg(reg);
                            promoted = true;
                            break;
                        }
                    }
                    if !promoted {
                        self.errors.push(e.clone());
                        return Err(e);
                    }
                }
            }
        }
    }

    fn lower(&mut self, arg: &Arg) -> Result<Operand, Error> {
        match arg {
            Arg::Reg(r) => Ok((*r).into()),
            Arg::Imm(i) => Ok((*i).into()),
            Arg::Mem(m) => Ok((*m).into()),
            Arg::Var(name) => Ok(Operand::Var(name.clone())),
            Arg::Local(name) => {
                let regable = match self.arena.get(name) {
                    Some(alloc) => alloc.fits_in_register(),
                    None => {
                        let e = Error::UnknownAllocation { name: name.into() };
                        self.errors.push(e.clone());
                        return Err(e);
                    }
                };
                if !regable {
                    return Ok(self.register_for(name)?.into());
                }
                match self
                    .arena
                    .location(name)
                    .expect("allocation existence checked above")
                {
                    Loc::Reg(r) => Ok(r.into()),
                    Loc::Mem(m) => Ok(m.into()),
                }
            }
        }
    }

    fn lea_var_into_mem(&mut self, dst: Indirect, var: &str) -> Result<(), Error> {
        self.arena.new_local("__movvar", 64)?;
        let scratch = self.register_for("__movvar")?;
        let first = self.encode_raw("lea", &[scratch.into(), Operand::Var(var.into())]);
        let second = self.encode_raw("mov", &[dst.into(), scratch.into()]);
        self.forget("__movvar")?;
        first.and(second)
    }

    // ── Realization ─────────────────────────────────────────────────────

    /// Fold intra-function jumps into the body.  Jumps to labels this
    /// function never defined are promoted to inter-object relocations.
    /// Idempotent; must come after the last directive.
    pub fn resolve(&mut self) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        let jumps = mem::take(&mut self.jumps);
        for rel in jumps {
            match self.labels.get(&rel.symbol) {
                Some(&label_off) => rel.apply(&mut self.buf, label_off as i32),
                None => self.relocations.push(rel),
            }
        }
    }

    /// Resolve and return the body bytes, or the accumulated errors.
    pub fn body(&mut self) -> Result<&[u8], Error> {
        self.resolve();
        if !self.errors.is_empty() {
            return Err(Error::from_list(self.errors.clone()));
        }
        Ok(&self.buf)
    }

    /// Resolve and convert into the serializable [`Function`] record.
    pub fn finish(mut self) -> Result<Function, Error> {
        self.resolve();
        if !self.errors.is_empty() {
            return Err(Error::from_list(self.errors));
        }
        Ok(Function {
            name: self.name,
            type_sig: self.type_sig,
            src_file: self.src_file,
            src_line: self.src_line,
            args: self.args_meta,
            symbols: self.symbols,
            relocations: self.relocations,
            body: self.buf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::Register::*;

    fn builder(isa: &Isa) -> FunctionBuilder<'_> {
        FunctionBuilder::new(isa, "test.bas", 1, "f")
    }

    #[test]
    fn forward_jump_resolves_to_zero_displacement() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.jump("jmp", "end").unwrap();
        f.label("end").unwrap();
        let body = f.body().unwrap();
        assert_eq!(body, [0xE9, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn backward_jump_gets_negative_displacement() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.label("top").unwrap();
        f.instr("nop", &[]).unwrap();
        f.jump("jmp", "top").unwrap();
        let body = f.body().unwrap();
        // nop; jmp -6 (back over the nop and the jump itself).
        assert_eq!(body, [0x90, 0xE9, 0xFA, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn unknown_label_becomes_relocation() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.jump("call", "helper").unwrap();
        let func = f.finish().unwrap();
        assert_eq!(func.body, [0xE8, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(func.relocations, [Relocation::rel32(1, "helper")]);
    }

    #[test]
    fn duplicate_label_is_recorded_and_fatal() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.label("x").unwrap();
        assert!(f.label("x").is_err());
        assert!(f.body().is_err());
    }

    #[test]
    fn resolve_is_idempotent() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.jump("jmp", "end").unwrap();
        f.label("end").unwrap();
        f.resolve();
        f.resolve();
        assert_eq!(f.body().unwrap(), [0xE9, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn prologue_shape() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.prologue().unwrap();
        assert_eq!(
            f.body().unwrap(),
            [
                0x55, // push rbp
                0x53, // push rbx
                0x41, 0x54, // push r12
                0x41, 0x55, // push r13
                0x41, 0x56, // push r14
                0x41, 0x57, // push r15
                0x48, 0x89, 0xE5, // mov rbp, rsp
                0x48, 0x81, 0xEC, 0x00, 0x00, 0x00, 0x00, // sub rsp, imm32
            ]
        );
    }

    #[test]
    fn epilogue_patches_frame_size() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.prologue().unwrap();
        f.new_local("a", 64).unwrap();
        f.new_local("b", 64).unwrap();
        f.epilogue().unwrap();
        let body = f.body().unwrap().to_vec();
        // __retvalue + a + b = 24 bytes, patched into the prologue's SUB.
        let imm = u32::from_le_bytes(body[16..20].try_into().unwrap());
        assert_eq!(imm, 24);
        // Tail: mov rsp, rbp; pop r15..rbp.
        assert_eq!(
            &body[20..],
            [0x48, 0x89, 0xEC, 0x41, 0x5F, 0x41, 0x5E, 0x41, 0x5D, 0x41, 0x5C, 0x5B, 0x5D]
        );
    }

    #[test]
    fn locals_lower_to_frame_slots() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.prologue().unwrap();
        f.new_local("x", 64).unwrap();
        let start = f.offset() as usize;
        // mov x, 7 writes straight through to the slot.
        f.instr("mov", &[Arg::local("x"), Imm::U8(7).into()]).unwrap();
        let body = f.body().unwrap();
        // x sits at [rbp-16] (__retvalue owns -8).
        assert_eq!(
            &body[start..],
            [0x48, 0xC7, 0x85, 0xF0, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn call_binds_retvalue_to_rax() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        f.prologue().unwrap();
        f.jump("call", "g").unwrap();
        let alloc = f.allocation("__retvalue").unwrap();
        assert_eq!(alloc.register(), Some(Rax));
        // The return value is immediately usable by name.
        let r = f.register_for("__retvalue").unwrap();
        assert_eq!(r, Rax);
    }

    #[test]
    fn acquire_rejects_manually_used_register() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        assert!(f.use_reg(Rcx));
        assert!(matches!(
            f.acquire(Rcx),
            Err(Error::RegisterBusy { .. })
        ));
        f.release_reg(Rcx);
        f.acquire(Rcx).unwrap();
    }

    #[test]
    fn register_exhaustion_reports() {
        let isa = Isa::load();
        let mut f = builder(&isa);
        // Drain the whole 64-bit file manually; nothing is evictable
        // because no allocation holds the registers.
        while f.get_reg(64).is_some() {}
        f.new_local("x", 64).unwrap();
        assert!(matches!(
            f.register_for("x"),
            Err(Error::RegisterExhausted { width: 64 })
        ));
    }
}
