//! End-to-end function-building scenarios: prologue shape, spill/reload
//! discipline around calls and labels, and the LEA-of-a-var decomposition.

use boasm::Register::*;
use boasm::{Arg, FunctionBuilder, Imm, Indirect, Isa};

fn builder<'a>(isa: &'a Isa, name: &str) -> FunctionBuilder<'a> {
    FunctionBuilder::new(isa, "test.bas", 1, name)
}

/// The six-push prologue every function opens with.
const PROLOGUE_HEAD: &[u8] = &[
    0x55, // push rbp
    0x53, // push rbx
    0x41, 0x54, // push r12
    0x41, 0x55, // push r13
    0x41, 0x56, // push r14
    0x41, 0x57, // push r15
    0x48, 0x89, 0xE5, // mov rbp, rsp
    0x48, 0x81, 0xEC, // sub rsp, imm32
];

// ─── Recursive fib ──────────────────────────────────────────────────────

#[test]
fn recursive_fib_prologue_and_relocations() {
    let isa = Isa::load();
    let mut f = builder(&isa, "fib");
    f.prologue().unwrap();
    f.arg_i("n", 0).unwrap();

    f.instr("cmp", &[Arg::local("n"), Imm::U8(3).into()])
        .unwrap();
    f.jump("jl", "base").unwrap();

    f.new_local("acc", 64).unwrap();
    // fib(n - 1)
    f.instr("mov", &[Rdi.into(), Arg::local("n")]).unwrap();
    f.instr("sub", &[Rdi.into(), Imm::U8(1).into()]).unwrap();
    f.jump("call", "fib").unwrap();
    f.instr("mov", &[Arg::local("acc"), Rax.into()]).unwrap();
    // fib(n - 2)
    f.instr("mov", &[Rdi.into(), Arg::local("n")]).unwrap();
    f.instr("sub", &[Rdi.into(), Imm::U8(2).into()]).unwrap();
    f.jump("call", "fib").unwrap();
    f.instr("add", &[Rax.into(), Arg::local("acc")]).unwrap();
    f.epilogue().unwrap();
    f.instr("ret", &[]).unwrap();

    f.label("base").unwrap();
    f.instr("mov", &[Rax.into(), Imm::U8(1).into()]).unwrap();
    f.epilogue().unwrap();
    f.instr("ret", &[]).unwrap();

    let func = f.finish().unwrap();

    // The emitted text begins with the canonical six-push prologue.
    assert_eq!(&func.body[..PROLOGUE_HEAD.len()], PROLOGUE_HEAD);

    // The intra-function `jl base` resolved away; what remains are the two
    // recursive CALL relocations, each right after its E8 byte.
    assert_eq!(func.relocations.len(), 2);
    for rel in &func.relocations {
        assert_eq!(rel.symbol, "fib");
        assert_eq!(func.body[rel.offset as usize - 1], 0xE8);
    }
    let first = func.relocations[0].offset;
    let second = func.relocations[1].offset;
    assert!(first + 4 < second, "calls patch disjoint ranges");
}

// ─── LEA of a var into memory ───────────────────────────────────────────

#[test]
fn lea_var_into_memory_goes_through_scratch() {
    let isa = Isa::load();
    let mut f = builder(&isa, "f");
    f.instr(
        "lea",
        &[Indirect::new(Rbp, -8).into(), Arg::var("__str0")],
    )
    .unwrap();
    let func = f.finish().unwrap();

    // lea r10, [rip+__str0]; mov [rbp-8], r10
    assert_eq!(
        func.body,
        [
            0x4C, 0x8D, 0x15, 0x00, 0x00, 0x00, 0x00, // lea r10, [rip+0]
            0x4C, 0x89, 0x95, 0xF8, 0xFF, 0xFF, 0xFF, // mov [rbp-8], r10
        ]
    );
    assert_eq!(func.relocations.len(), 1);
    assert_eq!(func.relocations[0].symbol, "__str0");
    assert_eq!(func.relocations[0].offset, 3);
}

#[test]
fn lea_scratch_slot_returns_to_free_list() {
    let isa = Isa::load();
    let mut f = builder(&isa, "f");
    f.instr(
        "lea",
        &[Indirect::new(Rbp, -16).into(), Arg::var("msg")],
    )
    .unwrap();
    // The transient __movvar slot (8 bytes at -8) is recycled.
    f.new_local("x", 64).unwrap();
    assert_eq!(f.allocation("x").unwrap().frame_offset(), -8);
}

// ─── Spill across a call ────────────────────────────────────────────────

#[test]
fn call_spills_caller_saved_only() {
    let isa = Isa::load();
    let mut f = builder(&isa, "f");
    f.prologue().unwrap();
    // a lives in callee-saved RBX, b in caller-saved RCX.
    f.arg("a", Rbx).unwrap();
    f.arg("b", Rcx).unwrap();

    let before_call = f.offset() as usize;
    f.jump("call", "foo").unwrap();
    let after_call = f.offset() as usize;

    // b is reloaded on its next register use, a stayed put.
    let reloaded = f.register_for("b").unwrap();
    assert_eq!(reloaded, R10);
    assert_eq!(f.allocation("a").unwrap().register(), Some(Rbx));

    let func = f.finish().unwrap();

    // Between the call directive and the E8: exactly the spill of b to its
    // slot at [rbp-24].
    let spill_b = [0x48, 0x89, 0x8D, 0xE8, 0xFF, 0xFF, 0xFF];
    assert_eq!(&func.body[before_call..before_call + 7], spill_b);
    assert_eq!(func.body[before_call + 7], 0xE8);

    // The reload follows the call.
    let reload_b = [0x4C, 0x8B, 0x95, 0xE8, 0xFF, 0xFF, 0xFF];
    assert_eq!(&func.body[after_call..after_call + 7], reload_b);

    // No spill of a anywhere: mov [rbp-16], rbx never appears.
    let spill_a = [0x48, 0x89, 0x9D, 0xF0, 0xFF, 0xFF, 0xFF];
    assert!(
        !func.body.windows(spill_a.len()).any(|w| w == spill_a),
        "callee-saved a must not be spilled around the call"
    );
}

// ─── Label eviction ─────────────────────────────────────────────────────

#[test]
fn label_evicts_all_registers() {
    let isa = Isa::load();
    let mut f = builder(&isa, "f");
    f.prologue().unwrap();
    f.new_local("x", 64).unwrap();

    // Bring x into a register; nothing to load yet (x has no value in
    // memory), so no bytes are emitted.
    let r = f.register_for("x").unwrap();
    assert_eq!(r, R10);
    let before_label = f.offset() as usize;

    f.label("loop").unwrap();

    // The label spilled x (to [rbp-16]) before recording its offset.
    let spill_x = [0x4C, 0x89, 0x95, 0xF0, 0xFF, 0xFF, 0xFF];
    assert_eq!(
        f.label_offset("loop").unwrap() as usize,
        before_label + spill_x.len()
    );
    assert!(f.allocation("x").unwrap().register().is_none());
    assert!(f.allocation("x").unwrap().in_memory());

    // The next use reloads from the stack slot.
    let after_label = f.offset() as usize;
    f.register_for("x").unwrap();
    let func = f.finish().unwrap();
    assert_eq!(&func.body[before_label..before_label + 7], spill_x);
    let reload_x = [0x4C, 0x8B, 0x95, 0xF0, 0xFF, 0xFF, 0xFF];
    assert_eq!(&func.body[after_label..after_label + 7], reload_x);
}

#[test]
fn unconditional_jump_evicts_all() {
    let isa = Isa::load();
    let mut f = builder(&isa, "f");
    f.prologue().unwrap();
    f.new_local("x", 64).unwrap();
    f.register_for("x").unwrap();

    let before = f.offset() as usize;
    f.jump("jmp", "elsewhere").unwrap();
    // Spill precedes the jump opcode.
    let func_body = f.body().unwrap();
    assert_eq!(
        &func_body[before..before + 7],
        [0x4C, 0x89, 0x95, 0xF0, 0xFF, 0xFF, 0xFF]
    );
    assert_eq!(func_body[before + 7], 0xE9);
}

// ─── Stack arguments ────────────────────────────────────────────────────

#[test]
fn seventh_argument_lands_beyond_saved_frame() {
    let isa = Isa::load();
    let mut f = builder(&isa, "f");
    f.prologue().unwrap();
    for (i, name) in ["a", "b", "c", "d", "e", "g"].iter().enumerate() {
        f.arg_i(name, i as u32).unwrap();
    }
    f.arg_i("h", 6).unwrap();
    // Return address + six saved registers = 56 bytes above RBP.
    assert_eq!(f.allocation("h").unwrap().frame_offset(), 56);
    assert!(f.allocation("h").unwrap().in_memory());
    // Register args took the SysV order.
    assert_eq!(f.allocation("a").unwrap().register(), Some(Rdi));
    assert_eq!(f.allocation("g").unwrap().register(), Some(R9));
}
