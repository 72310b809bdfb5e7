//! Performance benchmarks for `boasm`.
//!
//! Measures:
//! - Single-instruction encode latency
//! - Whole-function build throughput (directives → resolved body)
//! - Link throughput (objects → ELF image)
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use boasm::Register::*;
use boasm::{link_executable, Arg, FunctionBuilder, Imm, Indirect, Isa, OFile};

fn bench_encode(c: &mut Criterion) {
    let isa = Isa::load();
    let mut group = c.benchmark_group("encode");

    group.bench_function("mov_reg_reg", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(16);
            isa.encode(&mut buf, black_box("mov"), &[Rax.into(), Rbx.into()])
                .unwrap();
            buf
        })
    });

    group.bench_function("mov_mem_disp32", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(16);
            isa.encode(
                &mut buf,
                black_box("mov"),
                &[Rax.into(), Indirect::new(Rbp, -0x40).into()],
            )
            .unwrap();
            buf
        })
    });

    group.bench_function("cmp_imm8", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(16);
            isa.encode(
                &mut buf,
                black_box("cmp"),
                &[Rdi.into(), Imm::U8(3).into()],
            )
            .unwrap();
            buf
        })
    });

    group.finish();
}

fn build_function(isa: &Isa) -> boasm::Function {
    let mut f = FunctionBuilder::new(isa, "bench.bas", 1, "start");
    f.prologue().unwrap();
    f.arg_i("n", 0).unwrap();
    f.new_local("acc", 64).unwrap();
    f.instr("mov", &[Arg::local("acc"), Imm::U8(0).into()])
        .unwrap();
    for _ in 0..16 {
        f.instr("mov", &[Rax.into(), Arg::local("n")]).unwrap();
        f.instr("add", &[Rax.into(), Arg::local("acc")]).unwrap();
        f.instr("mov", &[Arg::local("acc"), Rax.into()]).unwrap();
    }
    f.epilogue().unwrap();
    f.instr("ret", &[]).unwrap();
    f.finish().unwrap()
}

fn bench_function_build(c: &mut Criterion) {
    let isa = Isa::load();
    c.bench_function("function_build_50_directives", |b| {
        b.iter(|| build_function(black_box(&isa)))
    });
}

fn bench_link(c: &mut Criterion) {
    let isa = Isa::load();
    let mut o = OFile::new("bench.bo", "bench");
    o.add_function(build_function(&isa)).unwrap();
    c.bench_function("link_single_object", |b| {
        b.iter(|| link_executable(black_box(std::slice::from_ref(&o))).unwrap())
    });
}

fn bench_isa_load(c: &mut Criterion) {
    c.bench_function("isa_load", |b| b.iter(Isa::load));
}

criterion_group!(
    benches,
    bench_encode,
    bench_function_build,
    bench_link,
    bench_isa_load
);
criterion_main!(benches);
