//! `bdump` — pretty-print the contents of `.bo` object files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use boasm::OFile;

#[derive(Parser)]
#[command(name = "bdump", about = "Dump the contents of .bo object files", version)]
struct Cli {
    /// Object files to dump.
    #[arg(value_name = "OBJECT", required = true)]
    inputs: Vec<PathBuf>,
}

fn dump(o: &OFile) {
    println!("Read from {}", o.filename);
    println!("\tPackage: {}", o.package);
    println!("\tFormat: {}", o.target_format);

    println!("\tTypes:");
    for t in o.types.values() {
        println!("\t\t{}", t.name);
        for p in &t.properties {
            println!("\t\t\t{p}");
        }
        if !t.description.is_empty() {
            println!("\t\t\tdescription: {:02X?}", t.description);
        }
    }

    println!("\tData:");
    for v in o.data.values() {
        println!("\t\t{} :: {} = {:02X?}", v.name, v.vtype, v.value);
    }
    println!("\tVars:");
    for v in o.vars.values() {
        println!("\t\t{} :: {} = {:02X?}", v.name, v.vtype, v.value);
    }

    println!("\tFunctions:");
    for f in o.functions.values() {
        println!("\t\t{}", f.name);
        if !f.type_sig.is_empty() {
            println!("\t\t\ttype: {}", f.type_sig);
        }
        println!("\t\t\tsource: {}:{}", f.src_file, f.src_line);
        if !f.args.is_empty() {
            println!("\t\t\targs:");
            for a in &f.args {
                println!("\t\t\t\t{} :: {}", a.name, a.vtype);
            }
        }
        if !f.symbols.is_empty() {
            println!("\t\t\tsymbols:");
            for s in &f.symbols {
                println!("\t\t\t\t{} @ {:#x}", s.name, s.offset);
            }
        }
        if !f.relocations.is_empty() {
            println!("\t\t\trelocations:");
            for r in &f.relocations {
                println!("\t\t\t\t{:#06x} -> {} ({:?}+{})", r.offset, r.symbol, r.kind, r.addend);
            }
        }
        print!("\t\t\tbody ({} bytes):", f.body.len());
        for (i, b) in f.body.iter().enumerate() {
            if i % 16 == 0 {
                print!("\n\t\t\t\t");
            }
            print!("{b:02X} ");
        }
        println!();
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let mut status = ExitCode::SUCCESS;
    for path in &cli.inputs {
        let path = path.to_string_lossy();
        match OFile::load(&path) {
            Ok(o) => dump(&o),
            Err(e) => {
                eprintln!("bdump: failed to read object file {path}: {e}");
                status = ExitCode::FAILURE;
            }
        }
    }
    status
}
