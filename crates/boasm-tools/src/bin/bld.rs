//! `bld` — link `.bo` object files into an ELF-64 executable.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use boasm::{link_executable, OFile};

#[derive(Parser)]
#[command(
    name = "bld",
    about = "Link .bo object files into an ELF-64 executable",
    version
)]
struct Cli {
    /// Write the linked executable to this file.
    #[arg(short = 'o', long = "output", default_value = "b.out")]
    output: PathBuf,

    /// Object files to link; exactly one must define `start`.
    #[arg(value_name = "OBJECT", required = true)]
    inputs: Vec<PathBuf>,
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut objects: Vec<OFile> = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let path = path.to_string_lossy();
        let o = OFile::load(&path).map_err(|e| format!("failed to read object file {path}: {e}"))?;
        log::debug!(
            "read {} (package {}, {} functions)",
            path,
            o.package,
            o.functions.len()
        );
        objects.push(o);
    }

    let elf = link_executable(&objects).map_err(|e| e.to_string())?;
    log::info!("linked {} object(s), {} bytes", objects.len(), elf.len());

    let out = cli.output.to_string_lossy();
    std::fs::write(&cli.output, &elf).map_err(|e| format!("failed to write {out}: {e}"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&cli.output, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| format!("failed to mark {out} executable: {e}"))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("bld: {msg}");
            ExitCode::FAILURE
        }
    }
}
