//! `bci run [-d] <file>` executes a bytecode image; `bci dis <file>`
//! disassembles one. Usage and fatal diagnostics both go to stdout, per the
//! interpreter's process-fatal error model: there's nothing left to recover
//! once something prints here, so stderr buys nothing.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

const USAGE: &str = "usage: bci run [-d] <file>\n       bci dis <file>\n";

#[derive(Parser)]
#[command(name = "bci", disable_help_subcommand = true)]
struct Cli {
  #[command(subcommand)]
  cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
  /// Execute a bytecode image.
  Run {
    #[arg(short = 'd')]
    trace: bool,
    file: PathBuf,
  },
  /// Disassemble a bytecode image.
  Dis { file: PathBuf },
}

fn main() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(_) => {
      print!("{USAGE}");
      return ExitCode::FAILURE;
    }
  };
  let Some(cmd) = cli.cmd else {
    print!("{USAGE}");
    return ExitCode::FAILURE;
  };
  match dispatch(cmd) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      // FatalError already wrote its diagnostic to the machine's output.
      if !matches!(e.downcast_ref::<bci_vm::Error>(), Some(bci_vm::Error::FatalError)) {
        println!("{e}");
      }
      ExitCode::FAILURE
    }
  }
}

fn dispatch(cmd: Cmd) -> anyhow::Result<()> {
  match cmd {
    Cmd::Run { trace, file } => {
      let image = load(&file)?;
      let mut machine = bci_vm::Machine::new(image);
      machine.set_trace(trace);
      machine.run()?;
    }
    Cmd::Dis { file } => {
      let image = load(&file)?;
      print!("{}", bci_op::disassemble(&image)?);
    }
  }
  Ok(())
}

fn load(path: &Path) -> anyhow::Result<bci_image::Image> {
  let bytes = std::fs::read(path)?;
  Ok(bci_image::Image::new(bytes))
}
