//! `bpf-sim`: run a seccomp BPF filter file against a synthetic syscall and print the verdict.
//!
//! This is the only place that prints a result or picks the process exit code:
//!
//!   success       -> disposition on stdout, exit 0
//!   usage error   -> message on stderr,     exit EINVAL
//!   fault         -> `FAULT` on stderr,     exit EFAULT
//!   program error -> `ERROR` on stderr,     exit ENOEXEC

use std::process;

use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use bpf_sim::cli::Invocation;
use bpf_sim::{simulate, Action, Program, SimError};

/// `RUST_LOG` wins; otherwise `-v` turns on debug output.
fn setup_tracing(verbose: bool) {
  let default_level = match verbose {
    true  => "debug",
    false => "warn"
  };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_level));
  let fmt_layer = fmt::layer()
    .with_target(false)
    .with_writer(std::io::stderr);
  let sub = Registry::default()
    .with(filter)
    .with(fmt_layer);
  if set_global_default(sub).is_err() {
    eprintln!("Failed to set tracing subscriber");
  }
}

fn run(invocation: &Invocation) -> Result<Action, SimError> {
  let program = Program::load_file(&invocation.file)?;
  tracing::debug!("Program:\n{}", program);
  tracing::debug!("Syscall record: {}", invocation.record);

  simulate(&program, &invocation.record, &invocation.config)
}

fn main() {
  let invocation = match Invocation::parse_from(std::env::args_os()) {
    Ok(invocation) => invocation,
    Err(e) => {
      eprintln!("{}", e.report(false));
      process::exit(e.exit_code());
    }
  };

  setup_tracing(invocation.config.verbose);

  match run(&invocation) {
    Ok(action) => {
      println!("{}", action);
    }
    Err(e) => {
      tracing::debug!("{}", e);
      eprintln!("{}", e.report(invocation.config.verbose));
      process::exit(e.exit_code());
    }
  }
}
