/*!
  An offline simulator for seccomp-style classic BPF syscall filters.

  A filter program is loaded from its raw binary form, run against a synthetic syscall record
  (architecture, syscall number and six argument words), and the action code it returns is
  classified as `KILL`, `TRAP`, `ERRNO(n)` or `ALLOW`. The pipeline is

  ```text
  bytes -> [`Program::load`] -> `Program` ----------┐
                                                    ├-> [`execute`] -> `ActionCode` ->⋯
  flags -> [`SyscallRecordBuilder`] -> `SyscallRecord` ┘

  ⋯-> [`Action::classify`] -> `Action`
  ```

  Every stage returns `Result<_, SimError>`; nothing below the binary's `main` prints a verdict
  or exits the process.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod action;
pub mod bytecode;
pub mod cli;
pub mod config;
pub mod error;
pub mod program;
pub mod simulator;
pub mod syscall;

pub use action::{Action, ActionCode};
pub use config::{Architecture, SimConfig};
pub use error::SimError;
pub use program::Program;
pub use simulator::execute;
pub use syscall::{SyscallRecord, SyscallRecordBuilder};

/// Executes `program` against `record` and classifies the action it returns.
pub fn simulate(
  program : &Program,
  record  : &SyscallRecord,
  config  : &SimConfig
) -> Result<Action, SimError>
{
  let code   = execute(program, record, config)?;
  let action = Action::classify(code)?;
  tracing::debug!("Line {} returned {:#010x}: {}", code.line, code.value, action);
  Ok(action)
}
