/*!
  The simulator's error taxonomy. Every failure is terminal and falls into exactly one of
  three classes, each of which maps to its own process exit code:

    Usage   : the invocation itself is malformed; nothing was simulated.
    Fault   : the simulator cannot carry out the request (I/O, capacity, missing opcode).
    Program : the request was executable, but the loaded filter is malformed.

  Each error carries an errno-style numeric cause so that verbose reports can say exactly
  what went wrong. Program errors additionally carry the position of the instruction at
  fault.
*/

use std::fmt::{Display, Formatter};
use std::io;

use thiserror::Error;

/// The errno values the simulator reports. Linux numbering.
pub mod errno {
  pub const E2BIG      : i32 = 7;
  pub const ENOEXEC    : i32 = 8;
  pub const EIO        : i32 = 5;
  pub const EFAULT     : i32 = 14;
  pub const EINVAL     : i32 = 22;
  pub const EDOM       : i32 = 33;
  pub const ERANGE     : i32 = 34;
  pub const ELOOP      : i32 = 40;
  pub const EOPNOTSUPP : i32 = 95;
}

/// Position of an instruction within a program.
pub type Line = u32;

#[derive(Debug, Error)]
pub enum SimError {
  #[error("usage error: {0}")]
  Usage(#[from] UsageError),

  #[error("simulator fault: {0}")]
  Fault(#[from] Fault),

  #[error("program error at instruction {line}: {cause}")]
  Program {
    cause : ProgramErrorCause,
    line  : Line
  },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
  #[error("the architecture must be selected before any argument is set")]
  ArchitectureAfterArgument,
  #[error("unsupported architecture: {0} (expected 32 or 64)")]
  BadArchitecture(u64),
  #[error("argument index {0} is out of range (expected 0 to 5)")]
  BadArgumentIndex(usize),
  #[error("{0}")]
  BadCommandLine(String),
}

#[derive(Debug, Error)]
pub enum Fault {
  #[error("cannot read program: {0}")]
  Io(#[from] io::Error),
  #[error("program exceeds the maximum of {max} instructions")]
  ProgramTooLarge { max: usize },
  #[error("opcode {0:#06x} is not supported")]
  UnsupportedOpcode(u16),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProgramErrorCause {
  #[error("instruction pointer left the program without a return")]
  IpOutOfRange,
  #[error("load offset {0} is outside the syscall record")]
  LoadOutOfRange(u32),
  #[error("undefined action code {0:#010x}")]
  UndefinedAction(u32),
  #[error("step limit of {0} instructions exceeded")]
  StepLimitExceeded(u64),
}

impl Fault {
  pub fn errno(&self) -> i32 {
    match self {
      Fault::Io(e)                   => e.raw_os_error().unwrap_or(errno::EIO),
      Fault::ProgramTooLarge { .. }  => errno::E2BIG,
      Fault::UnsupportedOpcode(_)    => errno::EOPNOTSUPP,
    }
  }
}

impl ProgramErrorCause {
  pub fn errno(&self) -> i32 {
    match self {
      | ProgramErrorCause::IpOutOfRange
      | ProgramErrorCause::LoadOutOfRange(_)  => errno::ERANGE,
      ProgramErrorCause::UndefinedAction(_)   => errno::EDOM,
      ProgramErrorCause::StepLimitExceeded(_) => errno::ELOOP,
    }
  }
}

impl SimError {
  pub fn program(cause: ProgramErrorCause, line: Line) -> SimError {
    SimError::Program { cause, line }
  }

  /// The numeric cause disclosed in verbose reports.
  pub fn errno(&self) -> i32 {
    match self {
      SimError::Usage(_)             => errno::EINVAL,
      SimError::Fault(fault)         => fault.errno(),
      SimError::Program { cause, .. } => cause.errno(),
    }
  }

  /// The process exit code for this class of error.
  pub fn exit_code(&self) -> i32 {
    match self {
      SimError::Usage(_)        => errno::EINVAL,
      SimError::Fault(_)        => errno::EFAULT,
      SimError::Program { .. }  => errno::ENOEXEC,
    }
  }

  /// The terse report printed at the top-level boundary. `verbose` only changes how much is
  /// disclosed, never the classification.
  pub fn report(&self, verbose: bool) -> Report<'_> {
    Report { error: self, verbose }
  }
}

pub struct Report<'a> {
  error   : &'a SimError,
  verbose : bool
}

impl<'a> Display for Report<'a> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match (self.error, self.verbose) {

      (SimError::Usage(e), _) => {
        write!(f, "{}", e)
      }

      (SimError::Fault(_), false) => {
        write!(f, "FAULT")
      }

      (SimError::Fault(_), true) => {
        write!(f, "FAULT: errno = {}", self.error.errno())
      }

      (SimError::Program { .. }, false) => {
        write!(f, "ERROR")
      }

      (SimError::Program { line, .. }, true) => {
        write!(f, "ERROR: errno = {}, line = {}", self.error.errno(), line)
      }

    }
  }
}
