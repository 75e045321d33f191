//! The immutable configuration handed down the load → build → execute → classify chain.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use crate::error::UsageError;

/// Machine word width of the syscall being simulated. It decides the width of the argument
/// words in the syscall record and therefore the record's byte layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Architecture {
  X32,
  X64,
}

impl Architecture {
  /// Width in bytes of one argument word.
  pub fn word_size(&self) -> usize {
    match self {
      Architecture::X32 => 4,
      Architecture::X64 => 8,
    }
  }

  pub fn bits(&self) -> u32 {
    (self.word_size() * 8) as u32
  }
}

impl Default for Architecture {
  fn default() -> Self {
    Architecture::X32
  }
}

impl TryFrom<u64> for Architecture {
  type Error = UsageError;

  fn try_from(bits: u64) -> Result<Self, Self::Error> {
    match bits {
      32 => Ok(Architecture::X32),
      64 => Ok(Architecture::X64),
      other => Err(UsageError::BadArchitecture(other)),
    }
  }
}

impl Display for Architecture {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}-bit", self.bits())
  }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SimConfig {
  /// Architecture used for the syscall record unless overridden.
  pub architecture : Architecture,
  /// Disclose numeric causes and failing positions, and log the program and record.
  pub verbose      : bool,
  /**
    Upper bound on the number of instructions a single run may execute. `None` leaves the
    engine unbounded, so a filter whose jumps cycle in range without reaching a return never
    terminates. `Some(n)` turns such a filter into a program error after `n` steps.
  */
  pub step_limit   : Option<u64>,
}
