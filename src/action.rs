//! Classification of the action code a filter returns.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use crate::error::{Line, ProgramErrorCause, SimError};

pub const ACTION_KILL  : u32 = 0x0000_0000;
pub const ACTION_TRAP  : u32 = 0x0002_0000;
pub const ACTION_ERRNO : u32 = 0x0003_0000;
pub const ACTION_ALLOW : u32 = 0x7fff_0000;

const ACTION_MASK : u32 = 0xffff_0000;
const DATA_MASK   : u32 = 0x0000_ffff;

/// The operand of the return instruction that ended a run, and where that instruction was.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionCode {
  pub value : u32,
  pub line  : Line,
}

/// The disposition a filter decided on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Action {
  Kill,
  Trap,
  Errno(u16),
  Allow,
}

impl Action {
  /// Any value other than the four dispositions is a program error citing the return.
  pub fn classify(code: ActionCode) -> Result<Action, SimError> {
    Action::try_from(code.value)
      .map_err(|cause| SimError::program(cause, code.line))
  }

  pub fn code(&self) -> u32 {
    match self {
      Action::Kill         => ACTION_KILL,
      Action::Trap         => ACTION_TRAP,
      Action::Errno(errno) => ACTION_ERRNO | *errno as u32,
      Action::Allow        => ACTION_ALLOW,
    }
  }
}

impl TryFrom<u32> for Action {
  type Error = ProgramErrorCause;

  fn try_from(value: u32) -> Result<Self, Self::Error> {
    match value {
      ACTION_KILL                                => Ok(Action::Kill),
      ACTION_TRAP                                => Ok(Action::Trap),
      v if v & ACTION_MASK == ACTION_ERRNO       => Ok(Action::Errno((v & DATA_MASK) as u16)),
      ACTION_ALLOW                               => Ok(Action::Allow),
      other                                      => Err(ProgramErrorCause::UndefinedAction(other)),
    }
  }
}

impl Display for Action {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Action::Kill         => write!(f, "KILL"),
      Action::Trap         => write!(f, "TRAP"),
      Action::Errno(errno) => write!(f, "ERRNO({})", errno),
      Action::Allow        => write!(f, "ALLOW"),
    }
  }
}
