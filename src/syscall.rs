/*!
  The syscall record is the "invocation under test" that a filter inspects. Filters only see
  it as bytes, so its byte image must be laid out exactly:

    [Syscall:32][Arg0:W][Arg1:W][Arg2:W][Arg3:W][Arg4:W][Arg5:W]

  where every field is little-endian and `W` is the architecture's word width, 32 or 64 bits.
  The architecture tag is not part of the image. It selects the layout and thereby the size
  of the record, which is also the bound on valid load offsets: 28 bytes for 32 bit and 52
  bytes for 64 bit.
*/

use std::fmt::{Display, Formatter};

use crate::config::{Architecture, SimConfig};
use crate::error::UsageError;

/// Number of syscall argument words.
pub const SYSCALL_ARG_COUNT: usize = 6;

/// Size in bytes of the syscall number field.
const SYSCALL_NUMBER_SIZE: usize = 4;

/// Size in bytes of the record image for the given architecture.
pub fn record_size(architecture: Architecture) -> usize {
  SYSCALL_NUMBER_SIZE + SYSCALL_ARG_COUNT * architecture.word_size()
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyscallRecord {
  architecture : Architecture,
  syscall      : u32,
  args         : [u64; SYSCALL_ARG_COUNT],
  bytes        : Vec<u8>,
}

impl SyscallRecord {
  fn new(architecture: Architecture, syscall: u32, args: [u64; SYSCALL_ARG_COUNT]) -> Self {
    let mut bytes = Vec::with_capacity(record_size(architecture));
    bytes.extend_from_slice(&syscall.to_le_bytes());
    for arg in args.iter() {
      match architecture {
        Architecture::X32 => bytes.extend_from_slice(&(*arg as u32).to_le_bytes()),
        Architecture::X64 => bytes.extend_from_slice(&arg.to_le_bytes()),
      }
    }

    SyscallRecord { architecture, syscall, args, bytes }
  }

  pub fn architecture(&self) -> Architecture {
    self.architecture
  }

  pub fn syscall(&self) -> u32 {
    self.syscall
  }

  /// Argument `index` as stored, i.e. truncated to 32 bits on a 32 bit record.
  pub fn arg(&self, index: usize) -> Option<u64> {
    self.args.get(index).map(|arg| {
      match self.architecture {
        Architecture::X32 => *arg as u32 as u64,
        Architecture::X64 => *arg,
      }
    })
  }

  /// The record's byte image. Its length is the maximum valid load offset.
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// The byte at `offset`, or `None` if `offset` lies outside the record for its architecture.
  pub fn byte_at(&self, offset: u32) -> Option<u8> {
    self.bytes.get(offset as usize).copied()
  }
}

impl Display for SyscallRecord {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let args: Vec<String> =
      (0..SYSCALL_ARG_COUNT)
        .filter_map(|i| self.arg(i))
        .map(|arg| format!("{:#x}", arg))
        .collect();
    write!(f, "{} syscall {}({})", self.architecture, self.syscall, args.join(", "))
  }
}

/**
  Assembles a `SyscallRecord`. The architecture starts at the configured default and may only
  be changed while no argument has been set, because the argument words are meaningless once
  their width changes underneath them.
*/
#[derive(Clone, Debug)]
pub struct SyscallRecordBuilder {
  architecture : Architecture,
  syscall      : u32,
  args         : [u64; SYSCALL_ARG_COUNT],
  args_set     : bool,
}

impl SyscallRecordBuilder {
  pub fn new(config: &SimConfig) -> SyscallRecordBuilder {
    SyscallRecordBuilder {
      architecture : config.architecture,
      syscall      : 0,
      args         : [0; SYSCALL_ARG_COUNT],
      args_set     : false,
    }
  }

  pub fn architecture(&mut self, architecture: Architecture) -> Result<&mut Self, UsageError> {
    if self.args_set {
      return Err(UsageError::ArchitectureAfterArgument);
    }
    self.architecture = architecture;
    Ok(self)
  }

  pub fn syscall(&mut self, syscall: u32) -> &mut Self {
    self.syscall = syscall;
    self
  }

  pub fn arg(&mut self, index: usize, value: u64) -> Result<&mut Self, UsageError> {
    match self.args.get_mut(index) {
      Some(slot) => {
        *slot = value;
        self.args_set = true;
        Ok(self)
      }
      None => Err(UsageError::BadArgumentIndex(index)),
    }
  }

  pub fn build(&self) -> SyscallRecord {
    SyscallRecord::new(self.architecture, self.syscall, self.args)
  }
}
