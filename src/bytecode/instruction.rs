use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use super::binary::{RawInstruction, Word};

// Instruction classes
pub const BPF_LD  : u16 = 0x00;
pub const BPF_JMP : u16 = 0x05;
pub const BPF_RET : u16 = 0x06;
// Load size
pub const BPF_W   : u16 = 0x00;
// Load mode
pub const BPF_ABS : u16 = 0x20;
// Jump operations
pub const BPF_JA  : u16 = 0x00;
pub const BPF_JEQ : u16 = 0x10;
pub const BPF_JGT : u16 = 0x20;
pub const BPF_JGE : u16 = 0x30;
// Operand source
pub const BPF_K   : u16 = 0x00;

/**
  The opcodes the simulator can execute, numbered as in classic BPF. Any other code on the
  wire decodes to `Instruction::Unsupported`. The `strum` name of each variant is its
  assembly mnemonic.
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,            Hash
)]
#[repr(u16)]
pub enum Opcode {
  #[strum(serialize = "ld")]
  LoadAbsolute     = 0x20, // BPF_LD  | BPF_W   | BPF_ABS
  #[strum(serialize = "ja")]
  Jump             = 0x05, // BPF_JMP | BPF_JA
  #[strum(serialize = "jeq")]
  JumpEqual        = 0x15, // BPF_JMP | BPF_JEQ | BPF_K
  #[strum(serialize = "jgt")]
  JumpGreater      = 0x25, // BPF_JMP | BPF_JGT | BPF_K
  #[strum(serialize = "jge")]
  JumpGreaterEqual = 0x35, // BPF_JMP | BPF_JGE | BPF_K
  #[strum(serialize = "ret")]
  Return           = 0x06, // BPF_RET | BPF_K
}

impl Opcode {
  pub fn code(&self) -> u16 {
    Into::<u16>::into(*self)
  }
}

/**
  A decoded instruction. There is one variant per supported opcode carrying only the fields
  that opcode uses, and an explicit `Unsupported` variant that keeps the raw record so the
  engine can report it when (and only if) it is dispatched.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// A <- byte at offset `k` of the syscall record
  LoadAbsolute { k: Word },
  /// ip += k
  Jump { k: Word },
  /// ip += (A == k) ? jt : jf
  JumpEqual { k: Word, jt: u8, jf: u8 },
  /// ip += (k > A) ? jt : jf
  JumpGreater { k: Word, jt: u8, jf: u8 },
  /// ip += (k >= A) ? jt : jf
  JumpGreaterEqual { k: Word, jt: u8, jf: u8 },
  /// Terminate with action code `k`
  Return { k: Word },
  Unsupported(RawInstruction),
}

impl Instruction {
  /// Decoding never fails; validity is only checked when an instruction is executed.
  pub fn decode(raw: RawInstruction) -> Instruction {
    let RawInstruction { code, jt, jf, k } = raw;
    match Opcode::try_from(code) {
      Ok(Opcode::LoadAbsolute)     => Instruction::LoadAbsolute { k },
      Ok(Opcode::Jump)             => Instruction::Jump { k },
      Ok(Opcode::JumpEqual)        => Instruction::JumpEqual { k, jt, jf },
      Ok(Opcode::JumpGreater)      => Instruction::JumpGreater { k, jt, jf },
      Ok(Opcode::JumpGreaterEqual) => Instruction::JumpGreaterEqual { k, jt, jf },
      Ok(Opcode::Return)           => Instruction::Return { k },
      Err(_)                       => Instruction::Unsupported(raw),
    }
  }

  pub fn encode(&self) -> RawInstruction {
    match *self {
      Instruction::LoadAbsolute { k } => {
        RawInstruction::new(Opcode::LoadAbsolute.code(), 0, 0, k)
      }
      Instruction::Jump { k } => {
        RawInstruction::new(Opcode::Jump.code(), 0, 0, k)
      }
      Instruction::JumpEqual { k, jt, jf } => {
        RawInstruction::new(Opcode::JumpEqual.code(), jt, jf, k)
      }
      Instruction::JumpGreater { k, jt, jf } => {
        RawInstruction::new(Opcode::JumpGreater.code(), jt, jf, k)
      }
      Instruction::JumpGreaterEqual { k, jt, jf } => {
        RawInstruction::new(Opcode::JumpGreaterEqual.code(), jt, jf, k)
      }
      Instruction::Return { k } => {
        RawInstruction::new(Opcode::Return.code(), 0, 0, k)
      }
      Instruction::Unsupported(raw) => raw,
    }
  }

  pub fn opcode(&self) -> Option<Opcode> {
    match self {
      Instruction::LoadAbsolute { .. }     => Some(Opcode::LoadAbsolute),
      Instruction::Jump { .. }             => Some(Opcode::Jump),
      Instruction::JumpEqual { .. }        => Some(Opcode::JumpEqual),
      Instruction::JumpGreater { .. }      => Some(Opcode::JumpGreater),
      Instruction::JumpGreaterEqual { .. } => Some(Opcode::JumpGreaterEqual),
      Instruction::Return { .. }           => Some(Opcode::Return),
      Instruction::Unsupported(_)          => None,
    }
  }
}

/// Disassembly, one instruction per line.
impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::LoadAbsolute { k } => {
        write!(f, "{} [{}]", Opcode::LoadAbsolute, k)
      }

      Instruction::Jump { k } => {
        write!(f, "{} +{}", Opcode::Jump, k)
      }

      | Instruction::JumpEqual { k, jt, jf }
      | Instruction::JumpGreater { k, jt, jf }
      | Instruction::JumpGreaterEqual { k, jt, jf } => {
        // The opcode is always present for these variants.
        let name: &'static str = self.opcode().map(Into::into).unwrap_or("j??");
        write!(f, "{} #{:#x}, {}, {}", name, k, jt, jf)
      }

      Instruction::Return { k } => {
        write!(f, "{} #{:#010x}", Opcode::Return, k)
      }

      Instruction::Unsupported(raw) => {
        write!(f, ".unsupported {:#06x}, {}, {}, {:#x}", raw.code, raw.jt, raw.jf, raw.k)
      }

    }
  }
}
