/*!
  A `Program` is the loaded, immutable instruction sequence of one simulation run, and this
  module is also its loader.

  The loader reads whole 8 byte records until the source is exhausted. A trailing record that
  is cut short is dropped without complaint. The number of instructions is capped at
  `MAX_PROGRAM_LENGTH`; going over is a simulator fault (our capacity is the limit, not the
  filter's validity). Opcodes are not validated here.
*/

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::ops::Index;
use std::path::Path;

use prettytable::Table;

use crate::bytecode::{parse_raw_instruction, Instruction, RawInstruction, INSTRUCTION_SIZE};
use crate::error::{Fault, SimError};
use crate::simulator::TABLE_DISPLAY_FORMAT;

/// The longest program the simulator will load.
pub const MAX_PROGRAM_LENGTH: usize = 4096;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
  instructions: Vec<Instruction>,
}

impl Program {

  // region Construction

  pub fn new() -> Program {
    Program { instructions: Vec::new() }
  }

  /// Appends an instruction, faulting if the program is already at capacity.
  pub fn push(&mut self, instruction: Instruction) -> Result<(), SimError> {
    if self.instructions.len() >= MAX_PROGRAM_LENGTH {
      return Err(Fault::ProgramTooLarge { max: MAX_PROGRAM_LENGTH }.into());
    }
    self.instructions.push(instruction);
    Ok(())
  }

  pub fn from_instructions<I>(instructions: I) -> Result<Program, SimError>
    where I: IntoIterator<Item = Instruction>
  {
    let mut program = Program::new();
    for instruction in instructions {
      program.push(instruction)?;
    }
    Ok(program)
  }

  // endregion

  // region Loading

  /// Decodes a program image already in memory.
  pub fn from_bytes(image: &[u8]) -> Result<Program, SimError> {
    let mut program = Program::new();
    let mut input   = image;

    while let Ok((rest, raw)) = parse_raw_instruction(input) {
      program.push(Instruction::decode(raw))?;
      input = rest;
    }

    if !input.is_empty() {
      tracing::debug!(
        "Discarding {} trailing bytes (a partial {} byte record).",
        input.len(),
        INSTRUCTION_SIZE
      );
    }
    Ok(program)
  }

  /// Reads every record from `source`. Reading stops one record past capacity, so an endless
  /// source faults instead of being drained.
  pub fn load<R: Read>(source: R) -> Result<Program, SimError> {
    let cap       = ((MAX_PROGRAM_LENGTH + 1) * INSTRUCTION_SIZE) as u64;
    let mut image = Vec::new();
    source.take(cap).read_to_end(&mut image).map_err(Fault::from)?;
    let program = Program::from_bytes(&image)?;
    tracing::info!("Program loaded: {} instructions.", program.len());
    Ok(program)
  }

  pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Program, SimError> {
    let path = path.as_ref();
    tracing::debug!("Opening program file {}", path.display());
    let file = File::open(path).map_err(Fault::from)?;
    Program::load(file)
  }

  // endregion

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  /// Fetch by instruction pointer. `None` is the out-of-range case.
  pub fn get(&self, ip: u32) -> Option<&Instruction> {
    self.instructions.get(ip as usize)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
    self.instructions.iter()
  }

  /// The program image, i.e. the inverse of `from_bytes` for whole records.
  pub fn to_bytes(&self) -> Vec<u8> {
    let raw: Vec<RawInstruction> = self.instructions.iter().map(Instruction::encode).collect();
    crate::bytecode::encode_program(&raw)
  }

}

impl Index<usize> for Program {
  type Output = Instruction;

  fn index(&self, index: usize) -> &Self::Output {
    &self.instructions[index]
  }
}

/// A disassembly listing.
impl Display for Program {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Line", ubl->"Code", ubl->"Instruction"]);

    for (line, instruction) in self.instructions.iter().enumerate() {
      table.add_row(
        row![
          r->line,
          format!("{:#06x}", instruction.encode().code),
          instruction
        ]
      );
    }

    write!(f, "{}", table)
  }
}
