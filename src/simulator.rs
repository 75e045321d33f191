//! The execution engine: a fetch-decode-execute loop over a loaded `Program`, reading from a
//! `SyscallRecord` and ending in either an `ActionCode` or a classified error.

use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};

use crate::action::ActionCode;
use crate::bytecode::Instruction;
use crate::config::SimConfig;
use crate::error::{Fault, Line, ProgramErrorCause, SimError};
use crate::program::Program;
use crate::syscall::SyscallRecord;

/// Words of scratch memory. No supported opcode touches them.
pub const SCRATCH_SIZE: usize = 16;

/// Machine state. Zeroed at the start of every run and never shared between runs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SimulatorState {
  pub accumulator : u32,
  pub scratch     : [u32; SCRATCH_SIZE],
}

pub struct Simulator<'a> {
  program : &'a Program,
  record  : &'a SyscallRecord,
  config  : &'a SimConfig,

  // Registers //
  state   : SimulatorState,
  ip      : u32,  // Instruction pointer, the next instruction to fetch
  current : Line, // Position of the instruction most recently fetched
  steps   : u64,  // Instructions executed so far
}

/// Runs `program` against `record` with a fresh machine.
pub fn execute(
  program : &Program,
  record  : &SyscallRecord,
  config  : &SimConfig
) -> Result<ActionCode, SimError>
{
  Simulator::new(program, record, config).run()
}

impl<'a> Simulator<'a> {

  // region Display methods

  /// A two-column `name[i] = value` table with an optional marked row.
  fn make_register_table<T: Display>(name: &str, cells: &[T], marked: Option<usize>) -> Table {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, cell) in cells.iter().enumerate() {
      let marker = if Some(i) == marked { "* --> " } else { "" };
      table.add_row(row![r->format!("{}{}[{}] =", marker, name, i), cell]);
    }
    table
  }

  // endregion

  pub fn new(program: &'a Program, record: &'a SyscallRecord, config: &'a SimConfig) -> Self {
    Simulator {
      program,
      record,
      config,
      state   : SimulatorState::default(),
      ip      : 0,
      current : 0,
      steps   : 0,
    }
  }

  pub fn state(&self) -> &SimulatorState {
    &self.state
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }

  /**
    Executes until a return instruction is reached or an error occurs.

    The instruction pointer is range-checked before every fetch. Leaving the program without
    having returned is an out-of-range program error charged to the last instruction that
    executed (position 0 if none did). With no step limit configured, a program whose jumps
    cycle within range and never return does not terminate.
  */
  pub fn run(&mut self) -> Result<ActionCode, SimError> {
    let program = self.program;

    tracing::debug!("Executing {} instructions against {}", program.len(), self.record);

    while let Some(&instruction) = program.get(self.ip) {
      if let Some(limit) = self.config.step_limit {
        if self.steps >= limit {
          return Err(SimError::program(ProgramErrorCause::StepLimitExceeded(limit), self.ip));
        }
      }

      // Fetch and bump the instruction pointer.
      self.current = self.ip;
      self.ip      = self.ip.wrapping_add(1);
      self.steps  += 1;

      tracing::trace!(
        "[{:>4}] {:<24} A = {:#010x}",
        self.current,
        instruction.to_string(),
        self.state.accumulator
      );

      if let Some(action) = self.step(instruction)? {
        return Ok(action);
      }

      #[cfg(feature = "trace_computation")]
      tracing::trace!("\n{}", self);
    }

    tracing::debug!("Instruction pointer {} is outside the program.", self.ip);
    Err(SimError::program(ProgramErrorCause::IpOutOfRange, self.current))
  }

  /// Executes one instruction. `Some` means the program returned.
  fn step(&mut self, instruction: Instruction) -> Result<Option<ActionCode>, SimError> {
    match instruction {

      Instruction::LoadAbsolute { k } => {
        // A single byte, even though the opcode is tagged as a word load.
        match self.record.byte_at(k) {
          Some(byte) => self.state.accumulator = byte as u32,
          None       => {
            return Err(
              SimError::program(ProgramErrorCause::LoadOutOfRange(k), self.current)
            );
          }
        }
      }

      Instruction::Jump { k } => {
        self.ip = self.ip.wrapping_add(k);
      }

      Instruction::JumpEqual { k, jt, jf } => {
        self.branch(self.state.accumulator == k, jt, jf);
      }

      // The constant is the left operand in both ordered comparisons.
      Instruction::JumpGreater { k, jt, jf } => {
        self.branch(k > self.state.accumulator, jt, jf);
      }

      Instruction::JumpGreaterEqual { k, jt, jf } => {
        self.branch(k >= self.state.accumulator, jt, jf);
      }

      Instruction::Return { k } => {
        return Ok(Some(ActionCode { value: k, line: self.current }));
      }

      Instruction::Unsupported(raw) => {
        tracing::debug!("Unsupported opcode {:#06x} at line {}", raw.code, self.current);
        return Err(Fault::UnsupportedOpcode(raw.code).into());
      }

    }
    Ok(None)
  }

  fn branch(&mut self, condition: bool, jt: u8, jf: u8) {
    let offset = match condition {
      true  => jt,
      false => jf
    };
    self.ip = self.ip.wrapping_add(offset as u32);
  }

}


lazy_static! {
  pub static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl<'a> Display for Simulator<'a> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let code: Vec<&Instruction> = self.program.iter().collect();
    let memory: Vec<String> =
      self.state.scratch.iter().map(|word| format!("{:#010x}", word)).collect();

    let p_table = Simulator::make_register_table("P", &code, Some(self.current as usize));
    let m_table = Simulator::make_register_table("M", &memory, None);

    let mut combined_table = table!([p_table, m_table]);

    combined_table.set_titles(row![ub->"Program", ub->"Scratch"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(
      f,
      "A = {:#010x}\tip = {}\tsteps = {}\n{}",
      self.state.accumulator, self.ip, self.steps, combined_table
    )
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::action::{Action, ACTION_ALLOW, ACTION_KILL};
  use crate::config::Architecture;
  use crate::error::errno;
  use crate::syscall::SyscallRecordBuilder;

  use Instruction::*;

  fn program(instructions: Vec<Instruction>) -> Program {
    Program::from_instructions(instructions).unwrap()
  }

  fn record(architecture: Architecture, syscall: u32) -> SyscallRecord {
    SyscallRecordBuilder::new(&SimConfig::default())
      .architecture(architecture).unwrap()
      .syscall(syscall)
      .build()
  }

  fn run(program: &Program, record: &SyscallRecord) -> Result<ActionCode, SimError> {
    execute(program, record, &SimConfig::default())
  }

  fn expect_program_error(
    result : Result<ActionCode, SimError>,
    cause  : ProgramErrorCause,
    line   : Line
  ) {
    match result {
      Err(SimError::Program { cause: c, line: l }) => {
        assert_eq!(c, cause);
        assert_eq!(l, line);
      }
      other => panic!("expected {:?} at {}, got {:?}", cause, line, other),
    }
  }

  /// Loads byte 0, allows if it equals zero, kills otherwise.
  fn byte_zero_filter() -> Program {
    program(vec![
      LoadAbsolute { k: 0 },
      JumpEqual { k: 0, jt: 0, jf: 1 },
      Return { k: ACTION_ALLOW },
      Return { k: ACTION_KILL },
    ])
  }

  #[test]
  fn return_is_the_action(){
    let p = program(vec![Return { k: 0x0003_0005 }]);
    let code = run(&p, &record(Architecture::X32, 0)).unwrap();
    assert_eq!(code, ActionCode { value: 0x0003_0005, line: 0 });
    assert_eq!(Action::classify(code).unwrap(), Action::Errno(5));
  }

  #[test]
  fn byte_zero_is_low_byte_of_syscall_number(){
    let p = byte_zero_filter();

    let code = run(&p, &record(Architecture::X32, 57)).unwrap();
    assert_eq!(code, ActionCode { value: ACTION_KILL, line: 3 });

    let code = run(&p, &record(Architecture::X32, 0)).unwrap();
    assert_eq!(code, ActionCode { value: ACTION_ALLOW, line: 2 });

    // Only the low byte is read: 0x100 has a zero low byte.
    let code = run(&p, &record(Architecture::X64, 0x100)).unwrap();
    assert_eq!(code.value, ACTION_ALLOW);
  }

  #[test]
  fn load_reads_a_single_byte(){
    let record = SyscallRecordBuilder::new(&SimConfig::default())
      .arg(0, 0xaabb_ccdd).unwrap()
      .build();
    let p = program(vec![
      LoadAbsolute { k: 5 },
      JumpEqual { k: 0xcc, jt: 0, jf: 1 },
      Return { k: ACTION_ALLOW },
      Return { k: ACTION_KILL },
    ]);

    let config = SimConfig::default();
    let mut simulator = Simulator::new(&p, &record, &config);
    assert_eq!(simulator.run().unwrap().value, ACTION_ALLOW);
    assert_eq!(simulator.state().accumulator, 0xcc);
  }

  #[test]
  fn load_offset_bounds_depend_on_architecture(){
    // Last byte of both layouts loads on both.
    let p = program(vec![LoadAbsolute { k: 27 }, Return { k: ACTION_ALLOW }]);
    assert!(run(&p, &record(Architecture::X32, 1)).is_ok());
    assert!(run(&p, &record(Architecture::X64, 1)).is_ok());

    // Past the 32 bit record but inside the 64 bit one.
    let p = program(vec![LoadAbsolute { k: 28 }, Return { k: ACTION_KILL }]);
    expect_program_error(
      run(&p, &record(Architecture::X32, 1)),
      ProgramErrorCause::LoadOutOfRange(28),
      0
    );
    assert_eq!(run(&p, &record(Architecture::X64, 1)).unwrap().value, ACTION_KILL);

    let p = program(vec![LoadAbsolute { k: 51 }, Return { k: ACTION_ALLOW }]);
    assert!(run(&p, &record(Architecture::X64, 1)).is_ok());

    let p = program(vec![LoadAbsolute { k: 52 }, Return { k: ACTION_ALLOW }]);
    expect_program_error(
      run(&p, &record(Architecture::X64, 1)),
      ProgramErrorCause::LoadOutOfRange(52),
      0
    );
  }

  #[test]
  fn huge_load_offset_is_out_of_range(){
    let p = program(vec![LoadAbsolute { k: u32::max_value() }, Return { k: 0 }]);
    let error = run(&p, &record(Architecture::X64, 0)).unwrap_err();
    assert_eq!(error.errno(), errno::ERANGE);
    assert_eq!(error.exit_code(), errno::ENOEXEC);
  }

  #[test]
  fn unconditional_jump(){
    let p = program(vec![
      Jump { k: 1 },
      Return { k: ACTION_KILL },
      Return { k: ACTION_ALLOW },
    ]);
    assert_eq!(run(&p, &record(Architecture::X32, 0)).unwrap().value, ACTION_ALLOW);
  }

  #[test]
  fn ordered_jumps_compare_constant_to_accumulator(){
    // Accumulator = 57
    let greater = |k| program(vec![
      LoadAbsolute { k: 0 },
      JumpGreater { k, jt: 0, jf: 1 },
      Return { k: ACTION_ALLOW },
      Return { k: ACTION_KILL },
    ]);
    let greater_equal = |k| program(vec![
      LoadAbsolute { k: 0 },
      JumpGreaterEqual { k, jt: 0, jf: 1 },
      Return { k: ACTION_ALLOW },
      Return { k: ACTION_KILL },
    ]);
    let r = record(Architecture::X32, 57);

    assert_eq!(run(&greater(58), &r).unwrap().value, ACTION_ALLOW);
    assert_eq!(run(&greater(57), &r).unwrap().value, ACTION_KILL);
    assert_eq!(run(&greater(10), &r).unwrap().value, ACTION_KILL);

    assert_eq!(run(&greater_equal(58), &r).unwrap().value, ACTION_ALLOW);
    assert_eq!(run(&greater_equal(57), &r).unwrap().value, ACTION_ALLOW);
    assert_eq!(run(&greater_equal(10), &r).unwrap().value, ACTION_KILL);
  }

  #[test]
  fn empty_program_is_out_of_range(){
    let p = Program::new();
    expect_program_error(
      run(&p, &record(Architecture::X32, 0)),
      ProgramErrorCause::IpOutOfRange,
      0
    );
  }

  #[test]
  fn falling_off_the_end(){
    let p = program(vec![LoadAbsolute { k: 0 }, LoadAbsolute { k: 1 }]);
    expect_program_error(
      run(&p, &record(Architecture::X32, 0)),
      ProgramErrorCause::IpOutOfRange,
      1
    );
  }

  #[test]
  fn jump_past_end_reports_the_jump(){
    let p = program(vec![
      LoadAbsolute { k: 0 },
      Jump { k: 10 },
      Return { k: ACTION_ALLOW },
    ]);
    expect_program_error(
      run(&p, &record(Architecture::X32, 0)),
      ProgramErrorCause::IpOutOfRange,
      1
    );

    let p = program(vec![
      JumpEqual { k: 0, jt: 200, jf: 0 },
      Return { k: ACTION_ALLOW },
    ]);
    expect_program_error(
      run(&p, &record(Architecture::X32, 0)),
      ProgramErrorCause::IpOutOfRange,
      0
    );
  }

  #[test]
  fn jump_wraps_around(){
    // ip = 1; 1 + 0xfffffffe = 0xffffffff, out of range.
    let p = program(vec![Jump { k: u32::max_value() - 1 }, Return { k: ACTION_ALLOW }]);
    expect_program_error(
      run(&p, &record(Architecture::X32, 0)),
      ProgramErrorCause::IpOutOfRange,
      0
    );

    // ip = 3 after fetching line 2; 3 + 0xfffffffe wraps to 1.
    let p = program(vec![
      Jump { k: 1 },
      Return { k: ACTION_ALLOW },
      Jump { k: u32::max_value() - 1 },
    ]);
    assert_eq!(
      run(&p, &record(Architecture::X32, 0)).unwrap(),
      ActionCode { value: ACTION_ALLOW, line: 1 }
    );
  }

  #[test]
  fn unsupported_opcode_faults_when_reached(){
    let alu = Unsupported(crate::bytecode::RawInstruction::new(0x04, 0, 0, 1));

    let p = program(vec![alu, Return { k: ACTION_ALLOW }]);
    let error = run(&p, &record(Architecture::X32, 0)).unwrap_err();
    assert!(matches!(error, SimError::Fault(Fault::UnsupportedOpcode(0x04))));
    assert_eq!(error.errno(), errno::EOPNOTSUPP);
    assert_eq!(error.exit_code(), errno::EFAULT);

    let p = program(vec![Jump { k: 1 }, alu, Return { k: ACTION_ALLOW }]);
    assert_eq!(run(&p, &record(Architecture::X32, 0)).unwrap().value, ACTION_ALLOW);
  }

  #[test]
  fn step_limit_stops_a_cycle(){
    // ip = 1 after the fetch; 1 + 0xffffffff wraps to 0: a one-instruction loop.
    let p = program(vec![Jump { k: u32::max_value() }, Return { k: ACTION_ALLOW }]);
    let config = SimConfig { step_limit: Some(100), ..SimConfig::default() };
    let r = record(Architecture::X32, 0);

    let mut simulator = Simulator::new(&p, &r, &config);
    let error = simulator.run().unwrap_err();
    assert_eq!(simulator.steps(), 100);
    assert_eq!(error.errno(), errno::ELOOP);
    expect_program_error(Err(error), ProgramErrorCause::StepLimitExceeded(100), 0);
  }

  #[test]
  fn step_limit_does_not_affect_terminating_programs(){
    let config = SimConfig { step_limit: Some(4), ..SimConfig::default() };
    let p = byte_zero_filter();
    let code = execute(&p, &record(Architecture::X32, 0), &config).unwrap();
    assert_eq!(code.value, ACTION_ALLOW);

    let config = SimConfig { step_limit: Some(2), ..SimConfig::default() };
    expect_program_error(
      execute(&p, &record(Architecture::X32, 0), &config),
      ProgramErrorCause::StepLimitExceeded(2),
      2
    );
  }

  #[test]
  fn state_starts_zeroed(){
    let p = program(vec![Return { k: 0 }]);
    let r = record(Architecture::X32, 0);
    let config = SimConfig::default();
    let mut simulator = Simulator::new(&p, &r, &config);

    assert_eq!(*simulator.state(), SimulatorState::default());
    simulator.run().unwrap();
    assert_eq!(simulator.state().scratch, [0; SCRATCH_SIZE]);
  }

  #[test]
  fn display_highlights_current_instruction(){
    let p = byte_zero_filter();
    let r = record(Architecture::X32, 0);
    let config = SimConfig::default();
    let mut simulator = Simulator::new(&p, &r, &config);
    simulator.run().unwrap();

    let text = simulator.to_string();
    assert!(text.contains("* --> P[2] ="));
    assert!(text.contains("ret #0x7fff0000"));
    assert!(text.contains("M[15] ="));
  }

}
