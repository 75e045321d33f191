/*!

  The simulator executes a small subset of classic BPF, the bytecode that kernel syscall
  filters are written in. Instructions are fixed-width 64 bit records (see `binary`):

    Code:      16 bits  (class + size + mode/operation + source)
    JumpTrue:   8 bits
    JumpFalse:  8 bits
    K:         32 bits  (immediate, byte offset, or jump distance depending on the code)

  On the wire the code is just a number. Once loaded, each record is decoded into an
  `Instruction`, an enum with one variant per supported opcode holding only the operands
  that opcode uses. Codes the simulator does not implement are not rejected at load time;
  they decode to `Instruction::Unsupported` and only become an error if execution reaches
  them. This keeps the engine's dispatch an exhaustive `match` instead of a numeric switch
  with a default arm.

*/

mod binary;
mod instruction;

pub use binary::{
  encode_program, parse_raw_instruction, RawInstruction, Word, INSTRUCTION_SIZE
};
pub use instruction::{
  Instruction, Opcode,
  BPF_ABS, BPF_JA, BPF_JEQ, BPF_JGE, BPF_JGT, BPF_JMP, BPF_K, BPF_LD, BPF_RET, BPF_W
};
