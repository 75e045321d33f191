/*!
  This module is responsible for the encoding and decoding of binary instruction records.

  A program file is nothing but a sequence of these records with no header and no count.
  Every record is 8 bytes, little-endian:

    [Code:16][JumpTrue:8][JumpFalse:8][K:32]
*/

use nom::{
  combinator::map,
  number::complete::{le_u16, le_u32, le_u8},
  sequence::tuple,
  IResult,
};

// If you change this you must also change `parse_raw_instruction` and `encode`.
pub type Word = u32;

/// Size in bytes of one encoded instruction record.
pub const INSTRUCTION_SIZE: usize = 8;

/// An instruction record exactly as it appears on the wire, before the opcode is interpreted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct RawInstruction {
  pub code : u16,
  pub jt   : u8,
  pub jf   : u8,
  pub k    : Word,
}

impl RawInstruction {
  pub fn new(code: u16, jt: u8, jf: u8, k: Word) -> RawInstruction {
    RawInstruction { code, jt, jf, k }
  }

  pub fn encode(&self) -> [u8; INSTRUCTION_SIZE] {
    let mut bytes = [0u8; INSTRUCTION_SIZE];
    bytes[0..2].copy_from_slice(&self.code.to_le_bytes());
    bytes[2] = self.jt;
    bytes[3] = self.jf;
    bytes[4..8].copy_from_slice(&self.k.to_le_bytes());
    bytes
  }
}

/**
  Parses one complete record from the front of `input`. Fewer than `INSTRUCTION_SIZE` bytes is
  a parse error rather than `Incomplete`, which is what lets the loader drop a trailing
  partial record.
*/
pub fn parse_raw_instruction(input: &[u8]) -> IResult<&[u8], RawInstruction> {
  map(
    tuple((le_u16, le_u8, le_u8, le_u32)),
    |(code, jt, jf, k)| RawInstruction { code, jt, jf, k }
  )(input)
}

/// Encodes a sequence of records into a program image.
pub fn encode_program<'a, I>(instructions: I) -> Vec<u8>
  where I: IntoIterator<Item = &'a RawInstruction>
{
  instructions
    .into_iter()
    .flat_map(|raw| raw.encode().to_vec())
    .collect()
}
