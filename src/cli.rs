/*!
  The command line front end. It turns `argv` into a `SimConfig`, the path of the program file
  and a `SyscallRecord`, and nothing more.

  Options are applied in the order they were given, so `-m` after one of `-0`..`-5` reaches the
  record builder after an argument has been set and is rejected there. A repeated option is
  applied again at each of its positions, so its last value wins. Numbers are read the way C's
  `strtol(.., 0)` reads them: `0x` for hexadecimal, a leading `0` for octal, decimal otherwise,
  and a leading `-` is a value rather than a flag.
*/

use std::convert::TryFrom;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use nom::{
  branch::alt,
  bytes::complete::tag,
  character::complete::{char as one_char, digit1, hex_digit1, oct_digit1},
  combinator::{all_consuming, map_res, opt},
  sequence::{pair, preceded},
  IResult,
};

use crate::config::{Architecture, SimConfig};
use crate::error::{SimError, UsageError};
use crate::syscall::{SyscallRecord, SyscallRecordBuilder, SYSCALL_ARG_COUNT};

const USAGE: &str =
  "bpf-sim [-m {32,64}] -f <bpf_file> [-v] -s <syscall_num> [-0 <a0>] ... [-5 <a5>]";

const ARG_IDS: [&str; SYSCALL_ARG_COUNT] = ["arg0", "arg1", "arg2", "arg3", "arg4", "arg5"];

#[derive(Parser, Debug)]
#[command(
  name = "bpf-sim",
  about = "Run a seccomp BPF filter against a synthetic syscall",
  override_usage = USAGE,
  args_override_self = true
)]
pub struct Cli {
  /// Architecture of the simulated syscall
  #[arg(short = 'm', value_name = "32|64", value_parser = parse_architecture)]
  pub machine   : Vec<Architecture>,

  /// Raw BPF program file
  #[arg(short = 'f', value_name = "bpf_file")]
  pub file      : PathBuf,

  /// Report numeric causes and failing instructions
  #[arg(short = 'v')]
  pub verbose   : bool,

  /// Syscall number
  #[arg(short = 's', value_name = "syscall_num", value_parser = parse_number, allow_hyphen_values = true)]
  pub syscall   : Vec<u64>,

  #[arg(short = '0', value_name = "a0", value_parser = parse_number, allow_hyphen_values = true)]
  pub arg0      : Vec<u64>,
  #[arg(short = '1', value_name = "a1", value_parser = parse_number, allow_hyphen_values = true)]
  pub arg1      : Vec<u64>,
  #[arg(short = '2', value_name = "a2", value_parser = parse_number, allow_hyphen_values = true)]
  pub arg2      : Vec<u64>,
  #[arg(short = '3', value_name = "a3", value_parser = parse_number, allow_hyphen_values = true)]
  pub arg3      : Vec<u64>,
  #[arg(short = '4', value_name = "a4", value_parser = parse_number, allow_hyphen_values = true)]
  pub arg4      : Vec<u64>,
  #[arg(short = '5', value_name = "a5", value_parser = parse_number, allow_hyphen_values = true)]
  pub arg5      : Vec<u64>,

  /// Stop with a program error after this many instructions
  #[arg(long = "max-steps", value_name = "n", value_parser = parse_number, allow_hyphen_values = true)]
  pub max_steps : Option<u64>,
}

/// Everything a run needs, parsed and validated.
#[derive(Debug)]
pub struct Invocation {
  pub config : SimConfig,
  pub file   : PathBuf,
  pub record : SyscallRecord,
}

/// One option that feeds the syscall record, in command line order.
#[derive(Clone, Copy, Debug)]
enum Setting {
  Architecture(Architecture),
  Syscall(u64),
  Arg(usize, u64),
}

impl Invocation {
  pub fn parse_from<I, T>(args: I) -> Result<Invocation, SimError>
    where I: IntoIterator<Item = T>,
          T: Into<OsString> + Clone
  {
    let matches = Cli::command()
      .try_get_matches_from(args)
      .map_err(|e| UsageError::BadCommandLine(e.render().to_string()))?;
    let cli = Cli::from_arg_matches(&matches)
      .map_err(|e| UsageError::BadCommandLine(e.render().to_string()))?;

    let config = SimConfig {
      verbose    : cli.verbose,
      step_limit : cli.max_steps,
      ..SimConfig::default()
    };

    let mut builder = SyscallRecordBuilder::new(&config);
    for setting in cli.settings(&matches) {
      match setting {
        Setting::Architecture(architecture) => { builder.architecture(architecture)?; }
        Setting::Syscall(number)            => { builder.syscall(number as u32); }
        Setting::Arg(index, value)          => { builder.arg(index, value)?; }
      }
    }

    Ok(Invocation {
      config,
      file   : cli.file,
      record : builder.build(),
    })
  }
}

impl Cli {
  fn args(&self) -> [&[u64]; SYSCALL_ARG_COUNT] {
    [
      self.arg0.as_slice(), self.arg1.as_slice(), self.arg2.as_slice(),
      self.arg3.as_slice(), self.arg4.as_slice(), self.arg5.as_slice(),
    ]
  }

  /**
    Every occurrence of a record-building option, sorted by its position on the command line.
    Repeated options each keep their own position, so `-0 1 -m 64 -0 2` still puts `-m` after
    an argument.
  */
  fn settings(&self, matches: &ArgMatches) -> Vec<Setting> {
    let mut settings: Vec<(usize, Setting)> = Vec::new();

    settings.extend(
      occurrences(matches, "machine", self.machine.as_slice())
        .map(|(index, architecture)| (index, Setting::Architecture(architecture)))
    );
    settings.extend(
      occurrences(matches, "syscall", self.syscall.as_slice())
        .map(|(index, number)| (index, Setting::Syscall(number)))
    );
    for (i, (values, id)) in self.args().iter().zip(ARG_IDS.iter()).enumerate() {
      settings.extend(
        occurrences(matches, id, *values).map(|(index, value)| (index, Setting::Arg(i, value)))
      );
    }

    settings.sort_by_key(|(index, _)| *index);
    settings.into_iter().map(|(_, setting)| setting).collect()
  }
}

/// Pairs each value of `id` with its command line index.
fn occurrences<'a, T: Copy + 'a>(
  matches : &'a ArgMatches,
  id      : &str,
  values  : &'a [T]
) -> impl Iterator<Item = (usize, T)> + 'a
{
  matches.indices_of(id).into_iter().flatten().zip(values.iter().copied())
}

// region Number parsing

fn unsigned_number(input: &str) -> IResult<&str, u64> {
  alt((
    map_res(
      preceded(alt((tag("0x"), tag("0X"))), hex_digit1),
      |digits: &str| u64::from_str_radix(digits, 16)
    ),
    map_res(
      preceded(tag("0"), oct_digit1),
      |digits: &str| u64::from_str_radix(digits, 8)
    ),
    map_res(digit1, |digits: &str| digits.parse::<u64>()),
  ))(input)
}

/// A C-style integer literal. A leading `-` wraps, as assigning a negative `long` to an
/// unsigned field does.
pub fn parse_number(text: &str) -> Result<u64, String> {
  match all_consuming(pair(opt(one_char('-')), unsigned_number))(text.trim()) {
    Ok((_, (None, value)))    => Ok(value),
    Ok((_, (Some(_), value))) => Ok(value.wrapping_neg()),
    Err(_)                    => Err(format!("`{}` is not a number", text)),
  }
}

fn parse_architecture(text: &str) -> Result<Architecture, String> {
  let bits = parse_number(text)?;
  Architecture::try_from(bits).map_err(|e| e.to_string())
}

// endregion
