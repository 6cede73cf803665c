//! Options of the command-line interface.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::engine::ToolLog;

/// The trace level / verbosity for the logging framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TraceLevel {
    /// Turn logging off.
    Off,
    /// Only print errors.
    #[default]
    Error,
    /// Print errors and warnings.
    Warn,
    /// Print errors, warnings and useful information.
    Info,
    /// Print errors, warnings, useful and debug information.
    Debug,
    /// Print all information, including the lines exchanged with gr1c.
    Trace,
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => write!(f, "{}", value.get_name()),
            None => Err(fmt::Error),
        }
    }
}

impl From<TraceLevel> for log::LevelFilter {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Off => Self::Off,
            TraceLevel::Error => Self::Error,
            TraceLevel::Warn => Self::Warn,
            TraceLevel::Info => Self::Info,
            TraceLevel::Debug => Self::Debug,
            TraceLevel::Trace => Self::Trace,
        }
    }
}

/// Diagnostic output requested from gr1c.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ToolLogLevel {
    /// No diagnostics.
    Off,
    /// Write the gr1c log.
    #[default]
    Log,
    /// Write a verbose gr1c log.
    Verbose,
}

impl From<ToolLogLevel> for ToolLog {
    fn from(level: ToolLogLevel) -> Self {
        match level {
            ToolLogLevel::Off => ToolLog::Off,
            ToolLogLevel::Log => ToolLog::Log,
            ToolLogLevel::Verbose => ToolLog::Verbose,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct CliOptions {
    /// The trace level to use for instantiating the logging framework.
    #[arg(short = 't', long = "trace", value_enum, default_value_t = TraceLevel::default(), global = true)]
    pub trace_level: TraceLevel,
    /// The gr1c executable.
    #[arg(long = "gr1c", env = "GR1C", default_value = "gr1c", global = true)]
    pub gr1c: PathBuf,
    /// Diagnostic output requested from gr1c.
    #[arg(long = "tool-log", value_enum, default_value_t = ToolLogLevel::default(), global = true)]
    pub tool_log: ToolLogLevel,
    /// Keep the files passed to gr1c in this directory.
    #[arg(long = "work-dir", global = true)]
    pub work_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the gr1c specification of a gridworld.
    Spec(SpecArgs),
    /// Synthesize a strategy for a gridworld and print it as XML.
    Synth(WorldArgs),
    /// Synthesize a strategy, block a cell and patch the strategy.
    Block(BlockArgs),
    /// Print a random gridworld.
    Random(RandomArgs),
}

#[derive(Debug, Clone, Args)]
pub struct WorldArgs {
    /// File with the gridworld description.
    pub world: PathBuf,
    /// Encode cells by one boolean variable each.
    #[arg(long = "bool")]
    pub boolean: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SpecArgs {
    #[command(flatten)]
    pub world: WorldArgs,
    /// Visit the goals in the order they are given.
    #[arg(long = "ordered-goals")]
    pub ordered_goals: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BlockArgs {
    #[command(flatten)]
    pub world: WorldArgs,
    /// Row of the blocked cell, negative values count from the end.
    #[arg(allow_negative_numbers = true)]
    pub row: isize,
    /// Column of the blocked cell, negative values count from the end.
    #[arg(allow_negative_numbers = true)]
    pub col: isize,
    /// Chebyshev radius of the patched neighborhood.
    #[arg(short = 'r', long = "radius", default_value_t = 1)]
    pub radius: usize,
}

#[derive(Debug, Clone, Args)]
pub struct RandomArgs {
    pub rows: usize,
    pub cols: usize,
    /// Ratio of walls to cells.
    #[arg(short = 'd', long = "density", default_value_t = 0.2)]
    pub density: f64,
    /// Number of initial cells.
    #[arg(long = "init", default_value_t = 1)]
    pub num_init: usize,
    /// Number of goals.
    #[arg(long = "goals", default_value_t = 2)]
    pub num_goals: usize,
    /// Number of trolls of radius 1.
    #[arg(long = "trolls", default_value_t = 0)]
    pub num_trolls: usize,
    /// Keep all initial cells and goals mutually reachable.
    #[arg(long = "feasible")]
    pub feasible: bool,
    /// Seconds after which the search for a feasible world gives up.
    #[arg(long = "timeout", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,
    /// Seed of the random number generator.
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

fn parse_seconds(arg: &str) -> Result<Duration, String> {
    let secs: f64 = arg.parse().map_err(|e| format!("{}", e))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("invalid number of seconds: {}", arg));
    }
    Ok(Duration::from_secs_f64(secs))
}
