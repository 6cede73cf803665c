//! Access to an external GR(1) synthesis engine.
//!
//! [`SynthesisEngine`] is the capability used by the patch layer. The
//! process-backed implementation is [`gr1c::Gr1cProcess`]; an interactive
//! session with the same tool is provided by [`session::Gr1cSession`].

pub mod gr1c;
pub mod session;

use std::fmt::{self, Write as _};
use std::io;

use crate::automaton::{Automaton, AutomatonError, State};
use crate::spec::{GrSpec, SpecError};

pub use gr1c::{Gr1cConfig, Gr1cProcess};
pub use session::Gr1cSession;

/// Errors raised while talking to the synthesis engine.
///
/// A failed synthesis or patch is not an error; it is reported as `None`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Automaton(#[from] AutomatonError),
    #[error("goal mode {mode} out of range for {num_goals} goals")]
    InvalidGoalMode { mode: i64, num_goals: i64 },
    #[error("unexpected response from engine: {0}")]
    Protocol(String),
    #[error("session has no engine process")]
    NoProcess,
}

/// Amount of diagnostic output requested from the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ToolLog {
    Off,
    Log,
    Verbose,
}

impl ToolLog {
    /// Command-line flags of gr1c for this level.
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            ToolLog::Off => &[],
            ToolLog::Log => &["-l"],
            ToolLog::Verbose => &["-l", "-vv"],
        }
    }
}

impl Default for ToolLog {
    fn default() -> Self {
        ToolLog::Log
    }
}

impl fmt::Display for ToolLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolLog::Off => "off",
            ToolLog::Log => "log",
            ToolLog::Verbose => "verbose",
        };
        write!(f, "{}", name)
    }
}

/// An edit of the game graph, applied by a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCommand {
    /// Forbid the system from moving into any state with this system part.
    BlockSys(State),
    /// Remove the edge between two states. The second state may give
    /// the environment part only.
    Restrict(State, State),
    /// Add the edge between two states. The second state may give the
    /// environment part only.
    Relax(State, State),
}

impl ChangeCommand {
    pub fn keyword(&self) -> &'static str {
        match self {
            ChangeCommand::BlockSys(_) => "blocksys",
            ChangeCommand::Restrict(..) => "restrict",
            ChangeCommand::Relax(..) => "relax",
        }
    }
}

/// Neighborhood and edge changes handed to a local patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFile {
    pub neighborhood: Vec<State>,
    pub commands: Vec<ChangeCommand>,
}

impl ChangeFile {
    pub fn new(neighborhood: Vec<State>, commands: Vec<ChangeCommand>) -> Self {
        Self {
            neighborhood,
            commands,
        }
    }

    /// Write the change file in the format read by `gr1c patch -e`.
    ///
    /// Every neighborhood state is one line with its full state vector.
    /// Command lines follow, with states as positional vectors over the
    /// variables of `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if a state lacks a variable it has to provide.
    pub fn render(&self, spec: &GrSpec) -> Result<String, SpecError> {
        let join = |v: Vec<i64>| {
            v.iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut out = String::new();
        for state in &self.neighborhood {
            let _ = writeln!(out, "{}", join(spec.state_vector(state)?));
        }
        for cmd in &self.commands {
            match cmd {
                ChangeCommand::BlockSys(state) => {
                    let _ = writeln!(out, "{} {}", cmd.keyword(), join(spec.sys_vector(state)?));
                }
                ChangeCommand::Restrict(from, to) | ChangeCommand::Relax(from, to) => {
                    let mut target = spec.env_vector(to)?;
                    if to.len() > spec.env_vars.len() {
                        target.extend(spec.sys_vector(to)?);
                    }
                    let _ = writeln!(
                        out,
                        "{} {} {}",
                        cmd.keyword(),
                        join(spec.state_vector(from)?),
                        join(target)
                    );
                }
            }
        }
        Ok(out)
    }
}

/// A GR(1) synthesis engine.
///
/// Methods return `Ok(None)` when the engine finds no strategy or fails to
/// run, and `Err` only for local problems such as unreadable temporary
/// files or states that cannot be encoded.
pub trait SynthesisEngine {
    /// Check that a specification text is syntactically correct.
    fn check_syntax(&self, text: &str) -> Result<bool, EngineError>;

    /// Decide realizability without constructing a strategy.
    fn check_realizable(&self, spec: &GrSpec) -> Result<bool, EngineError>;

    /// Synthesize a strategy.
    fn synthesize(&self, spec: &GrSpec) -> Result<Option<Automaton>, EngineError>;

    /// Synthesize a strategy for the reachability game in which the single
    /// system goal has to be reached once.
    fn synthesize_reachgame(&self, spec: &GrSpec) -> Result<Option<Automaton>, EngineError>;

    /// Patch `aut` locally around the states and edits of `changes`.
    fn patch(
        &self,
        spec: &GrSpec,
        aut: &Automaton,
        changes: &ChangeFile,
    ) -> Result<Option<Automaton>, EngineError>;

    /// Extend `aut` by a new system goal, preferring to stay close in the
    /// given metric variables.
    fn add_sys_goal(
        &self,
        spec: &GrSpec,
        aut: &Automaton,
        goal: &str,
        metric_vars: &[String],
    ) -> Result<Option<Automaton>, EngineError>;

    /// Remove the system goal at `index` from `aut`.
    fn rm_sys_goal(
        &self,
        spec: &GrSpec,
        aut: &Automaton,
        index: usize,
    ) -> Result<Option<Automaton>, EngineError>;
}
