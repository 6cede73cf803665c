//! Synthesis and incremental patching of GR(1) strategies.
//!
//! The crate models strategies as [`Automaton`]s, specifications as
//! [`GrSpec`]s and robot workspaces as [`GridWorld`]s. Strategies are
//! synthesized by an external [`SynthesisEngine`], by default the gr1c
//! tool, and repaired after local changes by the routines of
//! [`incremental`].

pub mod automaton;
pub mod engine;
pub mod gridworld;
pub mod incremental;
pub mod options;
pub mod partition;
pub mod spec;

use std::fmt::{self, Display};

pub use automaton::{Automaton, NodeId, State};
pub use engine::{Gr1cConfig, Gr1cProcess, Gr1cSession, SynthesisEngine, ToolLog};
pub use gridworld::{Cell, GridWorld};
pub use incremental::PatchError;
pub use spec::{Domain, GrSpec};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Status {
    Realizable,
    Unrealizable,
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Status::Realizable => "REALIZABLE",
                Status::Unrealizable => "UNREALIZABLE",
            }
        )
    }
}

impl From<bool> for Status {
    fn from(realizable: bool) -> Self {
        if realizable {
            Status::Realizable
        } else {
            Status::Unrealizable
        }
    }
}

/// Outcome of synthesizing or patching a strategy.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    status: Status,
    strategy: Option<Automaton>,
}

impl SynthesisResult {
    fn realizable(strategy: Automaton) -> Self {
        Self {
            status: Status::Realizable,
            strategy: Some(strategy),
        }
    }

    fn unrealizable() -> Self {
        Self {
            status: Status::Unrealizable,
            strategy: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn strategy(&self) -> Option<&Automaton> {
        self.strategy.as_ref()
    }

    pub fn into_strategy(self) -> Option<Automaton> {
        self.strategy
    }
}

impl From<Option<Automaton>> for SynthesisResult {
    fn from(strategy: Option<Automaton>) -> Self {
        match strategy {
            Some(aut) => Self::realizable(aut),
            None => Self::unrealizable(),
        }
    }
}

/// Synthesize a strategy for a robot in `world`.
///
/// # Errors
///
/// Returns an error if the world has initial cells or goals outside of
/// it, or if the engine cannot be run.
pub fn synthesize_world<E: SynthesisEngine + ?Sized>(
    engine: &E,
    world: &GridWorld,
    options: &gridworld::SpecOptions,
) -> Result<SynthesisResult, PatchError> {
    let spec = world.spec(options)?;
    Ok(engine.synthesize(&spec)?.into())
}
