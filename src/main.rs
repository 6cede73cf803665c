//! gr1patch binary crate.

use std::io::{self, Write};

use clap::Parser;
use fs_err as fs;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use gr1patch::automaton::XmlVersion;
use gr1patch::engine::{EngineError, Gr1cConfig, Gr1cProcess, SynthesisEngine};
use gr1patch::gridworld::generate::{Generated, RandomWorld};
use gr1patch::gridworld::troll::{add_trolls, MGridWorld};
use gr1patch::gridworld::{GridWorldError, SpecOptions};
use gr1patch::incremental::{unreachable_cell_discrete, PatchError};
use gr1patch::options::{BlockArgs, CliOptions, Command, RandomArgs, SpecArgs, TraceLevel, WorldArgs};
use gr1patch::{GrSpec, State, Status, SynthesisResult};

/// Prefix of the variables of the controlled robot.
const ROBOT_PREFIX: &str = "Y";
/// Prefix of the variables of trolls.
const TROLL_PREFIX: &str = "X";

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    GridWorld(#[from] GridWorldError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

fn main() {
    if let Err(error) = gr1patch_main() {
        // discard result as we cannot further propagate a write error
        let _ = writeln!(io::stderr(), "Error: {}", error);
        std::process::exit(1);
    }
}

/// Initialize the logging framework with the given trace level.
///
/// # Errors
///
/// Returns an error if the logging framework has already been initialized.
fn initialize_logging(level: TraceLevel) -> io::Result<()> {
    env_logger::builder()
        .filter(None, level.into())
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}

/// Main function that parses the options and runs the selected command.
///
/// # Errors
///
/// Returns an error if a file cannot be read, a world is malformed or
/// gr1c cannot be run.
fn gr1patch_main() -> Result<(), MainError> {
    let options = CliOptions::parse();
    initialize_logging(options.trace_level)?;

    let engine = Gr1cProcess::new(Gr1cConfig {
        program: options.gr1c.clone(),
        tool_log: options.tool_log.into(),
        work_dir: options.work_dir.clone(),
        ..Gr1cConfig::default()
    });
    match &options.command {
        Command::Spec(args) => print_spec(args),
        Command::Synth(args) => synth(&engine, args),
        Command::Block(args) => block(&engine, args),
        Command::Random(args) => random(args),
    }
}

/// The world of a description file with its specification and the
/// possible states of its trolls.
fn load_world(
    args: &WorldArgs,
    ordered_goals: bool,
) -> Result<(MGridWorld, GrSpec, Vec<Vec<State>>), MainError> {
    let desc = fs::read_to_string(&args.world)?;
    let mworld = MGridWorld::loads(&desc, ROBOT_PREFIX)?;
    let nonbool = !args.boolean;
    let (spec, moves) = if mworld.trolls.is_empty() {
        let options = SpecOptions {
            nonbool,
            ordered_goals,
            ..SpecOptions::default()
        };
        (mworld.world.spec(&options)?, Vec::new())
    } else {
        add_trolls(&mworld.world, &mworld.trolls, TROLL_PREFIX, false, nonbool)?
    };
    info!(
        "Loaded {}x{} world with {} trolls",
        mworld.world.size().0,
        mworld.world.size().1,
        mworld.trolls.len()
    );
    Ok((mworld, spec, moves))
}

fn print_result(result: &SynthesisResult) -> io::Result<()> {
    writeln!(io::stdout(), "{}", result.status())?;
    if let Some(strategy) = result.strategy() {
        write!(io::stdout(), "{}", strategy.to_xml(XmlVersion::V1))?;
    }
    Ok(())
}

fn print_spec(args: &SpecArgs) -> Result<(), MainError> {
    let (_, spec, _) = load_world(&args.world, args.ordered_goals)?;
    write!(io::stdout(), "{}", spec.to_gr1c())?;
    Ok(())
}

fn synth(engine: &impl SynthesisEngine, args: &WorldArgs) -> Result<(), MainError> {
    let (_, spec, _) = load_world(args, false)?;
    let result = SynthesisResult::from(engine.synthesize(&spec)?);
    print_result(&result)?;
    Ok(())
}

fn block(engine: &impl SynthesisEngine, args: &BlockArgs) -> Result<(), MainError> {
    let (mut mworld, spec, moves) = load_world(&args.world, false)?;
    let aut = match engine.synthesize(&spec)? {
        Some(aut) => aut,
        None => {
            writeln!(io::stdout(), "{}", Status::Unrealizable)?;
            return Ok(());
        }
    };
    let cell = (args.row, args.col);
    mworld.world.set_occupied(cell)?;
    let patched = unreachable_cell_discrete(
        engine,
        &spec,
        &aut,
        &mworld.world,
        cell,
        args.radius,
        &moves,
        !args.world.boolean,
    )?;
    print_result(&SynthesisResult::from(patched))?;
    Ok(())
}

fn random(args: &RandomArgs) -> Result<(), MainError> {
    let params = RandomWorld {
        size: (args.rows, args.cols),
        wall_density: args.density,
        num_init: args.num_init,
        num_goals: args.num_goals,
        prefix: ROBOT_PREFIX.to_string(),
        ensure_feasible: args.feasible,
        timeout: args.timeout,
        num_trolls: args.num_trolls,
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    match params.generate(&mut rng) {
        Generated::Static(world) => write!(io::stdout(), "{}", world.dumps())?,
        Generated::Moving(mworld) => write!(io::stdout(), "{}", mworld.dumps())?,
        Generated::TimedOut => writeln!(io::stdout(), "TIMEOUT")?,
        Generated::Infeasible => writeln!(io::stdout(), "INFEASIBLE")?,
    }
    Ok(())
}
