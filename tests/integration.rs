//! Integration tests that run the gr1c engine client against a scripted
//! stand-in for gr1c.
#![cfg(unix)]

use std::path::{Path, PathBuf};

use fs_err as fs;
use tempfile::TempDir;

use gr1patch::engine::{ChangeCommand, Gr1cConfig, Gr1cProcess, SynthesisEngine, ToolLog};
use gr1patch::incremental::{add_sys_goal, patch_local_fixpoint, rm_sys_goal, unreachable_cell_discrete};
use gr1patch::{synthesize_world, Automaton, Domain, GrSpec, GridWorld, NodeId, State, Status};

fn state(pairs: &[(&str, i64)]) -> State {
    pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
}

/// The strategy that gr1c synthesizes for [`reference_spec`].
fn golden() -> Automaton {
    let mut aut = Automaton::new();
    aut.add_node(NodeId::new(0), &state(&[("x", 1), ("y", 1)]), vec![NodeId::new(1), NodeId::new(2)]);
    aut.add_node(NodeId::new(1), &state(&[("x", 0), ("y", 1)]), vec![NodeId::new(1), NodeId::new(2)]);
    aut.add_node(NodeId::new(2), &state(&[("x", 1), ("y", 0)]), vec![NodeId::new(1), NodeId::new(0)]);
    aut
}

fn reference_spec() -> GrSpec {
    GrSpec::new()
        .with_env_vars(vec!["x"], Domain::Boolean)
        .with_sys_vars(vec!["y"], Domain::Boolean)
        .with_env_init("x")
        .with_env_prog("x")
        .with_sys_init("y")
        .with_sys_prog(vec!["y & x", "!y"])
}

/// An engine running the fake gr1c, which records its calls in a
/// temporary directory.
struct Fake {
    log: TempDir,
    engine: Gr1cProcess,
}

impl Fake {
    fn new(tool_log: ToolLog, work_dir: Option<PathBuf>) -> Self {
        let log = tempfile::tempdir().unwrap();
        let script = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fake-gr1c.sh");
        let engine = Gr1cProcess::new(Gr1cConfig {
            program: PathBuf::from("sh"),
            args: vec![script.into_os_string(), log.path().as_os_str().to_owned()],
            tool_log,
            work_dir,
        });
        Fake { log, engine }
    }

    fn recorded(&self, name: &str) -> String {
        fs::read_to_string(self.log.path().join(name)).unwrap()
    }

    fn args(&self) -> Vec<String> {
        self.recorded("args").lines().map(String::from).collect()
    }
}

#[test]
fn test_synthesize_reference() {
    let fake = Fake::new(ToolLog::Log, None);
    let spec = reference_spec();
    let aut = fake.engine.synthesize(&spec).unwrap().unwrap();
    assert_eq!(aut, golden());
    assert!(aut.node(NodeId::new(0)).unwrap().is_initial());
    assert_eq!(fake.args(), vec!["-t", "json", "-l"]);
    assert_eq!(fake.recorded("stdin"), spec.to_gr1c());
}

#[test]
fn test_unrealizable_is_no_result() {
    let fake = Fake::new(ToolLog::Verbose, None);
    let spec = reference_spec().with_sys_init("False");
    assert!(fake.engine.synthesize(&spec).unwrap().is_none());
    assert!(!fake.engine.check_realizable(&spec).unwrap());
    assert!(fake.engine.check_realizable(&reference_spec()).unwrap());
    assert_eq!(fake.args(), vec!["-r", "-l", "-vv"]);
}

#[test]
fn test_check_syntax() {
    let fake = Fake::new(ToolLog::Off, None);
    assert!(fake.engine.check_syntax(&reference_spec().to_gr1c()).unwrap());
    assert_eq!(fake.args(), vec!["-s"]);
    assert!(!fake.engine.check_syntax("SYS: y;\n").unwrap());
}

#[test]
fn test_reachability_game() {
    let fake = Fake::new(ToolLog::Verbose, None);
    let spec = reference_spec().with_sys_prog(vec!["y"]);
    let aut = fake.engine.synthesize_reachgame(&spec).unwrap().unwrap();
    assert_eq!(fake.args(), vec!["rg", "-t", "tulip", "-l"]);
    assert!(fake.recorded("stdin").ends_with("SYSGOAL: <>(y);\n"));
    assert_eq!(aut.len(), 1);
    let node = aut.node(NodeId::new(0)).unwrap();
    assert_eq!((node.mode(), node.rgrad()), (0, 1));
}

#[test]
fn test_patch_local_fixpoint() {
    let fake = Fake::new(ToolLog::Log, None);
    let spec = reference_spec();
    let neighborhood = vec![state(&[("x", 1), ("y", 1)]), state(&[("x", 0), ("y", 1)])];
    let commands = vec![
        ChangeCommand::BlockSys(state(&[("y", 0)])),
        ChangeCommand::Restrict(state(&[("x", 1), ("y", 1)]), state(&[("x", 0)])),
    ];
    let patched = patch_local_fixpoint(&fake.engine, &spec, &golden(), &neighborhood, &commands)
        .unwrap()
        .unwrap();
    assert_eq!(patched, golden());

    let args = fake.args();
    assert_eq!(&args[..6], &["patch", "-l", "-t", "json", "-a", "-"]);
    assert_eq!(args[6], "-e");
    assert!(args[7].ends_with("_changefile.edc"));
    assert!(args[8].ends_with("_specfile.spc"));
    // temporary files are gone after the call
    assert!(!Path::new(&args[7]).exists());

    assert_eq!(fake.recorded("changefile"), "1 1\n0 1\nblocksys 0\nrestrict 1 1 0\n");
    assert_eq!(fake.recorded("specfile"), spec.to_gr1c());
    let strategy = fake.recorded("stdin");
    assert_eq!(strategy, golden().to_gr1c_plain(&spec.env_var_names(), &spec.sys_var_names()).unwrap());
    assert!(strategy.starts_with("1\n0 1 1 "));
}

#[test]
fn test_patch_without_neighborhood_skips_engine() {
    let fake = Fake::new(ToolLog::Log, None);
    let block = ChangeCommand::BlockSys(state(&[("y", 0)]));
    let result = patch_local_fixpoint(&fake.engine, &reference_spec(), &golden(), &[], &[block]).unwrap();
    assert!(result.is_none());
    assert!(!fake.log.path().join("args").exists());
}

#[test]
fn test_goal_edits_keep_files_in_work_dir() {
    let work = tempfile::tempdir().unwrap();
    let fake = Fake::new(ToolLog::Off, Some(work.path().to_path_buf()));
    let spec = reference_spec();
    let metric = vec!["x".to_string(), "y".to_string()];

    let added = add_sys_goal(&fake.engine, &spec, &golden(), "y", &metric).unwrap();
    assert_eq!(added, Some(golden()));
    let spec_file = work.path().join("add_sysgoal_specfile.spc");
    assert_eq!(
        fake.args(),
        vec!["patch", "-t", "json", "-a", "-", "-f", "y", "-m", "x y", spec_file.to_str().unwrap()]
    );
    assert_eq!(fs::read_to_string(&spec_file).unwrap(), spec.to_gr1c());

    let removed = rm_sys_goal(&fake.engine, &spec, &golden(), 1).unwrap();
    assert_eq!(removed, Some(golden()));
    let spec_file = work.path().join("rm_sysgoal_specfile.spc");
    assert_eq!(
        fake.args(),
        vec!["patch", "-t", "json", "-a", "-", "-r", "1", spec_file.to_str().unwrap()]
    );
}

#[test]
fn test_patch_rejects_incomplete_strategy() {
    let fake = Fake::new(ToolLog::Log, None);
    let mut aut = Automaton::new();
    aut.add_node(NodeId::new(0), &state(&[("x", 1)]), vec![NodeId::new(0)]);
    let block = ChangeCommand::BlockSys(state(&[("y", 0)]));
    let result = patch_local_fixpoint(&fake.engine, &reference_spec(), &aut, &[state(&[("x", 1), ("y", 1)])], &[block]);
    assert!(result.is_err());
}

#[test]
fn test_block_cell_in_gridworld() {
    let fake = Fake::new(ToolLog::Log, None);
    let world = GridWorld::loads("2 3\nI  \n  G\n", "Y").unwrap();
    let spec = world.spec(&Default::default()).unwrap();
    let mut aut = Automaton::new();
    aut.add_node(NodeId::new(0), &state(&[("Y_r", 0), ("Y_c", 0)]), vec![NodeId::new(0)]);

    unreachable_cell_discrete(&fake.engine, &spec, &aut, &world, (1, 1), 1, &[], true)
        .unwrap()
        .unwrap();
    assert_eq!(
        fake.recorded("changefile"),
        "0 0\n0 1\n0 2\n1 0\n1 1\n1 2\nblocksys 1 1\n"
    );
    assert_eq!(fake.recorded("stdin"), "1\n0 0 0 0 -1 -1 0\n");
}

#[test]
fn test_synthesize_world_through_process() {
    let fake = Fake::new(ToolLog::Log, None);
    let world = GridWorld::loads("1 3\nI*G\n", "Y").unwrap();
    let result = synthesize_world(&fake.engine, &world, &Default::default()).unwrap();
    assert_eq!(result.status(), Status::Realizable);
    assert!(fake.recorded("stdin").contains("SYS: Y_r [0,0] Y_c [0,2];"));
}
