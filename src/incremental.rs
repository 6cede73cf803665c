//! Incremental patching of strategies after changes of the game.
//!
//! Every routine builds a neighborhood of states around the change and
//! hands it to [`SynthesisEngine::patch`], which repairs the strategy
//! locally instead of synthesizing a new one. A routine returns `Ok(None)`
//! when the patch is not possible; callers may then retry with a larger
//! radius or synthesize from scratch.

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};

use crate::automaton::{Automaton, State};
use crate::engine::{ChangeCommand, ChangeFile, EngineError, SynthesisEngine};
use crate::gridworld::{Cell, GridWorld, GridWorldError};
use crate::partition::{GeometryError, Polytope};
use crate::spec::{Domain, GrSpec, SpecError};

/// Volume below which two cells are considered not to overlap.
pub const DEFAULT_ABS_TOL: f64 = 1e-7;

/// Errors raised by the patch routines.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    GridWorld(#[from] GridWorldError),
    #[error("{0} requires a boolean cell encoding")]
    NonBooleanEncoding(&'static str),
    #[error("unknown cell '{0}'")]
    UnknownCell(String),
}

/// Drop a zero-node result, which gr1c may report as a success.
fn nonempty(what: &str, result: Option<Automaton>) -> Option<Automaton> {
    match result {
        Some(aut) if aut.is_empty() => {
            warn!("{} returned a strategy without nodes, treating it as failure", what);
            None
        }
        Some(aut) => Some(aut),
        None => {
            debug!("{} failed", what);
            None
        }
    }
}

/// Patch `aut` locally within `neighborhood` after the edits `commands`.
///
/// An empty neighborhood cannot be patched and yields `None` without
/// calling the engine. Without commands the strategy is returned
/// unchanged.
pub fn patch_local_fixpoint<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &GrSpec,
    aut: &Automaton,
    neighborhood: &[State],
    commands: &[ChangeCommand],
) -> Result<Option<Automaton>, PatchError> {
    if neighborhood.is_empty() {
        debug!("Empty neighborhood, nothing can be patched");
        return Ok(None);
    }
    if commands.is_empty() {
        return Ok(Some(aut.clone()));
    }
    info!(
        "Patching strategy with {} nodes in a neighborhood of {} states",
        aut.len(),
        neighborhood.len()
    );
    let changes = ChangeFile::new(neighborhood.to_vec(), commands.to_vec());
    let patched = engine.patch(spec, aut, &changes)?;
    Ok(nonempty("Patch", patched))
}

/// Add the system goal `goal` to `aut`, see [`SynthesisEngine::add_sys_goal`].
pub fn add_sys_goal<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &GrSpec,
    aut: &Automaton,
    goal: &str,
    metric_vars: &[String],
) -> Result<Option<Automaton>, PatchError> {
    info!("Adding system goal {}", goal);
    let patched = engine.add_sys_goal(spec, aut, goal, metric_vars)?;
    Ok(nonempty("Goal addition", patched))
}

/// Remove the system goal at `index` from `aut`.
pub fn rm_sys_goal<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &GrSpec,
    aut: &Automaton,
    index: usize,
) -> Result<Option<Automaton>, PatchError> {
    info!("Removing system goal {}", index);
    let patched = engine.rm_sys_goal(spec, aut, index)?;
    Ok(nonempty("Goal removal", patched))
}

/// Patch a gridworld strategy after `blocked` has become a wall.
///
/// The neighborhood holds every cell within Chebyshev distance `radius`
/// of the blocked cell. Each list in `nonmetric` gives the possible values
/// of variables without a distance, such as troll positions, and the
/// neighborhood is the product of the cells with all of these lists.
///
/// # Errors
///
/// Returns an error if the blocked cell is outside the world.
#[allow(clippy::too_many_arguments)]
pub fn unreachable_cell_discrete<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &GrSpec,
    aut: &Automaton,
    world: &GridWorld,
    blocked: Cell,
    radius: usize,
    nonmetric: &[Vec<State>],
    nonbool: bool,
) -> Result<Option<Automaton>, PatchError> {
    let (rows, cols) = world.size();
    let (row, col) = world.resolve(blocked)?;
    let rows_near = row.saturating_sub(radius)..=(row + radius).min(rows - 1);
    let mut neighborhood = Vec::new();
    for r in rows_near {
        for c in col.saturating_sub(radius)..=(col + radius).min(cols - 1) {
            neighborhood.push(world.state((r as isize, c as isize), (0, 0), nonbool)?);
        }
    }

    for moves in nonmetric {
        let mut product = Vec::with_capacity(neighborhood.len() * moves.len());
        for independent in moves {
            for state in &neighborhood {
                let mut state = state.clone();
                state.extend(independent.iter().map(|(k, &v)| (k.clone(), v)));
                product.push(state);
            }
        }
        neighborhood = product;
    }

    let block = ChangeCommand::BlockSys(world.state(blocked, (0, 0), nonbool)?);
    patch_local_fixpoint(engine, spec, aut, &neighborhood, &[block])
}

/// Names of the cells that overlap `seed` inflated by `radius`.
fn cells_near<'a>(
    cells: &'a BTreeMap<String, Polytope>,
    seed: &Polytope,
    radius: f64,
    abs_tol: f64,
) -> Result<Vec<&'a str>, GeometryError> {
    let inflated = seed.inflate(radius);
    let mut near = Vec::new();
    for (name, cell) in cells {
        if inflated.intersect(cell)?.volume()? > abs_tol {
            debug!("Including cell {} in neighborhood", name);
            near.push(name.as_str());
        }
    }
    Ok(near)
}

/// The state in which exactly the cell `name` is occupied.
fn occupying<'a, I>(names: I, name: &str) -> State
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .map(|k| (k.clone(), i64::from(k == name)))
        .collect()
}

/// Patch a strategy over a cell decomposition after the cell
/// `blocked_name` has become unreachable.
///
/// `cells` maps each boolean cell variable to its polytope, and a state is
/// determined by the occupied cell alone. The neighborhood holds every
/// cell that overlaps the blocked cell inflated by `radius` with volume
/// above `abs_tol`.
///
/// # Errors
///
/// Returns an error for a non-boolean encoding, an unknown blocked cell,
/// or polytopes whose overlap cannot be measured.
#[allow(clippy::too_many_arguments)]
pub fn unreachable_cell<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &GrSpec,
    aut: &Automaton,
    cells: &BTreeMap<String, Polytope>,
    blocked_name: &str,
    radius: f64,
    abs_tol: f64,
    nonbool: bool,
) -> Result<Option<Automaton>, PatchError> {
    if nonbool {
        return Err(PatchError::NonBooleanEncoding("unreachable_cell"));
    }
    let blocked = cells
        .get(blocked_name)
        .ok_or_else(|| PatchError::UnknownCell(blocked_name.to_string()))?;
    let neighborhood: Vec<State> = cells_near(cells, blocked, radius, abs_tol)?
        .into_iter()
        .map(|name| occupying(cells.keys(), name))
        .collect();
    let block = ChangeCommand::BlockSys(occupying(cells.keys(), blocked_name));
    patch_local_fixpoint(engine, spec, aut, &neighborhood, &[block])
}

/// Patch a strategy after cells have been split into smaller ones.
///
/// `refinements` maps the name of each refined cell of `cells` to its new
/// sub-cells. The new cells become boolean system variables of `spec`, and
/// every node of the strategy starts with them unoccupied. The refined
/// cells are blocked in a neighborhood around them, so that the patch
/// routes through the sub-cells instead. On success the refined cells are
/// removed from `spec` and from the returned strategy; on failure `spec`
/// is left as it was.
///
/// # Errors
///
/// Returns an error for a non-boolean encoding, an unknown refined cell,
/// or polytopes whose overlap cannot be measured.
#[allow(clippy::too_many_arguments)]
pub fn refine_cell<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &mut GrSpec,
    aut: &Automaton,
    cells: &BTreeMap<String, Polytope>,
    refinements: &IndexMap<String, Vec<(String, Polytope)>>,
    radius: f64,
    abs_tol: f64,
    nonbool: bool,
) -> Result<Option<Automaton>, PatchError> {
    if nonbool {
        return Err(PatchError::NonBooleanEncoding("refine_cell"));
    }
    if let Some(name) = refinements.keys().find(|&name| !cells.contains_key(name)) {
        return Err(PatchError::UnknownCell(name.clone()));
    }

    let mut all_cells = cells.clone();
    let mut new_names = IndexSet::new();
    for (name, polytope) in refinements.values().flatten() {
        new_names.insert(name.clone());
        all_cells.insert(name.clone(), polytope.clone());
    }

    let saved = spec.clone();
    for name in refinements.keys().chain(&new_names) {
        if !spec.sys_vars.contains_key(name) {
            spec.sys_vars.insert(name.clone(), Domain::Boolean);
        }
    }
    let mut extended = aut.clone();
    for name in &new_names {
        extended.extend_states(name, 0);
    }

    let outcome = refine_patch(engine, spec, &extended, &all_cells, refinements, radius, abs_tol);
    match outcome {
        Ok(Some(mut patched)) => {
            for name in refinements.keys() {
                patched.remove_variable(name);
                spec.sys_vars.shift_remove(name);
            }
            info!(
                "Refined {} cells into {} new cells",
                refinements.len(),
                new_names.len()
            );
            Ok(Some(patched))
        }
        other => {
            *spec = saved;
            other
        }
    }
}

fn refine_patch<E: SynthesisEngine + ?Sized>(
    engine: &E,
    spec: &GrSpec,
    aut: &Automaton,
    cells: &BTreeMap<String, Polytope>,
    refinements: &IndexMap<String, Vec<(String, Polytope)>>,
    radius: f64,
    abs_tol: f64,
) -> Result<Option<Automaton>, PatchError> {
    let mut near = IndexSet::new();
    for name in refinements.keys() {
        let seed = cells
            .get(name)
            .ok_or_else(|| PatchError::UnknownCell(name.clone()))?;
        near.extend(cells_near(cells, seed, radius, abs_tol)?);
    }
    let neighborhood: Vec<State> = near
        .into_iter()
        .map(|name| occupying(cells.keys(), name))
        .collect();
    let blocks: Vec<ChangeCommand> = refinements
        .keys()
        .map(|name| ChangeCommand::BlockSys(occupying(cells.keys(), name)))
        .collect();
    patch_local_fixpoint(engine, spec, aut, &neighborhood, &blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::automaton::NodeId;
    use std::cell::RefCell;

    /// Engine that records patch requests and answers with a fixed result.
    #[derive(Default)]
    pub(crate) struct RecordingEngine {
        pub answer: Option<Automaton>,
        pub patches: RefCell<Vec<(GrSpec, Automaton, ChangeFile)>>,
        pub goals: RefCell<Vec<String>>,
    }

    impl RecordingEngine {
        pub fn answering(answer: Option<Automaton>) -> Self {
            Self {
                answer,
                ..Self::default()
            }
        }
    }

    impl SynthesisEngine for RecordingEngine {
        fn check_syntax(&self, _text: &str) -> Result<bool, EngineError> {
            Ok(true)
        }

        fn check_realizable(&self, _spec: &GrSpec) -> Result<bool, EngineError> {
            Ok(self.answer.is_some())
        }

        fn synthesize(&self, _spec: &GrSpec) -> Result<Option<Automaton>, EngineError> {
            Ok(self.answer.clone())
        }

        fn synthesize_reachgame(&self, _spec: &GrSpec) -> Result<Option<Automaton>, EngineError> {
            Ok(self.answer.clone())
        }

        fn patch(
            &self,
            spec: &GrSpec,
            aut: &Automaton,
            changes: &ChangeFile,
        ) -> Result<Option<Automaton>, EngineError> {
            // encoding problems surface like in the process engine
            changes.render(spec)?;
            self.patches
                .borrow_mut()
                .push((spec.clone(), aut.clone(), changes.clone()));
            Ok(self.answer.clone())
        }

        fn add_sys_goal(
            &self,
            _spec: &GrSpec,
            _aut: &Automaton,
            goal: &str,
            _metric_vars: &[String],
        ) -> Result<Option<Automaton>, EngineError> {
            self.goals.borrow_mut().push(goal.to_string());
            Ok(self.answer.clone())
        }

        fn rm_sys_goal(
            &self,
            _spec: &GrSpec,
            _aut: &Automaton,
            index: usize,
        ) -> Result<Option<Automaton>, EngineError> {
            self.goals.borrow_mut().push(index.to_string());
            Ok(self.answer.clone())
        }
    }

    fn state(pairs: &[(&str, i64)]) -> State {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    fn single(pairs: &[(&str, i64)]) -> Automaton {
        let mut aut = Automaton::new();
        aut.add_node(NodeId::new(0), &state(pairs), vec![NodeId::new(0)]);
        aut
    }

    fn unit(x: f64, y: f64) -> Polytope {
        Polytope::from_box(&[x, y], &[x + 1.0, y + 1.0])
    }

    /// Three unit cells in a row and one far away.
    fn cells() -> BTreeMap<String, Polytope> {
        vec![
            ("a".to_string(), unit(0.0, 0.0)),
            ("b".to_string(), unit(1.0, 0.0)),
            ("c".to_string(), unit(2.0, 0.0)),
            ("d".to_string(), unit(10.0, 10.0)),
        ]
        .into_iter()
        .collect()
    }

    fn cell_spec(names: &[&str]) -> GrSpec {
        GrSpec::new().with_sys_vars(names.iter().copied(), Domain::Boolean)
    }

    #[test]
    fn test_patch_empty_neighborhood() {
        let engine = RecordingEngine::answering(Some(single(&[("a", 1)])));
        let aut = single(&[("a", 1)]);
        let block = ChangeCommand::BlockSys(state(&[("a", 1)]));
        let result =
            patch_local_fixpoint(&engine, &cell_spec(&["a"]), &aut, &[], &[block]).unwrap();
        assert!(result.is_none());
        assert!(engine.patches.borrow().is_empty());
    }

    #[test]
    fn test_patch_without_changes_is_identity() {
        let engine = RecordingEngine::answering(None);
        let aut = single(&[("a", 1)]);
        let result =
            patch_local_fixpoint(&engine, &cell_spec(&["a"]), &aut, &[state(&[("a", 1)])], &[])
                .unwrap();
        assert_eq!(result, Some(aut));
        assert!(engine.patches.borrow().is_empty());
    }

    #[test]
    fn test_zero_node_result_is_failure() {
        let engine = RecordingEngine::answering(Some(Automaton::new()));
        let aut = single(&[("a", 1)]);
        let block = ChangeCommand::BlockSys(state(&[("a", 1)]));
        let spec = cell_spec(&["a"]);
        let result =
            patch_local_fixpoint(&engine, &spec, &aut, &[state(&[("a", 0)])], &[block]).unwrap();
        assert!(result.is_none());
        assert_eq!(engine.patches.borrow().len(), 1);
        assert!(add_sys_goal(&engine, &spec, &aut, "a", &[]).unwrap().is_none());
        assert!(rm_sys_goal(&engine, &spec, &aut, 0).unwrap().is_none());
        assert_eq!(*engine.goals.borrow(), vec!["a".to_string(), "0".to_string()]);
    }

    #[test]
    fn test_unreachable_cell_discrete() {
        let world = GridWorld::loads("3 3\n   \n   \n   \n", "Y").unwrap();
        let spec = world.spec(&Default::default()).unwrap();
        let aut = single(&[("Y_r", 0), ("Y_c", 0)]);
        let engine = RecordingEngine::answering(Some(aut.clone()));
        let result =
            unreachable_cell_discrete(&engine, &spec, &aut, &world, (0, -1), 1, &[], true).unwrap();
        assert_eq!(result, Some(aut));

        let patches = engine.patches.borrow();
        let changes = &patches[0].2;
        let expected: Vec<State> = vec![(0, 1), (0, 2), (1, 1), (1, 2)]
            .into_iter()
            .map(|(r, c)| state(&[("Y_r", r), ("Y_c", c)]))
            .collect();
        assert_eq!(changes.neighborhood, expected);
        assert_eq!(
            changes.commands,
            vec![ChangeCommand::BlockSys(state(&[("Y_r", 0), ("Y_c", 2)]))]
        );
    }

    #[test]
    fn test_unreachable_cell_discrete_product() {
        let world = GridWorld::loads("1 2\n  \n", "Y").unwrap();
        let mut spec = world.spec(&Default::default()).unwrap();
        spec.env_vars.insert("X_r".to_string(), Domain::Range(0, 1));
        let aut = single(&[("X_r", 0), ("Y_r", 0), ("Y_c", 0)]);
        let engine = RecordingEngine::answering(Some(aut.clone()));
        let trolls = vec![vec![state(&[("X_r", 0)]), state(&[("X_r", 1)])]];
        unreachable_cell_discrete(&engine, &spec, &aut, &world, (0, 1), 0, &trolls, true)
            .unwrap();
        let patches = engine.patches.borrow();
        assert_eq!(
            patches[0].2.neighborhood,
            vec![
                state(&[("X_r", 0), ("Y_r", 0), ("Y_c", 1)]),
                state(&[("X_r", 1), ("Y_r", 0), ("Y_c", 1)]),
            ]
        );
    }

    #[test]
    fn test_unreachable_cell_discrete_out_of_bounds() {
        let world = GridWorld::loads("1 2\n  \n", "Y").unwrap();
        let spec = world.spec(&Default::default()).unwrap();
        let engine = RecordingEngine::default();
        let result =
            unreachable_cell_discrete(&engine, &spec, &Automaton::new(), &world, (1, 0), 1, &[], true);
        assert!(matches!(result, Err(PatchError::GridWorld(_))));
    }

    #[test]
    fn test_unreachable_cell() {
        let spec = cell_spec(&["a", "b", "c", "d"]);
        let aut = single(&[("a", 1), ("b", 0), ("c", 0), ("d", 0)]);
        let engine = RecordingEngine::answering(Some(aut.clone()));
        let result =
            unreachable_cell(&engine, &spec, &aut, &cells(), "b", 0.5, DEFAULT_ABS_TOL, false)
                .unwrap();
        assert_eq!(result, Some(aut));
        let patches = engine.patches.borrow();
        let changes = &patches[0].2;
        assert_eq!(
            changes.neighborhood,
            vec![
                state(&[("a", 1), ("b", 0), ("c", 0), ("d", 0)]),
                state(&[("a", 0), ("b", 1), ("c", 0), ("d", 0)]),
                state(&[("a", 0), ("b", 0), ("c", 1), ("d", 0)]),
            ]
        );
        assert_eq!(
            changes.commands,
            vec![ChangeCommand::BlockSys(state(&[("a", 0), ("b", 1), ("c", 0), ("d", 0)]))]
        );
    }

    #[test]
    fn test_unreachable_cell_small_radius() {
        let spec = cell_spec(&["a", "b", "c", "d"]);
        let aut = single(&[("a", 1), ("b", 0), ("c", 0), ("d", 0)]);
        let engine = RecordingEngine::answering(Some(aut.clone()));
        unreachable_cell(&engine, &spec, &aut, &cells(), "a", 0.0, DEFAULT_ABS_TOL, false)
            .unwrap();
        assert_eq!(engine.patches.borrow()[0].2.neighborhood.len(), 1);
    }

    #[test]
    fn test_unreachable_cell_contract() {
        let spec = cell_spec(&["a"]);
        let engine = RecordingEngine::default();
        let aut = Automaton::new();
        assert!(matches!(
            unreachable_cell(&engine, &spec, &aut, &cells(), "a", 1.0, DEFAULT_ABS_TOL, true),
            Err(PatchError::NonBooleanEncoding(_))
        ));
        assert!(matches!(
            unreachable_cell(&engine, &spec, &aut, &cells(), "e", 1.0, DEFAULT_ABS_TOL, false),
            Err(PatchError::UnknownCell(name)) if name == "e"
        ));
    }

    fn refinement() -> IndexMap<String, Vec<(String, Polytope)>> {
        let mut refinements = IndexMap::new();
        refinements.insert(
            "b".to_string(),
            vec![
                ("b0".to_string(), Polytope::from_box(&[1.0, 0.0], &[1.5, 1.0])),
                ("b1".to_string(), Polytope::from_box(&[1.5, 0.0], &[2.0, 1.0])),
            ],
        );
        refinements
    }

    #[test]
    fn test_refine_cell() {
        let mut spec = cell_spec(&["a", "b", "c", "d"]);
        let aut = single(&[("a", 1), ("b", 0), ("c", 0), ("d", 0)]);
        let answer = single(&[("a", 1), ("b", 0), ("b0", 0), ("b1", 0), ("c", 0), ("d", 0)]);
        let engine = RecordingEngine::answering(Some(answer));
        let result = refine_cell(
            &engine,
            &mut spec,
            &aut,
            &cells(),
            &refinement(),
            0.25,
            DEFAULT_ABS_TOL,
            false,
        )
        .unwrap()
        .unwrap();

        let expected = state(&[("a", 1), ("b0", 0), ("b1", 0), ("c", 0), ("d", 0)]);
        assert_eq!(result.state(NodeId::new(0)), Some(expected));
        assert_eq!(spec.sys_var_names(), vec!["a", "c", "d", "b0", "b1"]);

        let patches = engine.patches.borrow();
        let (patch_spec, patch_aut, changes) = &patches[0];
        assert!(patch_spec.sys_vars.contains_key("b"));
        assert_eq!(patch_aut.state(NodeId::new(0)).unwrap().get("b0"), Some(&0));
        let near: Vec<&str> = changes
            .neighborhood
            .iter()
            .map(|s| s.iter().find(|(_, &v)| v == 1).map(|(k, _)| k.as_str()).unwrap())
            .collect();
        assert_eq!(near, vec!["a", "b", "b0", "b1", "c"]);
        assert_eq!(changes.commands.len(), 1);
    }

    #[test]
    fn test_refine_cell_failure_restores_spec() {
        let mut spec = cell_spec(&["a", "b", "c", "d"]);
        let before = spec.clone();
        let aut = single(&[("a", 1), ("b", 0), ("c", 0), ("d", 0)]);
        let engine = RecordingEngine::answering(None);
        let result = refine_cell(
            &engine,
            &mut spec,
            &aut,
            &cells(),
            &refinement(),
            0.25,
            DEFAULT_ABS_TOL,
            false,
        )
        .unwrap();
        assert!(result.is_none());
        assert_eq!(spec, before);
    }

    #[test]
    fn test_refine_unknown_cell() {
        let mut spec = cell_spec(&["a"]);
        let mut refinements = refinement();
        refinements.insert("z".to_string(), vec![]);
        let engine = RecordingEngine::default();
        assert!(matches!(
            refine_cell(
                &engine,
                &mut spec,
                &Automaton::new(),
                &cells(),
                &refinements,
                1.0,
                DEFAULT_ABS_TOL,
                false
            ),
            Err(PatchError::UnknownCell(name)) if name == "z"
        ));
    }
}
