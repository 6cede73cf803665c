//! Paths of robots through gridworlds, as read from strategies.

use std::collections::BTreeSet;

use log::debug;

use super::{Cell, GridWorld};
use crate::automaton::{Automaton, NodeId, State};

/// Extract `(prefix, row, column)` from a cell variable or formula.
///
/// In the boolean encoding the name has the form `prefix_R_C`, where
/// `prefix_n_n` is the "nowhere" cell `(-1, -1)`. Otherwise the formula
/// has the form `((prefix_r = R) & (prefix_c = C))`, in either order.
pub fn extract_coord(subf: &str, nonbool: bool) -> Option<(String, isize, isize)> {
    if nonbool {
        let frags: Vec<&str> = subf
            .split('=')
            .map(|s| s.trim().trim_matches(|c| c == '(' || c == ')').trim())
            .collect();
        if frags.len() != 3 {
            return None;
        }
        let row_first = frags[0].ends_with("_r") && frags[1].ends_with("_c");
        let col_first = frags[0].ends_with("_c") && frags[1].ends_with("_r");
        if !row_first && !col_first {
            return None;
        }
        let prefix = &frags[0][..frags[0].rfind('_')?];
        let first = frags[1][..frags[1].find(')')?].trim().parse().ok()?;
        let second = frags[2].parse().ok()?;
        if row_first {
            Some((prefix.to_string(), first, second))
        } else {
            Some((prefix.to_string(), second, first))
        }
    } else {
        let frags: Vec<&str> = subf.split('_').collect();
        let n = frags.len();
        if n < 3 {
            return None;
        }
        let prefix = frags[..n - 2].join("_");
        if frags[n - 1] == "n" && frags[n - 2] == "n" {
            return Some((prefix, -1, -1));
        }
        let row = frags[n - 2].parse().ok()?;
        let col = frags[n - 1].parse().ok()?;
        Some((prefix, row, col))
    }
}

/// The entries of a state whose variable names start with `prefix`.
pub fn prefix_filt(state: &State, prefix: &str) -> State {
    state
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .map(|(k, &v)| (k.clone(), v))
        .collect()
}

/// Follow a strategy from node 0 along first successors and record the
/// cell that holds in each visited node.
///
/// Cells are read from true boolean cell variables, optionally only those
/// starting with `prefix`. A node without such a variable repeats the last
/// cell, and leading nodes without one take the first known cell. The walk
/// stops at a dead end or when it would revisit a node.
pub fn extract_path(aut: &Automaton, prefix: Option<&str>) -> Vec<Cell> {
    let mut path: Vec<Option<Cell>> = Vec::new();
    let mut last = None;
    let mut id = NodeId::new(0);
    let mut visited = BTreeSet::new();
    visited.insert(id);
    while let Some(state) = aut.state(id) {
        let mut updated = false;
        for (name, &value) in &state {
            if value == 0 || !prefix.map_or(true, |p| name.starts_with(p)) {
                continue;
            }
            if let Some((_, row, col)) = extract_coord(name, false) {
                path.push(Some((row, col)));
                last = Some((row, col));
                updated = true;
            }
        }
        if !updated {
            path.push(last);
        }
        match aut.successors(id).next() {
            Some(next) if visited.insert(next) => id = next,
            _ => break,
        }
    }
    let first = match path.iter().flatten().next() {
        Some(&first) => first,
        None => return Vec::new(),
    };
    path.into_iter().map(|c| c.unwrap_or(first)).collect()
}

/// Check that a path visits every goal of the world and never enters a
/// wall. With `sequenced`, the goals must be visited in order.
pub fn verify_path(world: &GridWorld, path: &[Cell], sequenced: bool) -> bool {
    if sequenced {
        let mut goals = world.goal_list.iter().peekable();
        for p in path {
            match goals.peek().copied() {
                None => break,
                Some(g) if g == p => {
                    goals.next();
                }
                Some(_) if goals.clone().any(|g| g == p) => {
                    debug!("Path visits goal {:?} out of order", p);
                    return false;
                }
                Some(_) => {}
            }
        }
        if let Some(g) = goals.peek() {
            debug!("Path does not visit goal {:?}", g);
            return false;
        }
    } else if let Some(g) = world.goal_list.iter().find(|&&g| !path.contains(&g)) {
        debug!("Path does not visit goal {:?}", g);
        return false;
    }
    if let Some(p) = path.iter().find(|&&p| !matches!(world.is_empty(p, true), Ok(true))) {
        debug!("Path intersects obstacle at {:?}", p);
        return false;
    }
    true
}

/// Check that paths of the same length never share a cell at the same time.
pub fn verify_mutex(paths: &[Vec<Cell>]) -> bool {
    let len = match paths.first() {
        Some(p) => p.len(),
        None => return true,
    };
    if paths.iter().any(|p| p.len() != len) {
        debug!("Paths are different lengths");
        return false;
    }
    (0..len).all(|t| {
        let cells: BTreeSet<Cell> = paths.iter().map(|p| p[t]).collect();
        cells.len() == paths.len()
    })
}

/// Remove every time step at which no path moves on the next step.
///
/// The last step is always kept. Paths are cut to the shortest length.
pub fn compress_paths(paths: &[Vec<Cell>]) -> Vec<Vec<Cell>> {
    let len = paths.iter().map(Vec::len).min().unwrap_or(0);
    if len == 0 {
        return Vec::new();
    }
    let step = |t: usize| paths.iter().map(move |p| p[t]);
    let keep: Vec<usize> = (0..len)
        .filter(|&t| t == len - 1 || !step(t).eq(step(t + 1)))
        .collect();
    paths
        .iter()
        .map(|p| keep.iter().map(|&t| p[t]).collect())
        .collect()
}
