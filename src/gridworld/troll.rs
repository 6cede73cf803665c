//! Moving obstacles ("trolls").
//!
//! A troll is an adversarial agent that roams a square home region around
//! its centre and must return to the centre infinitely often. In a
//! description string, `E` marks the centre of a troll of radius 1.

use std::fmt;
use std::str::FromStr;

use log::info;

use super::{Cell, GridWorld, GridWorldError, SpecOptions};
use crate::automaton::State;
use crate::spec::GrSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Troll {
    pub center: Cell,
    /// Extent of the home region in the infinity norm.
    pub radius: usize,
}

impl Troll {
    pub fn new(center: Cell, radius: usize) -> Self {
        Self { center, radius }
    }

    /// Offset and size of the home region, clipped to the world.
    ///
    /// # Errors
    ///
    /// Returns an error if the centre is outside of the world.
    pub fn home(&self, world: &GridWorld) -> Result<((usize, usize), (usize, usize)), GridWorldError> {
        let (rows, cols) = world.size();
        let (row, col) = world.within(self.center).ok_or(GridWorldError::OutOfBounds {
            cell: self.center,
            size: (rows, cols),
        })?;
        let clip = |c: usize, dim: usize| {
            let offset = c.saturating_sub(self.radius);
            let size = (c - offset + self.radius + 1).min(dim - offset);
            (offset, size)
        };
        let (row_offset, row_size) = clip(row, rows);
        let (col_offset, col_size) = clip(col, cols);
        Ok(((row_offset, col_offset), (row_size, col_size)))
    }
}

/// A gridworld with moving obstacles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MGridWorld {
    pub world: GridWorld,
    pub trolls: Vec<Troll>,
}

impl From<GridWorld> for MGridWorld {
    fn from(world: GridWorld) -> Self {
        Self {
            world,
            trolls: Vec::new(),
        }
    }
}

impl MGridWorld {
    /// Parse a gridworld description that may contain `E` cells.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no size line or a row contains an
    /// unrecognized symbol.
    pub fn loads(desc: &str, prefix: &str) -> Result<Self, GridWorldError> {
        let parsed = GridWorld::parse(desc, prefix, true)?;
        Ok(Self {
            world: parsed.world,
            trolls: parsed.troll_cells.into_iter().map(|c| Troll::new(c, 1)).collect(),
        })
    }

    /// Read a description from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load<P: AsRef<std::path::Path>>(path: P, prefix: &str) -> Result<Self, GridWorldError> {
        let desc = fs_err::read_to_string(path.as_ref())?;
        Self::loads(&desc, prefix)
    }

    /// Write the description; only trolls of radius 1 can be written.
    pub fn dumps(&self) -> String {
        self.world.dump_with(|i, j| {
            let cell = (i as isize, j as isize);
            self.trolls
                .iter()
                .any(|t| t.center == cell && t.radius == 1)
                .then(|| 'E')
        })
    }

    /// The specification of the world together with its trolls.
    ///
    /// # Errors
    ///
    /// Returns an error if a troll centre is outside of the world.
    pub fn mspec(&self, troll_prefix: &str) -> Result<GrSpec, GridWorldError> {
        Ok(add_trolls(&self.world, &self.trolls, troll_prefix, false, true)?.0)
    }

    /// Render the world with the home regions of its trolls.
    ///
    /// # Errors
    ///
    /// Returns an error if a troll centre is outside of the world.
    pub fn pretty(&self, show_grid: bool, path: &[Cell], goal_order: bool) -> Result<String, GridWorldError> {
        self.world.pretty(show_grid, path, goal_order, &self.trolls)
    }
}

impl FromStr for MGridWorld {
    type Err = GridWorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::loads(s, "Y")
    }
}

impl fmt::Display for MGridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pretty = self.pretty(true, &[], false).map_err(|_| fmt::Error)?;
        write!(f, "{}", pretty)
    }
}

/// Build the specification of a controlled robot in `world` among trolls.
///
/// Troll `i` moves in its own sub-world named `<prefix>_<i>` as part of the
/// environment. Its goal is its centre, and it starts there or, with
/// `start_anywhere`, in any empty cell of its home region. The robot may
/// never occupy the cell a troll moves to. Trolls may overlap each other.
///
/// Variable names of boolean troll cells use world coordinates. In the
/// integer encoding troll positions are relative to their home region.
///
/// Returns the specification and, per troll, every state the troll can
/// be in.
///
/// # Errors
///
/// Returns an error if a troll centre is outside of the world.
pub fn add_trolls(
    world: &GridWorld,
    trolls: &[Troll],
    prefix: &str,
    start_anywhere: bool,
    nonbool: bool,
) -> Result<(GrSpec, Vec<Vec<State>>), GridWorldError> {
    let mut homes = Vec::with_capacity(trolls.len());
    let mut moves = Vec::with_capacity(trolls.len());
    for (id, troll) in trolls.iter().enumerate() {
        let (offset, size) = troll.home(world)?;
        let offset = (offset.0 as isize, offset.1 as isize);
        let mut sub = world.dumpsubworld(size, offset, &format!("{}_{}", prefix, id), false)?;
        let center = (troll.center.0 - offset.0, troll.center.1 - offset.1);
        sub.goal_list = vec![center];
        sub.init_list = if start_anywhere {
            let (rows, cols) = size;
            (0..rows as isize)
                .flat_map(|i| (0..cols as isize).map(move |j| (i, j)))
                .filter(|&c| sub.is_empty(c, false).unwrap_or(false))
                .collect()
        } else {
            vec![center]
        };
        let state_offset = if nonbool { (0, 0) } else { offset };
        let mut troll_moves = Vec::with_capacity(size.0 * size.1);
        for i in 0..size.0 as isize {
            for j in 0..size.1 as isize {
                troll_moves.push(sub.state((i, j), state_offset, nonbool)?);
            }
        }
        moves.push(troll_moves);
        homes.push((offset, sub));
    }

    let mut spec = GrSpec::new();
    spec.import_gridworld(
        world,
        &SpecOptions {
            nonbool,
            ..Default::default()
        },
    )?;
    for (offset, sub) in &homes {
        spec.import_gridworld(
            sub,
            &SpecOptions {
                offset: *offset,
                controlled: false,
                nonbool,
                ..Default::default()
            },
        )?;
    }

    let (rows, cols) = world.size();
    for i in 0..rows as isize {
        for j in 0..cols as isize {
            for (offset, sub) in &homes {
                let (sub_rows, sub_cols) = sub.size();
                let inside = i >= offset.0
                    && i < offset.0 + sub_rows as isize
                    && j >= offset.1
                    && j < offset.1 + sub_cols as isize;
                if !inside {
                    continue;
                }
                let troll_var = if nonbool {
                    format!(
                        "(({p}_r' = {r}) & ({p}_c' = {c}))",
                        p = sub.prefix,
                        r = i - offset.0,
                        c = j - offset.1
                    )
                } else {
                    format!("{}_{}_{}'", sub.prefix, i, j)
                };
                spec.sys_safety.push(format!(
                    "!({} & {})",
                    world.name((i, j), true, nonbool)?,
                    troll_var
                ));
            }
        }
    }
    info!(
        "Added {} trolls with {} environment variables",
        trolls.len(),
        spec.env_vars.len()
    );
    Ok((spec, moves))
}
