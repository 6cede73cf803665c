//! Gridworlds: rectangular occupancy grids describing robot motion.
//!
//! A gridworld is read from a small text format. The first line that is
//! neither blank nor a `#` comment gives the number of rows and columns.
//! Every following line describes one row, where ` ` is an empty cell, `*`
//! a wall, `I` a possible initial cell and `G` a goal. Missing rows are
//! empty, characters beyond the column count are ignored.
//!
//! Cells are addressed by `(row, column)` pairs. Negative indices wrap
//! around once, so `(-1, -1)` is the bottom-right cell.

pub mod continuous;
pub mod generate;
pub mod path;
pub mod troll;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use fixedbitset::FixedBitSet;
use log::debug;

use crate::automaton::State;
use crate::partition::{Polytope, PropPreservingPartition, Region};
use crate::spec::{Domain, GrSpec};
use troll::Troll;

/// A `(row, column)` cell coordinate; negative values count from the end.
pub type Cell = (isize, isize);

#[derive(Debug, thiserror::Error)]
pub enum GridWorldError {
    #[error("cell ({}, {}) is out of bounds of a {}x{} gridworld", .cell.0, .cell.1, .size.0, .size.1)]
    OutOfBounds { cell: Cell, size: (usize, usize) },
    #[error("line {line}: unrecognized row symbol '{symbol}'")]
    UnknownSymbol { line: usize, symbol: char },
    #[error("malformed gridworld description: {0}")]
    Malformed(String),
    #[error("unworkable subworld of size {size:?} at offset {offset:?}")]
    SubworldOutOfBounds { size: (usize, usize), offset: Cell },
    #[error("gridworld too small: minimum dimension {0}")]
    TooSmall(usize),
    #[error("too many {0} for grid size")]
    TooManyFeatures(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for generating the specification of a gridworld.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecOptions {
    /// Index offset applied to boolean cell variable names.
    pub offset: Cell,
    /// Whether the position is a system (controlled) or environment variable.
    pub controlled: bool,
    /// Encode the position as a pair of integers instead of one boolean per cell.
    pub nonbool: bool,
    /// Require the goals to be visited in the order they are listed.
    pub ordered_goals: bool,
}

impl Default for SpecOptions {
    fn default() -> Self {
        Self {
            offset: (0, 0),
            controlled: true,
            nonbool: true,
            ordered_goals: false,
        }
    }
}

/// Neighbours in the order up, left, down, right.
const NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

#[derive(Debug, Clone)]
pub struct GridWorld {
    rows: usize,
    cols: usize,
    occupied: FixedBitSet,
    pub init_list: Vec<Cell>,
    pub goal_list: Vec<Cell>,
    /// Prefix of the cell variable names.
    pub prefix: String,
}

/// Equality ignores the variable prefix.
impl PartialEq for GridWorld {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size()
            && self.occupied == other.occupied
            && self.goal_list == other.goal_list
            && self.init_list == other.init_list
    }
}

impl Eq for GridWorld {}

/// Result of parsing a description that may contain `E` cells.
pub(crate) struct Parsed {
    pub(crate) world: GridWorld,
    pub(crate) troll_cells: Vec<Cell>,
}

impl GridWorld {
    /// An unoccupied gridworld of the given size.
    pub fn new(rows: usize, cols: usize, prefix: &str) -> Self {
        Self {
            rows,
            cols,
            occupied: FixedBitSet::with_capacity(rows * cols),
            init_list: Vec::new(),
            goal_list: Vec::new(),
            prefix: prefix.to_string(),
        }
    }

    /// Size as `(rows, columns)`.
    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub(crate) fn parse(desc: &str, prefix: &str, trolls: bool) -> Result<Parsed, GridWorldError> {
        let mut world: Option<GridWorld> = None;
        let mut troll_cells = Vec::new();
        let mut row = 0;
        for (number, line) in desc.lines().enumerate() {
            let world = match world.as_mut() {
                Some(world) => world,
                None => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    let dims: Vec<usize> = trimmed
                        .split_whitespace()
                        .take(2)
                        .map(str::parse)
                        .collect::<Result<_, _>>()
                        .map_err(|_| GridWorldError::Malformed(format!("invalid size line '{}'", trimmed)))?;
                    if dims.len() != 2 {
                        return Err(GridWorldError::Malformed(format!("invalid size line '{}'", trimmed)));
                    }
                    world = Some(GridWorld::new(dims[0], dims[1], prefix));
                    continue;
                }
            };
            if row >= world.rows {
                break;
            }
            for (col, symbol) in line.chars().take(world.cols).enumerate() {
                let cell = (row as isize, col as isize);
                match symbol {
                    ' ' => {}
                    '*' => {
                        let index = world.flat(row, col);
                        world.occupied.insert(index);
                    }
                    'I' => world.init_list.push(cell),
                    'G' => world.goal_list.push(cell),
                    'E' if trolls => troll_cells.push(cell),
                    _ => {
                        return Err(GridWorldError::UnknownSymbol {
                            line: number + 1,
                            symbol,
                        })
                    }
                }
            }
            row += 1;
        }
        let world = world.ok_or_else(|| GridWorldError::Malformed("missing size line".to_string()))?;
        Ok(Parsed { world, troll_cells })
    }

    /// Parse a gridworld description.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no size line or a row contains an
    /// unrecognized symbol.
    pub fn loads(desc: &str, prefix: &str) -> Result<Self, GridWorldError> {
        Ok(Self::parse(desc, prefix, false)?.world)
    }

    /// Read a gridworld description from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load<P: AsRef<Path>>(path: P, prefix: &str) -> Result<Self, GridWorldError> {
        let desc = fs_err::read_to_string(path.as_ref())?;
        Self::loads(&desc, prefix)
    }

    pub(crate) fn dump_with(&self, mark: impl Fn(usize, usize) -> Option<char>) -> String {
        let mut out = format!("{} {}\n", self.rows, self.cols);
        for i in 0..self.rows {
            for j in 0..self.cols {
                let cell = (i as isize, j as isize);
                let symbol = if self.occupied.contains(self.flat(i, j)) {
                    '*'
                } else if self.init_list.contains(&cell) {
                    'I'
                } else if self.goal_list.contains(&cell) {
                    'G'
                } else {
                    mark(i, j).unwrap_or(' ')
                };
                out.push(symbol);
            }
            out.push('\n');
        }
        out
    }

    /// Write the gridworld description.
    pub fn dumps(&self) -> String {
        self.dump_with(|_, _| None)
    }

    fn flat(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Resolve a possibly negative coordinate to a position in the grid.
    pub(crate) fn resolve(&self, (row, col): Cell) -> Result<(usize, usize), GridWorldError> {
        fn wrap(x: isize, n: usize) -> Option<usize> {
            let n = n as isize;
            if x < -n || x >= n {
                None
            } else if x < 0 {
                Some((x + n) as usize)
            } else {
                Some(x as usize)
            }
        }
        match (wrap(row, self.rows), wrap(col, self.cols)) {
            (Some(r), Some(c)) => Ok((r, c)),
            _ => Err(GridWorldError::OutOfBounds {
                cell: (row, col),
                size: self.size(),
            }),
        }
    }

    /// Position of an in-bounds coordinate without wrapping.
    fn within(&self, (row, col): Cell) -> Option<(usize, usize)> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            None
        } else {
            Some((row as usize, col as usize))
        }
    }

    fn wall_at(&self, (row, col): (usize, usize)) -> bool {
        self.occupied.contains(self.flat(row, col))
    }

    fn empty_neighbours(&self, (row, col): (usize, usize)) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBOURS.iter().filter_map(move |&(dr, dc)| {
            self.within((row as isize + dr, col as isize + dc))
                .filter(|&p| !self.wall_at(p))
        })
    }

    fn cell_name(&self, (row, col): (usize, usize), offset: Cell, next: bool, nonbool: bool) -> String {
        let prime = if next { "'" } else { "" };
        if nonbool {
            format!(
                "(({p}_r{n} = {r}) & ({p}_c{n} = {c}))",
                p = self.prefix,
                n = prime,
                r = row as isize + offset.0,
                c = col as isize + offset.1
            )
        } else {
            format!(
                "{}_{}_{}{}",
                self.prefix,
                row as isize + offset.0,
                col as isize + offset.1,
                prime
            )
        }
    }

    /// Variable name, or formula in the integer encoding, of a cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is out of bounds.
    pub fn name(&self, cell: Cell, next: bool, nonbool: bool) -> Result<String, GridWorldError> {
        let pos = self.resolve(cell)?;
        Ok(self.cell_name(pos, (0, 0), next, nonbool))
    }

    /// The state in which the robot occupies the given cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is out of bounds.
    pub fn state(&self, cell: Cell, offset: Cell, nonbool: bool) -> Result<State, GridWorldError> {
        let (row, col) = self.resolve(cell)?;
        let mut state = State::new();
        if nonbool {
            state.insert(format!("{}_r", self.prefix), (row as isize + offset.0) as i64);
            state.insert(format!("{}_c", self.prefix), (col as isize + offset.1) as i64);
        } else {
            for i in 0..self.rows {
                for j in 0..self.cols {
                    state.insert(self.cell_name((i, j), offset, false, false), 0);
                }
            }
            state.insert(self.cell_name((row, col), offset, false, false), 1);
        }
        Ok(state)
    }

    /// Whether a cell is free of walls.
    ///
    /// With `extend`, indices do not wrap and any cell outside the grid
    /// counts as occupied.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is out of bounds and `extend` is false.
    pub fn is_empty(&self, cell: Cell, extend: bool) -> Result<bool, GridWorldError> {
        if extend {
            return Ok(self.within(cell).map_or(false, |p| !self.wall_at(p)));
        }
        Ok(!self.wall_at(self.resolve(cell)?))
    }

    /// Mark a cell as permanently occupied.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is out of bounds.
    pub fn set_occupied(&mut self, cell: Cell) -> Result<(), GridWorldError> {
        let (row, col) = self.resolve(cell)?;
        let index = self.flat(row, col);
        self.occupied.insert(index);
        Ok(())
    }

    /// Mark a cell as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the cell is out of bounds.
    pub fn set_empty(&mut self, cell: Cell) -> Result<(), GridWorldError> {
        let (row, col) = self.resolve(cell)?;
        let index = self.flat(row, col);
        self.occupied.set(index, false);
        Ok(())
    }

    /// Whether a path of empty, 4-connected cells leads from `start` to `stop`.
    ///
    /// # Errors
    ///
    /// Returns an error if either cell is out of bounds.
    pub fn is_reachable(&self, start: Cell, stop: Cell) -> Result<bool, GridWorldError> {
        let start = self.resolve(start)?;
        let stop = self.resolve(stop)?;
        if self.wall_at(start) || self.wall_at(stop) {
            return Ok(false);
        }
        let mut seen = FixedBitSet::with_capacity(self.rows * self.cols);
        seen.insert(self.flat(start.0, start.1));
        let mut open = vec![start];
        while let Some(current) = open.pop() {
            if current == stop {
                return Ok(true);
            }
            for next in self.empty_neighbours(current) {
                let index = self.flat(next.0, next.1);
                if !seen.put(index) {
                    open.push(next);
                }
            }
        }
        Ok(false)
    }

    /// The GR(1) specification of moving in this gridworld.
    ///
    /// From every empty cell the robot may stay or move to an empty
    /// neighbour, and it never enters a wall. In the boolean encoding
    /// exactly one cell variable holds at any time. Every goal must be
    /// visited infinitely often.
    ///
    /// # Errors
    ///
    /// Returns an error if an initial or goal cell is out of bounds.
    pub fn spec(&self, options: &SpecOptions) -> Result<GrSpec, GridWorldError> {
        let nonbool = options.nonbool;
        let offset = if nonbool { (0, 0) } else { options.offset };
        let name = |pos: (usize, usize), next: bool| self.cell_name(pos, offset, next, nonbool);
        let positions: Vec<(usize, usize)> = (0..self.rows)
            .flat_map(|i| (0..self.cols).map(move |j| (i, j)))
            .collect();

        let mut safety = Vec::new();
        for &pos in positions.iter().filter(|&&p| !self.wall_at(p)) {
            let mut moves = vec![name(pos, true)];
            moves.extend(self.empty_neighbours(pos).map(|n| name(n, true)));
            safety.push(format!("{} -> ({})", name(pos, false), moves.join(" | ")));
        }
        for &pos in positions.iter().filter(|&&p| self.wall_at(p)) {
            safety.push(format!("!({})", name(pos, true)));
        }
        if !nonbool {
            let free: Vec<(usize, usize)> = positions.iter().copied().filter(|&p| !self.wall_at(p)).collect();
            let disjuncts: Vec<String> = free
                .iter()
                .map(|&outer| {
                    let mut conj = vec![name(outer, true)];
                    conj.extend(
                        free.iter()
                            .filter(|&&inner| inner != outer)
                            .map(|&inner| format!("(!{})", name(inner, true))),
                    );
                    format!("({})", conj.join(" & "))
                })
                .collect();
            safety.push(disjuncts.join("\n| "));
        }

        let mut vars = indexmap::IndexMap::new();
        if nonbool {
            vars.insert(
                format!("{}_r", self.prefix),
                Domain::Range(0, self.rows as i64 - 1),
            );
            vars.insert(
                format!("{}_c", self.prefix),
                Domain::Range(0, self.cols as i64 - 1),
            );
        } else {
            for &pos in &positions {
                vars.insert(name(pos, false), Domain::Boolean);
            }
        }

        let mut init = Vec::with_capacity(self.init_list.len());
        for &cell in &self.init_list {
            let pos = self.resolve(cell)?;
            if nonbool {
                init.push(name(pos, false));
            } else {
                let own = name(pos, false);
                let mut conj = vec![own.clone()];
                conj.extend(vars.keys().filter(|&v| *v != own).map(|v| format!("!{}", v)));
                init.push(format!("({})", conj.join(" & ")));
            }
        }
        let init = init.join(" | ");

        let goals = self
            .goal_list
            .iter()
            .map(|&cell| Ok(name(self.resolve(cell)?, false)))
            .collect::<Result<Vec<_>, GridWorldError>>()?;

        let mut spec = GrSpec::new();
        let (init_slot, safety_slot, prog_slot) = if options.controlled {
            spec.sys_vars = vars;
            (&mut spec.sys_init, &mut spec.sys_safety, &mut spec.sys_prog)
        } else {
            spec.env_vars = vars;
            (&mut spec.env_init, &mut spec.env_safety, &mut spec.env_prog)
        };
        if !init.is_empty() {
            init_slot.push(init);
        }
        safety_slot.extend(safety);

        if options.ordered_goals && !goals.is_empty() {
            let counter = format!("{}_goal", self.prefix);
            let n = goals.len();
            init_slot.push(format!("{} = 0", counter));
            for (k, goal) in goals.iter().enumerate() {
                safety_slot.push(format!(
                    "(({c} = {k}) & {g}) -> ({c}' = {k1})",
                    c = counter,
                    k = k,
                    g = goal,
                    k1 = k + 1
                ));
                safety_slot.push(format!(
                    "(({c} = {k}) & !({g})) -> ({c}' = {k})",
                    c = counter,
                    k = k,
                    g = goal
                ));
            }
            safety_slot.push(format!("({c} = {n}) -> ({c}' = 0)", c = counter, n = n));
            prog_slot.push(format!("{} = {}", counter, n));
            let vars = if options.controlled {
                &mut spec.sys_vars
            } else {
                &mut spec.env_vars
            };
            vars.insert(counter, Domain::Range(0, n as i64));
        } else {
            prog_slot.extend(goals);
        }
        debug!(
            "Gridworld {}x{} specification with {} safety conjuncts",
            self.rows,
            self.cols,
            spec.sys_safety.len() + spec.env_safety.len()
        );
        Ok(spec)
    }

    /// The gridworld as a discrete transition system.
    ///
    /// Every cell is a region `R_<name>` in which exactly its own
    /// proposition holds. Row `p` of the transition matrix marks the
    /// cells from which `p` can be entered: an empty cell from itself and
    /// its neighbours, a wall only from itself.
    pub fn discrete_transition_system(&self, nonbool: bool) -> PropPreservingPartition {
        let num_cells = self.rows * self.cols;
        let mut part = PropPreservingPartition::default();
        for i in 0..self.rows {
            for j in 0..self.cols {
                let prop = self.cell_name((i, j), (0, 0), false, nonbool);
                let mut props = vec![0; num_cells];
                props[self.flat(i, j)] = 1;
                part.regions.push(Region::new(format!("R_{}", prop), Vec::new(), props));
                part.prop_symbols.push(prop);

                let mut trans = vec![0; num_cells];
                trans[self.flat(i, j)] = 1;
                if !self.wall_at((i, j)) {
                    for (dr, dc) in NEIGHBOURS.iter() {
                        if let Some((r, c)) = self.within((i as isize + dr, j as isize + dc)) {
                            trans[self.flat(r, c)] = 1;
                        }
                    }
                }
                part.trans.push(trans);
            }
        }
        part
    }

    /// Transition matrix of an obstacle that cycles deterministically
    /// along `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell of the path is out of bounds.
    pub fn deterministic_moving_obstacle(&self, path: &[Cell]) -> Result<Vec<Vec<u8>>, GridWorldError> {
        let path = path
            .iter()
            .map(|&c| self.resolve(c))
            .collect::<Result<Vec<_>, _>>()?;
        let num_cells = self.rows * self.cols;
        let mut trans = Vec::with_capacity(num_cells);
        for i in 0..self.rows {
            for j in 0..self.cols {
                let mut row = vec![0; num_cells];
                if let Some(n) = path.iter().position(|&p| p == (i, j)) {
                    let (pr, pc) = path[(n + path.len() - 1) % path.len()];
                    row[self.flat(pr, pc)] = 1;
                }
                trans.push(row);
            }
        }
        Ok(trans)
    }

    /// A partition of the plane into one box per cell.
    ///
    /// `side_lengths` is the (width, height) of a cell and `offset` the
    /// position of the bottom-left corner of the grid. Regions follow the
    /// cells in row-major order. An empty cell is adjacent to itself and to
    /// its empty neighbours, and the transition matrix equals the adjacency.
    pub fn dump_ppartition(
        &self,
        side_lengths: (f64, f64),
        offset: (f64, f64),
        nonbool: bool,
    ) -> PropPreservingPartition {
        let (w, h) = side_lengths;
        let num_cells = self.rows * self.cols;
        let mut part = PropPreservingPartition {
            domain: Some(Polytope::from_box(
                &[offset.0, offset.1],
                &[offset.0 + self.cols as f64 * w, offset.1 + self.rows as f64 * h],
            )),
            ..Default::default()
        };
        for i in 0..self.rows {
            for j in 0..self.cols {
                let prop = self.cell_name((i, j), (0, 0), false, nonbool);
                let lower = [
                    offset.0 + j as f64 * w,
                    offset.1 + (self.rows - i - 1) as f64 * h,
                ];
                let upper = [lower[0] + w, lower[1] + h];
                let mut props = vec![0; num_cells];
                props[self.flat(i, j)] = 1;
                part.regions.push(Region::new(
                    format!("R_{}", prop),
                    vec![Polytope::from_box(&lower, &upper)],
                    props,
                ));
                part.prop_symbols.push(prop);
            }
        }
        let mut adj = vec![vec![0; num_cells]; num_cells];
        for i in 0..self.rows {
            for j in 0..self.cols {
                if self.wall_at((i, j)) {
                    continue;
                }
                let this = self.flat(i, j);
                adj[this][this] = 1;
                for (r, c) in self.empty_neighbours((i, j)) {
                    adj[self.flat(r, c)][this] = 1;
                }
            }
        }
        part.trans = adj.clone();
        part.adj = adj;
        part
    }

    /// A new gridworld made of part of this one.
    ///
    /// Initial cells and goals are not copied. With `extend`, any size and
    /// offset is allowed and cells outside of this gridworld are walls.
    ///
    /// # Errors
    ///
    /// Returns an error if the part does not fit and `extend` is false.
    pub fn dumpsubworld(
        &self,
        size: (usize, usize),
        offset: Cell,
        prefix: &str,
        extend: bool,
    ) -> Result<GridWorld, GridWorldError> {
        if !extend {
            let fits = self.within(offset).is_some()
                && size.0 >= 1
                && size.1 >= 1
                && offset.0 as usize + size.0 <= self.rows
                && offset.1 as usize + size.1 <= self.cols;
            if !fits {
                return Err(GridWorldError::SubworldOutOfBounds { size, offset });
            }
        }
        let mut sub = GridWorld::new(size.0, size.1, prefix);
        for i in 0..size.0 {
            for j in 0..size.1 {
                let source = (i as isize + offset.0, j as isize + offset.1);
                let wall = self.within(source).map_or(true, |p| self.wall_at(p));
                if wall {
                    let index = sub.flat(i, j);
                    sub.occupied.insert(index);
                }
            }
        }
        Ok(sub)
    }

    /// Scale the gridworld by integer factors: columns by `xf`, rows by `yf`.
    ///
    /// Walls grow, while initial cells and goals map to the top-left cell
    /// of their scaled block.
    pub fn scale(&self, xf: usize, yf: usize) -> GridWorld {
        let mut scaled = GridWorld::new(self.rows * yf, self.cols * xf, &self.prefix);
        for row in 0..scaled.rows {
            for col in 0..scaled.cols {
                let source = (row / yf, col / xf);
                if self.wall_at(source) {
                    let index = scaled.flat(row, col);
                    scaled.occupied.insert(index);
                }
                if row % yf == 0 && col % xf == 0 {
                    let cell = (source.0 as isize, source.1 as isize);
                    let target = (row as isize, col as isize);
                    if self.goal_list.contains(&cell) {
                        scaled.goal_list.push(target);
                    }
                    if self.init_list.contains(&cell) {
                        scaled.init_list.push(target);
                    }
                }
            }
        }
        scaled
    }

    /// Render the gridworld for humans.
    ///
    /// Walls are `*`, initial cells `I` and goals `G` (or their index when
    /// `goal_order` is set). Cells along `path` show the direction of the
    /// next step. Troll centres are `E` and the other empty cells of their
    /// home regions `+`.
    ///
    /// # Errors
    ///
    /// Returns an error if a troll centre is outside of the gridworld.
    pub fn pretty(
        &self,
        show_grid: bool,
        path: &[Cell],
        goal_order: bool,
        trolls: &[Troll],
    ) -> Result<String, GridWorldError> {
        let mut marks = vec![None; self.rows * self.cols];
        for troll in trolls {
            let ((oi, oj), (si, sj)) = troll.home(self)?;
            let center = (troll.center.0 as usize, troll.center.1 as usize);
            if !self.wall_at(center) {
                marks[self.flat(center.0, center.1)] = Some('E');
            }
            for i in oi..oi + si {
                for j in oj..oj + sj {
                    let index = self.flat(i, j);
                    if !self.wall_at((i, j)) && marks[index].is_none() {
                        marks[index] = Some('+');
                    }
                }
            }
        }
        let direction = |from: Cell, to: Cell| {
            if from.1 > to.1 {
                '<'
            } else if from.1 < to.1 {
                '>'
            } else if from.0 > to.0 {
                '^'
            } else if from.0 < to.0 {
                'v'
            } else {
                '.'
            }
        };
        let rule = "-".repeat(self.cols * 2 + 1);
        let mut out = String::new();
        if show_grid {
            out.push_str("  ");
            for k in 0..self.cols {
                out.push_str(&format!("{:>2}", k));
            }
            out.push('\n');
        } else {
            out.push_str(&"-".repeat(self.cols + 2));
            out.push('\n');
        }
        for i in 0..self.rows {
            if show_grid {
                out.push_str(&format!("  {}\n{:>2}", rule, i));
            } else {
                out.push('|');
            }
            for j in 0..self.cols {
                if show_grid {
                    out.push('|');
                }
                let cell = (i as isize, j as isize);
                let symbol = if self.wall_at((i, j)) {
                    '*'
                } else if let Some(mark) = marks[self.flat(i, j)] {
                    mark
                } else if self.init_list.contains(&cell) {
                    'I'
                } else if let Some(k) = self.goal_list.iter().position(|&g| g == cell) {
                    if goal_order {
                        std::char::from_digit(k as u32 % 36, 36).unwrap_or('G')
                    } else {
                        'G'
                    }
                } else if path.contains(&cell) {
                    let mut d = '.';
                    for (n, _) in path.iter().enumerate().filter(|&(_, &p)| p == cell) {
                        d = direction(cell, path[(n + 1) % path.len()]);
                        if d != '.' {
                            break;
                        }
                    }
                    d
                } else {
                    ' '
                };
                out.push(symbol);
            }
            out.push_str("|\n");
        }
        if show_grid {
            out.push_str(&format!("  {}\n", rule));
        } else {
            out.push_str(&"-".repeat(self.cols + 2));
            out.push('\n');
        }
        Ok(out)
    }
}

impl FromStr for GridWorld {
    type Err = GridWorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::loads(s, "Y")
    }
}

impl fmt::Display for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pretty = self.pretty(true, &[], false, &[]).map_err(|_| fmt::Error)?;
        write!(f, "{}", pretty)
    }
}
