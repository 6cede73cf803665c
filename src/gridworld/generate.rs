//! Random and structured generation of gridworlds.

use std::time::{Duration, Instant};

use fixedbitset::FixedBitSet;
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use super::troll::{MGridWorld, Troll};
use super::{Cell, GridWorld, GridWorldError};

/// Parameters of a random gridworld.
#[derive(Debug, Clone)]
pub struct RandomWorld {
    /// Number of rows and columns.
    pub size: (usize, usize),
    /// Ratio of walls to cells.
    pub wall_density: f64,
    pub num_init: usize,
    pub num_goals: usize,
    pub prefix: String,
    /// Only place walls that keep all initial cells and goals mutually
    /// reachable.
    pub ensure_feasible: bool,
    /// Give up on a feasible world after this long.
    pub timeout: Option<Duration>,
    /// Number of trolls of radius 1.
    pub num_trolls: usize,
}

impl Default for RandomWorld {
    fn default() -> Self {
        Self {
            size: (4, 5),
            wall_density: 0.2,
            num_init: 1,
            num_goals: 2,
            prefix: "Y".to_string(),
            ensure_feasible: false,
            timeout: None,
            num_trolls: 0,
        }
    }
}

/// Outcome of generating a random world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Static(GridWorld),
    /// A world with trolls, if any were requested.
    Moving(MGridWorld),
    /// No feasible world was found before the timeout.
    TimedOut,
    /// The grid ran out of cells for the requested features and walls.
    Infeasible,
}

impl Generated {
    /// The static part of the generated world, if any.
    pub fn world(&self) -> Option<&GridWorld> {
        match self {
            Generated::Static(world) => Some(world),
            Generated::Moving(mworld) => Some(&mworld.world),
            Generated::TimedOut | Generated::Infeasible => None,
        }
    }
}

impl RandomWorld {
    /// Generate a random world.
    ///
    /// Goals, initial cells and trolls are placed on distinct cells, then
    /// walls are added one at a time on the remaining cells. With
    /// `ensure_feasible`, a wall that cuts the cycle through all initial
    /// cells and goals is removed again and its cell is not tried again.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Generated {
        let start = Instant::now();
        let (rows, cols) = self.size;
        let num_cells = rows * cols;
        let num_walls = (self.wall_density * num_cells as f64).round_ties_even() as usize;
        let cell = |k: usize| ((k / cols) as isize, (k % cols) as isize);

        let mut taken = FixedBitSet::with_capacity(num_cells);
        let mut place = |count: usize, rng: &mut R| -> Option<Vec<usize>> {
            let mut placed = Vec::with_capacity(count);
            for _ in 0..count {
                let avail: Vec<usize> = (0..num_cells).filter(|&k| !taken.contains(k)).collect();
                let &k = avail.choose(rng)?;
                taken.insert(k);
                placed.push(k);
            }
            Some(placed)
        };
        let goals = place(self.num_goals, rng);
        let inits = place(self.num_init, rng);
        let trolls = place(self.num_trolls, rng);
        let (goals, inits, trolls) = match (goals, inits, trolls) {
            (Some(goals), Some(inits), Some(trolls)) => (goals, inits, trolls),
            _ => return Generated::Infeasible,
        };

        let mut world = GridWorld::new(rows, cols, &self.prefix);
        world.goal_list = goals.into_iter().map(cell).collect();
        world.init_list = inits.into_iter().map(cell).collect();
        let chain: Vec<Cell> = world
            .init_list
            .iter()
            .chain(world.goal_list.iter())
            .copied()
            .collect();

        let mut rejected = FixedBitSet::with_capacity(num_cells);
        let mut walls = 0;
        while walls < num_walls {
            if self.ensure_feasible {
                if let Some(timeout) = self.timeout {
                    if start.elapsed() >= timeout {
                        info!("No feasible world found within {:?}", timeout);
                        return Generated::TimedOut;
                    }
                }
            }
            let avail: Vec<usize> = (0..num_cells)
                .filter(|&k| !taken.contains(k) && !rejected.contains(k))
                .collect();
            let k = match avail.choose(rng) {
                Some(&k) => k,
                None => {
                    debug!("No cell left for wall {} of {}", walls + 1, num_walls);
                    return Generated::Infeasible;
                }
            };
            taken.insert(k);
            world.occupied.insert(k);
            walls += 1;
            if self.ensure_feasible && !is_cycle_reachable(&world, &chain) {
                world.occupied.set(k, false);
                taken.set(k, false);
                rejected.insert(k);
                walls -= 1;
            }
        }
        info!(
            "Generated {}x{} world with {} walls in {:.2?}",
            rows,
            cols,
            walls,
            start.elapsed()
        );

        if self.num_trolls > 0 {
            Generated::Moving(MGridWorld {
                world,
                trolls: trolls.into_iter().map(|k| Troll::new(cell(k), 1)).collect(),
            })
        } else {
            Generated::Static(world)
        }
    }
}

/// Whether each point reaches the next, cyclically.
fn is_cycle_reachable(world: &GridWorld, chain: &[Cell]) -> bool {
    (0..chain.len()).all(|i| {
        world
            .is_reachable(chain[i], chain[(i + 1) % chain.len()])
            .unwrap_or(false)
    })
}

/// An entirely unoccupied gridworld.
pub fn unoccupied(size: (usize, usize), prefix: &str) -> GridWorld {
    GridWorld::new(size.0, size.1, prefix)
}

/// A world of two zones connected by a horizontal passage.
///
/// Initial cells are placed in the left zone and goals in the right one.
/// `length` is the length of the passage as a fraction of the width, and
/// `ptop` the row at the top of the passage (random if not given).
///
/// # Errors
///
/// Returns an error if the world is smaller than 3x3 or the zones cannot
/// hold the requested cells.
#[allow(clippy::too_many_arguments)]
pub fn narrow_passage<R: Rng + ?Sized>(
    size: (usize, usize),
    width: usize,
    num_init: usize,
    num_goals: usize,
    length: f64,
    ptop: Option<usize>,
    prefix: &str,
    rng: &mut R,
) -> Result<GridWorld, GridWorldError> {
    let (rows, cols) = size;
    if rows < 3 || cols < 3 {
        return Err(GridWorldError::TooSmall(3));
    }
    let zone_width = (1.0 - length) / 2.0 * cols as f64;
    let izone = zone_width.max(1.0) as usize;
    let gzone = cols.saturating_sub(izone);
    if izone * rows < num_init {
        return Err(GridWorldError::TooManyFeatures("initial cells"));
    }
    if (cols - gzone) * rows < num_goals {
        return Err(GridWorldError::TooManyFeatures("goals"));
    }
    let ptop = match ptop {
        Some(ptop) => ptop,
        None if rows > width => rng.gen_range(0..rows - width),
        None => 0,
    };
    debug!("Passage rows {}..{}", ptop, ptop + width);

    let mut world = unoccupied(size, prefix);
    for y in (0..rows).filter(|y| !(ptop..ptop + width).contains(y)) {
        for x in izone..gzone {
            world.set_occupied((y as isize, x as isize))?;
        }
    }
    let left: Vec<Cell> = (0..rows as isize)
        .flat_map(|y| (0..izone as isize).map(move |x| (y, x)))
        .collect();
    world.init_list = left.choose_multiple(rng, num_init).copied().collect();
    let right: Vec<Cell> = (0..rows as isize)
        .flat_map(|y| (gzone as isize..cols as isize).map(move |x| (y, x)))
        .collect();
    world.goal_list = right.choose_multiple(rng, num_goals).copied().collect();
    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn occupied_count(world: &GridWorld) -> usize {
        let (rows, cols) = world.size();
        (0..rows as isize)
            .flat_map(|i| (0..cols as isize).map(move |j| (i, j)))
            .filter(|&c| !world.is_empty(c, false).unwrap())
            .count()
    }

    #[test]
    fn test_size_and_density() {
        let mut rng = StdRng::seed_from_u64(0);
        for &(size, density) in &[((4, 5), 0.2), ((4, 5), 0.4), ((10, 20), 0.6)] {
            let params = RandomWorld {
                size,
                wall_density: density,
                ..Default::default()
            };
            let generated = params.generate(&mut rng);
            let world = generated.world().unwrap();
            assert_eq!(world.size(), size);
            let cells = (size.0 * size.1) as f64;
            assert_eq!(occupied_count(world) as f64 / cells, density);
            assert_eq!(world.goal_list.len(), 2);
            assert_eq!(world.init_list.len(), 1);
            for c in world.goal_list.iter().chain(&world.init_list) {
                assert!(world.is_empty(*c, false).unwrap());
            }
        }
    }

    #[test]
    fn test_feasibility() {
        let mut rng = StdRng::seed_from_u64(7);
        for &(size, density) in &[((4, 5), 0.2), ((4, 5), 0.4), ((10, 20), 0.6)] {
            let params = RandomWorld {
                size,
                wall_density: density,
                num_init: 2,
                num_goals: 2,
                ensure_feasible: true,
                ..Default::default()
            };
            match params.generate(&mut rng) {
                Generated::Static(world) => {
                    let (i, g) = (&world.init_list, &world.goal_list);
                    assert!(world.is_reachable(i[0], i[1]).unwrap());
                    assert!(world.is_reachable(i[1], g[0]).unwrap());
                    assert!(world.is_reachable(g[0], g[1]).unwrap());
                    assert!(world.is_reachable(g[1], i[0]).unwrap());
                }
                Generated::Infeasible => {}
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn test_trolls_and_exhaustion() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = RandomWorld {
            size: (5, 5),
            num_trolls: 2,
            ..Default::default()
        };
        match params.generate(&mut rng) {
            Generated::Moving(mworld) => {
                assert_eq!(mworld.trolls.len(), 2);
                assert!(mworld.trolls.iter().all(|t| t.radius == 1));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let crowded = RandomWorld {
            size: (2, 2),
            num_goals: 3,
            num_init: 2,
            ..Default::default()
        };
        assert_eq!(crowded.generate(&mut rng), Generated::Infeasible);
    }

    #[test]
    fn test_timeout() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = RandomWorld {
            size: (10, 10),
            ensure_feasible: true,
            timeout: Some(Duration::from_secs(0)),
            ..Default::default()
        };
        assert_eq!(params.generate(&mut rng), Generated::TimedOut);
    }

    #[test]
    fn test_narrow_passage() {
        let mut rng = StdRng::seed_from_u64(5);
        let world = narrow_passage((5, 10), 1, 2, 2, 0.4, Some(2), "Y", &mut rng).unwrap();
        // zones are three columns wide
        assert_eq!(
            world.dumps().lines().nth(1).map(|l| &l[3..7]),
            Some("****")
        );
        assert!(world.is_empty((2, 5), false).unwrap());
        assert!(!world.is_empty((1, 5), false).unwrap());
        assert!(world.init_list.iter().all(|&(_, x)| x < 3));
        assert!(world.goal_list.iter().all(|&(_, x)| x >= 7));
        assert_eq!(world.init_list.len(), 2);
        assert!(world.is_reachable(world.init_list[0], world.goal_list[0]).unwrap());

        assert!(matches!(
            narrow_passage((2, 10), 1, 1, 1, 0.4, None, "Y", &mut rng),
            Err(GridWorldError::TooSmall(3))
        ));
        assert!(matches!(
            narrow_passage((3, 10), 1, 10, 1, 0.4, None, "Y", &mut rng),
            Err(GridWorldError::TooManyFeatures(_))
        ));
    }

    #[test]
    fn test_unoccupied() {
        let world = unoccupied((3, 5), "Z");
        assert_eq!(world.size(), (3, 5));
        assert_eq!(occupied_count(&world), 0);
        assert_eq!(world.prefix, "Z");
    }
}
