//! Gridworlds embedded in the plane.

use super::path::extract_coord;
use super::{Cell, GridWorld};
use crate::partition::PropPreservingPartition;

/// A gridworld bound to a partition of the plane into one box per cell.
#[derive(Debug, Clone)]
pub struct CGridWorld {
    pub world: GridWorld,
    pub part: PropPreservingPartition,
    side_lengths: (f64, f64),
    offset: (f64, f64),
}

impl CGridWorld {
    /// Place `world` in the plane with cells of the given (width, height)
    /// and its bottom-left corner at `offset`.
    pub fn new(world: GridWorld, side_lengths: (f64, f64), offset: (f64, f64)) -> Self {
        let part = world.dump_ppartition(side_lengths, offset, false);
        Self {
            world,
            part,
            side_lengths,
            offset,
        }
    }

    /// Change the placement of the grid.
    pub fn remap(&mut self, side_lengths: (f64, f64), offset: (f64, f64)) {
        self.part = self.world.dump_ppartition(side_lengths, offset, false);
        self.side_lengths = side_lengths;
        self.offset = offset;
    }

    /// The cell containing a point, if it lies in the grid.
    pub fn get_cell(&self, x: [f64; 2]) -> Option<Cell> {
        self.part
            .regions
            .iter()
            .find(|r| r.polytopes.first().map_or(false, |p| p.contains(&x)))
            .and_then(|r| r.props.iter().position(|&p| p != 0))
            .and_then(|k| extract_coord(&self.part.prop_symbols[k], false))
            .map(|(_, row, col)| (row, col))
    }

    /// Lower-left and upper-right corner of a cell.
    pub fn get_bbox(&self, cell: Cell) -> [[f64; 2]; 2] {
        let (rows, cols) = self.world.size();
        let row = cell.0.rem_euclid(rows as isize) as f64;
        let col = cell.1.rem_euclid(cols as isize) as f64;
        let (w, h) = self.side_lengths;
        let (ox, oy) = self.offset;
        [
            [ox + col * w, oy + (rows as f64 - row - 1.0) * h],
            [ox + (col + 1.0) * w, oy + (rows as f64 - row) * h],
        ]
    }

    /// Centre of a cell.
    pub fn get_ccenter(&self, cell: Cell) -> [f64; 2] {
        let [ll, ur] = self.get_bbox(cell);
        [(ll[0] + ur[0]) / 2.0, (ll[1] + ur[1]) / 2.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::tests::TRIVIAL_GWFILE;

    fn trivial() -> CGridWorld {
        let world = GridWorld::loads(TRIVIAL_GWFILE, "Y").unwrap();
        CGridWorld::new(world, (1.0, 1.0), (0.0, 0.0))
    }

    #[test]
    fn test_get_cell() {
        let y = trivial();
        assert_eq!(y.get_cell([0.5, 0.7]), Some((1, 0)));
        assert_eq!(y.get_cell([1.5, 0.4]), Some((1, 1)));
        assert_eq!(y.get_cell([-0.5, 0.5]), None);
    }

    #[test]
    fn test_get_bbox() {
        let y = trivial();
        assert_eq!(y.get_bbox((0, 0)), [[0.0, 1.0], [1.0, 2.0]]);
        assert_eq!(y.get_bbox((-1, -1)), [[1.0, 0.0], [2.0, 1.0]]);
        assert_eq!(y.get_bbox((1, -1)), y.get_bbox((-1, -1)));
    }

    #[test]
    fn test_get_ccenter() {
        let y = trivial();
        assert_eq!(y.get_ccenter((0, 0)), [0.5, 1.5]);
        assert_eq!(y.get_ccenter((-1, -1)), [1.5, 0.5]);
    }

    #[test]
    fn test_remap() {
        let mut y = trivial();
        y.remap((2.0, 0.5), (10.0, 0.0));
        assert_eq!(y.get_cell([11.0, 0.75]), Some((0, 0)));
        assert_eq!(y.get_bbox((1, 1)), [[12.0, 0.0], [14.0, 0.5]]);
    }
}
