//! Fixed-size occupancy map for the field.

use eco_core::{Coordinate, EntityId, Error, Result};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Row-major neighbour offsets, skipping the centre cell.
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Random probes tried before falling back to a full scan.
const RANDOM_PROBES: usize = 64;

/// A bounded 2D grid holding at most one entity per cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    cells: Vec<Option<EntityId>>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    pub fn area(&self) -> usize {
        self.cells.len()
    }

    pub fn in_bounds(&self, coord: Coordinate) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    /// Occupant of a cell; out-of-bounds cells are reported empty
    pub fn get(&self, coord: Coordinate) -> Option<EntityId> {
        if !self.in_bounds(coord) {
            return None;
        }
        self.cells[self.coord_to_index(coord)]
    }

    pub fn is_free(&self, coord: Coordinate) -> bool {
        self.in_bounds(coord) && self.get(coord).is_none()
    }

    /// Claim a cell. Fails if the cell is occupied or off the field.
    pub fn place(&mut self, id: EntityId, coord: Coordinate) -> Result<()> {
        if !self.in_bounds(coord) {
            return Err(Error::InvalidState(format!(
                "cannot place {id} at {coord}: outside {}x{} field",
                self.rows, self.cols
            )));
        }
        let index = self.coord_to_index(coord);
        if let Some(occupant) = self.cells[index] {
            return Err(Error::InvalidState(format!(
                "cannot place {id} at {coord}: occupied by {occupant}"
            )));
        }
        self.cells[index] = Some(id);
        Ok(())
    }

    /// Vacate a cell. Clearing an empty cell is a no-op.
    pub fn clear(&mut self, coord: Coordinate) {
        if self.in_bounds(coord) {
            let index = self.coord_to_index(coord);
            self.cells[index] = None;
        }
    }

    /// The up-to-eight adjacent in-bounds cells, in row-major order
    pub fn neighbors(&self, coord: Coordinate) -> Vec<Coordinate> {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|&(dr, dc)| coord.offset(dr, dc, self.rows, self.cols))
            .collect()
    }

    /// Unoccupied neighbours, in the same order as [`Grid::neighbors`]
    pub fn free_neighbors(&self, coord: Coordinate) -> Vec<Coordinate> {
        self.neighbors(coord)
            .into_iter()
            .filter(|&c| self.get(c).is_none())
            .collect()
    }

    /// Occupants of the adjacent cells, in scan order
    pub fn neighbor_occupants(&self, coord: Coordinate) -> Vec<EntityId> {
        self.neighbors(coord)
            .into_iter()
            .filter_map(|c| self.get(c))
            .collect()
    }

    /// A uniformly chosen empty cell, used while populating the field
    pub fn random_free_coordinate(&self, rng: &mut ChaCha8Rng) -> Option<Coordinate> {
        if self.cells.is_empty() {
            return None;
        }
        for _ in 0..RANDOM_PROBES {
            let coord = Coordinate::new(rng.gen_range(0..self.rows), rng.gen_range(0..self.cols));
            if self.get(coord).is_none() {
                return Some(coord);
            }
        }

        // Crowded field: choose among the remaining free cells directly.
        let free: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(i, _)| i)
            .collect();
        if free.is_empty() {
            return None;
        }
        Some(self.index_to_coord(free[rng.gen_range(0..free.len())]))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    fn coord_to_index(&self, coord: Coordinate) -> usize {
        coord.row * self.cols + coord.col
    }

    /// Get coordinate from index
    pub fn index_to_coord(&self, index: usize) -> Coordinate {
        Coordinate::new(index / self.cols, index % self.cols)
    }

    /// Iterator over all coordinates, row-major
    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (0..self.cells.len()).map(move |i| self.index_to_coord(i))
    }

    /// Iterator over all cells with coordinates
    pub fn iter(&self) -> impl Iterator<Item = (Coordinate, Option<EntityId>)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.index_to_coord(i), *cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(10, 12);
        assert_eq!(grid.rows, 10);
        assert_eq!(grid.cols, 12);
        assert_eq!(grid.area(), 120);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn test_place_rejects_occupied_cell() {
        let mut grid = Grid::new(4, 4);
        let coord = Coordinate::new(1, 2);
        grid.place(EntityId(1), coord).unwrap();
        assert_eq!(grid.get(coord), Some(EntityId(1)));

        let err = grid.place(EntityId(2), coord).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(grid.get(coord), Some(EntityId(1)));
    }

    #[test]
    fn test_place_rejects_out_of_bounds() {
        let mut grid = Grid::new(4, 4);
        assert!(grid.place(EntityId(1), Coordinate::new(4, 0)).is_err());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut grid = Grid::new(3, 3);
        let coord = Coordinate::new(0, 0);
        grid.clear(coord);
        grid.place(EntityId(9), coord).unwrap();
        grid.clear(coord);
        grid.clear(coord);
        assert!(grid.is_free(coord));
    }

    #[test]
    fn test_neighbors_scan_order() {
        let grid = Grid::new(5, 5);
        let neighbors = grid.neighbors(Coordinate::new(2, 2));
        assert_eq!(
            neighbors,
            vec![
                Coordinate::new(1, 1),
                Coordinate::new(1, 2),
                Coordinate::new(1, 3),
                Coordinate::new(2, 1),
                Coordinate::new(2, 3),
                Coordinate::new(3, 1),
                Coordinate::new(3, 2),
                Coordinate::new(3, 3),
            ]
        );
    }

    #[test]
    fn test_corner_neighbors_are_clipped() {
        let grid = Grid::new(5, 5);
        assert_eq!(
            grid.neighbors(Coordinate::new(0, 0)),
            vec![Coordinate::new(0, 1), Coordinate::new(1, 0), Coordinate::new(1, 1)]
        );
        assert_eq!(grid.neighbors(Coordinate::new(4, 2)).len(), 5);
    }

    #[test]
    fn test_free_neighbors_filters_occupied() {
        let mut grid = Grid::new(3, 3);
        let centre = Coordinate::new(1, 1);
        grid.place(EntityId(1), Coordinate::new(0, 0)).unwrap();
        grid.place(EntityId(2), Coordinate::new(1, 2)).unwrap();

        let free = grid.free_neighbors(centre);
        assert_eq!(free.len(), 6);
        assert_eq!(free[0], Coordinate::new(0, 1));
        assert!(!free.contains(&Coordinate::new(1, 2)));
        assert_eq!(grid.neighbor_occupants(centre), vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn test_random_free_coordinate_on_crowded_grid() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut grid = Grid::new(6, 6);
        let last = Coordinate::new(5, 4);
        for (i, coord) in grid.coordinates().collect::<Vec<_>>().into_iter().enumerate() {
            if coord != last {
                grid.place(EntityId(i as u64), coord).unwrap();
            }
        }
        assert_eq!(grid.random_free_coordinate(&mut rng), Some(last));

        grid.place(EntityId(1000), last).unwrap();
        assert_eq!(grid.random_free_coordinate(&mut rng), None);
    }

    proptest! {
        #[test]
        fn prop_neighbors_are_adjacent_and_ordered(
            rows in 1usize..12,
            cols in 1usize..12,
            r in 0usize..12,
            c in 0usize..12,
        ) {
            let grid = Grid::new(rows, cols);
            let coord = Coordinate::new(r % rows, c % cols);
            let neighbors = grid.neighbors(coord);

            prop_assert!(neighbors.len() <= 8);
            for n in &neighbors {
                prop_assert!(grid.in_bounds(*n));
                prop_assert_eq!(n.chebyshev_distance(&coord), 1);
            }
            let mut sorted = neighbors.clone();
            sorted.sort();
            prop_assert_eq!(sorted, neighbors);
        }
    }
}
