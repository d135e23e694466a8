// Spatial hash grid for collision neighbour lookup.
//
// Instead of testing every pair of dots, dots are bucketed into square cells
// whose side equals the collision distance. Any dot closer than that distance
// to a query point lies in the query's cell or one of its eight neighbours.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    /// Side of each cell.
    cell_size: f64,
    /// Cell coordinates -> indices of the points bucketed there, in insertion order.
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Cell size should be the largest distance that will be queried.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        ((x / self.cell_size).floor() as i64, (y / self.cell_size).floor() as i64)
    }

    pub fn insert(&mut self, index: usize, x: f64, y: f64) {
        let cell = self.cell_of(x, y);
        self.cells.entry(cell).or_default().push(index);
    }

    /// Indices of points that may lie within `cell_size` of (x, y).
    /// Includes false positives; callers do the exact distance check.
    /// Order is deterministic: cells row by row, then insertion order.
    pub fn neighbours(&self, x: f64, y: f64) -> Vec<usize> {
        let (cx, cy) = self.cell_of(x, y);
        let mut result = Vec::new();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(indices) = self.cells.get(&(cx + dx, cy + dy)) {
                    result.extend_from_slice(indices);
                }
            }
        }
        result
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
