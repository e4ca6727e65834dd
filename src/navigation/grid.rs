//! Uniform cell grid laid over the world for path planning

use crate::core::types::{Rect, Vec2};

/// Grid cell coordinates (column, row)
pub type Cell = (usize, usize);

/// Generic 2D grid with configurable cell size
#[derive(Debug, Clone)]
pub struct Grid<T: Clone + Default> {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
    pub origin: Vec2,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize, cell_size: f32, origin: Vec2) -> Self {
        Self {
            width,
            height,
            cell_size,
            origin,
            data: vec![T::default(); width * height],
        }
    }

    /// Smallest grid covering `bounds`; a zero-sized rect still gets one cell
    pub fn covering(bounds: Rect, cell_size: f32) -> Self {
        let cell_size = cell_size.max(1.0);
        let width = ((bounds.width / cell_size).ceil() as usize).max(1);
        let height = ((bounds.height / cell_size).ceil() as usize).max(1);
        Self::new(width, height, cell_size, Vec2::new(bounds.x, bounds.y))
    }

    #[inline]
    pub fn get(&self, cell: Cell) -> Option<&T> {
        let (x, y) = cell;
        if x < self.width && y < self.height {
            Some(&self.data[y * self.width + x])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, cell: Cell, value: T) {
        let (x, y) = cell;
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Convert a world position to cell coordinates, clamped to the grid
    #[inline]
    pub fn world_to_cell(&self, pos: Vec2) -> Cell {
        let x = ((pos.x - self.origin.x) / self.cell_size).floor() as i64;
        let y = ((pos.y - self.origin.y) / self.cell_size).floor() as i64;
        (
            x.clamp(0, self.width as i64 - 1) as usize,
            y.clamp(0, self.height as i64 - 1) as usize,
        )
    }

    /// Cell center in world coordinates
    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            self.origin.x + (cell.0 as f32 + 0.5) * self.cell_size,
            self.origin.y + (cell.1 as f32 + 0.5) * self.cell_size,
        )
    }

    /// In-bounds 8-connected neighbours, orthogonal first
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        const OFFSETS: [(i64, i64); 8] = [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)];
        let (x, y) = (cell.0 as i64, cell.1 as i64);
        OFFSETS.iter().filter_map(move |(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            (nx >= 0 && ny >= 0 && (nx as usize) < self.width && (ny as usize) < self.height)
                .then_some((nx as usize, ny as usize))
        })
    }
}

/// True when two cells touch, diagonals included
pub fn adjacent(a: Cell, b: Cell) -> bool {
    let dx = a.0.abs_diff(b.0);
    let dy = a.1.abs_diff(b.1);
    dx <= 1 && dy <= 1 && (dx, dy) != (0, 0)
}
