//! A* pathfinding over the navigation grid
//!
//! Planets and black holes block every cell whose center lies inside the
//! obstacle radius inflated by the safety margin. The cells holding the start
//! and the goal are never blocked. Moves are 8-connected with Euclidean step
//! cost; the heuristic is Manhattan distance in world units.

use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use crate::core::types::{Rect, Vec2};
use crate::navigation::grid::{Cell, Grid};
use crate::world::galaxy::Galaxy;
use crate::world::hazards::Hazards;

/// A circular no-fly zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: Vec2,
    pub radius: f32,
}

impl Obstacle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Planets and black holes as obstacles, in world order
pub fn world_obstacles(galaxy: &Galaxy, hazards: &Hazards) -> Vec<Obstacle> {
    let planets = galaxy.planets().map(|p| Obstacle::new(p.pos, p.radius));
    let holes = hazards.black_holes.iter().map(|bh| Obstacle::new(bh.pos, bh.radius));
    planets.chain(holes).collect()
}

/// Node in the A* open set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathNode {
    f_cost: OrderedFloat<f32>,
    cell: Cell,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Cell order breaks f ties so expansion order is reproducible
        self.f_cost.cmp(&other.f_cost).then_with(|| (self.cell.1, self.cell.0).cmp(&(other.cell.1, other.cell.0)))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct Pathfinder {
    grid: Grid<bool>,
    pub margin: f32,
}

impl Pathfinder {
    pub fn new(bounds: Rect, cell_size: f32, margin: f32) -> Self {
        Self { grid: Grid::covering(bounds, cell_size), margin }
    }

    /// Planner over `bounds` with every planet and black hole blocked
    pub fn for_world(bounds: Rect, cell_size: f32, margin: f32, galaxy: &Galaxy, hazards: &Hazards) -> Self {
        let mut finder = Self::new(bounds, cell_size, margin);
        for obstacle in world_obstacles(galaxy, hazards) {
            finder.block(obstacle);
        }
        finder
    }

    pub fn cell_size(&self) -> f32 {
        self.grid.cell_size
    }

    pub fn cell_of(&self, pos: Vec2) -> Cell {
        self.grid.world_to_cell(pos)
    }

    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        self.grid.cell_center(cell)
    }

    /// Mark every cell whose center is inside the inflated obstacle
    pub fn block(&mut self, obstacle: Obstacle) {
        let reach = obstacle.radius + self.margin;
        let lo = self.grid.world_to_cell(obstacle.center - Vec2::new(reach, reach));
        let hi = self.grid.world_to_cell(obstacle.center + Vec2::new(reach, reach));
        for y in lo.1..=hi.1 {
            for x in lo.0..=hi.0 {
                if self.grid.cell_center((x, y)).distance(&obstacle.center) < reach {
                    self.grid.set((x, y), true);
                }
            }
        }
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.grid.get(cell).copied().unwrap_or(true)
    }

    fn heuristic(&self, a: Cell, b: Cell) -> f32 {
        (a.0.abs_diff(b.0) + a.1.abs_diff(b.1)) as f32 * self.grid.cell_size
    }

    fn step_cost(&self, a: Cell, b: Cell) -> f32 {
        self.grid.cell_center(a).distance(&self.grid.cell_center(b))
    }

    fn passable(&self, cell: Cell, start: Cell, goal: Cell) -> bool {
        cell == start || cell == goal || !self.is_blocked(cell)
    }

    /// Cell sequence from start to goal, both included. None if unreachable.
    pub fn find_cells(&self, start: Cell, goal: Cell) -> Option<Vec<Cell>> {
        if start == goal {
            return Some(vec![start]);
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: BTreeMap<Cell, Cell> = BTreeMap::new();
        let mut g_scores: BTreeMap<Cell, f32> = BTreeMap::new();

        g_scores.insert(start, 0.0);
        open_set.push(Reverse(PathNode { f_cost: OrderedFloat(self.heuristic(start, goal)), cell: start }));

        while let Some(Reverse(current)) = open_set.pop() {
            if current.cell == goal {
                return Some(reconstruct_path(&came_from, goal));
            }
            let current_g = g_scores.get(&current.cell).copied().unwrap_or(f32::INFINITY);

            for neighbor in self.grid.neighbors(current.cell) {
                if !self.passable(neighbor, start, goal) {
                    continue;
                }
                // No squeezing diagonally between two blocked cells
                let diagonal = neighbor.0 != current.cell.0 && neighbor.1 != current.cell.1;
                if diagonal
                    && (!self.passable((neighbor.0, current.cell.1), start, goal)
                        || !self.passable((current.cell.0, neighbor.1), start, goal))
                {
                    continue;
                }

                let tentative_g = current_g + self.step_cost(current.cell, neighbor);
                let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(f32::INFINITY);
                if tentative_g < neighbor_g {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative_g);
                    let f_cost = OrderedFloat(tentative_g + self.heuristic(neighbor, goal));
                    open_set.push(Reverse(PathNode { f_cost, cell: neighbor }));
                }
            }
        }

        None
    }

    /// Waypoints from `start` to `goal` as the centers of the cells walked,
    /// ending at the goal cell's center. An unreachable goal yields the goal
    /// itself as the only waypoint.
    pub fn find_path(&self, start: Vec2, goal: Vec2) -> Vec<Vec2> {
        let (start_cell, goal_cell) = (self.cell_of(start), self.cell_of(goal));
        match self.find_cells(start_cell, goal_cell) {
            Some(cells) => cells.into_iter().map(|c| self.cell_center(c)).collect(),
            None => {
                tracing::debug!(?start, ?goal, "no path found, flying straight");
                vec![goal]
            }
        }
    }
}

fn reconstruct_path(came_from: &BTreeMap<Cell, Cell>, mut current: Cell) -> Vec<Cell> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
