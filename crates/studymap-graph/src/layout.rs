use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use studymap_core::{NodeId, Position};

/// Spacing and grid parameters for the topic graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance between siblings
    pub horizontal_spacing: f32,
    /// Distance from a parent down to its row of children
    pub vertical_offset: f32,
    /// Cell size used when snapping positions
    pub grid_size: f32,
    /// Downward shift applied on each collision
    pub collision_step: f32,
    /// Row the seeded root nodes sit on
    pub root_y: f32,
}

impl LayoutConfig {
    pub const DEFAULT_HORIZONTAL_SPACING: f32 = 250.0;
    pub const DEFAULT_VERTICAL_OFFSET: f32 = 150.0;
    pub const DEFAULT_GRID_SIZE: f32 = 50.0;
    pub const DEFAULT_COLLISION_STEP: f32 = 50.0;
    pub const DEFAULT_ROOT_Y: f32 = 100.0;
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: Self::DEFAULT_HORIZONTAL_SPACING,
            vertical_offset: Self::DEFAULT_VERTICAL_OFFSET,
            grid_size: Self::DEFAULT_GRID_SIZE,
            collision_step: Self::DEFAULT_COLLISION_STEP,
            root_y: Self::DEFAULT_ROOT_Y,
        }
    }
}

/// What the collision pass needs to know about one node.
#[derive(Debug, Clone)]
pub struct LayoutItem {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub position: Position,
}

type Cell = (i64, i64);

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    pub config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Roots spread along one row, the middle topic at x = 0.
    pub fn root_positions(&self, count: usize) -> Vec<Position> {
        let center = (count / 2) as f32;
        (0..count)
            .map(|i| {
                Position::new(
                    self.config.horizontal_spacing * (i as f32 - center),
                    self.config.root_y,
                )
            })
            .collect()
    }

    /// Children centred under `parent`, one row below it.
    pub fn child_positions(&self, parent: Position, count: usize) -> Vec<Position> {
        if count == 0 {
            return Vec::new();
        }
        let center = (count - 1) as f32 / 2.0;
        let y = parent.y + self.config.vertical_offset;
        (0..count)
            .map(|i| {
                Position::new(
                    parent.x + (i as f32 - center) * self.config.horizontal_spacing,
                    y,
                )
            })
            .collect()
    }

    fn grid(&self) -> f64 {
        f64::from(self.config.grid_size.max(1.0))
    }

    fn snap(&self, position: Position) -> Cell {
        let grid = self.grid();
        (
            (f64::from(position.x) / grid).round() as i64,
            (f64::from(position.y) / grid).round() as i64,
        )
    }

    fn cell_position(&self, cell: Cell) -> Position {
        let grid = self.grid();
        Position::new((cell.0 as f64 * grid) as f32, (cell.1 as f64 * grid) as f32)
    }

    fn step_rows(&self) -> i64 {
        ((f64::from(self.config.collision_step) / self.grid()).ceil() as i64).max(1)
    }

    /// Snap every item to the grid and push overlapping items downward.
    ///
    /// Items are visited by increasing depth, ties in the given order, so a
    /// parent is final before any of its children is placed. Returns the new
    /// position of every item.
    pub fn resolve_collisions(&self, items: &[LayoutItem]) -> HashMap<NodeId, Position> {
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by_key(|&i| items[i].depth);

        let step = self.step_rows();
        let grid = self.grid();
        let mut occupied: HashSet<Cell> = HashSet::with_capacity(items.len());
        let mut placed: HashMap<NodeId, Position> = HashMap::with_capacity(items.len());

        for idx in order {
            let item = &items[idx];
            let mut cell = self.snap(item.position);

            if let Some(parent_pos) = item.parent.as_ref().and_then(|p| placed.get(p)) {
                let min_y = f64::from(parent_pos.y) + f64::from(self.config.vertical_offset);
                let min_row = (min_y / grid).ceil() as i64;
                if cell.1 < min_row {
                    cell.1 = min_row;
                }
            }

            while occupied.contains(&cell) {
                cell.1 += step;
            }

            occupied.insert(cell);
            placed.insert(item.id.clone(), self.cell_position(cell));
        }

        placed
    }
}
