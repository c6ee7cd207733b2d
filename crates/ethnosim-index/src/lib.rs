//! Toroidal grid coordinates and cached 4-neighbor tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Number of orthogonal neighbors every toroidal cell has.
pub const NEIGHBOR_COUNT: usize = 4;

/// Errors emitted when building neighbor tables.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates grid dimensions that cannot be used (e.g., zero width).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Direction of a neighbor slot, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Slot order used by every neighbor table.
    pub const ALL: [Direction; NEIGHBOR_COUNT] =
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Coordinate offset `(dx, dy)` for this direction; `y` grows downward.
    #[must_use]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Wrap a signed coordinate into `[0, dim)`.
///
/// Uses Euclidean remainder so negative inputs wrap from the far edge.
#[must_use]
pub fn wrap_coord(coord: i64, dim: u32) -> u32 {
    debug_assert!(dim > 0, "dimension must be positive");
    coord.rem_euclid(i64::from(dim)) as u32
}

/// Row-major index of the (wrapped) cell at `(x, y)`.
#[must_use]
pub fn cell_index(x: i64, y: i64, width: u32, height: u32) -> usize {
    let x = wrap_coord(x, width) as usize;
    let y = wrap_coord(y, height) as usize;
    y * width as usize + x
}

/// `(x, y)` coordinates of a row-major cell index.
#[must_use]
pub fn cell_coords(idx: usize, width: u32) -> (u32, u32) {
    let width = width as usize;
    ((idx % width) as u32, (idx / width) as u32)
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Total number of cells covered by the index.
    fn cell_count(&self) -> usize;

    /// Neighbor indices of `cell`, in table order.
    fn neighbors_of(&self, cell: usize) -> &[usize];
}

/// Precomputed up/down/left/right neighbors for every cell of a toroidal grid.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToroidalNeighbors {
    width: u32,
    height: u32,
    table: Vec<[usize; NEIGHBOR_COUNT]>,
}

impl ToroidalNeighbors {
    /// Build the neighbor table for a `width` x `height` torus.
    pub fn new(width: u32, height: u32) -> Result<Self, IndexError> {
        if width == 0 || height == 0 {
            return Err(IndexError::InvalidConfig(
                "grid dimensions must be positive",
            ));
        }
        let mut table = Vec::with_capacity(width as usize * height as usize);
        for y in 0..i64::from(height) {
            for x in 0..i64::from(width) {
                table.push(Direction::ALL.map(|dir| {
                    let (dx, dy) = dir.offset();
                    cell_index(x + dx, y + dy, width, height)
                }));
            }
        }
        Ok(Self {
            width,
            height,
            table,
        })
    }

    /// Shared table for the given dimensions, built on first request.
    ///
    /// Tables are immutable, so every engine with the same dimensions reuses
    /// one allocation for the lifetime of the process.
    pub fn shared(width: u32, height: u32) -> Result<Arc<Self>, IndexError> {
        static CACHE: OnceLock<Mutex<HashMap<(u32, u32), Arc<ToroidalNeighbors>>>> =
            OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = guard.get(&(width, height)) {
            return Ok(Arc::clone(existing));
        }
        let built = Arc::new(Self::new(width, height)?);
        guard.insert((width, height), Arc::clone(&built));
        Ok(built)
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Neighbor in a specific direction.
    #[must_use]
    pub fn neighbor(&self, cell: usize, direction: Direction) -> Option<usize> {
        let slot = Direction::ALL.iter().position(|d| *d == direction)?;
        self.table.get(cell).map(|row| row[slot])
    }

    /// Cells of the wrapped square block of side `2 * radius + 1` centred on `center`.
    ///
    /// An axis the block would wrap past is covered once, so no cell repeats
    /// and the walk never exceeds `width * height` cells.
    pub fn square_block(&self, center: usize, radius: u32) -> impl Iterator<Item = usize> + '_ {
        let (cx, cy) = cell_coords(center, self.width);
        let columns = block_offsets(radius, self.width);
        block_offsets(radius, self.height).flat_map(move |dy| {
            columns.clone().map(move |dx| {
                cell_index(
                    i64::from(cx) + dx,
                    i64::from(cy) + dy,
                    self.width,
                    self.height,
                )
            })
        })
    }
}

/// Offsets along one axis of length `extent`, clamped to a single lap.
fn block_offsets(radius: u32, extent: u32) -> RangeInclusive<i64> {
    let radius = i64::from(radius);
    let extent = i64::from(extent.max(1));
    if 2 * radius + 1 >= extent {
        0..=extent - 1
    } else {
        -radius..=radius
    }
}

impl NeighborhoodIndex for ToroidalNeighbors {
    fn cell_count(&self) -> usize {
        self.table.len()
    }

    fn neighbors_of(&self, cell: usize) -> &[usize] {
        self.table
            .get(cell)
            .map(|row| row.as_slice())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ToroidalNeighbors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToroidalNeighbors")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("cells", &self.table.len())
            .finish()
    }
}
