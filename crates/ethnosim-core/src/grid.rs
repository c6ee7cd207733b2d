//! Row-major cell storage for the toroidal world.

use crate::{Agent, Stats};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-size grid of optional agents, indexed `y * width + x`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Option<Agent>>,
}

impl Grid {
    /// Create an empty grid.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
        }
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Agent at `idx`, if the index is in range and occupied.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Agent> {
        self.cells.get(idx).copied().flatten()
    }

    #[must_use]
    pub fn is_occupied(&self, idx: usize) -> bool {
        matches!(self.cells.get(idx), Some(Some(_)))
    }

    /// Read-only view of every cell.
    #[must_use]
    pub fn cells(&self) -> &[Option<Agent>] {
        &self.cells
    }

    /// Overwrite one cell. Returns `false` when `idx` is out of range.
    pub(crate) fn set(&mut self, idx: usize, agent: Option<Agent>) -> bool {
        match self.cells.get_mut(idx) {
            Some(slot) => {
                *slot = agent;
                true
            }
            None => false,
        }
    }

    /// Empty one cell, returning its previous occupant.
    pub(crate) fn take(&mut self, idx: usize) -> Option<Agent> {
        self.cells.get_mut(idx).and_then(Option::take)
    }

    pub(crate) fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Reset every occupant's PTR to `base_ptr`.
    pub(crate) fn reset_ptr(&mut self, base_ptr: f32) {
        for agent in self.cells.iter_mut().flatten() {
            agent.ptr = base_ptr;
        }
    }

    /// Indices of occupied cells in ascending order.
    #[must_use]
    pub fn occupied_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.is_some().then_some(idx))
            .collect()
    }

    /// Indices of empty cells in ascending order.
    #[must_use]
    pub fn empty_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.is_none().then_some(idx))
            .collect()
    }

    /// Count agents per phenotype and tag.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for agent in self.cells.iter().flatten() {
            stats.counts.increment(agent.phenotype());
            if let Some(slot) = stats.tag_counts.get_mut(agent.tag as usize) {
                *slot += 1;
            }
            stats.total += 1;
        }
        stats
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("occupied", &self.cells.iter().flatten().count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Phenotype;

    #[test]
    fn set_ignores_out_of_range_indices() {
        let mut grid = Grid::new(3, 2);
        assert!(!grid.set(6, Some(Agent::new(0, true, false, 0.1))));
        assert!(grid.set(5, Some(Agent::new(0, true, false, 0.1))));
        assert_eq!(grid.occupied_cells(), vec![5]);
        assert_eq!(grid.empty_cells().len(), 5);
        assert_eq!(grid.take(5).map(|a| a.tag), Some(0));
        assert!(!grid.is_occupied(5));
    }

    #[test]
    fn stats_count_phenotypes_and_tags() {
        let mut grid = Grid::new(4, 1);
        grid.set(0, Some(Agent::with_phenotype(0, Phenotype::Altruist, 0.1)));
        grid.set(1, Some(Agent::with_phenotype(3, Phenotype::Altruist, 0.1)));
        grid.set(3, Some(Agent::with_phenotype(3, Phenotype::Traitor, 0.1)));
        let stats = grid.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.counts.altruist, 2);
        assert_eq!(stats.counts.traitor, 1);
        assert_eq!(stats.counts.sum(), stats.total);
        assert_eq!(stats.tag_counts, [1, 0, 0, 2]);
    }
}
