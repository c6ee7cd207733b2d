//! The four-phase tick engine and its seeding operations.

use crate::grid::Grid;
use crate::observer::{
    CooperationEvent, DeathEvent, NullObserver, ReproductionEvent, SimulationObserver,
};
use crate::payoff;
use crate::{
    Agent, Distribution, EngineError, Generation, ParamsPatch, Phenotype, ScenarioMode,
    SimulationConfig, SimulationParams, Stats,
};
use ethnosim_index::{NeighborhoodIndex, ToroidalNeighbors};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// One agent placement for [`SimulationEngine::set_seed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAgent {
    pub idx: usize,
    pub tag: u8,
    /// In-group bit; drawn at random when absent.
    #[serde(default)]
    pub ig: Option<bool>,
    /// Out-group bit; drawn at random when absent.
    #[serde(default)]
    pub og: Option<bool>,
}

impl SeedAgent {
    #[must_use]
    pub const fn new(idx: usize, tag: u8) -> Self {
        Self {
            idx,
            tag,
            ig: None,
            og: None,
        }
    }

    #[must_use]
    pub const fn with_phenotype(idx: usize, tag: u8, phenotype: Phenotype) -> Self {
        let (ig, og) = phenotype.traits();
        Self {
            idx,
            tag,
            ig: Some(ig),
            og: Some(og),
        }
    }
}

/// Per-phase counts for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Generation reached by this tick.
    pub generation: Generation,
    pub immigrants: usize,
    /// Directed actor/partner evaluations in the interaction phase.
    pub encounters: usize,
    /// One-directional PTR transfers.
    pub cooperations: usize,
    pub births: usize,
    pub deaths: usize,
}

/// Owns the grid and advances it one generation per [`SimulationEngine::tick`].
pub struct SimulationEngine {
    grid: Grid,
    neighbors: Arc<ToroidalNeighbors>,
    params: SimulationParams,
    scenario: ScenarioMode,
    tag_count: u8,
    generation: Generation,
    rng: Box<dyn RngCore>,
    observer: Box<dyn SimulationObserver>,
}

impl fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("grid", &self.grid)
            .field("params", &self.params)
            .field("scenario", &self.scenario)
            .field("tag_count", &self.tag_count)
            .field("generation", &self.generation)
            .finish()
    }
}

impl SimulationEngine {
    /// Instantiate an engine with no observer.
    pub fn new(config: SimulationConfig) -> Result<Self, EngineError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Instantiate an engine that reports tick events to `observer`.
    pub fn with_observer(
        config: SimulationConfig,
        observer: Box<dyn SimulationObserver>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let neighbors = ToroidalNeighbors::shared(config.grid_width, config.grid_height)?;
        let rng = config.seeded_rng();
        debug!(
            width = config.grid_width,
            height = config.grid_height,
            scenario = ?config.scenario,
            tag_count = config.tag_count,
            seeded = config.rng_seed.is_some(),
            "simulation engine created"
        );
        Ok(Self {
            grid: Grid::new(config.grid_width, config.grid_height),
            neighbors,
            params: config.params,
            scenario: config.scenario,
            tag_count: config.tag_count,
            generation: Generation::zero(),
            rng: Box::new(rng),
            observer,
        })
    }

    /// Replace the event observer, returning the previous one.
    pub fn set_observer(
        &mut self,
        observer: Box<dyn SimulationObserver>,
    ) -> Box<dyn SimulationObserver> {
        std::mem::replace(&mut self.observer, observer)
    }

    /// Replace the random source used by every stochastic phase.
    pub fn set_rng(&mut self, rng: Box<dyn RngCore>) {
        self.rng = rng;
    }

    /// Restart the random source from a fixed seed.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Box::new(SmallRng::seed_from_u64(seed));
    }

    /// Run immigration, interaction, reproduction, and death, then advance the generation.
    pub fn tick(&mut self) -> TickReport {
        let immigrants = self.stage_immigration();
        let (encounters, cooperations) = self.stage_interaction();
        let births = self.stage_reproduction();
        let deaths = self.stage_death();
        self.generation = self.generation.next();
        trace!(
            generation = self.generation.0,
            immigrants, encounters, cooperations, births, deaths, "tick complete"
        );
        TickReport {
            generation: self.generation,
            immigrants,
            encounters,
            cooperations,
            births,
            deaths,
        }
    }

    fn stage_immigration(&mut self) -> usize {
        let arrivals = self.params.immigration_rate.max(0.0).floor() as usize;
        if arrivals == 0 {
            return 0;
        }
        let mut empty = self.grid.empty_cells();
        let mut placed = 0;
        while placed < arrivals && !empty.is_empty() {
            let pick = self.rng.random_range(0..empty.len());
            let cell = empty.swap_remove(pick);
            let tag = self.rng.random_range(0..self.tag_count);
            let agent = self.fresh_agent(tag, None, None);
            self.grid.set(cell, Some(agent));
            placed += 1;
        }
        placed
    }

    /// Returns `(directed encounters, transfers)`.
    fn stage_interaction(&mut self) -> (usize, usize) {
        let SimulationParams {
            cost,
            benefit,
            base_ptr,
            ..
        } = self.params;
        self.grid.reset_ptr(base_ptr);
        let mut encounters = 0;
        let mut transfers = 0;
        for cell in 0..self.grid.len() {
            if !self.grid.is_occupied(cell) {
                continue;
            }
            for &neighbor in self.neighbors.neighbors_of(cell) {
                // Each adjacency is evaluated once, from its lower-indexed end.
                if neighbor <= cell {
                    continue;
                }
                let (Some(mut actor), Some(mut partner)) =
                    (self.grid.get(cell), self.grid.get(neighbor))
                else {
                    continue;
                };
                encounters += 2;
                let outcome = payoff::encounter(&mut actor, &mut partner, cost, benefit);
                if outcome.transfers() == 0 {
                    continue;
                }
                self.grid.set(cell, Some(actor));
                self.grid.set(neighbor, Some(partner));
                transfers += outcome.transfers();
                if outcome.actor_gave {
                    self.observer.on_cooperation(&CooperationEvent {
                        giver: cell,
                        receiver: neighbor,
                        cost,
                        benefit,
                        giver_agent: actor,
                    });
                }
                if outcome.partner_gave {
                    self.observer.on_cooperation(&CooperationEvent {
                        giver: neighbor,
                        receiver: cell,
                        cost,
                        benefit,
                        giver_agent: partner,
                    });
                }
            }
        }
        (encounters, transfers)
    }

    fn stage_reproduction(&mut self) -> usize {
        let mut order = self.grid.occupied_cells();
        order.shuffle(&mut self.rng);
        let SimulationParams {
            base_ptr,
            mutation_rate,
            ..
        } = self.params;
        let mut births = 0;
        for parent_idx in order {
            let Some(parent) = self.grid.get(parent_idx) else {
                continue;
            };
            if self.rng.random::<f32>() >= parent.ptr {
                continue;
            }
            let open = self
                .neighbors
                .neighbors_of(parent_idx)
                .iter()
                .copied()
                .filter(|&n| !self.grid.is_occupied(n));
            let open_count = open.clone().count();
            if open_count == 0 {
                continue;
            }
            let pick = self.rng.random_range(0..open_count);
            let Some(child_idx) = open.clone().nth(pick) else {
                continue;
            };
            let offspring = mutate(
                &mut self.rng,
                &parent,
                mutation_rate,
                self.tag_count,
                base_ptr,
            );
            self.grid.set(child_idx, Some(offspring));
            births += 1;
            self.observer.on_reproduction(&ReproductionEvent {
                parent: parent_idx,
                child: child_idx,
                offspring,
            });
        }
        births
    }

    fn stage_death(&mut self) -> usize {
        let death_rate = self.params.death_rate;
        let mut deaths = 0;
        for cell in 0..self.grid.len() {
            let Some(agent) = self.grid.get(cell) else {
                continue;
            };
            if self.rng.random::<f32>() < death_rate {
                self.observer.on_death(&DeathEvent { cell, agent });
                self.grid.take(cell);
                deaths += 1;
            }
        }
        deaths
    }

    /// Agent placed by immigration or seeding, with the scenario's forced phenotype applied.
    fn fresh_agent(&mut self, tag: u8, ig: Option<bool>, og: Option<bool>) -> Agent {
        let base_ptr = self.params.base_ptr;
        if let Some(phenotype) = self.scenario.forced_phenotype(tag) {
            return Agent::with_phenotype(tag, phenotype, base_ptr);
        }
        let ig = ig.unwrap_or_else(|| self.rng.random_bool(0.5));
        let og = og.unwrap_or_else(|| self.rng.random_bool(0.5));
        Agent::new(tag, ig, og, base_ptr)
    }

    /// Empty the grid and return to generation zero.
    pub fn reset(&mut self) {
        self.grid.clear();
        self.generation = Generation::zero();
        debug!("simulation reset");
    }

    /// Write one cell directly. Out-of-range indices are ignored and return `false`.
    pub fn set_cell(&mut self, idx: usize, agent: Option<Agent>) -> bool {
        self.grid.set(idx, agent)
    }

    /// Place a fresh agent with `phenotype` and `tag` (brush tool).
    ///
    /// Ignored when `idx` or `tag` is out of range.
    pub fn paint(&mut self, idx: usize, phenotype: Phenotype, tag: u8) -> bool {
        if tag >= self.tag_count {
            return false;
        }
        let agent = Agent::with_phenotype(tag, phenotype, self.params.base_ptr);
        self.grid.set(idx, Some(agent))
    }

    /// Empty the wrapped square of side `2 * radius + 1` centred on `center`.
    ///
    /// Returns how many agents were removed.
    pub fn clear_region(&mut self, center: usize, radius: u32) -> usize {
        let mut removed = 0;
        for cell in self.neighbors.square_block(center, radius) {
            if self.grid.take(cell).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Reset, then place each listed agent.
    ///
    /// Entries with an out-of-range index or tag, or targeting an already seeded
    /// cell, are skipped. Missing cooperation bits are drawn at random, and the
    /// group-mapped scenario overrides them entirely.
    pub fn set_seed(&mut self, agents: &[SeedAgent]) {
        self.reset();
        let mut placed = 0;
        for seed in agents {
            if seed.idx >= self.grid.len()
                || seed.tag >= self.tag_count
                || self.grid.is_occupied(seed.idx)
            {
                continue;
            }
            let agent = self.fresh_agent(seed.tag, seed.ig, seed.og);
            self.grid.set(seed.idx, Some(agent));
            placed += 1;
        }
        debug!(requested = agents.len(), placed, "seeded explicit agents");
    }

    /// Reset and fill every cell from `distribution`.
    pub fn seed_by_distribution(&mut self, distribution: &Distribution) {
        self.seed_by_distribution_with_fill(distribution, 1.0);
    }

    /// Reset and populate `round(size * fill_ratio)` cells from `distribution`.
    ///
    /// Per-phenotype counts are rounded from the fractions; shortfalls are padded
    /// by cycling through the phenotypes and excess entries are dropped. Each
    /// placed agent receives a uniformly random tag.
    pub fn seed_by_distribution_with_fill(&mut self, distribution: &Distribution, fill_ratio: f32) {
        self.reset();
        let size = self.grid.len();
        let placed = fill_count(size, fill_ratio);

        let mut phenotypes = Vec::with_capacity(placed);
        for phenotype in Phenotype::ALL {
            let wanted = (f64::from(distribution.fraction(phenotype)) * placed as f64).round();
            let count = (wanted.max(0.0) as usize).min(placed);
            phenotypes.extend(std::iter::repeat_n(phenotype, count));
        }
        while phenotypes.len() < placed {
            phenotypes.push(Phenotype::ALL[phenotypes.len() % Phenotype::ALL.len()]);
        }
        phenotypes.truncate(placed);
        phenotypes.shuffle(&mut self.rng);

        let mut cells: Vec<usize> = (0..size).collect();
        if placed < size {
            cells.shuffle(&mut self.rng);
        }
        for (cell, phenotype) in cells.into_iter().zip(phenotypes) {
            let tag = self.rng.random_range(0..self.tag_count);
            let (ig, og) = phenotype.traits();
            let agent = self.fresh_agent(tag, Some(ig), Some(og));
            self.grid.set(cell, Some(agent));
        }
        debug!(placed, size, "seeded from distribution");
    }

    /// Reset and populate two groups on randomly chosen cells.
    ///
    /// `round(size * fill_ratio)` cells are filled; the first `round(filled * ratio_a)`
    /// receive `group_a` with tag 0 and the rest `group_b` with tag 1. Both ratios
    /// are clamped to `[0, 1]`. The phenotypes are placed as given, even in the
    /// group-mapped scenario.
    pub fn seed_two_groups(
        &mut self,
        group_a: Phenotype,
        group_b: Phenotype,
        ratio_a: f32,
        fill_ratio: f32,
    ) {
        self.reset();
        let size = self.grid.len();
        let mut cells: Vec<usize> = (0..size).collect();
        cells.shuffle(&mut self.rng);
        let placed = fill_count(size, fill_ratio);
        let count_a = fill_count(placed, ratio_a);
        let tag_b = 1u8.min(self.tag_count - 1);
        let base_ptr = self.params.base_ptr;
        for (i, &cell) in cells.iter().take(placed).enumerate() {
            let agent = if i < count_a {
                Agent::with_phenotype(0, group_a, base_ptr)
            } else {
                Agent::with_phenotype(tag_b, group_b, base_ptr)
            };
            self.grid.set(cell, Some(agent));
        }
        debug!(placed, group_a = count_a, group_b = placed - count_a, "seeded two groups");
    }

    /// Merge `patch` into the current parameters.
    ///
    /// The merged record is validated first; on error nothing changes.
    pub fn set_params(&mut self, patch: &ParamsPatch) -> Result<(), EngineError> {
        let merged = self.params.merged(patch);
        merged.validate()?;
        self.params = merged;
        debug!(params = ?self.params, "parameters updated");
        Ok(())
    }

    /// Population summary recomputed from the grid.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.grid.stats()
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Agent at `idx`, if any.
    #[must_use]
    pub fn agent(&self, idx: usize) -> Option<Agent> {
        self.grid.get(idx)
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Number of cells in the grid.
    #[must_use]
    pub fn size(&self) -> usize {
        self.grid.len()
    }

    #[must_use]
    pub const fn params(&self) -> &SimulationParams {
        &self.params
    }

    #[must_use]
    pub const fn scenario(&self) -> ScenarioMode {
        self.scenario
    }

    #[must_use]
    pub const fn tag_count(&self) -> u8 {
        self.tag_count
    }

    /// Shared neighbor table for this grid.
    #[must_use]
    pub fn neighbors(&self) -> &ToroidalNeighbors {
        &self.neighbors
    }
}

/// `round(total * ratio)` with the ratio clamped to `[0, 1]`; NaN counts as zero.
fn fill_count(total: usize, ratio: f32) -> usize {
    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    ((total as f64 * f64::from(ratio)).round() as usize).min(total)
}

/// Copy `parent` with each trait independently redrawn with probability `mutation_rate`.
fn mutate<R: Rng + ?Sized>(
    rng: &mut R,
    parent: &Agent,
    mutation_rate: f32,
    tag_count: u8,
    base_ptr: f32,
) -> Agent {
    let mut child = Agent {
        ptr: base_ptr,
        ..*parent
    };
    if rng.random::<f32>() < mutation_rate {
        child.tag = rng.random_range(0..tag_count);
    }
    if rng.random::<f32>() < mutation_rate {
        child.ig = rng.random_bool(0.5);
    }
    if rng.random::<f32>() < mutation_rate {
        child.og = rng.random_bool(0.5);
    }
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventCallbacks;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn quiet_params() -> SimulationParams {
        SimulationParams {
            death_rate: 0.0,
            mutation_rate: 0.0,
            immigration_rate: 0.0,
            ..SimulationParams::default()
        }
    }

    fn engine(width: u32, height: u32, params: SimulationParams) -> SimulationEngine {
        SimulationEngine::new(SimulationConfig {
            grid_width: width,
            grid_height: height,
            rng_seed: Some(0xE7_4A0),
            params,
            ..SimulationConfig::default()
        })
        .expect("engine")
    }

    #[test]
    fn interaction_applies_each_direction_once_per_adjacency() {
        // Horizontal strip of three: altruist(0) - egoist(1) - altruist(2), all tag 0.
        let params = SimulationParams {
            base_ptr: 0.0,
            ..quiet_params()
        };
        let mut engine = engine(5, 1, params);
        engine.set_cell(0, Some(Agent::with_phenotype(0, Phenotype::Altruist, 0.0)));
        engine.set_cell(1, Some(Agent::with_phenotype(0, Phenotype::Egoist, 0.0)));
        engine.set_cell(2, Some(Agent::with_phenotype(0, Phenotype::Altruist, 0.0)));
        let (encounters, transfers) = engine.stage_interaction();
        assert_eq!(encounters, 4);
        assert_eq!(transfers, 2);
        let egoist = engine.agent(1).expect("egoist");
        let left = engine.agent(0).expect("left");
        assert!((egoist.ptr - 0.06).abs() < 1e-6);
        assert!((left.ptr + 0.01).abs() < 1e-6);
    }

    #[test]
    fn interaction_resets_ptr_before_transfers() {
        let mut engine = engine(3, 3, quiet_params());
        engine.set_cell(4, Some(Agent::with_phenotype(1, Phenotype::Egoist, 9.0)));
        engine.stage_interaction();
        assert_eq!(engine.agent(4).map(|a| a.ptr), Some(0.12));
    }

    #[test]
    fn single_cell_grid_does_not_interact_with_itself() {
        let mut engine = engine(1, 1, quiet_params());
        engine.set_cell(0, Some(Agent::with_phenotype(0, Phenotype::Altruist, 0.0)));
        assert_eq!(engine.stage_interaction(), (0, 0));
        assert_eq!(engine.agent(0).map(|a| a.ptr), Some(0.12));
    }

    #[test]
    fn cooperation_events_report_giver_and_receiver() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let callbacks = EventCallbacks::new().cooperation(move |event| {
            sink.borrow_mut().push((event.giver, event.receiver));
        });
        let mut engine = engine(4, 1, quiet_params());
        engine.set_observer(Box::new(callbacks));
        engine.set_cell(1, Some(Agent::with_phenotype(0, Phenotype::Traitor, 0.0)));
        engine.set_cell(2, Some(Agent::with_phenotype(1, Phenotype::Ethnocentric, 0.0)));
        engine.stage_interaction();
        assert_eq!(*seen.borrow(), vec![(1, 2)]);
    }

    #[test]
    fn immigration_is_bounded_by_empty_cells() {
        let params = SimulationParams {
            immigration_rate: 50.0,
            ..quiet_params()
        };
        let mut engine = engine(3, 3, params);
        assert_eq!(engine.stage_immigration(), 9);
        assert_eq!(engine.stage_immigration(), 0);
        assert!(engine.grid().cells().iter().all(|cell| {
            cell.is_some_and(|agent| agent.ptr == 0.12 && agent.tag < 4)
        }));
    }

    #[test]
    fn immigration_ignores_fractional_rate() {
        let params = SimulationParams {
            immigration_rate: 2.9,
            ..quiet_params()
        };
        let mut engine = engine(4, 4, params);
        assert_eq!(engine.stage_immigration(), 2);
    }

    #[test]
    fn reproduction_without_open_neighbors_is_skipped() {
        let params = SimulationParams {
            base_ptr: 1.0,
            ..quiet_params()
        };
        let mut engine = engine(3, 3, params);
        for idx in 0..9 {
            engine.set_cell(idx, Some(Agent::with_phenotype(0, Phenotype::Egoist, 1.0)));
        }
        assert_eq!(engine.stage_reproduction(), 0);
    }

    #[test]
    fn certain_reproduction_fills_a_neighbor_with_a_copy() {
        let mut engine = engine(5, 5, quiet_params());
        engine.set_cell(12, Some(Agent::with_phenotype(2, Phenotype::Traitor, 1.0)));
        assert_eq!(engine.stage_reproduction(), 1);
        let neighbors: Vec<usize> = engine.neighbors().neighbors_of(12).to_vec();
        let children: Vec<Agent> = neighbors
            .iter()
            .filter_map(|&n| engine.agent(n))
            .collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].tag, 2);
        assert_eq!(children[0].phenotype(), Phenotype::Traitor);
        assert_eq!(children[0].ptr, 0.12);
    }

    #[test]
    fn certain_mutation_keeps_traits_in_range() {
        let mut rng = SmallRng::seed_from_u64(7);
        let parent = Agent::with_phenotype(0, Phenotype::Ethnocentric, 0.5);
        for _ in 0..200 {
            let child = mutate(&mut rng, &parent, 1.0, 3, 0.12);
            assert!(child.tag < 3);
            assert_eq!(child.ptr, 0.12);
        }
        let unchanged = mutate(&mut rng, &parent, 0.0, 3, 0.12);
        assert_eq!(unchanged.tag, 0);
        assert_eq!(unchanged.phenotype(), Phenotype::Ethnocentric);
    }

    #[test]
    fn certain_death_empties_grid_and_reports_each_agent() {
        let deaths = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&deaths);
        let mut engine = engine(4, 4, quiet_params());
        engine.set_observer(Box::new(
            EventCallbacks::new().death(move |event| sink.borrow_mut().push(event.cell)),
        ));
        engine.set_cell(3, Some(Agent::new(0, true, true, 0.1)));
        engine.set_cell(9, Some(Agent::new(1, false, true, 0.1)));
        engine
            .set_params(&ParamsPatch {
                death_rate: Some(1.0),
                ..ParamsPatch::default()
            })
            .expect("params");
        assert_eq!(engine.stage_death(), 2);
        assert_eq!(*deaths.borrow(), vec![3, 9]);
        assert_eq!(engine.stats().total, 0);
    }

    #[test]
    fn rejected_params_leave_engine_unchanged() {
        let mut engine = engine(2, 2, quiet_params());
        let before = *engine.params();
        let err = engine
            .set_params(&ParamsPatch {
                mutation_rate: Some(2.0),
                cost: Some(0.5),
                ..ParamsPatch::default()
            })
            .expect_err("invalid");
        assert!(matches!(err, EngineError::InvalidParams(_)));
        assert_eq!(*engine.params(), before);
    }

    #[test]
    fn fill_count_clamps_and_rounds() {
        assert_eq!(fill_count(100, 0.5), 50);
        assert_eq!(fill_count(225, 0.5), 113);
        assert_eq!(fill_count(10, 3.0), 10);
        assert_eq!(fill_count(10, -1.0), 0);
        assert_eq!(fill_count(10, f32::NAN), 0);
    }
}
