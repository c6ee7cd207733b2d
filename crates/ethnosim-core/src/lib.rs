//! Core types and the tick engine for the ethnosim tag/strategy simulation.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod engine;
pub mod grid;
pub mod observer;
pub mod payoff;
pub mod presets;

pub use engine::{SeedAgent, SimulationEngine, TickReport};
pub use ethnosim_index::{IndexError, NeighborhoodIndex, ToroidalNeighbors};
pub use grid::Grid;
pub use observer::{
    CooperationEvent, DeathEvent, EventCallbacks, NullObserver, ReproductionEvent,
    SimulationObserver,
};
pub use presets::{Distribution, GridPreset};

/// Largest number of distinct tags a simulation may use.
pub const MAX_TAG_COUNT: usize = 4;

/// Behavioural class derived from an agent's in-group and out-group bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phenotype {
    /// Cooperates with its own tag only.
    Ethnocentric,
    /// Cooperates with everyone.
    Altruist,
    /// Cooperates with no one.
    Egoist,
    /// Cooperates with other tags only.
    Traitor,
}

impl Phenotype {
    /// All phenotypes in reporting order.
    pub const ALL: [Phenotype; 4] = [
        Phenotype::Ethnocentric,
        Phenotype::Altruist,
        Phenotype::Egoist,
        Phenotype::Traitor,
    ];

    /// `(ig, og)` bits that produce this phenotype.
    #[must_use]
    pub const fn traits(self) -> (bool, bool) {
        match self {
            Phenotype::Ethnocentric => (true, false),
            Phenotype::Altruist => (true, true),
            Phenotype::Egoist => (false, false),
            Phenotype::Traitor => (false, true),
        }
    }

    #[must_use]
    pub const fn from_traits(ig: bool, og: bool) -> Self {
        match (ig, og) {
            (true, false) => Phenotype::Ethnocentric,
            (true, true) => Phenotype::Altruist,
            (false, false) => Phenotype::Egoist,
            (false, true) => Phenotype::Traitor,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Phenotype::Ethnocentric => "Ethnocentric",
            Phenotype::Altruist => "Altruist",
            Phenotype::Egoist => "Egoist",
            Phenotype::Traitor => "Traitor",
        }
    }
}

/// A single grid occupant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Group identity in `[0, tag_count)`.
    pub tag: u8,
    /// Cooperates with agents sharing its tag.
    pub ig: bool,
    /// Cooperates with agents carrying a different tag.
    pub og: bool,
    /// Potential to reproduce for the current tick.
    pub ptr: f32,
}

impl Agent {
    #[must_use]
    pub const fn new(tag: u8, ig: bool, og: bool, ptr: f32) -> Self {
        Self { tag, ig, og, ptr }
    }

    /// Agent expressing `phenotype` under `tag`.
    #[must_use]
    pub const fn with_phenotype(tag: u8, phenotype: Phenotype, ptr: f32) -> Self {
        let (ig, og) = phenotype.traits();
        Self { tag, ig, og, ptr }
    }

    /// Phenotype derived from the cooperation bits.
    #[must_use]
    pub const fn phenotype(&self) -> Phenotype {
        Phenotype::from_traits(self.ig, self.og)
    }
}

/// How freshly placed agents obtain their cooperation bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    /// Tags and strategies are independent.
    #[default]
    Standard,
    /// Each tag forces a fixed phenotype (tag 0 ethnocentric, 1 altruist, 2 egoist, 3 traitor).
    #[serde(alias = "clash")]
    GroupMapped,
}

impl ScenarioMode {
    /// Tag-to-phenotype table used by [`ScenarioMode::GroupMapped`].
    pub const GROUP_TABLE: [Phenotype; MAX_TAG_COUNT] = [
        Phenotype::Ethnocentric,
        Phenotype::Altruist,
        Phenotype::Egoist,
        Phenotype::Traitor,
    ];

    /// Phenotype forced onto `tag`, if this scenario forces one.
    #[must_use]
    pub fn forced_phenotype(self, tag: u8) -> Option<Phenotype> {
        match self {
            ScenarioMode::Standard => None,
            ScenarioMode::GroupMapped => Some(Self::GROUP_TABLE[tag as usize % MAX_TAG_COUNT]),
        }
    }
}

/// Monotonic generation counter, advanced once per completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// Returns the next generation value.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Errors surfaced by engine construction and parameter updates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A parameter update would leave the engine in an invalid state.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Payoff and population-dynamics parameters read by every tick phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// PTR subtracted from a cooperating giver.
    pub cost: f32,
    /// PTR added to the receiver of cooperation.
    pub benefit: f32,
    /// PTR every agent starts a tick with.
    pub base_ptr: f32,
    /// Per-tick probability that an agent dies.
    pub death_rate: f32,
    /// Per-trait probability that an offspring trait is redrawn.
    pub mutation_rate: f32,
    /// Immigrants placed per tick (fractional part ignored).
    pub immigration_rate: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            cost: 0.01,
            benefit: 0.03,
            base_ptr: 0.12,
            death_rate: 0.10,
            mutation_rate: 0.005,
            immigration_rate: 1.0,
        }
    }
}

impl SimulationParams {
    /// Check every field is finite, non-negative, and that probabilities are at most one.
    pub fn validate(&self) -> Result<(), EngineError> {
        let checks: [(f32, &'static str); 6] = [
            (self.cost, "cost must be finite and non-negative"),
            (self.benefit, "benefit must be finite and non-negative"),
            (self.base_ptr, "base_ptr must be finite and non-negative"),
            (self.death_rate, "death_rate must be finite and non-negative"),
            (self.mutation_rate, "mutation_rate must be finite and non-negative"),
            (
                self.immigration_rate,
                "immigration_rate must be finite and non-negative",
            ),
        ];
        for (value, message) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidParams(message));
            }
        }
        if self.death_rate > 1.0 {
            return Err(EngineError::InvalidParams("death_rate must not exceed 1"));
        }
        if self.mutation_rate > 1.0 {
            return Err(EngineError::InvalidParams(
                "mutation_rate must not exceed 1",
            ));
        }
        Ok(())
    }

    /// Copy of `self` with every field present in `patch` replaced.
    #[must_use]
    pub fn merged(&self, patch: &ParamsPatch) -> Self {
        Self {
            cost: patch.cost.unwrap_or(self.cost),
            benefit: patch.benefit.unwrap_or(self.benefit),
            base_ptr: patch.base_ptr.unwrap_or(self.base_ptr),
            death_rate: patch.death_rate.unwrap_or(self.death_rate),
            mutation_rate: patch.mutation_rate.unwrap_or(self.mutation_rate),
            immigration_rate: patch.immigration_rate.unwrap_or(self.immigration_rate),
        }
    }
}

/// Partial parameter update; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsPatch {
    pub cost: Option<f32>,
    pub benefit: Option<f32>,
    pub base_ptr: Option<f32>,
    pub death_rate: Option<f32>,
    pub mutation_rate: Option<f32>,
    pub immigration_rate: Option<f32>,
}

impl ParamsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Static configuration for a simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid width in cells.
    pub grid_width: u32,
    /// Grid height in cells.
    pub grid_height: u32,
    /// How new agents derive their strategy bits.
    pub scenario: ScenarioMode,
    /// Number of distinct tags, `1..=MAX_TAG_COUNT`.
    pub tag_count: u8,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Initial simulation parameters.
    pub params: SimulationParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_width: 50,
            grid_height: 50,
            scenario: ScenarioMode::Standard,
            tag_count: MAX_TAG_COUNT as u8,
            rng_seed: None,
            params: SimulationParams::default(),
        }
    }
}

impl SimulationConfig {
    /// Config for a named grid preset with default parameters.
    #[must_use]
    pub fn for_preset(preset: GridPreset) -> Self {
        let (grid_width, grid_height) = preset.dimensions();
        Self {
            grid_width,
            grid_height,
            ..Self::default()
        }
    }

    /// Number of cells in the configured grid.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(EngineError::InvalidConfig(
                "grid dimensions must be positive",
            ));
        }
        if self.grid_width > 4_096 || self.grid_height > 4_096 {
            return Err(EngineError::InvalidConfig(
                "grid dimensions must not exceed 4096",
            ));
        }
        if self.tag_count == 0 || self.tag_count as usize > MAX_TAG_COUNT {
            return Err(EngineError::InvalidConfig(
                "tag_count must be between 1 and 4",
            ));
        }
        self.params.validate().map_err(|err| match err {
            EngineError::InvalidParams(message) => EngineError::InvalidConfig(message),
            other => other,
        })
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Per-phenotype agent counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhenotypeCounts {
    pub ethnocentric: usize,
    pub altruist: usize,
    pub egoist: usize,
    pub traitor: usize,
}

impl PhenotypeCounts {
    #[must_use]
    pub const fn get(&self, phenotype: Phenotype) -> usize {
        match phenotype {
            Phenotype::Ethnocentric => self.ethnocentric,
            Phenotype::Altruist => self.altruist,
            Phenotype::Egoist => self.egoist,
            Phenotype::Traitor => self.traitor,
        }
    }

    pub fn increment(&mut self, phenotype: Phenotype) {
        match phenotype {
            Phenotype::Ethnocentric => self.ethnocentric += 1,
            Phenotype::Altruist => self.altruist += 1,
            Phenotype::Egoist => self.egoist += 1,
            Phenotype::Traitor => self.traitor += 1,
        }
    }

    #[must_use]
    pub const fn sum(&self) -> usize {
        self.ethnocentric + self.altruist + self.egoist + self.traitor
    }
}

/// Population summary recomputed from the grid on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Agents per phenotype.
    pub counts: PhenotypeCounts,
    /// Agents per tag; slots at or above the tag count stay zero.
    pub tag_counts: [usize; MAX_TAG_COUNT],
    /// Occupied cells.
    pub total: usize,
}

impl Stats {
    /// Fraction of the population expressing `phenotype`, or zero for an empty grid.
    #[must_use]
    pub fn share(&self, phenotype: Phenotype) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.counts.get(phenotype) as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phenotype_round_trips_through_traits() {
        for phenotype in Phenotype::ALL {
            let (ig, og) = phenotype.traits();
            assert_eq!(Phenotype::from_traits(ig, og), phenotype);
            assert_eq!(Agent::with_phenotype(2, phenotype, 0.1).phenotype(), phenotype);
        }
    }

    #[test]
    fn group_table_maps_each_tag() {
        let mode = ScenarioMode::GroupMapped;
        assert_eq!(mode.forced_phenotype(0), Some(Phenotype::Ethnocentric));
        assert_eq!(mode.forced_phenotype(1), Some(Phenotype::Altruist));
        assert_eq!(mode.forced_phenotype(2), Some(Phenotype::Egoist));
        assert_eq!(mode.forced_phenotype(3), Some(Phenotype::Traitor));
        assert_eq!(ScenarioMode::Standard.forced_phenotype(0), None);
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let params = SimulationParams::default();
        let patch = ParamsPatch {
            death_rate: Some(0.25),
            ..ParamsPatch::default()
        };
        let merged = params.merged(&patch);
        assert_eq!(merged.death_rate, 0.25);
        assert_eq!(merged.cost, params.cost);
        assert!(ParamsPatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn params_validation_rejects_bad_values() {
        let bad = [
            SimulationParams {
                cost: -0.1,
                ..SimulationParams::default()
            },
            SimulationParams {
                death_rate: 1.5,
                ..SimulationParams::default()
            },
            SimulationParams {
                mutation_rate: f32::NAN,
                ..SimulationParams::default()
            },
        ];
        for params in bad {
            assert!(matches!(
                params.validate(),
                Err(EngineError::InvalidParams(_))
            ));
        }
        assert!(SimulationParams::default().validate().is_ok());
    }

    #[test]
    fn config_validation_rejects_bad_dimensions_and_tags() {
        let zero = SimulationConfig {
            grid_width: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(zero.validate(), Err(EngineError::InvalidConfig(_))));
        let tags = SimulationConfig {
            tag_count: 5,
            ..SimulationConfig::default()
        };
        assert!(tags.validate().is_err());
        let params = SimulationConfig {
            params: SimulationParams {
                benefit: -1.0,
                ..SimulationParams::default()
            },
            ..SimulationConfig::default()
        };
        assert!(matches!(params.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn config_deserializes_partial_json() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"grid_width": 20, "scenario": "clash", "params": {"death_rate": 0.2}}"#)
                .expect("config");
        assert_eq!(config.grid_width, 20);
        assert_eq!(config.grid_height, 50);
        assert_eq!(config.scenario, ScenarioMode::GroupMapped);
        assert_eq!(config.params.death_rate, 0.2);
        assert_eq!(config.params.cost, 0.01);
    }

    #[test]
    fn stats_share_handles_empty_population() {
        let stats = Stats::default();
        assert_eq!(stats.share(Phenotype::Altruist), 0.0);
    }
}
