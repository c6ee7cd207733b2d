//! Named starting distributions and grid sizes.

use crate::Phenotype;
use serde::{Deserialize, Serialize};

/// Target fraction of the population per phenotype.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub ethnocentric: f32,
    pub altruist: f32,
    pub egoist: f32,
    pub traitor: f32,
}

impl Distribution {
    pub const EQUAL_MIX: Distribution = Distribution::new(0.25, 0.25, 0.25, 0.25);

    /// Built-in presets as `(name, distribution)` pairs.
    pub const PRESETS: [(&'static str, Distribution); 6] = [
        ("Equal Mix", Distribution::EQUAL_MIX),
        ("Heavy Altruist", Distribution::new(0.05, 0.9, 0.05, 0.0)),
        ("Heavy Ethnocentric", Distribution::new(0.8, 0.1, 0.1, 0.0)),
        ("Heavy Egoist", Distribution::new(0.05, 0.05, 0.9, 0.0)),
        ("Heavy Traitor", Distribution::new(0.05, 0.05, 0.0, 0.9)),
        (
            "Low Ethno High Altruist",
            Distribution::new(0.1, 0.7, 0.1, 0.1),
        ),
    ];

    #[must_use]
    pub const fn new(ethnocentric: f32, altruist: f32, egoist: f32, traitor: f32) -> Self {
        Self {
            ethnocentric,
            altruist,
            egoist,
            traitor,
        }
    }

    /// Look up a preset by name, ignoring case, spaces, dashes and underscores.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        Self::PRESETS
            .iter()
            .find(|(label, _)| normalize(label) == wanted)
            .map(|(_, distribution)| *distribution)
    }

    #[must_use]
    pub const fn fraction(&self, phenotype: Phenotype) -> f32 {
        match phenotype {
            Phenotype::Ethnocentric => self.ethnocentric,
            Phenotype::Altruist => self.altruist,
            Phenotype::Egoist => self.egoist,
            Phenotype::Traitor => self.traitor,
        }
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Self::EQUAL_MIX
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Grid sizes used by the guided stages and the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPreset {
    /// A single cell that neighbors itself on every side.
    Single,
    Small,
    Medium,
    Sandbox,
}

impl GridPreset {
    pub const ALL: [GridPreset; 4] = [
        GridPreset::Single,
        GridPreset::Small,
        GridPreset::Medium,
        GridPreset::Sandbox,
    ];

    #[must_use]
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            GridPreset::Single => (1, 1),
            GridPreset::Small => (10, 10),
            GridPreset::Medium => (20, 20),
            GridPreset::Sandbox => (50, 50),
        }
    }
}
