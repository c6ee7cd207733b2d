//! Colours for tags, strategies, and effect overlays.

use ethnosim_core::{Agent, MAX_TAG_COUNT, Phenotype};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Straight-alpha colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    /// Opaque colour from a `0xRRGGBB` literal.
    #[must_use]
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
            a: 1.0,
        }
    }

    #[must_use]
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

impl fmt::Display for Rgba {
    /// CSS notation: `#rrggbb` when opaque, `rgba(...)` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, self.a)
        }
    }
}

/// Per-tag colours: blue, orange, teal, magenta.
pub const TAG_COLORS: [Rgba; MAX_TAG_COUNT] = [
    Rgba::hex(0x3b82f6),
    Rgba::hex(0xf97316),
    Rgba::hex(0x14b8a6),
    Rgba::hex(0xd946ef),
];

/// Receiver-side "+benefit" text.
pub const GAIN: Rgba = Rgba::hex(0x22c55e);
/// Giver-side "-cost" text.
pub const LOSS: Rgba = Rgba::hex(0xef4444);
/// Death puffs.
pub const SMOKE: Rgba = Rgba::hex(0x787878).with_alpha(0.8);
/// Used when no agent is available to colour an effect.
pub const NEUTRAL: Rgba = Rgba::hex(0x888888);

#[must_use]
pub const fn strategy_color(phenotype: Phenotype) -> Rgba {
    match phenotype {
        Phenotype::Altruist => Rgba::hex(0x3b82f6),
        Phenotype::Ethnocentric => Rgba::hex(0xa855f7),
        Phenotype::Egoist => Rgba::hex(0xef4444),
        Phenotype::Traitor => Rgba::hex(0xeab308),
    }
}

/// Which attribute decides an agent's colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Tags,
    Strategy,
}

impl ColorMode {
    #[must_use]
    pub fn agent_color(self, agent: &Agent) -> Rgba {
        match self {
            ColorMode::Tags => TAG_COLORS
                .get(agent.tag as usize)
                .copied()
                .unwrap_or(NEUTRAL),
            ColorMode::Strategy => strategy_color(agent.phenotype()),
        }
    }
}
