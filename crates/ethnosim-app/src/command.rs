use ethnosim_core::{Distribution, ParamsPatch, Phenotype, SeedAgent};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// User intent applied to a session between frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    Play,
    Pause,
    SetSpeed {
        index: usize,
    },
    /// Advance exactly one tick, even while paused.
    Step,
    Reset,
    SeedDistribution {
        distribution: Distribution,
        #[serde(default = "full")]
        fill_ratio: f32,
    },
    SeedTwoGroups {
        group_a: Phenotype,
        group_b: Phenotype,
        #[serde(default = "half")]
        ratio_a: f32,
        #[serde(default = "full")]
        fill_ratio: f32,
    },
    SetSeed {
        agents: Vec<SeedAgent>,
    },
    SetParams {
        patch: ParamsPatch,
    },
    Paint {
        cell: usize,
        phenotype: Phenotype,
        tag: u8,
    },
    ClearRegion {
        center: usize,
        radius: u32,
    },
    ClearCell {
        cell: usize,
    },
}

fn full() -> f32 {
    1.0
}

fn half() -> f32 {
    0.5
}

impl SessionCommand {
    /// Whether the command replaces the whole grid.
    #[must_use]
    pub fn reseeds(&self) -> bool {
        matches!(
            self,
            Self::Reset | Self::SeedDistribution { .. } | Self::SeedTwoGroups { .. } | Self::SetSeed { .. }
        )
    }
}

/// A command scheduled relative to the start of a scripted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedCommand {
    pub at_ms: u64,
    #[serde(flatten)]
    pub command: SessionCommand,
}

/// Bounded FIFO of pending commands, drained once per frame.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    pending: VecDeque<SessionCommand>,
    capacity: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl CommandQueue {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity.min(1_024)),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue `command`; returns `false` and drops it when the queue is full.
    pub fn submit(&mut self, command: SessionCommand) -> bool {
        if self.pending.len() >= self.capacity {
            warn!(?command, "session command queue full; dropping command");
            return false;
        }
        self.pending.push_back(command);
        true
    }

    /// Remove and return every pending command in submission order.
    pub fn drain(&mut self) -> impl Iterator<Item = SessionCommand> + '_ {
        self.pending.drain(..)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
