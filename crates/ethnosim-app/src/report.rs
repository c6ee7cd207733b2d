//! JSON run reports written by the `run` and `headless` commands.

use anyhow::{Context, Result};
use ethnosim_core::{Generation, Phenotype, PhenotypeCounts, SimulationConfig, Stats, TickReport};
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;

/// Tick activity accumulated between two recorded frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub births: usize,
    pub deaths: usize,
    pub immigrants: usize,
    pub cooperations: usize,
    pub encounters: usize,
}

impl Activity {
    pub fn absorb(&mut self, tick: &TickReport) {
        self.births += tick.births;
        self.deaths += tick.deaths;
        self.immigrants += tick.immigrants;
        self.cooperations += tick.cooperations;
        self.encounters += tick.encounters;
    }

    pub fn merge(&mut self, other: Activity) {
        self.births += other.births;
        self.deaths += other.deaths;
        self.immigrants += other.immigrants;
        self.cooperations += other.cooperations;
        self.encounters += other.encounters;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulationFrame {
    pub generation: Generation,
    pub total: usize,
    pub counts: PhenotypeCounts,
    pub tag_counts: [usize; 4],
    #[serde(flatten)]
    pub activity: Activity,
}

impl PopulationFrame {
    fn new(generation: Generation, stats: &Stats, activity: Activity) -> Self {
        Self {
            generation,
            total: stats.total,
            counts: stats.counts,
            tag_counts: stats.tag_counts,
            activity,
        }
    }

    fn ethnocentric_share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.counts.ethnocentric as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub frame_count: usize,
    pub generations_simulated: u64,
    pub final_generation: Generation,
    pub final_total: usize,
    pub total_births: usize,
    pub total_deaths: usize,
    pub total_cooperations: usize,
    /// Cooperative acts per encounter over the whole run.
    pub cooperation_rate: f64,
    pub final_shares: PhenotypeShares,
    pub ethnocentric_share_min: f64,
    pub ethnocentric_share_max: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhenotypeShares {
    pub ethnocentric: f64,
    pub altruist: f64,
    pub egoist: f64,
    pub traitor: f64,
}

impl PhenotypeShares {
    fn from_frame(frame: &PopulationFrame) -> Self {
        let share = |count: usize| {
            if frame.total == 0 {
                0.0
            } else {
                count as f64 / frame.total as f64
            }
        };
        Self {
            ethnocentric: share(frame.counts.get(Phenotype::Ethnocentric)),
            altruist: share(frame.counts.get(Phenotype::Altruist)),
            egoist: share(frame.counts.get(Phenotype::Egoist)),
            traitor: share(frame.counts.get(Phenotype::Traitor)),
        }
    }
}

/// Population trajectory of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: SimulationConfig,
    pub initial: PopulationFrame,
    pub frames: Vec<PopulationFrame>,
    pub summary: ReportSummary,
    #[serde(skip)]
    pending: Activity,
}

impl RunReport {
    #[must_use]
    pub fn new(config: SimulationConfig, generation: Generation, stats: &Stats) -> Self {
        Self {
            config,
            initial: PopulationFrame::new(generation, stats, Activity::default()),
            frames: Vec::new(),
            summary: ReportSummary::default(),
            pending: Activity::default(),
        }
    }

    /// Fold one tick's activity into the next recorded frame.
    pub fn observe(&mut self, tick: &TickReport) {
        self.pending.absorb(tick);
    }

    /// Fold pre-aggregated activity (e.g. from a scheduler frame) into the next frame.
    pub fn observe_activity(&mut self, activity: Activity) {
        self.pending.merge(activity);
    }

    /// Close the current frame with the population at `generation`.
    pub fn record(&mut self, generation: Generation, stats: &Stats) {
        let activity = std::mem::take(&mut self.pending);
        self.frames.push(PopulationFrame::new(generation, stats, activity));
    }

    pub fn finalize(&mut self) {
        self.summary = summarize(&self.initial, &self.frames);
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize run report")?;
        Ok(())
    }
}

fn summarize(initial: &PopulationFrame, frames: &[PopulationFrame]) -> ReportSummary {
    let Some(last) = frames.last() else {
        let share = initial.ethnocentric_share();
        return ReportSummary {
            final_generation: initial.generation,
            final_total: initial.total,
            final_shares: PhenotypeShares::from_frame(initial),
            ethnocentric_share_min: share,
            ethnocentric_share_max: share,
            ..ReportSummary::default()
        };
    };

    let mut min_share = f64::INFINITY;
    let mut max_share = f64::NEG_INFINITY;
    let mut totals = Activity::default();
    for frame in frames {
        let share = frame.ethnocentric_share();
        min_share = min_share.min(share);
        max_share = max_share.max(share);
        totals.merge(frame.activity);
    }

    ReportSummary {
        frame_count: frames.len(),
        generations_simulated: last.generation.0.saturating_sub(initial.generation.0),
        final_generation: last.generation,
        final_total: last.total,
        total_births: totals.births,
        total_deaths: totals.deaths,
        total_cooperations: totals.cooperations,
        cooperation_rate: if totals.encounters == 0 {
            0.0
        } else {
            totals.cooperations as f64 / totals.encounters as f64
        },
        final_shares: PhenotypeShares::from_frame(last),
        ethnocentric_share_min: min_share,
        ethnocentric_share_max: max_share,
    }
}
