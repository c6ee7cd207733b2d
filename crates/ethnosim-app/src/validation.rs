//! Batch harness that checks whether ethnocentrism comes to dominate.

use ethnosim_core::{EngineError, Phenotype, ScenarioMode, SimulationConfig, SimulationEngine};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub runs: usize,
    pub ticks: u64,
    /// Trailing ticks averaged per run.
    pub window: usize,
    /// Minimum mean ethnocentric share for a pass.
    pub threshold: f64,
    /// Run `i` uses `base_seed + i`; `None` draws a fresh seed per run.
    pub base_seed: Option<u64>,
    pub simulation: SimulationConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            ticks: 2_000,
            window: 100,
            threshold: 0.65,
            base_seed: None,
            simulation: SimulationConfig {
                scenario: ScenarioMode::Standard,
                ..SimulationConfig::default()
            },
        }
    }
}

/// Trailing-window averages for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSample {
    pub run: usize,
    pub seed: u64,
    /// Mean ethnocentric share of the population.
    pub ethnocentric_share: f64,
    /// Mean combined ethnocentric and altruist share.
    pub cooperation_proxy: f64,
    /// Mean fraction of encounters in which the actor gave.
    pub cooperation_rate: f64,
    pub final_total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub samples: Vec<RunSample>,
    pub mean_ethnocentric: f64,
    /// Population standard deviation of the per-run ethnocentric shares.
    pub std_ethnocentric: f64,
    pub mean_cooperation_proxy: f64,
    pub mean_cooperation_rate: f64,
    pub threshold: f64,
    pub passed: bool,
}

/// Bounded trailing window of per-tick values.
#[derive(Debug)]
struct Window {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn mean(&self) -> f64 {
        mean(self.values.iter().copied())
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sum::<f64>() / len as f64
}

/// Run one seeded simulation from an empty grid and average its trailing window.
pub fn run_once(
    config: &ValidationConfig,
    run: usize,
    seed: u64,
) -> Result<RunSample, EngineError> {
    let mut engine = SimulationEngine::new(SimulationConfig {
        rng_seed: Some(seed),
        ..config.simulation.clone()
    })?;
    let mut ethnocentric = Window::new(config.window);
    let mut proxy = Window::new(config.window);
    let mut rate = Window::new(config.window);

    for _ in 0..config.ticks {
        let tick = engine.tick();
        if tick.encounters > 0 {
            rate.push(tick.cooperations as f64 / tick.encounters as f64);
        }
        let stats = engine.stats();
        if stats.total == 0 {
            continue;
        }
        ethnocentric.push(stats.share(Phenotype::Ethnocentric));
        proxy.push(stats.share(Phenotype::Ethnocentric) + stats.share(Phenotype::Altruist));
    }

    let sample = RunSample {
        run,
        seed,
        ethnocentric_share: ethnocentric.mean(),
        cooperation_proxy: proxy.mean(),
        cooperation_rate: rate.mean(),
        final_total: engine.stats().total,
    };
    debug!(?sample, "validation run finished");
    Ok(sample)
}

/// Run every configured simulation, reporting each sample to `on_run` as it completes.
pub fn run_validation(
    config: &ValidationConfig,
    mut on_run: impl FnMut(&RunSample),
) -> Result<ValidationSummary, EngineError> {
    config.simulation.validate()?;
    info!(
        runs = config.runs,
        ticks = config.ticks,
        window = config.window,
        "starting validation"
    );
    let mut samples = Vec::with_capacity(config.runs);
    for run in 0..config.runs {
        let seed = config
            .base_seed
            .map_or_else(rand::random::<u64>, |base| base.wrapping_add(run as u64));
        let sample = run_once(config, run, seed)?;
        on_run(&sample);
        samples.push(sample);
    }
    Ok(summarize(samples, config.threshold))
}

fn summarize(samples: Vec<RunSample>, threshold: f64) -> ValidationSummary {
    let mean_ethnocentric = mean(samples.iter().map(|s| s.ethnocentric_share));
    let variance = mean(
        samples
            .iter()
            .map(|s| (s.ethnocentric_share - mean_ethnocentric).powi(2)),
    );
    ValidationSummary {
        mean_cooperation_proxy: mean(samples.iter().map(|s| s.cooperation_proxy)),
        mean_cooperation_rate: mean(samples.iter().map(|s| s.cooperation_rate)),
        std_ethnocentric: variance.sqrt(),
        passed: !samples.is_empty() && mean_ethnocentric >= threshold,
        mean_ethnocentric,
        threshold,
        samples,
    }
}
