//! Real-time loop that drives engine ticks independently of the frame rate.
//!
//! Below [`FRAME_RATE`] ticks per second, elapsed wall-clock time feeds a
//! fixed-timestep accumulator, so a frame may run zero or several ticks. At or
//! above it, every frame runs `tps / FRAME_RATE` ticks unconditionally.

use crate::renderer::FrameSink;
use ethnosim_core::{Generation, PhenotypeCounts, SimulationEngine, Stats, TickReport};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Selectable tick rates, in ticks per second.
pub const SPEEDS: [u32; 10] = [1, 2, 5, 10, 30, 60, 120, 300, 600, 1200];
/// Frames per second the loop assumes when batching ticks.
pub const FRAME_RATE: u32 = 60;
/// Upper bound on ticks owed after a long stall.
pub const MAX_CATCH_UP_TICKS: u32 = 240;

/// Ticks per second for a speed index, clamped to the ladder.
#[must_use]
pub fn ticks_per_second(speed_index: usize) -> u32 {
    SPEEDS[speed_index.min(SPEEDS.len() - 1)]
}

/// Leftover wall-clock time carried between frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickAccumulator {
    carry: Duration,
}

impl TickAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            carry: Duration::ZERO,
        }
    }

    /// Time accumulated toward the next tick.
    #[must_use]
    pub const fn carry(&self) -> Duration {
        self.carry
    }

    pub fn reset(&mut self) {
        self.carry = Duration::ZERO;
    }

    /// Add `elapsed` and return how many whole `interval`s are now due.
    ///
    /// The carry is clamped to `max_ticks` intervals first (`0` disables the
    /// clamp). A zero interval never produces ticks.
    pub fn advance(&mut self, elapsed: Duration, interval: Duration, max_ticks: u32) -> usize {
        if interval.is_zero() {
            return 0;
        }
        self.carry += elapsed;
        if max_ticks > 0 {
            let ceiling = interval.saturating_mul(max_ticks);
            if self.carry > ceiling {
                self.carry = ceiling;
            }
        }
        let mut due = 0;
        while self.carry >= interval {
            self.carry -= interval;
            due += 1;
        }
        due
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Index into [`SPEEDS`].
    pub speed_index: usize,
    /// Minimum wall-clock gap between published stats.
    pub stats_interval_ms: u64,
    /// Record a history sample every this many ticks; 0 disables history.
    pub history_stride: u64,
    /// Oldest samples are discarded beyond this length.
    pub history_capacity: usize,
    /// Clamp on ticks owed by the accumulator; 0 disables the clamp.
    pub max_catch_up_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            speed_index: 0,
            stats_interval_ms: 80,
            history_stride: 15,
            history_capacity: 500,
            max_catch_up_ticks: MAX_CATCH_UP_TICKS,
        }
    }
}

/// Phenotype counts captured at a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySample {
    pub generation: Generation,
    #[serde(flatten)]
    pub counts: PhenotypeCounts,
}

/// What one call to [`Scheduler::frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub ticks: usize,
    pub immigrants: usize,
    pub encounters: usize,
    pub cooperations: usize,
    pub births: usize,
    pub deaths: usize,
    pub history_samples: usize,
    pub stats_published: bool,
    /// The grid was handed to the sink for drawing.
    pub drawn: bool,
}

/// Owns the engine and advances it from animation-frame callbacks.
#[derive(Debug)]
pub struct Scheduler {
    engine: SimulationEngine,
    config: SchedulerConfig,
    speed_index: usize,
    running: bool,
    accumulator: TickAccumulator,
    last_frame: Option<Instant>,
    last_stats: Option<Instant>,
    tick_count: u64,
    history: VecDeque<HistorySample>,
    latest_stats: Stats,
}

impl Scheduler {
    /// Wrap `engine`; the scheduler starts paused.
    #[must_use]
    pub fn new(engine: SimulationEngine, config: SchedulerConfig) -> Self {
        let latest_stats = engine.stats();
        Self {
            speed_index: config.speed_index.min(SPEEDS.len() - 1),
            engine,
            config,
            running: false,
            accumulator: TickAccumulator::new(),
            last_frame: None,
            last_stats: None,
            tick_count: 0,
            history: VecDeque::with_capacity(config.history_capacity.min(4_096)),
            latest_stats,
        }
    }

    /// Start (or keep) running, anchoring wall-clock references at `now`.
    ///
    /// Time spent paused is never replayed as catch-up ticks.
    pub fn play(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_frame = Some(now);
        self.last_stats = Some(now);
        self.accumulator.reset();
        debug!(tps = self.target_tps(), "scheduler playing");
    }

    /// Stop scheduling ticks. The engine is left untouched.
    pub fn pause(&mut self) {
        if self.running {
            self.running = false;
            debug!(generation = self.engine.generation().0, "scheduler paused");
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Select a rate from [`SPEEDS`]; out-of-range indices clamp to the fastest.
    pub fn set_speed_index(&mut self, index: usize) {
        self.speed_index = index.min(SPEEDS.len() - 1);
    }

    #[must_use]
    pub const fn speed_index(&self) -> usize {
        self.speed_index
    }

    #[must_use]
    pub fn target_tps(&self) -> u32 {
        ticks_per_second(self.speed_index)
    }

    /// Run one animation frame: tick as the current rate demands, draw, and
    /// publish stats if the throttle allows. Does nothing while paused.
    pub fn frame(&mut self, now: Instant, sink: &mut dyn FrameSink) -> FrameReport {
        let mut report = FrameReport::default();
        if !self.running {
            return report;
        }
        let elapsed = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_frame = Some(now);

        let tps = self.target_tps();
        let due = if tps < FRAME_RATE {
            let interval = Duration::from_secs(1) / tps;
            self.accumulator
                .advance(elapsed, interval, self.config.max_catch_up_ticks)
        } else {
            (tps / FRAME_RATE) as usize
        };

        for _ in 0..due {
            let tick = self.tick_and_sample(sink);
            report.immigrants += tick.immigrants;
            report.encounters += tick.encounters;
            report.cooperations += tick.cooperations;
            report.births += tick.births;
            report.deaths += tick.deaths;
            if self.history_due() {
                report.history_samples += 1;
            }
        }
        report.ticks = due;

        sink.draw(&self.engine);
        report.drawn = true;
        report.stats_published = self.maybe_publish_stats(now, sink);
        report
    }

    /// Run exactly one tick regardless of the running state and refresh stats.
    pub fn step_once(&mut self, sink: &mut dyn FrameSink) -> TickReport {
        let tick = self.tick_and_sample(sink);
        sink.draw(&self.engine);
        self.publish_stats(sink);
        tick
    }

    fn tick_and_sample(&mut self, sink: &mut dyn FrameSink) -> TickReport {
        let tick = self.engine.tick();
        self.tick_count += 1;
        if self.history_due() {
            let sample = HistorySample {
                generation: self.engine.generation(),
                counts: self.engine.stats().counts,
            };
            if self.history.len() >= self.config.history_capacity {
                self.history.pop_front();
            }
            if self.config.history_capacity > 0 {
                self.history.push_back(sample);
            }
            sink.record_history(&sample);
        }
        tick
    }

    fn history_due(&self) -> bool {
        self.config.history_stride > 0 && self.tick_count.is_multiple_of(self.config.history_stride)
    }

    fn maybe_publish_stats(&mut self, now: Instant, sink: &mut dyn FrameSink) -> bool {
        let interval = Duration::from_millis(self.config.stats_interval_ms);
        let due = self
            .last_stats
            .is_none_or(|last| now.saturating_duration_since(last) >= interval);
        if due {
            self.last_stats = Some(now);
            self.publish_stats(sink);
        }
        due
    }

    fn publish_stats(&mut self, sink: &mut dyn FrameSink) {
        self.latest_stats = self.engine.stats();
        sink.publish_stats(&self.latest_stats, self.engine.generation());
    }

    /// Apply `seed` to the engine, then clear history and the tick counter.
    ///
    /// Used for reset and every seeding operation so charts restart with the grid.
    pub fn reseed_with(&mut self, seed: impl FnOnce(&mut SimulationEngine)) {
        seed(&mut self.engine);
        self.history.clear();
        self.tick_count = 0;
        self.latest_stats = self.engine.stats();
    }

    /// Reset the engine to an empty grid at generation zero.
    pub fn reset(&mut self) {
        self.reseed_with(SimulationEngine::reset);
    }

    #[must_use]
    pub const fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Mutable engine access between frames (painting, parameter changes).
    pub fn engine_mut(&mut self) -> &mut SimulationEngine {
        &mut self.engine
    }

    /// History samples, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &HistorySample> {
        self.history.iter()
    }

    /// Stats as of the last publish, reset, or step.
    #[must_use]
    pub const fn latest_stats(&self) -> &Stats {
        &self.latest_stats
    }

    /// Ticks run since the last reset or reseed.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Wall-clock time owed toward the next sub-frame-rate tick.
    #[must_use]
    pub const fn pending(&self) -> Duration {
        self.accumulator.carry()
    }
}
