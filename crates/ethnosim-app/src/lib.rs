//! Application plumbing for ethnosim: real-time scheduling, session commands,
//! reports, and the validation harness.

pub mod command;
pub mod config;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod validation;

pub mod renderer {
    use ethnosim_core::{Generation, SimulationEngine, Stats};

    use crate::scheduler::HistorySample;

    /// Receives per-frame output from the scheduler.
    ///
    /// Every hook defaults to a no-op so sinks implement only what they show.
    pub trait FrameSink {
        /// Called once per running frame after ticks have been applied.
        fn draw(&mut self, _engine: &SimulationEngine) {}

        /// Called when the stats throttle elapses.
        fn publish_stats(&mut self, _stats: &Stats, _generation: Generation) {}

        fn record_history(&mut self, _sample: &HistorySample) {}
    }

    /// Sink that discards everything.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NullSink;

    impl FrameSink for NullSink {}
}

pub use command::{SessionCommand, TimedCommand};
pub use config::AppConfig;
pub use renderer::{FrameSink, NullSink};
pub use report::RunReport;
pub use scheduler::{
    FRAME_RATE, FrameReport, HistorySample, SPEEDS, Scheduler, SchedulerConfig, TickAccumulator,
    ticks_per_second,
};
pub use session::{ParticleOptions, Session, SessionOptions};
pub use validation::{RunSample, ValidationConfig, ValidationSummary, run_validation};
