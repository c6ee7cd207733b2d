//! A running simulation with its scheduler, command queue, and particle effects.

use crate::command::{CommandQueue, SessionCommand};
use crate::renderer::FrameSink;
use crate::scheduler::{FrameReport, Scheduler, SchedulerConfig};
use ethnosim_core::{EngineError, SimulationConfig, SimulationEngine};
use ethnosim_fx::{CellLayout, ColorMode, CooperationFx, DEFAULT_CAPACITY, ParticleBridge, ParticleSystem};
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Particle effect settings. Cooperation effects are off unless `cooperation` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleOptions {
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub color_mode: ColorMode,
    pub cooperation: Option<CooperationFx>,
    pub capacity: usize,
}

impl Default for ParticleOptions {
    fn default() -> Self {
        Self {
            canvas_width: 600.0,
            canvas_height: 600.0,
            color_mode: ColorMode::default(),
            cooperation: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub simulation: SimulationConfig,
    pub scheduler: SchedulerConfig,
    /// `None` runs without any particle effects.
    pub particles: Option<ParticleOptions>,
}

#[derive(Debug)]
pub struct Session {
    scheduler: Scheduler,
    particles: Option<Rc<RefCell<ParticleSystem>>>,
    layout: Option<CellLayout>,
    commands: CommandQueue,
}

impl Session {
    pub fn new(options: SessionOptions, now: Instant) -> Result<Self, EngineError> {
        let SessionOptions {
            simulation,
            scheduler,
            particles,
        } = options;
        let (engine, particles, layout) = match particles {
            Some(fx) => {
                let layout = CellLayout::fit(
                    simulation.grid_width,
                    simulation.grid_height,
                    fx.canvas_width,
                    fx.canvas_height,
                );
                let system = Rc::new(RefCell::new(ParticleSystem::with_capacity(fx.capacity, now)));
                let mut bridge =
                    ParticleBridge::new(Rc::clone(&system), layout).with_color_mode(fx.color_mode);
                if let Some(cooperation) = fx.cooperation {
                    bridge = bridge.with_cooperation(cooperation);
                }
                let engine = SimulationEngine::with_observer(simulation, Box::new(bridge))?;
                (engine, Some(system), Some(layout))
            }
            None => (SimulationEngine::new(simulation)?, None, None),
        };
        info!(
            width = engine.width(),
            height = engine.height(),
            particles = particles.is_some(),
            "session created"
        );
        Ok(Self {
            scheduler: Scheduler::new(engine, scheduler),
            particles,
            layout,
            commands: CommandQueue::default(),
        })
    }

    /// Queue `command` for the next frame.
    pub fn submit(&mut self, command: SessionCommand) -> bool {
        self.commands.submit(command)
    }

    /// Apply queued commands, advance the scheduler, then age particles.
    pub fn frame(&mut self, now: Instant, sink: &mut dyn FrameSink) -> FrameReport {
        if let Some(particles) = &self.particles {
            particles.borrow_mut().set_clock(now);
        }
        let pending: Vec<SessionCommand> = self.commands.drain().collect();
        for command in pending {
            self.apply(command, now, sink);
        }
        let report = self.scheduler.frame(now, sink);
        if let Some(particles) = &self.particles {
            particles.borrow_mut().update(now);
        }
        report
    }

    /// Apply one command immediately.
    pub fn apply(&mut self, command: SessionCommand, now: Instant, sink: &mut dyn FrameSink) {
        debug!(?command, "applying session command");
        let reseeds = command.reseeds();
        match command {
            SessionCommand::Play => self.scheduler.play(now),
            SessionCommand::Pause => self.scheduler.pause(),
            SessionCommand::SetSpeed { index } => self.scheduler.set_speed_index(index),
            SessionCommand::Step => {
                self.scheduler.step_once(sink);
            }
            SessionCommand::Reset => self.scheduler.reset(),
            SessionCommand::SeedDistribution {
                distribution,
                fill_ratio,
            } => self
                .scheduler
                .reseed_with(|engine| engine.seed_by_distribution_with_fill(&distribution, fill_ratio)),
            SessionCommand::SeedTwoGroups {
                group_a,
                group_b,
                ratio_a,
                fill_ratio,
            } => self.scheduler.reseed_with(|engine| {
                engine.seed_two_groups(group_a, group_b, ratio_a, fill_ratio);
            }),
            SessionCommand::SetSeed { agents } => {
                self.scheduler.reseed_with(|engine| engine.set_seed(&agents));
            }
            SessionCommand::SetParams { patch } => {
                if let Err(err) = self.scheduler.engine_mut().set_params(&patch) {
                    warn!(%err, ?patch, "rejected parameter update");
                }
            }
            SessionCommand::Paint {
                cell,
                phenotype,
                tag,
            } => {
                if !self.scheduler.engine_mut().paint(cell, phenotype, tag) {
                    debug!(cell, tag, "paint ignored");
                }
            }
            SessionCommand::ClearRegion { center, radius } => {
                let removed = self.scheduler.engine_mut().clear_region(center, radius);
                debug!(center, radius, removed, "region cleared");
            }
            SessionCommand::ClearCell { cell } => {
                self.scheduler.engine_mut().set_cell(cell, None);
            }
        }
        if reseeds {
            if let Some(particles) = &self.particles {
                particles.borrow_mut().clear();
            }
            sink.publish_stats(self.scheduler.latest_stats(), self.scheduler.engine().generation());
        }
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    #[must_use]
    pub const fn engine(&self) -> &SimulationEngine {
        self.scheduler.engine()
    }

    /// Live particles, when effects are enabled.
    pub fn particles(&self) -> Option<Ref<'_, ParticleSystem>> {
        self.particles.as_ref().map(|system| system.borrow())
    }

    #[must_use]
    pub const fn layout(&self) -> Option<CellLayout> {
        self.layout
    }

    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }
}
