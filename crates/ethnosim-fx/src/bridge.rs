//! Turns engine events into particles.

use crate::palette::ColorMode;
use crate::particles::{CooperationFx, ParticleSystem, Point};
use ethnosim_core::{CooperationEvent, DeathEvent, ReproductionEvent, SimulationObserver};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Maps cell indices to pixel rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellLayout {
    pub grid_width: u32,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl CellLayout {
    #[must_use]
    pub const fn new(grid_width: u32, cell_width: f32, cell_height: f32) -> Self {
        Self {
            grid_width,
            cell_width,
            cell_height,
        }
    }

    /// Layout stretching a `grid_width` x `grid_height` grid over a canvas.
    #[must_use]
    pub fn fit(grid_width: u32, grid_height: u32, canvas_width: f32, canvas_height: f32) -> Self {
        Self::new(
            grid_width,
            canvas_width / grid_width.max(1) as f32,
            canvas_height / grid_height.max(1) as f32,
        )
    }

    #[must_use]
    pub fn top_left(&self, idx: usize) -> Point {
        let width = self.grid_width.max(1) as usize;
        Point::new(
            (idx % width) as f32 * self.cell_width,
            (idx / width) as f32 * self.cell_height,
        )
    }

    #[must_use]
    pub fn center(&self, idx: usize) -> Point {
        let corner = self.top_left(idx);
        Point::new(
            corner.x + self.cell_width / 2.0,
            corner.y + self.cell_height / 2.0,
        )
    }

    /// Smaller cell side, used to size text.
    #[must_use]
    pub fn extent(&self) -> f32 {
        self.cell_width.min(self.cell_height)
    }
}

/// [`SimulationObserver`] that spawns particles into a shared [`ParticleSystem`].
///
/// Events that arrive while the system is borrowed elsewhere are dropped.
pub struct ParticleBridge {
    particles: Rc<RefCell<ParticleSystem>>,
    layout: CellLayout,
    color_mode: ColorMode,
    cooperation: Option<CooperationFx>,
}

impl ParticleBridge {
    /// Bridge spawning birth and death effects only.
    #[must_use]
    pub fn new(particles: Rc<RefCell<ParticleSystem>>, layout: CellLayout) -> Self {
        Self {
            particles,
            layout,
            color_mode: ColorMode::default(),
            cooperation: None,
        }
    }

    #[must_use]
    pub fn with_color_mode(mut self, color_mode: ColorMode) -> Self {
        self.color_mode = color_mode;
        self
    }

    /// Also draw cooperation lines and numbers using `fx`.
    #[must_use]
    pub fn with_cooperation(mut self, fx: CooperationFx) -> Self {
        self.cooperation = Some(fx);
        self
    }
}

impl SimulationObserver for ParticleBridge {
    fn on_cooperation(&mut self, event: &CooperationEvent) {
        let Some(fx) = self.cooperation.as_ref() else {
            return;
        };
        let Ok(mut particles) = self.particles.try_borrow_mut() else {
            trace!(giver = event.giver, "particle system busy; cooperation effect dropped");
            return;
        };
        let color = self.color_mode.agent_color(&event.giver_agent);
        particles.spawn_cooperation(
            self.layout.center(event.giver),
            self.layout.center(event.receiver),
            color,
            fx,
        );
    }

    fn on_reproduction(&mut self, event: &ReproductionEvent) {
        let Ok(mut particles) = self.particles.try_borrow_mut() else {
            trace!(child = event.child, "particle system busy; birth effect dropped");
            return;
        };
        let color = self.color_mode.agent_color(&event.offspring);
        particles.spawn_reproduction(self.layout.center(event.child), color);
    }

    fn on_death(&mut self, event: &DeathEvent) {
        let Ok(mut particles) = self.particles.try_borrow_mut() else {
            trace!(cell = event.cell, "particle system busy; death effect dropped");
            return;
        };
        particles.spawn_death(self.layout.center(event.cell));
    }
}

impl std::fmt::Debug for ParticleBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleBridge")
            .field("layout", &self.layout)
            .field("color_mode", &self.color_mode)
            .field("cooperation", &self.cooperation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethnosim_core::{Agent, CooperationEvent, Phenotype};
    use std::time::Instant;

    #[test]
    fn events_are_dropped_while_the_system_is_borrowed() {
        let particles = Rc::new(RefCell::new(ParticleSystem::new(Instant::now())));
        let layout = CellLayout::fit(4, 4, 40.0, 40.0);
        let mut bridge = ParticleBridge::new(Rc::clone(&particles), layout)
            .with_cooperation(CooperationFx::default());
        let agent = Agent::with_phenotype(1, Phenotype::Altruist, 0.12);

        {
            let held = particles.borrow_mut();
            bridge.on_cooperation(&CooperationEvent {
                giver: 0,
                receiver: 1,
                cost: 0.01,
                benefit: 0.03,
                giver_agent: agent,
            });
            bridge.on_reproduction(&ReproductionEvent {
                parent: 0,
                child: 4,
                offspring: agent,
            });
            bridge.on_death(&DeathEvent { cell: 5, agent });
            assert!(held.is_empty());
        }

        bridge.on_death(&DeathEvent { cell: 5, agent });
        assert!(!particles.borrow().is_empty());
    }

    #[test]
    fn layout_maps_indices_to_cell_centres() {
        let layout = CellLayout::fit(10, 5, 200.0, 50.0);
        assert_eq!(layout.cell_width, 20.0);
        assert_eq!(layout.cell_height, 10.0);
        assert_eq!(layout.top_left(23), Point::new(60.0, 20.0));
        assert_eq!(layout.center(23), Point::new(70.0, 25.0));
        assert_eq!(layout.extent(), 10.0);
    }
}
