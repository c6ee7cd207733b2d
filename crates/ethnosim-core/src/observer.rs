//! Side-channel notifications emitted while a tick runs.
//!
//! Events are delivered synchronously and never buffered: an observer that is
//! not installed when an event fires simply misses it.

use crate::Agent;

/// A one-directional PTR transfer during the interaction phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooperationEvent {
    pub giver: usize,
    pub receiver: usize,
    pub cost: f32,
    pub benefit: f32,
    /// Giver after the transfer was applied.
    pub giver_agent: Agent,
}

/// An offspring placed next to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReproductionEvent {
    pub parent: usize,
    pub child: usize,
    pub offspring: Agent,
}

/// An agent removed by the death phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathEvent {
    pub cell: usize,
    pub agent: Agent,
}

/// Receives engine events as they happen. Every method defaults to a no-op.
pub trait SimulationObserver {
    fn on_cooperation(&mut self, _event: &CooperationEvent) {}

    fn on_reproduction(&mut self, _event: &ReproductionEvent) {}

    fn on_death(&mut self, _event: &DeathEvent) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SimulationObserver for NullObserver {}

type Callback<E> = Option<Box<dyn FnMut(&E)>>;

/// Observer assembled from optional closures.
#[derive(Default)]
pub struct EventCallbacks {
    pub on_cooperation: Callback<CooperationEvent>,
    pub on_reproduction: Callback<ReproductionEvent>,
    pub on_death: Callback<DeathEvent>,
}

impl EventCallbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cooperation(mut self, callback: impl FnMut(&CooperationEvent) + 'static) -> Self {
        self.on_cooperation = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn reproduction(mut self, callback: impl FnMut(&ReproductionEvent) + 'static) -> Self {
        self.on_reproduction = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn death(mut self, callback: impl FnMut(&DeathEvent) + 'static) -> Self {
        self.on_death = Some(Box::new(callback));
        self
    }
}

impl SimulationObserver for EventCallbacks {
    fn on_cooperation(&mut self, event: &CooperationEvent) {
        if let Some(callback) = self.on_cooperation.as_mut() {
            callback(event);
        }
    }

    fn on_reproduction(&mut self, event: &ReproductionEvent) {
        if let Some(callback) = self.on_reproduction.as_mut() {
            callback(event);
        }
    }

    fn on_death(&mut self, event: &DeathEvent) {
        if let Some(callback) = self.on_death.as_mut() {
            callback(event);
        }
    }
}

impl std::fmt::Debug for EventCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCallbacks")
            .field("on_cooperation", &self.on_cooperation.is_some())
            .field("on_reproduction", &self.on_reproduction.is_some())
            .field("on_death", &self.on_death.is_some())
            .finish()
    }
}
