//! Visual side effects for ethnosim: particles spawned from engine events.

pub mod bridge;
pub mod palette;
pub mod particles;

pub use bridge::{CellLayout, ParticleBridge};
pub use palette::{ColorMode, Rgba, TAG_COLORS, strategy_color};
pub use particles::{
    CooperationFx, DEFAULT_CAPACITY, Particle, ParticleKind, ParticleSpec, ParticleSystem,
    ParticleView, Point,
};
