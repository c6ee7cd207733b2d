//! Short-lived particles for cooperation lines, +/- numbers, birth pops, and death puffs.
//!
//! Particles run on wall-clock time, independent of simulation generations. The
//! system keeps an internal clock that stamps new spawns; callers advance it with
//! [`ParticleSystem::update`] or [`ParticleSystem::set_clock`].

use crate::palette::{GAIN, LOSS, Rgba, SMOKE};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

/// Live particle cap; spawns beyond it are dropped.
pub const DEFAULT_CAPACITY: usize = 200;

/// Motion is expressed per 16 ms step.
const STEP_MS: f32 = 16.0;
/// Opacity of a freshly spawned particle.
const BASE_ALPHA: f32 = 0.9;

const POP_COUNT: usize = 6;
const POP_LIFETIME: Duration = Duration::from_millis(300);
const PUFF_COUNT: usize = 4;
const PUFF_LIFETIME: Duration = Duration::from_millis(500);
const FLOW_COUNT: usize = 5;
const FLOW_LIFETIME: Duration = Duration::from_millis(1_400);

/// Pixel-space point or velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn lerp(self, to: Point, t: f32) -> Point {
        Point::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    /// Floating text drifting by its velocity.
    Number,
    /// Straight stroke from origin to end.
    Line,
    /// Reproduction burst dot.
    Pop,
    /// Shrinking death smoke.
    Puff,
    /// Dot travelling from origin to end over its lifetime.
    Flow,
}

/// Everything needed to spawn a particle; the spawn time is added by the system.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSpec {
    pub kind: ParticleKind,
    pub origin: Point,
    pub velocity: Point,
    /// Line end or flow destination.
    pub end: Option<Point>,
    pub text: Option<Cow<'static, str>>,
    pub color: Rgba,
    pub lifetime: Duration,
    /// Time before the particle becomes visible; it still counts toward expiry.
    pub delay: Duration,
}

impl ParticleSpec {
    #[must_use]
    pub fn new(kind: ParticleKind, origin: Point, color: Rgba, lifetime: Duration) -> Self {
        Self {
            kind,
            origin,
            velocity: Point::default(),
            end: None,
            text: None,
            color,
            lifetime,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub spec: ParticleSpec,
    pub created_at: Instant,
}

impl Particle {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Whether the particle should still be retained at `now`.
    #[must_use]
    pub fn is_alive(&self, now: Instant) -> bool {
        self.age(now) < self.spec.lifetime + self.spec.delay
    }

    /// Position at `now`.
    #[must_use]
    pub fn position(&self, now: Instant) -> Point {
        let spec = &self.spec;
        let effective = self.age(now).saturating_sub(spec.delay);
        if let (ParticleKind::Flow, Some(end)) = (spec.kind, spec.end) {
            let progress = if spec.lifetime.is_zero() {
                1.0
            } else {
                (effective.as_secs_f32() / spec.lifetime.as_secs_f32()).min(1.0)
            };
            return spec.origin.lerp(end, progress);
        }
        let steps = effective.as_secs_f32() * 1_000.0 / STEP_MS;
        Point::new(
            spec.origin.x + spec.velocity.x * steps,
            spec.origin.y + spec.velocity.y * steps,
        )
    }

    /// Draw-ready state, or `None` while delayed or once expired.
    #[must_use]
    pub fn view(&self, now: Instant, cell_extent: f32) -> Option<ParticleView<'_>> {
        let spec = &self.spec;
        let age = self.age(now);
        if age < spec.delay {
            return None;
        }
        let effective = age - spec.delay;
        if effective >= spec.lifetime {
            return None;
        }
        let life = 1.0 - effective.as_secs_f32() / spec.lifetime.as_secs_f32();
        let size = match spec.kind {
            ParticleKind::Line => 2.0,
            ParticleKind::Number => cell_extent * 0.35,
            ParticleKind::Pop => 3.0,
            ParticleKind::Puff => 4.0 * life,
            ParticleKind::Flow => 5.0,
        };
        Some(ParticleView {
            kind: spec.kind,
            position: self.position(now),
            end: spec.end,
            text: spec.text.as_deref(),
            color: spec.color,
            alpha: BASE_ALPHA * life,
            size,
        })
    }
}

/// One particle as a renderer should draw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView<'a> {
    pub kind: ParticleKind,
    pub position: Point,
    pub end: Option<Point>,
    pub text: Option<&'a str>,
    pub color: Rgba,
    /// Opacity in `[0, 0.9]`.
    pub alpha: f32,
    /// Stroke width for lines, font size for numbers, radius for dots.
    pub size: f32,
}

/// Options for [`ParticleSystem::spawn_cooperation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooperationFx {
    pub line_lifetime: Duration,
    pub number_lifetime: Duration,
    /// Vertical drift of the numbers per 16 ms step; negative floats upward.
    pub number_velocity_y: f32,
    /// Numbers start this many pixels above the cell centre.
    pub number_offset_y: f32,
    pub number_delay: Duration,
    pub spawn_line: bool,
    pub spawn_numbers: bool,
    pub spawn_flow: bool,
    pub receiver_text: Cow<'static, str>,
    pub giver_text: Cow<'static, str>,
}

impl Default for CooperationFx {
    fn default() -> Self {
        Self {
            line_lifetime: Duration::from_millis(400),
            number_lifetime: Duration::from_millis(800),
            number_velocity_y: -0.5,
            number_offset_y: 0.0,
            number_delay: Duration::ZERO,
            spawn_line: true,
            spawn_numbers: true,
            spawn_flow: false,
            receiver_text: Cow::Borrowed("+3%"),
            giver_text: Cow::Borrowed("-1%"),
        }
    }
}

/// Bounded pool of live particles.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    capacity: usize,
    clock: Instant,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl ParticleSystem {
    /// Empty system whose clock starts at `now`.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, now)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize, now: Instant) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
            clock: now,
        }
    }

    /// Timestamp applied to subsequent spawns.
    pub fn set_clock(&mut self, now: Instant) {
        self.clock = now;
    }

    #[must_use]
    pub const fn clock(&self) -> Instant {
        self.clock
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    /// Add a particle stamped with the current clock. Returns `false` when full.
    pub fn spawn(&mut self, spec: ParticleSpec) -> bool {
        if self.particles.len() >= self.capacity {
            return false;
        }
        self.particles.push(Particle {
            spec,
            created_at: self.clock,
        });
        true
    }

    /// Line and +/- numbers for one transfer between two cell centres.
    ///
    /// Returns how many particles were accepted.
    pub fn spawn_cooperation(
        &mut self,
        giver: Point,
        receiver: Point,
        color: Rgba,
        fx: &CooperationFx,
    ) -> usize {
        let mut accepted = 0;
        if fx.spawn_line {
            let mut line = ParticleSpec::new(ParticleKind::Line, giver, color, fx.line_lifetime);
            line.end = Some(receiver);
            accepted += usize::from(self.spawn(line));
        }
        if fx.spawn_numbers {
            for (at, text, tint) in [
                (receiver, &fx.receiver_text, GAIN),
                (giver, &fx.giver_text, LOSS),
            ] {
                let origin = Point::new(at.x, at.y - fx.number_offset_y);
                let mut number =
                    ParticleSpec::new(ParticleKind::Number, origin, tint, fx.number_lifetime);
                number.velocity = Point::new(0.0, fx.number_velocity_y);
                number.text = Some(text.clone());
                number.delay = fx.number_delay;
                accepted += usize::from(self.spawn(number));
            }
        }
        if fx.spawn_flow {
            for _ in 0..FLOW_COUNT {
                let mut dot = ParticleSpec::new(ParticleKind::Flow, giver, color, FLOW_LIFETIME);
                dot.end = Some(receiver);
                accepted += usize::from(self.spawn(dot));
            }
        }
        accepted
    }

    /// Ring of dots bursting out of a newborn's cell centre.
    pub fn spawn_reproduction(&mut self, at: Point, color: Rgba) -> usize {
        self.spawn_ring(ParticleKind::Pop, at, color, POP_COUNT, 2.0, -1.0, POP_LIFETIME)
    }

    /// Grey puffs rising from a dead agent's cell centre.
    pub fn spawn_death(&mut self, at: Point) -> usize {
        self.spawn_ring(ParticleKind::Puff, at, SMOKE, PUFF_COUNT, 0.5, -0.3, PUFF_LIFETIME)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_ring(
        &mut self,
        kind: ParticleKind,
        at: Point,
        color: Rgba,
        count: usize,
        speed: f32,
        lift: f32,
        lifetime: Duration,
    ) -> usize {
        let mut accepted = 0;
        for i in 0..count {
            let angle = i as f32 / count as f32 * TAU;
            let mut spec = ParticleSpec::new(kind, at, color, lifetime);
            spec.velocity = Point::new(angle.cos() * speed, angle.sin() * speed + lift);
            accepted += usize::from(self.spawn(spec));
        }
        accepted
    }

    /// Advance the clock and drop every particle past its lifetime plus delay.
    pub fn update(&mut self, now: Instant) {
        self.clock = now;
        self.particles.retain(|p| p.is_alive(now));
    }

    /// Visible particles at `now`, sized for cells whose smaller side is `cell_extent`.
    pub fn views(&self, now: Instant, cell_extent: f32) -> impl Iterator<Item = ParticleView<'_>> {
        self.particles
            .iter()
            .filter_map(move |p| p.view(now, cell_extent))
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::NEUTRAL;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn spawns_beyond_capacity_are_dropped() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        for _ in 0..(DEFAULT_CAPACITY / POP_COUNT + 5) {
            system.spawn_reproduction(Point::new(5.0, 5.0), NEUTRAL);
        }
        assert_eq!(system.len(), DEFAULT_CAPACITY);
        assert!(!system.spawn(ParticleSpec::new(ParticleKind::Pop, Point::default(), NEUTRAL, ms(10))));
    }

    #[test]
    fn cooperation_defaults_spawn_line_and_two_numbers() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        let accepted = system.spawn_cooperation(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            NEUTRAL,
            &CooperationFx::default(),
        );
        assert_eq!(accepted, 3);
        let texts: Vec<(&str, Rgba)> = system
            .iter()
            .filter_map(|p| p.spec.text.as_deref().map(|t| (t, p.spec.color)))
            .collect();
        assert_eq!(texts, vec![("+3%", GAIN), ("-1%", LOSS)]);

        let with_flow = CooperationFx {
            spawn_flow: true,
            spawn_line: false,
            ..CooperationFx::default()
        };
        assert_eq!(
            system.spawn_cooperation(Point::default(), Point::new(0.0, 8.0), NEUTRAL, &with_flow),
            2 + FLOW_COUNT
        );
    }

    #[test]
    fn update_keeps_particles_until_lifetime_plus_delay() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        let mut delayed = ParticleSpec::new(ParticleKind::Number, Point::default(), GAIN, ms(100));
        delayed.delay = ms(50);
        system.spawn(delayed);
        system.spawn_death(Point::default());

        system.update(start + ms(120));
        assert_eq!(system.len(), 5);
        system.update(start + ms(149));
        assert_eq!(system.len(), 5);
        system.update(start + ms(150));
        assert_eq!(system.len(), 4);
        system.update(start + ms(500));
        assert!(system.is_empty());
    }

    #[test]
    fn delayed_particles_are_hidden_until_active() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        let fx = CooperationFx {
            spawn_line: false,
            number_delay: ms(200),
            ..CooperationFx::default()
        };
        system.spawn_cooperation(Point::default(), Point::new(4.0, 0.0), NEUTRAL, &fx);
        assert_eq!(system.views(start + ms(100), 10.0).count(), 0);
        let views: Vec<_> = system.views(start + ms(200), 10.0).collect();
        assert_eq!(views.len(), 2);
        assert!((views[0].alpha - BASE_ALPHA).abs() < 1e-6);
        assert!((views[0].size - 3.5).abs() < 1e-6);
    }

    #[test]
    fn drifting_particles_move_per_sixteen_ms() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        system.spawn_reproduction(Point::new(100.0, 100.0), NEUTRAL);
        let first = system.iter().next().expect("pop");
        // Angle zero: velocity (2, -1); 160 ms is ten steps.
        let pos = first.position(start + ms(160));
        assert!((pos.x - 120.0).abs() < 1e-3);
        assert!((pos.y - 90.0).abs() < 1e-3);
    }

    #[test]
    fn flow_particles_interpolate_and_stop_at_destination() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        let fx = CooperationFx {
            spawn_flow: true,
            spawn_line: false,
            spawn_numbers: false,
            ..CooperationFx::default()
        };
        system.spawn_cooperation(Point::new(0.0, 0.0), Point::new(14.0, 28.0), NEUTRAL, &fx);
        let dot = system.iter().next().expect("flow");
        let half = dot.position(start + ms(700));
        assert!((half.x - 7.0).abs() < 1e-3 && (half.y - 14.0).abs() < 1e-3);
        assert_eq!(dot.position(start + ms(5_000)), Point::new(14.0, 28.0));
    }

    #[test]
    fn puffs_fade_and_shrink() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        system.spawn_death(Point::default());
        let view = system
            .views(start + ms(250), 10.0)
            .next()
            .expect("visible puff");
        assert_eq!(view.kind, ParticleKind::Puff);
        assert!((view.alpha - 0.45).abs() < 1e-4);
        assert!((view.size - 2.0).abs() < 1e-4);
        assert_eq!(view.color, SMOKE);
    }

    #[test]
    fn spawns_use_the_current_clock() {
        let start = Instant::now();
        let mut system = ParticleSystem::new(start);
        system.set_clock(start + ms(1_000));
        system.spawn_death(Point::default());
        system.update(start + ms(1_400));
        assert_eq!(system.len(), PUFF_COUNT);
        system.clear();
        assert!(system.is_empty());
    }

    #[test]
    fn cooperation_options_load_from_partial_json() {
        let fx: CooperationFx =
            serde_json::from_str(r#"{"spawn_flow": true, "giver_text": "-2%"}"#).expect("parse");
        assert!(fx.spawn_flow);
        assert_eq!(fx.giver_text, "-2%");
        assert_eq!(fx.receiver_text, "+3%");
        assert_eq!(fx.line_lifetime, ms(400));
        assert!(fx.spawn_line);

        let custom = CooperationFx {
            number_delay: ms(120),
            number_offset_y: 4.0,
            spawn_numbers: false,
            ..fx
        };
        let json = serde_json::to_string(&custom).expect("serialize");
        let back: CooperationFx = serde_json::from_str(&json).expect("reparse");
        assert_eq!(back, custom);
    }
}
