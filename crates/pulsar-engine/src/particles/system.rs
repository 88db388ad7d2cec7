use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::coords::Viewport;

use super::particle::Particle;

/// How particle velocities are recomputed each frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum UpdatePolicy {
    /// Deterministic breathing motion along the placement ellipse.
    #[default]
    Orbit,
    /// Uniformly random step per particle per frame.
    RandomWalk,
}

/// Starting position of the particle with 1-based index `i`: a point on the
/// ellipse centred in `extent` with radii of 40% of each dimension.
pub fn initial_position(i: usize, extent: Viewport) -> Vec2 {
    let t = i as f64;
    Vec2::new(
        (extent.width as f64 * (0.5 + 0.4 * t.cos())) as f32,
        (extent.height as f64 * (0.5 + 0.4 * t.sin())) as f32,
    )
}

/// Fixed-size particle population.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    policy: UpdatePolicy,
    frame: u64,
    rng: Pcg32,
}

impl ParticleSystem {
    /// Places `count` particles for a framebuffer of `extent`, at rest.
    pub fn new(count: usize, extent: Viewport, policy: UpdatePolicy, seed: u64) -> Self {
        let particles = (1..=count)
            .map(|i| Particle {
                position: initial_position(i, extent),
                velocity: Vec2::ZERO,
            })
            .collect();
        Self {
            particles,
            policy,
            frame: 0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    /// Number of updates applied so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advances one frame: recomputes every velocity, then integrates.
    /// Positions are never clamped or wrapped.
    pub fn update(&mut self) {
        self.frame += 1;
        match self.policy {
            UpdatePolicy::Orbit => self.update_orbit(),
            UpdatePolicy::RandomWalk => self.update_random_walk(),
        }
    }

    fn update_orbit(&mut self) {
        let speed = 20.0 * (self.frame as f32 / 10.0).cos();
        for (k, p) in self.particles.iter_mut().enumerate() {
            let i = (k + 1) as f32;
            let j = i + 1.0;
            p.velocity = speed * Vec2::new(i.cos() - j.cos(), i.sin() - j.sin());
            p.position += p.velocity;
        }
    }

    fn update_random_walk(&mut self) {
        for p in &mut self.particles {
            let magnitude: f32 = self.rng.random_range(0.0..=10.0);
            let angle: f32 = self.rng.random_range(0.0..TAU);
            p.velocity = magnitude * Vec2::new(angle.cos(), angle.sin());
            p.position += p.velocity / 5.0;
        }
    }
}
