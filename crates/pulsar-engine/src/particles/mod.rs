//! CPU particle simulation feeding the points pipeline.

mod particle;
mod system;

pub use particle::Particle;
pub use system::{initial_position, ParticleSystem, UpdatePolicy};
