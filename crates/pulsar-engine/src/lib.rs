//! Pulsar engine crate.
//!
//! A small rendering harness: a GL-style device contract with a wgpu backend
//! and a headless recorder, the resource and pipeline wrappers built on it,
//! a particle simulation, and the winit runtime that drives one frame loop.

pub mod coords;
pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod particles;
pub mod pipeline;
pub mod render;
pub mod resource;
pub mod shader;
pub mod snapshot;
pub mod time;
pub mod transform;
pub mod window;
