//! Frame loop.
//!
//! [`Harness`] owns the device, the renderer and the particle system and
//! drives one iteration per [`Harness::step`]. The window is reached only
//! through [`WindowPort`], so the loop runs unchanged against a real window
//! or a scripted one.

mod config;
mod harness;
mod window_port;

pub use config::HarnessConfig;
pub use harness::{Harness, LoopState};
pub use window_port::WindowPort;
