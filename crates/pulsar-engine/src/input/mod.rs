//! Input subsystem.
//!
//! Public API is platform-agnostic and does not expose winit types. The
//! runtime translates window events into [`InputEvent`]s; the frame loop folds
//! each frame's events into [`FrameCommands`].

mod commands;
pub mod platform;
mod types;

pub use commands::{Command, FrameCommands};
pub use types::{InputEvent, Key, KeyState};
