//! Time subsystem.
//!
//! Provides frame timing without coupling to the runtime:
//! - `FrameClock` produces one `FrameTime` per presented frame
//! - `FrameStats` turns frame deltas into a once-per-second FPS report

mod frame_clock;
mod frame_stats;

pub use frame_clock::{FrameClock, FrameTime};
pub use frame_stats::{format_significant, FrameStats};
