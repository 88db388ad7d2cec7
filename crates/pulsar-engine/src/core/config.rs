use std::path::PathBuf;

use crate::device::ClearColor;
use crate::particles::UpdatePolicy;

/// Startup parameters of the frame loop.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub particle_count: usize,
    /// Sprite edge length in pixels.
    pub point_size: f32,
    /// Squared speed at which particle colour saturation reaches zero.
    pub speed_normalization: f32,
    pub update_policy: UpdatePolicy,
    /// Seed for [`UpdatePolicy::RandomWalk`].
    pub seed: u64,
    pub clear_color: ClearColor,
    pub snapshot_path: PathBuf,
    /// Length of the FPS averaging window, in seconds.
    pub fps_window: f32,
    /// Poll the device error latch after every call and log rejected calls.
    pub check_device_errors: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            particle_count: 10_000,
            point_size: 3.0,
            speed_normalization: 10.0,
            update_policy: UpdatePolicy::default(),
            seed: 0x5eed,
            clear_color: ClearColor::BLACK,
            snapshot_path: PathBuf::from("export.png"),
            fps_window: 1.0,
            check_device_errors: cfg!(debug_assertions),
        }
    }
}
