//! The three layers drawn every frame and the renderer that owns them.
//!
//! Draw order is fixed: rotating triangle, particle field, line overlay.

mod layers;
mod renderer;
mod vertex;

pub use layers::{crosshair, OverlayLayer, ParticleLayer, TriangleLayer, TRIANGLE_VERTICES};
pub use renderer::FrameRenderer;
pub use vertex::ColorVertex;

pub(crate) mod shaders {
    pub const TRIANGLE_VS: &str = include_str!("shaders/triangle.vert.wgsl");
    pub const POINTS_VS: &str = include_str!("shaders/points.vert.wgsl");
    pub const LINES_VS: &str = include_str!("shaders/lines.vert.wgsl");
    pub const COLOR_FS: &str = include_str!("shaders/color.frag.wgsl");
}
