//! Framebuffer coordinate conventions shared by the layers and the transforms.
//!
//! Canonical CPU space for 2D geometry:
//! - physical pixels
//! - origin top-left
//! - +X right, +Y down
//!
//! `transform::viewport_transform_2d` maps this space to NDC.

mod viewport;

pub use viewport::Viewport;
