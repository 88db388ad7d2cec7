use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::pipeline::{AttributeSpec, Vertex, VertexLayout};

/// One simulated point, streamed to the device as-is (16 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Framebuffer pixels, origin top-left.
    pub position: Vec2,
    /// Pixels per frame.
    pub velocity: Vec2,
}

const ATTRIBUTES: [AttributeSpec; 2] = [
    AttributeSpec::new("position", 2, 0),
    AttributeSpec::new("velocity", 2, 8),
];

impl Vertex for Particle {
    fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Particle>() as u32,
            attributes: &ATTRIBUTES,
        }
    }
}
