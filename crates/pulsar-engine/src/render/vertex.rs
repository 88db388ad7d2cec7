use bytemuck::{Pod, Zeroable};

use crate::pipeline::{AttributeSpec, Vertex, VertexLayout};

/// Position plus RGB colour; shared by the triangle and the overlay.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub pos: [f32; 2],
    pub col: [f32; 3],
}

impl ColorVertex {
    pub const fn new(pos: [f32; 2], col: [f32; 3]) -> Self {
        Self { pos, col }
    }
}

const ATTRIBUTES: [AttributeSpec; 2] = [
    AttributeSpec::new("pos", 2, 0),
    AttributeSpec::new("col", 3, 8),
];

impl Vertex for ColorVertex {
    fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<ColorVertex>() as u32,
            attributes: &ATTRIBUTES,
        }
    }
}
