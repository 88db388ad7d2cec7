//! Thin owning wrappers over device handles.
//!
//! Each wrapper owns exactly one handle and only touches the device's binding
//! state through it. Release consumes the wrapper so a handle cannot be
//! deleted twice.

mod buffer;
mod program;
mod vertex_array;

pub use buffer::Buffer;
pub use program::{LookupError, ShaderProgram};
pub use vertex_array::VertexArray;
