use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::coords::Viewport;
use crate::shader::{LinkedProgram, UniformLocation, UniformType};
use crate::snapshot::Snapshot;

use super::error::{DeviceError, DeviceErrorCode};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw handle value. Never zero for a live object.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Vertex-array object: an attribute layout bound to a data buffer.
    VertexArrayId
);
handle!(
    /// Data buffer.
    BufferId
);
handle!(
    /// Linked shader program.
    ProgramId
);

/// Binding point a buffer is attached to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Per-vertex data consumed by the bound vertex array.
    Array,
    /// Index data. Tracked for binding purposes; no draw call consumes it.
    ElementArray,
}

/// Update-frequency hint for `buffer_data`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    Static,
    /// Rewritten every frame.
    Stream,
}

/// Primitive topology of a draw call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    Triangles,
    Lines,
    /// One sprite per vertex. Vertex stages drawing points receive the sprite
    /// corner (0..6) through `@builtin(vertex_index)`.
    Points,
}

/// One vertex attribute as configured on a vertex array.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttributeBinding {
    pub location: u32,
    pub components: u32,
    pub offset: u32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    pub const BLACK: ClearColor = ClearColor::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// A value written to a uniform location.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::F32(_) => UniformType::F32,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Encodes the value with WGSL uniform layout. `out` must be exactly
    /// `self.ty().size()` bytes.
    pub fn write_to(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.ty().size() as usize);
        match self {
            UniformValue::F32(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Mat3(m) => {
                // mat3x3<f32> columns are 16-byte aligned.
                for (col, chunk) in m.to_cols_array_2d().iter().zip(out.chunks_exact_mut(16)) {
                    chunk[..12].copy_from_slice(bytemuck::cast_slice(col));
                    chunk[12..].fill(0);
                }
            }
            UniformValue::Mat4(m) => out.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array())),
        }
    }
}

/// Owned graphics-device context.
///
/// The device keeps a single "currently bound" vertex array, buffer per
/// target, and program. Every operation that reads or writes GPU data acts on
/// those bindings, so callers must bind before they upload or draw. Misuse
/// (unknown handles, nothing bound, type mismatches, out-of-range draws) never
/// panics: the call is ignored and an error code is latched for
/// [`Device::take_error`].
pub trait Device {
    /// Creates a vertex array and binds it.
    fn create_vertex_array(&mut self) -> VertexArrayId;
    fn bind_vertex_array(&mut self, id: VertexArrayId);
    fn delete_vertex_array(&mut self, id: VertexArrayId);

    /// Creates a buffer and binds it to [`BufferTarget::Array`].
    fn create_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId);
    /// Replaces the whole store of the buffer bound to `target`. An empty
    /// slice orphans the previous store and leaves a zero-sized buffer.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    /// Size in bytes of the buffer bound to `target`, if any.
    fn buffer_size(&self, target: BufferTarget) -> Option<u64>;
    fn delete_buffer(&mut self, id: BufferId);

    fn create_program(&mut self, program: &LinkedProgram) -> ProgramId;
    fn use_program(&mut self, id: ProgramId);
    fn delete_program(&mut self, id: ProgramId);

    /// Configures the bound vertex array to read `attributes` from the buffer
    /// currently bound to [`BufferTarget::Array`].
    fn vertex_attrib_layout(&mut self, stride: u32, attributes: &[AttributeBinding]);

    /// Writes a uniform of the program in use.
    fn uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn viewport(&mut self, viewport: Viewport);
    fn clear(&mut self, color: ClearColor);
    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Reads back the most recently presented frame as RGBA8.
    fn read_pixels(&mut self) -> Result<Snapshot, DeviceError>;

    /// Finishes the frame and hands it to the display.
    fn present(&mut self) -> Result<(), DeviceError>;

    /// Returns and clears the first error latched since the previous call.
    fn take_error(&mut self) -> Option<DeviceErrorCode>;
}
