//! In-memory device.
//!
//! Keeps buffer contents and uniform staging on the CPU, enforces the same
//! binding rules as the GPU backend and logs every call. Nothing is
//! rasterized: a read-back returns the clear colour of the last presented
//! frame.

use std::collections::HashMap;

use crate::coords::Viewport;
use crate::shader::{LinkedProgram, ProgramInterface, UniformLocation};
use crate::snapshot::Snapshot;

use super::context::{
    AttributeBinding, BufferId, BufferTarget, BufferUsage, ClearColor, Device, ProgramId,
    Topology, UniformValue, VertexArrayId,
};
use super::error::{DeviceError, DeviceErrorCode};
use super::state::{check_layout, draw_fits, BindState, UniformStaging};

/// One entry of the call log.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateVertexArray(VertexArrayId),
    BindVertexArray(VertexArrayId),
    DeleteVertexArray(VertexArrayId),
    CreateBuffer(BufferId),
    BindBuffer(BufferTarget, BufferId),
    BufferData {
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    DeleteBuffer(BufferId),
    CreateProgram(ProgramId),
    UseProgram(ProgramId),
    DeleteProgram(ProgramId),
    VertexAttribLayout {
        stride: u32,
        attributes: Vec<AttributeBinding>,
    },
    Uniform(UniformLocation, UniformValue),
    Viewport(Viewport),
    Clear(ClearColor),
    DrawArrays {
        topology: Topology,
        first: u32,
        count: u32,
    },
    ReadPixels,
    Present,
}

impl DeviceCall {
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            DeviceCall::DeleteVertexArray(_) | DeviceCall::DeleteBuffer(_) | DeviceCall::DeleteProgram(_)
        )
    }
}

/// A draw that passed validation, with the data it would have consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub topology: Topology,
    pub first: u32,
    pub count: u32,
    pub viewport: Viewport,
    /// Bytes of the drawn record range.
    pub vertices: Vec<u8>,
    /// Staged uniform bytes per binding at draw time.
    pub uniforms: Vec<(u32, Vec<u8>)>,
}

struct HeadlessProgram {
    interface: ProgramInterface,
    staging: UniformStaging,
}

type DrawHook = Box<dyn FnMut(&DrawRecord)>;

pub struct HeadlessDevice {
    state: BindState,
    buffers: HashMap<BufferId, Vec<u8>>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    viewport: Viewport,
    frame_clear: ClearColor,
    presented: Option<(Viewport, ClearColor)>,
    calls: Vec<DeviceCall>,
    draws: Vec<DrawRecord>,
    on_draw: Option<DrawHook>,
}

impl HeadlessDevice {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: BindState::default(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            viewport,
            frame_clear: ClearColor::BLACK,
            presented: None,
            calls: Vec::new(),
            draws: Vec::new(),
            on_draw: None,
        }
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Number of live objects: (vertex arrays, buffers, programs).
    pub fn live_objects(&self) -> (usize, usize, usize) {
        (
            self.state.vertex_arrays.len(),
            self.buffers.len(),
            self.programs.len(),
        )
    }

    /// Installs a callback run after every accepted draw.
    pub fn on_draw(&mut self, hook: impl FnMut(&DrawRecord) + 'static) {
        self.on_draw = Some(Box::new(hook));
    }

    fn program_mut(&mut self) -> Option<&mut HeadlessProgram> {
        let id = self.state.require_program()?;
        let program = self.programs.get_mut(&id);
        if program.is_none() {
            self.state.record(DeviceErrorCode::InvalidHandle);
        }
        program
    }

    fn validate_draw(&self, first: u32, count: u32) -> Result<DrawRecord, DeviceErrorCode> {
        let program_id = self.state.program().ok_or(DeviceErrorCode::NothingBound)?;
        let program = self.programs.get(&program_id).ok_or(DeviceErrorCode::InvalidHandle)?;
        let (_, layout) = self
            .state
            .bound_vertex_array()
            .ok_or(DeviceErrorCode::NothingBound)?;
        check_layout(&program.interface, &layout)?;

        let bytes = layout
            .buffer
            .and_then(|b| self.buffers.get(&b))
            .ok_or(DeviceErrorCode::InvalidHandle)?;
        if !draw_fits(first, count, layout.stride, bytes.len() as u64) {
            return Err(DeviceErrorCode::OutOfRange);
        }

        let start = first as usize * layout.stride as usize;
        let end = start + count as usize * layout.stride as usize;
        Ok(DrawRecord {
            program: program_id,
            topology: Topology::Triangles,
            first,
            count,
            viewport: self.viewport,
            vertices: bytes[start..end].to_vec(),
            uniforms: program
                .staging
                .blocks()
                .map(|(binding, data)| (binding, data.to_vec()))
                .collect(),
        })
    }
}

fn to_unorm8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl Device for HeadlessDevice {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = self.state.create_vertex_array();
        self.calls.push(DeviceCall::CreateVertexArray(id));
        id
    }

    fn bind_vertex_array(&mut self, id: VertexArrayId) {
        self.calls.push(DeviceCall::BindVertexArray(id));
        self.state.bind_vertex_array(id);
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        self.calls.push(DeviceCall::DeleteVertexArray(id));
        self.state.delete_vertex_array(id);
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = BufferId(self.state.allocate());
        self.buffers.insert(id, Vec::new());
        self.state.set_bound_buffer(BufferTarget::Array, Some(id));
        self.calls.push(DeviceCall::CreateBuffer(id));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId) {
        self.calls.push(DeviceCall::BindBuffer(target, id));
        if !self.buffers.contains_key(&id) {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.set_bound_buffer(target, Some(id));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.calls.push(DeviceCall::BufferData {
            target,
            len: data.len(),
            usage,
        });
        let Some(id) = self.state.require_buffer(target) else {
            return;
        };
        match self.buffers.get_mut(&id) {
            Some(store) => {
                store.clear();
                store.extend_from_slice(data);
            }
            None => self.state.record(DeviceErrorCode::InvalidHandle),
        }
    }

    fn buffer_size(&self, target: BufferTarget) -> Option<u64> {
        let id = self.state.bound_buffer(target)?;
        self.buffers.get(&id).map(|b| b.len() as u64)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.calls.push(DeviceCall::DeleteBuffer(id));
        if self.buffers.remove(&id).is_none() {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.forget_buffer(id);
    }

    fn create_program(&mut self, program: &LinkedProgram) -> ProgramId {
        let id = ProgramId(self.state.allocate());
        self.programs.insert(
            id,
            HeadlessProgram {
                interface: program.interface.clone(),
                staging: UniformStaging::new(&program.interface),
            },
        );
        self.calls.push(DeviceCall::CreateProgram(id));
        id
    }

    fn use_program(&mut self, id: ProgramId) {
        self.calls.push(DeviceCall::UseProgram(id));
        if !self.programs.contains_key(&id) {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.set_program(Some(id));
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.calls.push(DeviceCall::DeleteProgram(id));
        if self.programs.remove(&id).is_none() {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.forget_program(id);
    }

    fn vertex_attrib_layout(&mut self, stride: u32, attributes: &[AttributeBinding]) {
        self.calls.push(DeviceCall::VertexAttribLayout {
            stride,
            attributes: attributes.to_vec(),
        });
        self.state.configure_vertex_array(stride, attributes);
    }

    fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.calls.push(DeviceCall::Uniform(location, value));
        let Some(program) = self.program_mut() else {
            return;
        };
        if let Err(code) = program.staging.write(location, value) {
            self.state.record(code);
        }
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.calls.push(DeviceCall::Viewport(viewport));
        self.viewport = viewport;
    }

    fn clear(&mut self, color: ClearColor) {
        self.calls.push(DeviceCall::Clear(color));
        self.frame_clear = color;
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.calls.push(DeviceCall::DrawArrays {
            topology,
            first,
            count,
        });
        if count == 0 {
            return;
        }
        match self.validate_draw(first, count) {
            Ok(mut record) => {
                record.topology = topology;
                if let Some(hook) = self.on_draw.as_mut() {
                    hook(&record);
                }
                self.draws.push(record);
            }
            Err(code) => self.state.record(code),
        }
    }

    fn read_pixels(&mut self) -> Result<Snapshot, DeviceError> {
        self.calls.push(DeviceCall::ReadPixels);
        let (viewport, color) = self.presented.unwrap_or((self.viewport, ClearColor::BLACK));
        let pixel = [
            to_unorm8(color.r),
            to_unorm8(color.g),
            to_unorm8(color.b),
            to_unorm8(color.a),
        ];
        Ok(Snapshot::filled(viewport.width, viewport.height, pixel))
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::Present);
        self.presented = Some((self.viewport, self.frame_clear));
        Ok(())
    }

    fn take_error(&mut self) -> Option<DeviceErrorCode> {
        self.state.take_error()
    }
}

#[cfg(test)]
mod tests {
    use crate::shader::link;

    use super::*;

    const VS: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
};

@group(0) @binding(0) var<uniform> scale: f32;

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(pos * scale, 0.0, 1.0);
    return out;
}
"#;

    const FS: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

    fn setup(dev: &mut HeadlessDevice) -> (VertexArrayId, BufferId, ProgramId) {
        let program = link(VS, FS).unwrap();
        let vao = dev.create_vertex_array();
        let buf = dev.create_buffer();
        let prog = dev.create_program(&program);
        dev.vertex_attrib_layout(8, &[AttributeBinding { location: 0, components: 2, offset: 0 }]);
        dev.use_program(prog);
        (vao, buf, prog)
    }

    #[test]
    fn buffer_data_replaces_store() {
        let mut dev = HeadlessDevice::new(Viewport::new(4, 4));
        setup(&mut dev);
        dev.buffer_data(BufferTarget::Array, &[1, 2, 3, 4], BufferUsage::Stream);
        assert_eq!(dev.buffer_size(BufferTarget::Array), Some(4));
        dev.buffer_data(BufferTarget::Array, &[], BufferUsage::Stream);
        assert_eq!(dev.buffer_size(BufferTarget::Array), Some(0));
        assert_eq!(dev.take_error(), None);
    }

    #[test]
    fn draw_past_end_latches_out_of_range() {
        let mut dev = HeadlessDevice::new(Viewport::new(4, 4));
        setup(&mut dev);
        dev.buffer_data(BufferTarget::Array, &[0u8; 16], BufferUsage::Static);
        dev.draw_arrays(Topology::Triangles, 0, 3);
        assert_eq!(dev.take_error(), Some(DeviceErrorCode::OutOfRange));
        assert!(dev.draws().is_empty());
    }

    #[test]
    fn draw_without_program_latches_nothing_bound() {
        let mut dev = HeadlessDevice::new(Viewport::new(4, 4));
        dev.create_vertex_array();
        dev.create_buffer();
        dev.vertex_attrib_layout(8, &[AttributeBinding { location: 0, components: 2, offset: 0 }]);
        dev.buffer_data(BufferTarget::Array, &[0u8; 24], BufferUsage::Static);
        dev.draw_arrays(Topology::Triangles, 0, 3);
        assert_eq!(dev.take_error(), Some(DeviceErrorCode::NothingBound));
    }

    #[test]
    fn zero_count_draw_is_a_no_op() {
        let mut dev = HeadlessDevice::new(Viewport::new(4, 4));
        dev.draw_arrays(Topology::Points, 0, 0);
        assert_eq!(dev.take_error(), None);
        assert!(dev.draws().is_empty());
    }

    #[test]
    fn uniforms_are_captured_with_the_draw() {
        let mut dev = HeadlessDevice::new(Viewport::new(4, 4));
        setup(&mut dev);
        dev.buffer_data(BufferTarget::Array, &[0u8; 24], BufferUsage::Static);
        let loc = link(VS, FS).unwrap().interface.uniform("scale").unwrap();
        dev.uniform(loc, UniformValue::F32(2.0));
        dev.draw_arrays(Topology::Triangles, 0, 3);

        assert_eq!(dev.take_error(), None);
        let draw = &dev.draws()[0];
        assert_eq!(draw.vertices.len(), 24);
        assert_eq!(draw.uniforms, vec![(0, 2.0f32.to_ne_bytes().to_vec())]);
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut dev = HeadlessDevice::new(Viewport::new(4, 4));
        let (vao, buf, prog) = setup(&mut dev);
        dev.delete_program(prog);
        dev.delete_buffer(buf);
        dev.delete_vertex_array(vao);
        assert_eq!(dev.take_error(), None);
        assert_eq!(dev.live_objects(), (0, 0, 0));

        dev.use_program(prog);
        assert_eq!(dev.take_error(), Some(DeviceErrorCode::InvalidHandle));
        dev.bind_buffer(BufferTarget::Array, buf);
        assert_eq!(dev.take_error(), Some(DeviceErrorCode::InvalidHandle));
    }

    #[test]
    fn read_back_returns_presented_clear_colour() {
        let mut dev = HeadlessDevice::new(Viewport::new(2, 2));
        dev.clear(ClearColor::new(1.0, 0.0, 0.0, 1.0));
        dev.present().unwrap();
        dev.clear(ClearColor::new(0.0, 1.0, 0.0, 1.0));

        let snap = dev.read_pixels().unwrap();
        assert_eq!((snap.width, snap.height), (2, 2));
        assert_eq!(snap.pixel(1, 1), Some([255, 0, 0, 255]));
    }
}
