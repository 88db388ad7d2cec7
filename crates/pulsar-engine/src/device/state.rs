//! Binding bookkeeping shared by every backend.
//!
//! Backends own the actual storage; this module tracks what is bound, which
//! handles are alive, the layout recorded on each vertex array, the CPU-side
//! uniform staging of each program, and the error latch.

use std::collections::{BTreeMap, HashMap};

use crate::shader::{ProgramInterface, UniformLocation};

use super::context::{AttributeBinding, BufferId, BufferTarget, ProgramId, UniformValue, VertexArrayId};
use super::error::DeviceErrorCode;

/// Attribute layout recorded on a vertex array.
#[derive(Debug, Clone, Default)]
pub(crate) struct VertexArrayState {
    pub stride: u32,
    pub attributes: Vec<AttributeBinding>,
    /// Buffer captured when the layout was configured.
    pub buffer: Option<BufferId>,
}

/// CPU copy of a program's uniform bindings.
#[derive(Debug, Clone)]
pub(crate) struct UniformStaging {
    blocks: BTreeMap<u32, Vec<u8>>,
}

impl UniformStaging {
    pub fn new(interface: &ProgramInterface) -> Self {
        let blocks = interface
            .blocks
            .iter()
            .map(|b| (b.binding, vec![0u8; b.size as usize]))
            .collect();
        Self { blocks }
    }

    pub fn write(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Result<(), DeviceErrorCode> {
        if value.ty() != location.ty {
            return Err(DeviceErrorCode::TypeMismatch);
        }
        let block = self
            .blocks
            .get_mut(&location.binding)
            .ok_or(DeviceErrorCode::OutOfRange)?;
        let start = location.offset as usize;
        let end = start + location.ty.size() as usize;
        let dst = block.get_mut(start..end).ok_or(DeviceErrorCode::OutOfRange)?;
        value.write_to(dst);
        Ok(())
    }

    pub fn blocks(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.blocks.iter().map(|(b, bytes)| (*b, bytes.as_slice()))
    }
}

#[derive(Debug, Default)]
pub(crate) struct BindState {
    next_id: u32,
    vertex_array: Option<VertexArrayId>,
    array_buffer: Option<BufferId>,
    element_buffer: Option<BufferId>,
    program: Option<ProgramId>,
    pub vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    error: Option<DeviceErrorCode>,
}

impl BindState {
    /// Allocates a fresh non-zero handle value.
    pub fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Latches `code` unless an earlier error is still pending.
    pub fn record(&mut self, code: DeviceErrorCode) {
        log::trace!("device call rejected: {code}");
        self.error.get_or_insert(code);
    }

    pub fn take_error(&mut self) -> Option<DeviceErrorCode> {
        self.error.take()
    }

    // ── vertex arrays ─────────────────────────────────────────────────────

    pub fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.allocate());
        self.vertex_arrays.insert(id, VertexArrayState::default());
        self.vertex_array = Some(id);
        id
    }

    pub fn bind_vertex_array(&mut self, id: VertexArrayId) -> bool {
        if !self.vertex_arrays.contains_key(&id) {
            self.record(DeviceErrorCode::InvalidHandle);
            return false;
        }
        self.vertex_array = Some(id);
        true
    }

    pub fn delete_vertex_array(&mut self, id: VertexArrayId) -> bool {
        if self.vertex_arrays.remove(&id).is_none() {
            self.record(DeviceErrorCode::InvalidHandle);
            return false;
        }
        if self.vertex_array == Some(id) {
            self.vertex_array = None;
        }
        true
    }

    /// Records `attributes` on the bound vertex array against the bound array
    /// buffer.
    pub fn configure_vertex_array(&mut self, stride: u32, attributes: &[AttributeBinding]) -> bool {
        if stride == 0 {
            self.record(DeviceErrorCode::InvalidValue);
            return false;
        }
        let Some(buffer) = self.array_buffer else {
            self.record(DeviceErrorCode::NothingBound);
            return false;
        };
        let Some(id) = self.vertex_array else {
            self.record(DeviceErrorCode::NothingBound);
            return false;
        };
        if let Some(state) = self.vertex_arrays.get_mut(&id) {
            state.stride = stride;
            state.attributes = attributes.to_vec();
            state.buffer = Some(buffer);
        }
        true
    }

    /// The bound vertex array, if it has a configured layout.
    pub fn bound_vertex_array(&self) -> Option<(VertexArrayId, VertexArrayState)> {
        let id = self.vertex_array?;
        let state = self.vertex_arrays.get(&id)?;
        state.buffer.map(|_| (id, state.clone()))
    }

    // ── buffers ───────────────────────────────────────────────────────────

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => self.element_buffer,
        }
    }

    pub fn set_bound_buffer(&mut self, target: BufferTarget, id: Option<BufferId>) {
        match target {
            BufferTarget::Array => self.array_buffer = id,
            BufferTarget::ElementArray => self.element_buffer = id,
        }
    }

    pub fn require_buffer(&mut self, target: BufferTarget) -> Option<BufferId> {
        let bound = self.bound_buffer(target);
        if bound.is_none() {
            self.record(DeviceErrorCode::NothingBound);
        }
        bound
    }

    /// Unbinds `id` everywhere it is bound.
    pub fn forget_buffer(&mut self, id: BufferId) {
        for target in [BufferTarget::Array, BufferTarget::ElementArray] {
            if self.bound_buffer(target) == Some(id) {
                self.set_bound_buffer(target, None);
            }
        }
    }

    // ── programs ──────────────────────────────────────────────────────────

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn set_program(&mut self, id: Option<ProgramId>) {
        self.program = id;
    }

    pub fn require_program(&mut self) -> Option<ProgramId> {
        if self.program.is_none() {
            self.record(DeviceErrorCode::NothingBound);
        }
        self.program
    }

    pub fn forget_program(&mut self, id: ProgramId) {
        if self.program == Some(id) {
            self.program = None;
        }
    }
}

/// Checks that `layout` feeds every vertex input of `interface` with the
/// declared component count.
pub(crate) fn check_layout(
    interface: &ProgramInterface,
    layout: &VertexArrayState,
) -> Result<(), DeviceErrorCode> {
    for attr in &interface.attributes {
        let binding = layout
            .attributes
            .iter()
            .find(|b| b.location == attr.location)
            .ok_or(DeviceErrorCode::InvalidValue)?;
        if binding.components != attr.components {
            return Err(DeviceErrorCode::TypeMismatch);
        }
    }
    Ok(())
}

/// Checks that `count` records starting at `first` fit in `buffer_size` bytes.
pub(crate) fn draw_fits(first: u32, count: u32, stride: u32, buffer_size: u64) -> bool {
    let end = (first as u64 + count as u64) * stride as u64;
    end <= buffer_size
}
