use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::coords::Viewport;
use crate::shader::{LinkedProgram, ProgramInterface, UniformLocation};
use crate::snapshot::Snapshot;

use super::context::{
    AttributeBinding, BufferId, BufferTarget, BufferUsage, ClearColor, Device, ProgramId,
    Topology, UniformValue, VertexArrayId,
};
use super::error::{DeviceError, DeviceErrorCode, SurfaceErrorAction};
use super::gpu::Gpu;
use super::readback::{create_offscreen_target, read_texture_rgba};
use super::state::{check_layout, draw_fits, BindState, UniformStaging, VertexArrayState};

/// Corners of the quad drawn for each point sprite.
const POINT_SPRITE_VERTICES: u32 = 6;

#[derive(Default)]
struct BufferSlot {
    /// `None` while the store is empty; wgpu cannot bind zero-sized slices.
    store: Option<Rc<wgpu::Buffer>>,
    size: u64,
}

struct GpuProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    interface: ProgramInterface,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    layout: wgpu::PipelineLayout,
    staging: UniformStaging,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    program: ProgramId,
    vertex_array: VertexArrayId,
    topology: Topology,
    format: wgpu::TextureFormat,
}

struct RecordedDraw {
    pipeline: Rc<wgpu::RenderPipeline>,
    vertices: Rc<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
    _uniform_buffers: Vec<wgpu::Buffer>,
    viewport: Viewport,
    vertex_range: Range<u32>,
    instance_range: Range<u32>,
}

struct FrameRecording {
    clear: ClearColor,
    draws: Vec<RecordedDraw>,
}

impl Default for FrameRecording {
    fn default() -> Self {
        Self {
            clear: ClearColor::BLACK,
            draws: Vec::new(),
        }
    }
}

/// [`Device`] backed by a wgpu surface.
///
/// Draw calls are validated and recorded with everything they reference
/// (pipeline, vertex store, a snapshot of the uniforms), then replayed into a
/// single render pass on [`Device::present`]. The last presented recording is
/// kept so [`Device::read_pixels`] can replay it into an offscreen target.
pub struct WgpuDevice<'w> {
    gpu: Gpu<'w>,
    state: BindState,
    buffers: HashMap<BufferId, BufferSlot>,
    programs: HashMap<ProgramId, GpuProgram>,
    pipelines: HashMap<PipelineKey, Rc<wgpu::RenderPipeline>>,
    viewport: Viewport,
    frame: FrameRecording,
    last_frame: Option<FrameRecording>,
}

impl<'w> WgpuDevice<'w> {
    pub fn new(gpu: Gpu<'w>) -> Self {
        let size = gpu.size();
        Self {
            gpu,
            state: BindState::default(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            viewport: Viewport::new(size.width, size.height),
            frame: FrameRecording::default(),
            last_frame: None,
        }
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
    }

    /// Current drawable size in physical pixels.
    pub fn framebuffer_size(&self) -> Viewport {
        let size = self.gpu.size();
        Viewport::new(size.width, size.height)
    }

    fn evict_pipelines(&mut self, keep: impl Fn(&PipelineKey) -> bool) {
        self.pipelines.retain(|key, _| keep(key));
    }

    fn record_draw(
        &mut self,
        topology: Topology,
        first: u32,
        count: u32,
    ) -> Result<RecordedDraw, DeviceErrorCode> {
        let program_id = self.state.program().ok_or(DeviceErrorCode::NothingBound)?;
        let (vao_id, layout) = self
            .state
            .bound_vertex_array()
            .ok_or(DeviceErrorCode::NothingBound)?;
        let program = self
            .programs
            .get(&program_id)
            .ok_or(DeviceErrorCode::InvalidHandle)?;
        check_layout(&program.interface, &layout)?;

        let slot = layout
            .buffer
            .and_then(|id| self.buffers.get(&id))
            .ok_or(DeviceErrorCode::InvalidHandle)?;
        if !draw_fits(first, count, layout.stride, slot.size) {
            return Err(DeviceErrorCode::OutOfRange);
        }
        let vertices = slot.store.clone().ok_or(DeviceErrorCode::OutOfRange)?;

        let device = self.gpu.device();
        let key = PipelineKey {
            program: program_id,
            vertex_array: vao_id,
            topology,
            format: self.gpu.surface_format(),
        };
        let pipeline = match self.pipelines.get(&key) {
            Some(p) => p.clone(),
            None => {
                let p = Rc::new(build_pipeline(device, program, &layout, topology, key.format)?);
                log::debug!("render pipeline created: {key:?}");
                self.pipelines.insert(key, p.clone());
                p
            }
        };

        let (bind_group, uniform_buffers) = bind_uniforms(device, program);
        let (vertex_range, instance_range) = match topology {
            Topology::Points => (0..POINT_SPRITE_VERTICES, first..first + count),
            Topology::Triangles | Topology::Lines => (first..first + count, 0..1),
        };

        Ok(RecordedDraw {
            pipeline,
            vertices,
            bind_group,
            _uniform_buffers: uniform_buffers,
            viewport: self.viewport,
            vertex_range,
            instance_range,
        })
    }
}

fn vertex_format(components: u32) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::Triangles | Topology::Points => wgpu::PrimitiveTopology::TriangleList,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    program: &GpuProgram,
    layout: &VertexArrayState,
    topology: Topology,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, DeviceErrorCode> {
    let attributes = layout
        .attributes
        .iter()
        .map(|a: &AttributeBinding| {
            Ok(wgpu::VertexAttribute {
                format: vertex_format(a.components).ok_or(DeviceErrorCode::InvalidValue)?,
                offset: a.offset as u64,
                shader_location: a.location,
            })
        })
        .collect::<Result<Vec<_>, DeviceErrorCode>>()?;

    // Point sprites step once per record; the corner comes from the vertex index.
    let step_mode = match topology {
        Topology::Points => wgpu::VertexStepMode::Instance,
        Topology::Triangles | Topology::Lines => wgpu::VertexStepMode::Vertex,
    };

    let buffers = [wgpu::VertexBufferLayout {
        array_stride: layout.stride as u64,
        step_mode,
        attributes: &attributes,
    }];

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("pulsar pipeline"),
        layout: Some(&program.layout),

        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(program.interface.vertex_entry.as_str()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(program.interface.fragment_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(topology),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    }))
}

/// Uploads the staged uniforms into fresh buffers for one draw.
fn bind_uniforms(
    device: &wgpu::Device,
    program: &GpuProgram,
) -> (Option<wgpu::BindGroup>, Vec<wgpu::Buffer>) {
    let Some(bgl) = program.bind_group_layout.as_ref() else {
        return (None, Vec::new());
    };

    let buffers: Vec<(u32, wgpu::Buffer)> = program
        .staging
        .blocks()
        .map(|(binding, bytes)| {
            let mut contents = bytes.to_vec();
            contents.resize(bytes.len().next_multiple_of(16).max(16), 0);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("pulsar uniform block"),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            (binding, buffer)
        })
        .collect();

    let entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .map(|(binding, buffer)| wgpu::BindGroupEntry {
            binding: *binding,
            resource: buffer.as_entire_binding(),
        })
        .collect();

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("pulsar uniform bind group"),
        layout: bgl,
        entries: &entries,
    });

    (Some(bind_group), buffers.into_iter().map(|(_, b)| b).collect())
}

fn clamp_viewport(viewport: Viewport, target: Viewport) -> Option<(f32, f32)> {
    let w = viewport.width.min(target.width);
    let h = viewport.height.min(target.height);
    (w > 0 && h > 0).then_some((w as f32, h as f32))
}

fn encode_frame(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    frame: &FrameRecording,
    target: Viewport,
    label: &str,
) {
    let c = frame.clear;
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color {
                    r: c.r as f64,
                    g: c.g as f64,
                    b: c.b as f64,
                    a: c.a as f64,
                }),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    for draw in &frame.draws {
        let Some((w, h)) = clamp_viewport(draw.viewport, target) else {
            continue;
        };
        pass.set_viewport(0.0, 0.0, w, h, 0.0, 1.0);
        pass.set_pipeline(&draw.pipeline);
        if let Some(bind_group) = draw.bind_group.as_ref() {
            pass.set_bind_group(0, bind_group, &[]);
        }
        pass.set_vertex_buffer(0, draw.vertices.slice(..));
        pass.draw(draw.vertex_range.clone(), draw.instance_range.clone());
    }
}

impl Device for WgpuDevice<'_> {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        self.state.create_vertex_array()
    }

    fn bind_vertex_array(&mut self, id: VertexArrayId) {
        self.state.bind_vertex_array(id);
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        if self.state.delete_vertex_array(id) {
            self.evict_pipelines(|k| k.vertex_array != id);
        }
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = BufferId(self.state.allocate());
        self.buffers.insert(id, BufferSlot::default());
        self.state.set_bound_buffer(BufferTarget::Array, Some(id));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId) {
        if !self.buffers.contains_key(&id) {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.set_bound_buffer(target, Some(id));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let Some(id) = self.state.require_buffer(target) else {
            return;
        };
        let Some(slot) = self.buffers.get_mut(&id) else {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        };

        // Replacing the Rc orphans the old store; recorded draws keep it alive.
        slot.size = data.len() as u64;
        slot.store = (!data.is_empty()).then(|| {
            let label = match usage {
                BufferUsage::Static => "pulsar static buffer",
                BufferUsage::Stream => "pulsar stream buffer",
            };
            Rc::new(
                self.gpu
                    .device()
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(label),
                        contents: data,
                        usage: wgpu::BufferUsages::VERTEX
                            | wgpu::BufferUsages::INDEX
                            | wgpu::BufferUsages::COPY_DST,
                    }),
            )
        });
        log::trace!("buffer {:?} store replaced: {} bytes", id, data.len());
    }

    fn buffer_size(&self, target: BufferTarget) -> Option<u64> {
        let id = self.state.bound_buffer(target)?;
        self.buffers.get(&id).map(|slot| slot.size)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_none() {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.forget_buffer(id);
    }

    fn create_program(&mut self, program: &LinkedProgram) -> ProgramId {
        let device = self.gpu.device();
        let interface = program.interface.clone();

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pulsar vertex stage"),
            source: wgpu::ShaderSource::Wgsl(program.vertex_source.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pulsar fragment stage"),
            source: wgpu::ShaderSource::Wgsl(program.fragment_source.as_str().into()),
        });

        let bind_group_layout = (!interface.blocks.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = interface
                .blocks
                .iter()
                .map(|block| {
                    let mut visibility = wgpu::ShaderStages::NONE;
                    if block.visibility.vertex {
                        visibility |= wgpu::ShaderStages::VERTEX;
                    }
                    if block.visibility.fragment {
                        visibility |= wgpu::ShaderStages::FRAGMENT;
                    }
                    wgpu::BindGroupLayoutEntry {
                        binding: block.binding,
                        visibility,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("pulsar uniform bgl"),
                entries: &entries,
            })
        });

        let layout = {
            let bgls: Vec<&wgpu::BindGroupLayout> = bind_group_layout.iter().collect();
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("pulsar pipeline layout"),
                bind_group_layouts: &bgls,
                immediate_size: 0,
            })
        };

        let staging = UniformStaging::new(&interface);
        let id = ProgramId(self.state.allocate());
        self.programs.insert(
            id,
            GpuProgram {
                vertex,
                fragment,
                interface,
                bind_group_layout,
                layout,
                staging,
            },
        );
        id
    }

    fn use_program(&mut self, id: ProgramId) {
        if !self.programs.contains_key(&id) {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.set_program(Some(id));
    }

    fn delete_program(&mut self, id: ProgramId) {
        if self.programs.remove(&id).is_none() {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        }
        self.state.forget_program(id);
        self.evict_pipelines(|k| k.program != id);
    }

    fn vertex_attrib_layout(&mut self, stride: u32, attributes: &[AttributeBinding]) {
        if !self.state.configure_vertex_array(stride, attributes) {
            return;
        }
        if let Some((id, _)) = self.state.bound_vertex_array() {
            self.evict_pipelines(|k| k.vertex_array != id);
        }
    }

    fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(id) = self.state.require_program() else {
            return;
        };
        let Some(program) = self.programs.get_mut(&id) else {
            self.state.record(DeviceErrorCode::InvalidHandle);
            return;
        };
        if let Err(code) = program.staging.write(location, value) {
            self.state.record(code);
        }
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, color: ClearColor) {
        // Clearing discards everything drawn so far this frame.
        self.frame.clear = color;
        self.frame.draws.clear();
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        if count == 0 {
            return;
        }
        match self.record_draw(topology, first, count) {
            Ok(draw) => self.frame.draws.push(draw),
            Err(code) => self.state.record(code),
        }
    }

    fn read_pixels(&mut self) -> Result<Snapshot, DeviceError> {
        let target = self.framebuffer_size();
        if !target.is_valid() {
            return Err(DeviceError::Readback("framebuffer has zero size".into()));
        }

        let device = self.gpu.device();
        let texture =
            create_offscreen_target(device, self.gpu.surface_format(), target.width, target.height);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pulsar readback encoder"),
        });

        let empty = FrameRecording::default();
        let recording = self.last_frame.as_ref().unwrap_or(&empty);
        encode_frame(&mut encoder, &view, recording, target, "pulsar readback pass");

        let rgba = read_texture_rgba(device, self.gpu.queue(), &texture, encoder)?;
        Ok(Snapshot {
            width: target.width,
            height: target.height,
            rgba,
        })
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        let recording = std::mem::take(&mut self.frame);
        let target = self.framebuffer_size();
        if !target.is_valid() {
            return Ok(());
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                let message = err.to_string();
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("frame skipped: {message}");
                        Ok(())
                    }
                    SurfaceErrorAction::Fatal => Err(DeviceError::Surface(message)),
                };
            }
        };

        encode_frame(&mut frame.encoder, &frame.view, &recording, target, "pulsar frame pass");
        self.gpu.present(frame);
        self.last_frame = Some(recording);
        Ok(())
    }

    fn take_error(&mut self) -> Option<DeviceErrorCode> {
        self.state.take_error()
    }
}
