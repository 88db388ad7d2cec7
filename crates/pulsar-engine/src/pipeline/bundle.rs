use std::marker::PhantomData;

use crate::device::{BufferTarget, BufferUsage, Device, Topology, UniformValue};
use crate::resource::{Buffer, ShaderProgram, VertexArray};
use crate::shader::UniformLocation;

use super::error::PipelineError;
use super::layout::{resolve_layout, Vertex};

/// Construction parameters for a [`Pipeline`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineDescriptor<'a, V> {
    pub label: &'a str,
    pub vertex_src: &'a str,
    pub fragment_src: &'a str,
    pub topology: Topology,
    pub usage: BufferUsage,
    /// Uploaded once at construction. Meant for static pipelines.
    pub contents: Option<&'a [V]>,
}

pub struct Pipeline<V> {
    label: String,
    vertex_array: VertexArray,
    buffer: Buffer,
    program: ShaderProgram,
    topology: Topology,
    usage: BufferUsage,
    uploaded: u32,
    _records: PhantomData<V>,
}

impl<V: Vertex> Pipeline<V> {
    /// Creates the vertex array, buffer and program, checks the record layout
    /// of `V` against the program, and configures the attribute layout.
    ///
    /// On failure every object created so far is released again.
    pub fn new<D: Device>(
        dev: &mut D,
        desc: PipelineDescriptor<'_, V>,
    ) -> Result<Self, PipelineError> {
        let layout = V::layout();
        debug_assert_eq!(layout.stride as usize, std::mem::size_of::<V>());

        let vertex_array = VertexArray::new(dev);
        let buffer = Buffer::new(dev);

        let mut program = match ShaderProgram::new(dev, desc.vertex_src, desc.fragment_src) {
            Ok(program) => program,
            Err(err) => {
                buffer.release(dev);
                vertex_array.release(dev);
                return Err(err.into());
            }
        };

        let bindings = match resolve_layout(&layout, &mut program) {
            Ok(bindings) => bindings,
            Err(err) => {
                program.release(dev);
                buffer.release(dev);
                vertex_array.release(dev);
                return Err(err);
            }
        };

        dev.vertex_attrib_layout(layout.stride, &bindings);

        let mut pipeline = Self {
            label: desc.label.to_owned(),
            vertex_array,
            buffer,
            program,
            topology: desc.topology,
            usage: desc.usage,
            uploaded: 0,
            _records: PhantomData,
        };

        if let Some(contents) = desc.contents {
            pipeline.activate(dev).upload(contents);
        }

        log::debug!(
            "pipeline `{}` ready: {:?}, stride {}, {} attribute(s)",
            pipeline.label,
            pipeline.topology,
            layout.stride,
            bindings.len()
        );
        Ok(pipeline)
    }

    /// Number of records in the last upload.
    pub fn uploaded(&self) -> u32 {
        self.uploaded
    }

    /// Resolves a uniform at setup time; a missing name is a configuration
    /// error.
    pub fn require_uniform(&mut self, name: &str) -> Result<UniformLocation, PipelineError> {
        Ok(self.program.require_uniform(name)?)
    }

    /// Binds vertex array, buffer and program.
    pub fn activate<'a, D: Device>(&'a mut self, dev: &'a mut D) -> ActivePipeline<'a, V, D> {
        self.vertex_array.bind(dev);
        self.buffer.bind(dev);
        self.program.bind(dev);
        ActivePipeline {
            pipeline: self,
            dev,
        }
    }

    /// Splits into its objects so several pipelines can be released grouped
    /// by kind.
    pub fn into_parts(self) -> (VertexArray, Buffer, ShaderProgram) {
        (self.vertex_array, self.buffer, self.program)
    }

    /// Releases program, buffer and vertex array, in that order.
    pub fn release(self, dev: &mut impl Device) {
        let (vertex_array, buffer, program) = self.into_parts();
        program.release(dev);
        buffer.release(dev);
        vertex_array.release(dev);
    }
}

/// A pipeline whose objects are bound on the device.
pub struct ActivePipeline<'a, V, D> {
    pipeline: &'a mut Pipeline<V>,
    dev: &'a mut D,
}

impl<V: Vertex, D: Device> ActivePipeline<'_, V, D> {
    /// Replaces the buffer contents with `records`.
    ///
    /// Streaming pipelines orphan the previous store with a zero-length
    /// allocation before filling. An empty slice leaves a zero-byte buffer.
    pub fn upload(&mut self, records: &[V]) {
        let target = self.pipeline.buffer.target();
        let bytes: &[u8] = bytemuck::cast_slice(records);
        match self.pipeline.usage {
            BufferUsage::Static => {
                self.dev.buffer_data(target, bytes, BufferUsage::Static);
            }
            BufferUsage::Stream => {
                self.dev.buffer_data(target, &[], BufferUsage::Stream);
                if !bytes.is_empty() {
                    self.dev.buffer_data(target, bytes, BufferUsage::Stream);
                }
            }
        }
        self.pipeline.uploaded = records.len() as u32;
        log::trace!(
            "pipeline `{}` uploaded {} record(s)",
            self.pipeline.label,
            records.len()
        );
    }

    pub fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.dev.uniform(location, value);
    }

    /// Draws `count` records from the start of the buffer.
    pub fn draw(&mut self, count: u32) {
        self.dev.draw_arrays(self.pipeline.topology, 0, count);
    }

    /// Draws every record of the last upload.
    pub fn draw_uploaded(&mut self) {
        let count = self.pipeline.uploaded;
        self.draw(count);
    }

    /// Byte size of the pipeline's buffer store.
    pub fn buffer_size(&self) -> u64 {
        self.dev
            .buffer_size(self.pipeline.buffer.target())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use crate::coords::Viewport;
    use crate::device::{DeviceCall, HeadlessDevice};
    use crate::pipeline::{AttributeSpec, VertexLayout};
    use crate::shader::ShaderError;

    use super::*;

    #[repr(C)]
    #[derive(Debug, Copy, Clone, Pod, Zeroable)]
    struct Dot {
        pos: [f32; 2],
        vel: [f32; 2],
    }

    const DOT_ATTRIBUTES: [AttributeSpec; 2] =
        [AttributeSpec::new("pos", 2, 0), AttributeSpec::new("vel", 2, 8)];

    impl Vertex for Dot {
        fn layout() -> VertexLayout {
            VertexLayout {
                stride: 16,
                attributes: &DOT_ATTRIBUTES,
            }
        }
    }

    const VS: &str = r#"
@group(0) @binding(0) var<uniform> scale: f32;

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) vel: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos * scale + vel * 0.0, 0.0, 1.0);
}
"#;

    const FS: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

    fn descriptor<'a>(vs: &'a str) -> PipelineDescriptor<'a, Dot> {
        PipelineDescriptor {
            label: "dots",
            vertex_src: vs,
            fragment_src: FS,
            topology: Topology::Points,
            usage: BufferUsage::Stream,
            contents: None,
        }
    }

    fn dots(n: usize) -> Vec<Dot> {
        (0..n)
            .map(|i| Dot {
                pos: [i as f32, 0.0],
                vel: [0.0; 2],
            })
            .collect()
    }

    #[test]
    fn zero_record_upload_leaves_empty_buffer() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let mut pipeline = Pipeline::new(&mut dev, descriptor(VS)).unwrap();

        let mut active = pipeline.activate(&mut dev);
        active.upload(&[]);
        active.draw_uploaded();
        assert_eq!(active.buffer_size(), 0);
        assert_eq!(dev.take_error(), None);
        assert!(dev.draws().is_empty());
    }

    #[test]
    fn upload_sizes_buffer_by_record_count() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let mut pipeline = Pipeline::new(&mut dev, descriptor(VS)).unwrap();

        let mut active = pipeline.activate(&mut dev);
        active.upload(&dots(250));
        assert_eq!(active.buffer_size(), 250 * 16);
        active.draw_uploaded();
        assert_eq!(dev.take_error(), None);
        assert_eq!(dev.draws()[0].count, 250);
    }

    #[test]
    fn streaming_upload_orphans_then_fills() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let mut pipeline = Pipeline::new(&mut dev, descriptor(VS)).unwrap();
        pipeline.activate(&mut dev).upload(&dots(3));

        let uploads: Vec<usize> = dev
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::BufferData { len, .. } => Some(*len),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![0, 48]);
    }

    #[test]
    fn static_contents_are_uploaded_at_construction() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let records = dots(3);
        let mut desc = descriptor(VS);
        desc.usage = BufferUsage::Static;
        desc.contents = Some(&records);
        let mut pipeline = Pipeline::new(&mut dev, desc).unwrap();

        assert_eq!(pipeline.uploaded(), 3);
        let active = pipeline.activate(&mut dev);
        assert_eq!(active.buffer_size(), 48);
    }

    #[test]
    fn activation_binds_all_three_objects() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let mut pipeline = Pipeline::new(&mut dev, descriptor(VS)).unwrap();
        let before = dev.calls().len();
        pipeline.activate(&mut dev);

        let calls = &dev.calls()[before..];
        assert!(matches!(calls[0], DeviceCall::BindVertexArray(_)));
        assert!(matches!(calls[1], DeviceCall::BindBuffer(BufferTarget::Array, _)));
        assert!(matches!(calls[2], DeviceCall::UseProgram(_)));
    }

    #[test]
    fn uniforms_resolve_and_reach_the_draw() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let mut pipeline = Pipeline::new(&mut dev, descriptor(VS)).unwrap();
        let scale = pipeline.require_uniform("scale").unwrap();
        assert!(matches!(
            pipeline.require_uniform("speed"),
            Err(PipelineError::MissingUniform(name)) if name == "speed"
        ));

        let mut active = pipeline.activate(&mut dev);
        active.set_uniform(scale, UniformValue::F32(0.5));
        active.upload(&dots(1));
        active.draw_uploaded();
        assert_eq!(dev.take_error(), None);
        assert_eq!(dev.draws()[0].uniforms[0].1, 0.5f32.to_ne_bytes().to_vec());
    }

    #[test]
    fn link_failure_aborts_with_log_and_releases() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let bad_fs = r#"
@fragment
fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let mut desc = descriptor(VS);
        desc.fragment_src = bad_fs;
        let err = Pipeline::new(&mut dev, desc).err().unwrap();

        assert!(matches!(err, PipelineError::Shader(ShaderError::Link { .. })));
        assert!(!err.to_string().is_empty());
        assert_eq!(dev.live_objects(), (0, 0, 0));
    }

    #[test]
    fn missing_attribute_aborts_and_releases() {
        let vs = r#"
@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) vel: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position + vel, 0.0, 1.0);
}
"#;
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let err = Pipeline::new(&mut dev, descriptor(vs)).err().unwrap();
        assert!(matches!(err, PipelineError::MissingAttribute(ref name) if name == "pos"));
        assert!(err.to_string().contains("pos"));
        assert_eq!(dev.live_objects(), (0, 0, 0));
        assert_eq!(dev.take_error(), None);
    }

    #[test]
    fn component_mismatch_is_rejected() {
        let vs = r#"
@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) vel: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos.xy + vel, 0.0, 1.0);
}
"#;
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let err = Pipeline::new(&mut dev, descriptor(vs)).err().unwrap();
        assert!(matches!(
            err,
            PipelineError::ComponentMismatch { layout: 2, program: 3, .. }
        ));
    }

    #[test]
    fn uncovered_program_attribute_is_rejected() {
        let vs = r#"
@vertex
fn vs_main(
    @location(0) pos: vec2<f32>,
    @location(1) vel: vec2<f32>,
    @location(2) size: f32,
) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos + vel * size, 0.0, 1.0);
}
"#;
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let err = Pipeline::new(&mut dev, descriptor(vs)).err().unwrap();
        assert!(matches!(err, PipelineError::UncoveredAttribute(ref name) if name == "size"));
    }

    #[test]
    fn release_order_is_program_buffer_vertex_array() {
        let mut dev = HeadlessDevice::new(Viewport::new(8, 8));
        let pipeline = Pipeline::new(&mut dev, descriptor(VS)).unwrap();
        pipeline.release(&mut dev);

        let tail: Vec<&DeviceCall> = dev.calls().iter().rev().take(3).collect();
        assert!(matches!(tail[2], DeviceCall::DeleteProgram(_)));
        assert!(matches!(tail[1], DeviceCall::DeleteBuffer(_)));
        assert!(matches!(tail[0], DeviceCall::DeleteVertexArray(_)));
        assert_eq!(dev.live_objects(), (0, 0, 0));
    }
}
