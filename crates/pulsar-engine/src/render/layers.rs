use glam::{Mat3, Mat4};

use crate::coords::Viewport;
use crate::device::{BufferUsage, Device, Topology, UniformValue};
use crate::particles::Particle;
use crate::pipeline::{Pipeline, PipelineDescriptor, PipelineError};
use crate::shader::UniformLocation;

use super::shaders::{COLOR_FS, LINES_VS, POINTS_VS, TRIANGLE_VS};
use super::vertex::ColorVertex;

pub const TRIANGLE_VERTICES: [ColorVertex; 3] = [
    ColorVertex::new([-0.6, -0.4], [1.0, 0.0, 0.0]),
    ColorVertex::new([0.6, -0.4], [0.0, 1.0, 0.0]),
    ColorVertex::new([0.0, 0.6], [0.0, 0.0, 1.0]),
];

/// Static RGB triangle spun by an MVP matrix.
pub struct TriangleLayer {
    pipeline: Pipeline<ColorVertex>,
    mvp: UniformLocation,
}

impl TriangleLayer {
    pub fn new(dev: &mut impl Device) -> Result<Self, PipelineError> {
        let mut pipeline = Pipeline::new(
            dev,
            PipelineDescriptor {
                label: "triangle",
                vertex_src: TRIANGLE_VS,
                fragment_src: COLOR_FS,
                topology: Topology::Triangles,
                usage: BufferUsage::Static,
                contents: Some(&TRIANGLE_VERTICES),
            },
        )?;
        let mvp = pipeline.require_uniform("mvp")?;
        Ok(Self { pipeline, mvp })
    }

    pub fn draw(&mut self, dev: &mut impl Device, mvp: Mat4) {
        let mut active = self.pipeline.activate(dev);
        active.set_uniform(self.mvp, UniformValue::Mat4(mvp));
        active.draw(TRIANGLE_VERTICES.len() as u32);
    }

    pub fn into_pipeline(self) -> Pipeline<ColorVertex> {
        self.pipeline
    }
}

/// Streams the particle population as point sprites.
pub struct ParticleLayer {
    pipeline: Pipeline<Particle>,
    transform: UniformLocation,
    point_size: UniformLocation,
    speed_normalization: UniformLocation,
    size: f32,
    normalization: f32,
}

impl ParticleLayer {
    pub fn new(
        dev: &mut impl Device,
        point_size: f32,
        speed_normalization: f32,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Pipeline::new(
            dev,
            PipelineDescriptor {
                label: "points",
                vertex_src: POINTS_VS,
                fragment_src: COLOR_FS,
                topology: Topology::Points,
                usage: BufferUsage::Stream,
                contents: None,
            },
        )?;
        Ok(Self {
            transform: pipeline.require_uniform("transform")?,
            point_size: pipeline.require_uniform("point_size")?,
            speed_normalization: pipeline.require_uniform("speed_normalization")?,
            pipeline,
            size: point_size,
            normalization: speed_normalization,
        })
    }

    pub fn draw(&mut self, dev: &mut impl Device, transform: Mat3, particles: &[Particle]) {
        let mut active = self.pipeline.activate(dev);
        active.set_uniform(self.transform, UniformValue::Mat3(transform));
        active.set_uniform(self.point_size, UniformValue::F32(self.size));
        active.set_uniform(self.speed_normalization, UniformValue::F32(self.normalization));
        active.upload(particles);
        active.draw_uploaded();
    }

    pub fn into_pipeline(self) -> Pipeline<Particle> {
        self.pipeline
    }
}

/// White crosshair through the framebuffer centre, as two line segments in
/// pixel coordinates.
pub fn crosshair(viewport: Viewport) -> [ColorVertex; 4] {
    const WHITE: [f32; 3] = [1.0, 1.0, 1.0];
    let w = viewport.width as f32;
    let h = viewport.height as f32;
    [
        ColorVertex::new([0.0, h / 2.0], WHITE),
        ColorVertex::new([w, h / 2.0], WHITE),
        ColorVertex::new([w / 2.0, 0.0], WHITE),
        ColorVertex::new([w / 2.0, h], WHITE),
    ]
}

/// Screen-space line overlay, regenerated every frame.
pub struct OverlayLayer {
    pipeline: Pipeline<ColorVertex>,
    transform: UniformLocation,
}

impl OverlayLayer {
    pub fn new(dev: &mut impl Device) -> Result<Self, PipelineError> {
        let mut pipeline = Pipeline::new(
            dev,
            PipelineDescriptor {
                label: "lines",
                vertex_src: LINES_VS,
                fragment_src: COLOR_FS,
                topology: Topology::Lines,
                usage: BufferUsage::Stream,
                contents: None,
            },
        )?;
        let transform = pipeline.require_uniform("transform")?;
        Ok(Self {
            pipeline,
            transform,
        })
    }

    pub fn draw(&mut self, dev: &mut impl Device, transform: Mat3, viewport: Viewport) {
        let segments = crosshair(viewport);
        let mut active = self.pipeline.activate(dev);
        active.set_uniform(self.transform, UniformValue::Mat3(transform));
        active.upload(&segments);
        active.draw_uploaded();
    }

    pub fn into_pipeline(self) -> Pipeline<ColorVertex> {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::device::{DeviceCall, HeadlessDevice};
    use crate::transform::viewport_transform_2d;

    use super::*;

    #[test]
    fn crosshair_passes_through_centre() {
        let [a, b, c, d] = crosshair(Viewport::new(800, 600));
        assert_eq!((a.pos, b.pos), ([0.0, 300.0], [800.0, 300.0]));
        assert_eq!((c.pos, d.pos), ([400.0, 0.0], [400.0, 600.0]));

        let t = viewport_transform_2d(800.0, 600.0);
        let centre = t * Vec3::new(400.0, 300.0, 1.0);
        assert!(centre.x.abs() < 1e-6 && centre.y.abs() < 1e-6);
    }

    #[test]
    fn triangle_is_static_and_draws_three() {
        let mut dev = HeadlessDevice::new(Viewport::new(800, 600));
        let mut layer = TriangleLayer::new(&mut dev).unwrap();
        layer.draw(&mut dev, Mat4::IDENTITY);

        assert_eq!(dev.take_error(), None);
        let draw = &dev.draws()[0];
        assert_eq!(draw.topology, Topology::Triangles);
        assert_eq!(draw.count, 3);
        assert_eq!(draw.vertices, bytemuck::cast_slice::<ColorVertex, u8>(&TRIANGLE_VERTICES));
        assert_eq!(draw.uniforms[0].1.len(), 64);
    }

    #[test]
    fn particle_layer_streams_sixteen_bytes_per_particle() {
        let mut dev = HeadlessDevice::new(Viewport::new(800, 600));
        let mut layer = ParticleLayer::new(&mut dev, 3.0, 10.0).unwrap();
        let particles = vec![Particle::default(); 1_000];
        layer.draw(&mut dev, viewport_transform_2d(800.0, 600.0), &particles);

        assert_eq!(dev.take_error(), None);
        let draw = &dev.draws()[0];
        assert_eq!(draw.topology, Topology::Points);
        assert_eq!(draw.vertices.len(), 1_000 * 16);

        // mat3 (48 bytes) then point size and speed normalization.
        let block = &draw.uniforms[0].1;
        assert_eq!(block[48..52], 3.0f32.to_ne_bytes());
        assert_eq!(block[52..56], 10.0f32.to_ne_bytes());
    }

    #[test]
    fn empty_particle_field_draws_nothing() {
        let mut dev = HeadlessDevice::new(Viewport::new(800, 600));
        let mut layer = ParticleLayer::new(&mut dev, 3.0, 10.0).unwrap();
        layer.draw(&mut dev, Mat3::IDENTITY, &[]);
        assert_eq!(dev.take_error(), None);
        assert!(dev.draws().is_empty());
        assert!(dev.calls().contains(&DeviceCall::DrawArrays {
            topology: Topology::Points,
            first: 0,
            count: 0
        }));
    }

    #[test]
    fn overlay_draws_two_segments() {
        let mut dev = HeadlessDevice::new(Viewport::new(640, 480));
        let mut layer = OverlayLayer::new(&mut dev).unwrap();
        layer.draw(&mut dev, viewport_transform_2d(640.0, 480.0), Viewport::new(640, 480));
        assert_eq!(dev.take_error(), None);
        let draw = &dev.draws()[0];
        assert_eq!(draw.topology, Topology::Lines);
        assert_eq!(draw.count, 4);
    }
}
