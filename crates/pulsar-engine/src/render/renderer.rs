use glam::{Mat3, Mat4};

use crate::coords::Viewport;
use crate::device::Device;
use crate::particles::Particle;
use crate::pipeline::PipelineError;

use super::layers::{OverlayLayer, ParticleLayer, TriangleLayer};

/// Owns the three layers for the lifetime of the window.
pub struct FrameRenderer {
    triangle: TriangleLayer,
    points: ParticleLayer,
    overlay: OverlayLayer,
}

impl FrameRenderer {
    /// Builds every pipeline. Any configuration error aborts construction
    /// after releasing what was already created.
    pub fn new(
        dev: &mut impl Device,
        point_size: f32,
        speed_normalization: f32,
    ) -> Result<Self, PipelineError> {
        let triangle = TriangleLayer::new(dev)?;
        let points = match ParticleLayer::new(dev, point_size, speed_normalization) {
            Ok(points) => points,
            Err(err) => {
                triangle.into_pipeline().release(dev);
                return Err(err);
            }
        };
        let overlay = match OverlayLayer::new(dev) {
            Ok(overlay) => overlay,
            Err(err) => {
                triangle.into_pipeline().release(dev);
                points.into_pipeline().release(dev);
                return Err(err);
            }
        };
        log::info!("renderer ready: triangle, points, lines");
        Ok(Self {
            triangle,
            points,
            overlay,
        })
    }

    pub fn draw_triangle(&mut self, dev: &mut impl Device, mvp: Mat4) {
        self.triangle.draw(dev, mvp);
    }

    pub fn draw_particles(&mut self, dev: &mut impl Device, transform: Mat3, particles: &[Particle]) {
        self.points.draw(dev, transform, particles);
    }

    pub fn draw_overlay(&mut self, dev: &mut impl Device, transform: Mat3, viewport: Viewport) {
        self.overlay.draw(dev, transform, viewport);
    }

    /// Releases every object: all programs, then all buffers, then all
    /// vertex arrays.
    pub fn shutdown(self, dev: &mut impl Device) {
        let (tri_vao, tri_buf, tri_prog) = self.triangle.into_pipeline().into_parts();
        let (pts_vao, pts_buf, pts_prog) = self.points.into_pipeline().into_parts();
        let (ovl_vao, ovl_buf, ovl_prog) = self.overlay.into_pipeline().into_parts();

        for program in [tri_prog, pts_prog, ovl_prog] {
            program.release(dev);
        }
        for buffer in [tri_buf, pts_buf, ovl_buf] {
            buffer.release(dev);
        }
        for vertex_array in [tri_vao, pts_vao, ovl_vao] {
            vertex_array.release(dev);
        }
        log::info!("renderer resources released");
    }
}
