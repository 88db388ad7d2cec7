/// A single acquired surface frame.
///
/// Short-lived: holding the surface texture prevents acquisition of the next
/// frame, so it must be handed back through [`super::Gpu::present`] promptly.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
