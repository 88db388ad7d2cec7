//! Graphics device context.
//!
//! [`Device`] is the owned binding state every resource and pipeline call is
//! threaded through. Backends:
//! - [`WgpuDevice`]: records draws per frame and replays them on a wgpu surface
//! - [`HeadlessDevice`]: CPU-only, logs every call; used by tests
//! - [`CheckedDevice`]: polls the error latch after each call and reports

mod checked;
mod context;
mod error;
mod frame;
mod gpu;
mod headless;
mod init;
mod readback;
mod state;
mod surface;
mod wgpu_backend;

pub use checked::{CheckedDevice, DeviceErrorReport, MAX_REPORTS};
pub use context::{
    AttributeBinding, BufferId, BufferTarget, BufferUsage, ClearColor, Device, ProgramId,
    Topology, UniformValue, VertexArrayId,
};
pub use error::{DeviceError, DeviceErrorCode, SurfaceErrorAction};
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use headless::{DeviceCall, DrawRecord, HeadlessDevice};
pub use init::GpuInit;
pub use wgpu_backend::WgpuDevice;
