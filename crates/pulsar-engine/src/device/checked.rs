use crate::coords::Viewport;
use crate::shader::{LinkedProgram, UniformLocation};
use crate::snapshot::Snapshot;

use super::context::{
    AttributeBinding, BufferId, BufferTarget, BufferUsage, ClearColor, Device, ProgramId,
    Topology, UniformValue, VertexArrayId,
};
use super::error::{DeviceError, DeviceErrorCode};

/// A device call that latched an error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceErrorReport {
    pub call_site: &'static str,
    pub code: DeviceErrorCode,
}

/// Reports kept before further rejected calls are only counted.
pub const MAX_REPORTS: usize = 256;

/// Polls the wrapped device's error latch after every call and keeps a
/// report for each rejected call.
///
/// Reports are logged at `warn`; nothing panics. At most [`MAX_REPORTS`] are
/// kept until [`CheckedDevice::drain_reports`]; the rest are counted. When
/// disabled, calls pass straight through and the latch is left for the caller.
pub struct CheckedDevice<D> {
    inner: D,
    enabled: bool,
    reports: Vec<DeviceErrorReport>,
    dropped: u64,
    pending: Option<DeviceErrorCode>,
}

impl<D: Device> CheckedDevice<D> {
    pub fn new(inner: D, enabled: bool) -> Self {
        Self {
            inner,
            enabled,
            reports: Vec::new(),
            dropped: 0,
            pending: None,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn reports(&self) -> &[DeviceErrorReport] {
        &self.reports
    }

    /// Rejected calls seen after the report list filled up.
    pub fn dropped_reports(&self) -> u64 {
        self.dropped
    }

    /// Takes the kept reports and the dropped count, starting over.
    pub fn drain_reports(&mut self) -> (Vec<DeviceErrorReport>, u64) {
        (
            std::mem::take(&mut self.reports),
            std::mem::take(&mut self.dropped),
        )
    }

    fn check(&mut self, call_site: &'static str) {
        if !self.enabled {
            return;
        }
        let Some(code) = self.inner.take_error() else {
            return;
        };
        self.pending.get_or_insert(code);

        if self.reports.len() < MAX_REPORTS {
            log::warn!("device error in {call_site}: {code}");
            self.reports.push(DeviceErrorReport { call_site, code });
        } else {
            if self.dropped == 0 {
                log::warn!("{MAX_REPORTS} device errors reported; counting the rest");
            }
            self.dropped += 1;
        }
    }
}

impl<D: Device> Device for CheckedDevice<D> {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = self.inner.create_vertex_array();
        self.check("create_vertex_array");
        id
    }

    fn bind_vertex_array(&mut self, id: VertexArrayId) {
        self.inner.bind_vertex_array(id);
        self.check("bind_vertex_array");
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        self.inner.delete_vertex_array(id);
        self.check("delete_vertex_array");
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = self.inner.create_buffer();
        self.check("create_buffer");
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId) {
        self.inner.bind_buffer(target, id);
        self.check("bind_buffer");
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.inner.buffer_data(target, data, usage);
        self.check("buffer_data");
    }

    fn buffer_size(&self, target: BufferTarget) -> Option<u64> {
        self.inner.buffer_size(target)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.inner.delete_buffer(id);
        self.check("delete_buffer");
    }

    fn create_program(&mut self, program: &LinkedProgram) -> ProgramId {
        let id = self.inner.create_program(program);
        self.check("create_program");
        id
    }

    fn use_program(&mut self, id: ProgramId) {
        self.inner.use_program(id);
        self.check("use_program");
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.inner.delete_program(id);
        self.check("delete_program");
    }

    fn vertex_attrib_layout(&mut self, stride: u32, attributes: &[AttributeBinding]) {
        self.inner.vertex_attrib_layout(stride, attributes);
        self.check("vertex_attrib_layout");
    }

    fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.inner.uniform(location, value);
        self.check("uniform");
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.inner.viewport(viewport);
        self.check("viewport");
    }

    fn clear(&mut self, color: ClearColor) {
        self.inner.clear(color);
        self.check("clear");
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        self.inner.draw_arrays(topology, first, count);
        self.check("draw_arrays");
    }

    fn read_pixels(&mut self) -> Result<Snapshot, DeviceError> {
        let snapshot = self.inner.read_pixels();
        self.check("read_pixels");
        snapshot
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        let result = self.inner.present();
        self.check("present");
        result
    }

    fn take_error(&mut self) -> Option<DeviceErrorCode> {
        self.pending.take().or_else(|| self.inner.take_error())
    }
}

#[cfg(test)]
mod tests {
    use crate::device::HeadlessDevice;

    use super::*;

    #[test]
    fn reports_name_the_failing_call() {
        let mut dev = CheckedDevice::new(HeadlessDevice::new(Viewport::new(4, 4)), true);
        dev.buffer_data(BufferTarget::ElementArray, &[0; 4], BufferUsage::Static);
        dev.draw_arrays(Topology::Lines, 0, 2);

        assert_eq!(
            dev.reports(),
            &[
                DeviceErrorReport {
                    call_site: "buffer_data",
                    code: DeviceErrorCode::NothingBound
                },
                DeviceErrorReport {
                    call_site: "draw_arrays",
                    code: DeviceErrorCode::NothingBound
                },
            ]
        );
        assert_eq!(dev.take_error(), Some(DeviceErrorCode::NothingBound));
        assert_eq!(dev.take_error(), None);
    }

    #[test]
    fn disabled_wrapper_leaves_latch_to_caller() {
        let mut dev = CheckedDevice::new(HeadlessDevice::new(Viewport::new(4, 4)), false);
        dev.delete_buffer(BufferId(42));
        assert!(dev.reports().is_empty());
        assert_eq!(dev.take_error(), Some(DeviceErrorCode::InvalidHandle));
    }

    #[test]
    fn report_list_is_bounded() {
        let mut dev = CheckedDevice::new(HeadlessDevice::new(Viewport::new(4, 4)), true);
        for _ in 0..10_000 {
            dev.draw_arrays(Topology::Points, 0, 1);
            dev.take_error();
        }
        assert_eq!(dev.reports().len(), MAX_REPORTS);
        assert_eq!(dev.dropped_reports(), (10_000 - MAX_REPORTS) as u64);

        let (reports, dropped) = dev.drain_reports();
        assert_eq!(reports.len(), MAX_REPORTS);
        assert_eq!(dropped, (10_000 - MAX_REPORTS) as u64);
        assert!(dev.reports().is_empty());
        assert_eq!(dev.dropped_reports(), 0);

        dev.draw_arrays(Topology::Points, 0, 1);
        assert_eq!(dev.reports().len(), 1);
    }

    #[test]
    fn clean_calls_produce_no_reports() {
        let mut dev = CheckedDevice::new(HeadlessDevice::new(Viewport::new(4, 4)), true);
        dev.create_vertex_array();
        dev.create_buffer();
        dev.buffer_data(BufferTarget::Array, &[0; 8], BufferUsage::Stream);
        dev.clear(ClearColor::BLACK);
        dev.present().unwrap();
        assert!(dev.reports().is_empty());
    }
}
