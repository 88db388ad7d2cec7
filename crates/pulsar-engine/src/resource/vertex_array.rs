use crate::device::{Device, VertexArrayId};

/// An attribute-layout object. Created bound.
#[derive(Debug)]
pub struct VertexArray {
    id: VertexArrayId,
}

impl VertexArray {
    pub fn new(dev: &mut impl Device) -> Self {
        Self {
            id: dev.create_vertex_array(),
        }
    }

    pub fn id(&self) -> VertexArrayId {
        self.id
    }

    pub fn bind(&self, dev: &mut impl Device) {
        dev.bind_vertex_array(self.id);
    }

    pub fn release(self, dev: &mut impl Device) {
        dev.delete_vertex_array(self.id);
    }
}

#[cfg(test)]
mod tests {
    use crate::coords::Viewport;
    use crate::device::{DeviceCall, HeadlessDevice};

    use super::*;

    #[test]
    fn new_is_bound_and_release_deletes() {
        let mut dev = HeadlessDevice::new(Viewport::new(1, 1));
        let vao = VertexArray::new(&mut dev);
        let id = vao.id();
        assert_ne!(id.raw(), 0);
        vao.bind(&mut dev);
        vao.release(&mut dev);
        assert_eq!(
            dev.calls(),
            &[
                DeviceCall::CreateVertexArray(id),
                DeviceCall::BindVertexArray(id),
                DeviceCall::DeleteVertexArray(id),
            ]
        );
        assert_eq!(dev.take_error(), None);
    }
}
