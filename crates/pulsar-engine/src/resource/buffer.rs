use crate::device::{BufferId, BufferTarget, Device};

/// A data buffer and the target it is bound to.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    target: BufferTarget,
}

impl Buffer {
    /// Creates a buffer bound to [`BufferTarget::Array`].
    pub fn new(dev: &mut impl Device) -> Self {
        Self {
            id: dev.create_buffer(),
            target: BufferTarget::Array,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Binds to `target` and makes it the buffer's target from now on.
    pub fn rebind(&mut self, dev: &mut impl Device, target: BufferTarget) {
        self.target = target;
        dev.bind_buffer(target, self.id);
    }

    /// Binds to the current target.
    pub fn bind(&self, dev: &mut impl Device) {
        dev.bind_buffer(self.target, self.id);
    }

    pub fn release(self, dev: &mut impl Device) {
        dev.delete_buffer(self.id);
    }
}
