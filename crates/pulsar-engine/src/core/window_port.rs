use crate::coords::Viewport;
use crate::input::InputEvent;

/// What the frame loop needs from a window.
pub trait WindowPort {
    /// Returns every event received since the previous call, oldest first.
    fn drain_events(&mut self) -> Vec<InputEvent>;

    /// Current framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> Viewport;

    fn set_title(&mut self, title: &str);
}
