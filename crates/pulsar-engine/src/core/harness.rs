use anyhow::{Context, Result};

use crate::coords::Viewport;
use crate::device::Device;
use crate::input::FrameCommands;
use crate::particles::ParticleSystem;
use crate::pipeline::PipelineError;
use crate::render::FrameRenderer;
use crate::snapshot::SnapshotSink;
use crate::time::{format_significant, FrameClock, FrameStats};
use crate::transform::{rotation_ortho_4x4, viewport_transform_2d};

use super::config::HarnessConfig;
use super::window_port::WindowPort;

/// Loop state. `Closing` is terminal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    Running,
    Closing,
}

/// Owns the device and everything drawn with it.
pub struct Harness<D: Device, S: SnapshotSink> {
    device: D,
    sink: S,
    config: HarnessConfig,
    renderer: Option<FrameRenderer>,
    particles: ParticleSystem,
    clock: FrameClock,
    stats: FrameStats,
    state: LoopState,
}

impl<D: Device, S: SnapshotSink> Harness<D, S> {
    /// Builds the three pipelines and seeds the particle field across
    /// `framebuffer`.
    pub fn new(
        mut device: D,
        sink: S,
        config: HarnessConfig,
        framebuffer: Viewport,
    ) -> Result<Self, PipelineError> {
        let renderer =
            FrameRenderer::new(&mut device, config.point_size, config.speed_normalization)?;
        let particles = ParticleSystem::new(
            config.particle_count,
            framebuffer,
            config.update_policy,
            config.seed,
        );
        log::info!(
            "harness ready: {} particles ({:?}) on {}x{}",
            particles.len(),
            config.update_policy,
            framebuffer.width,
            framebuffer.height
        );

        Ok(Self {
            device,
            sink,
            stats: FrameStats::with_window(config.fps_window),
            config,
            renderer: Some(renderer),
            particles,
            clock: FrameClock::new(),
            state: LoopState::Running,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    /// Runs one loop iteration.
    ///
    /// A snapshot request reads back the previously presented frame first. A
    /// close request then moves to `Closing` and releases every resource
    /// without drawing. Returns the state after the iteration.
    pub fn step(&mut self, window: &mut impl WindowPort) -> Result<LoopState> {
        if self.state == LoopState::Closing {
            return Ok(LoopState::Closing);
        }

        let commands = FrameCommands::from_events(&window.drain_events());
        // Exports the last presented frame, so it also runs on the way out.
        if commands.snapshot {
            self.export_snapshot();
        }
        if commands.close {
            log::info!("close requested");
            self.shutdown();
            return Ok(LoopState::Closing);
        }

        let framebuffer = window.framebuffer_size();
        if !framebuffer.is_valid() {
            log::trace!("framebuffer is empty, skipping frame");
            return Ok(LoopState::Running);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(self.state);
        };

        let time = self.clock.tick();
        let dev = &mut self.device;
        dev.viewport(framebuffer);
        dev.clear(self.config.clear_color);

        let mvp = rotation_ortho_4x4(time.elapsed, framebuffer.aspect_ratio());
        let screen = viewport_transform_2d(framebuffer.width as f32, framebuffer.height as f32);

        renderer.draw_triangle(dev, mvp);

        self.particles.update();
        renderer.draw_particles(dev, screen, self.particles.particles());

        renderer.draw_overlay(dev, screen, framebuffer);

        if let Some(fps) = self.stats.record(time.raw_dt) {
            let title = format!("FPS: {}", format_significant(fps, 2));
            log::info!("{title}");
            window.set_title(&title);
        }
        log::trace!("frame {} drawn at {}x{}", time.frame_index, framebuffer.width, framebuffer.height);

        dev.present().context("failed to present frame")?;
        Ok(LoopState::Running)
    }

    /// Steps until the loop closes.
    pub fn run(&mut self, window: &mut impl WindowPort) -> Result<()> {
        while self.step(window)? == LoopState::Running {}
        Ok(())
    }

    /// Releases every GPU object and enters `Closing`. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.state = LoopState::Closing;
        if let Some(renderer) = self.renderer.take() {
            renderer.shutdown(&mut self.device);
        }
    }

    fn export_snapshot(&mut self) {
        let snapshot = match self.device.read_pixels() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::error!("snapshot readback failed: {err}");
                return;
            }
        };
        if let Err(err) = self.sink.write(&snapshot) {
            log::error!("snapshot export failed: {err:#}");
        }
    }
}

impl<D: Device, S: SnapshotSink> Drop for Harness<D, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::device::{DeviceCall, HeadlessDevice, Topology};
    use crate::input::{InputEvent, Key};
    use crate::snapshot::Snapshot;

    use super::*;

    type Queue = Rc<RefCell<VecDeque<InputEvent>>>;

    struct ScriptedWindow {
        events: Queue,
        size: Viewport,
        titles: Vec<String>,
    }

    impl ScriptedWindow {
        fn new(size: Viewport) -> Self {
            Self {
                events: Queue::default(),
                size,
                titles: Vec::new(),
            }
        }
    }

    impl WindowPort for ScriptedWindow {
        fn drain_events(&mut self) -> Vec<InputEvent> {
            self.events.borrow_mut().drain(..).collect()
        }

        fn framebuffer_size(&self) -> Viewport {
            self.size
        }

        fn set_title(&mut self, title: &str) {
            self.titles.push(title.to_owned());
        }
    }

    #[derive(Default, Clone)]
    struct MemorySink(Rc<RefCell<Vec<Snapshot>>>);

    impl SnapshotSink for MemorySink {
        fn write(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
            self.0.borrow_mut().push(snapshot.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl SnapshotSink for FailingSink {
        fn write(&mut self, _: &Snapshot) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    const SIZE: Viewport = Viewport::new(800, 600);

    fn config() -> HarnessConfig {
        HarnessConfig {
            particle_count: 64,
            ..HarnessConfig::default()
        }
    }

    fn harness<S: SnapshotSink>(dev: HeadlessDevice, sink: S) -> Harness<HeadlessDevice, S> {
        Harness::new(dev, sink, config(), SIZE).unwrap()
    }

    #[test]
    fn frame_draws_layers_in_order() {
        let mut window = ScriptedWindow::new(SIZE);
        let mut h = harness(HeadlessDevice::new(SIZE), MemorySink::default());

        assert_eq!(h.step(&mut window).unwrap(), LoopState::Running);

        let topologies: Vec<Topology> = h.device().draws().iter().map(|d| d.topology).collect();
        assert_eq!(topologies, [Topology::Triangles, Topology::Points, Topology::Lines]);
        assert_eq!(h.device().draws()[1].count, 64);
        assert_eq!(h.device().calls().last(), Some(&DeviceCall::Present));
        assert_eq!(h.device_mut().take_error(), None);
        assert_eq!(h.particles().frame(), 1);
    }

    #[test]
    fn close_during_points_draw_ends_at_present() {
        let mut window = ScriptedWindow::new(SIZE);
        let mut dev = HeadlessDevice::new(SIZE);

        let queue = window.events.clone();
        let mut points_draws = 0;
        dev.on_draw(move |draw| {
            if draw.topology == Topology::Points {
                points_draws += 1;
                if points_draws == 2 {
                    queue.borrow_mut().push_back(InputEvent::key_pressed(Key::Escape));
                }
            }
        });

        let mut h = harness(dev, MemorySink::default());
        h.run(&mut window).unwrap();
        assert_eq!(h.state(), LoopState::Closing);

        let calls = h.device().calls();
        let presents = calls.iter().filter(|c| **c == DeviceCall::Present).count();
        assert_eq!(presents, 2);

        let last_present = calls.iter().rposition(|c| *c == DeviceCall::Present).unwrap();
        let tail = &calls[last_present + 1..];
        assert!(tail.iter().all(DeviceCall::is_delete), "{tail:?}");

        let kinds: Vec<u8> = tail
            .iter()
            .map(|c| match c {
                DeviceCall::DeleteProgram(_) => 0,
                DeviceCall::DeleteBuffer(_) => 1,
                _ => 2,
            })
            .collect();
        assert!(kinds.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(kinds.len(), 9);
        assert_eq!(h.device().live_objects(), (0, 0, 0));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut h = harness(HeadlessDevice::new(SIZE), MemorySink::default());
        h.shutdown();
        let after_first = h.device().calls().len();
        h.shutdown();
        assert_eq!(h.device().calls().len(), after_first);

        let mut window = ScriptedWindow::new(SIZE);
        assert_eq!(h.step(&mut window).unwrap(), LoopState::Closing);
        assert_eq!(h.device().calls().len(), after_first);
    }

    #[test]
    fn snapshot_reads_previous_frame_before_drawing() {
        let mut window = ScriptedWindow::new(SIZE);
        let sink = MemorySink::default();
        let mut h = harness(HeadlessDevice::new(SIZE), sink.clone());

        h.step(&mut window).unwrap();
        let before = h.device().calls().len();

        window.events.borrow_mut().push_back(InputEvent::key_pressed(Key::S));
        h.step(&mut window).unwrap();

        assert_eq!(h.device().calls()[before], DeviceCall::ReadPixels);
        let shots = sink.0.borrow();
        assert_eq!(shots.len(), 1);
        assert_eq!((shots[0].width, shots[0].height), (800, 600));
        assert_eq!(shots[0].pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn snapshot_and_close_in_one_frame_exports_then_closes() {
        let mut window = ScriptedWindow::new(SIZE);
        let sink = MemorySink::default();
        let mut h = harness(HeadlessDevice::new(SIZE), sink.clone());
        h.step(&mut window).unwrap();

        window.events.borrow_mut().extend([
            InputEvent::key_pressed(Key::S),
            InputEvent::key_pressed(Key::Escape),
        ]);
        assert_eq!(h.step(&mut window).unwrap(), LoopState::Closing);
        assert_eq!(sink.0.borrow().len(), 1);

        let calls = h.device().calls();
        let last_present = calls.iter().rposition(|c| *c == DeviceCall::Present).unwrap();
        assert_eq!(calls[last_present + 1], DeviceCall::ReadPixels);
        assert!(calls[last_present + 2..].iter().all(DeviceCall::is_delete));
    }

    #[test]
    fn snapshot_failure_is_not_fatal() {
        let mut window = ScriptedWindow::new(SIZE);
        let mut h = harness(HeadlessDevice::new(SIZE), FailingSink);
        window.events.borrow_mut().push_back(InputEvent::key_pressed(Key::S));
        assert_eq!(h.step(&mut window).unwrap(), LoopState::Running);
        assert_eq!(h.device().calls().last(), Some(&DeviceCall::Present));
    }

    #[test]
    fn empty_framebuffer_skips_the_frame() {
        let mut window = ScriptedWindow::new(Viewport::new(0, 0));
        let mut h = harness(HeadlessDevice::new(SIZE), MemorySink::default());
        let before = h.device().calls().len();

        assert_eq!(h.step(&mut window).unwrap(), LoopState::Running);
        assert_eq!(h.device().calls().len(), before);
        assert_eq!(h.particles().frame(), 0);
    }

    #[test]
    fn fps_is_reported_in_the_title() {
        let mut window = ScriptedWindow::new(SIZE);
        let config = HarnessConfig {
            particle_count: 8,
            fps_window: 1e-4,
            ..HarnessConfig::default()
        };
        let mut h =
            Harness::new(HeadlessDevice::new(SIZE), MemorySink::default(), config, SIZE).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1));
        h.step(&mut window).unwrap();
        assert_eq!(window.titles.len(), 1);
        assert!(window.titles[0].starts_with("FPS: "), "{}", window.titles[0]);
    }

    #[test]
    fn close_button_closes() {
        let mut window = ScriptedWindow::new(SIZE);
        let mut h = harness(HeadlessDevice::new(SIZE), MemorySink::default());
        window.events.borrow_mut().push_back(InputEvent::CloseRequested);
        assert_eq!(h.step(&mut window).unwrap(), LoopState::Closing);
        assert!(!h.device().calls().contains(&DeviceCall::Present));
    }
}
