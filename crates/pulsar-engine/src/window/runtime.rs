use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::coords::Viewport;
use crate::core::{Harness, HarnessConfig, LoopState, WindowPort};
use crate::device::{CheckedDevice, Device, Gpu, GpuInit, WgpuDevice};
use crate::input::platform::winit::translate_window_event;
use crate::input::InputEvent;
use crate::snapshot::PngFileSink;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "Pulsar".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and drives the frame loop until it closes.
    ///
    /// Startup failures (window, adapter, device, pipeline configuration) and
    /// fatal presentation errors are returned once the event loop has exited.
    pub fn run(config: RuntimeConfig, gpu_init: GpuInit, harness: HarnessConfig) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, harness);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

type WindowHarness<'w> = Harness<CheckedDevice<WgpuDevice<'w>>, PngFileSink>;

#[self_referencing]
struct WindowEntry {
    pending: Vec<InputEvent>,

    window: Window,

    #[borrows(window)]
    #[not_covariant]
    harness: WindowHarness<'this>,
}

/// [`WindowPort`] over a winit window and the events buffered for it.
struct WinitWindowPort<'a> {
    window: &'a Window,
    pending: &'a mut Vec<InputEvent>,
}

impl WindowPort for WinitWindowPort<'_> {
    fn drain_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(self.pending)
    }

    fn framebuffer_size(&self) -> Viewport {
        let size = self.window.inner_size();
        Viewport::new(size.width, size.height)
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}

fn build_harness(
    window: &Window,
    gpu_init: GpuInit,
    config: HarnessConfig,
) -> Result<WindowHarness<'_>> {
    let gpu = pollster::block_on(Gpu::new(window, gpu_init))
        .context("GPU initialization failed for window")?;
    let device = WgpuDevice::new(gpu);
    let framebuffer = device.framebuffer_size();
    let checked = CheckedDevice::new(device, config.check_device_errors);
    let sink = PngFileSink::new(config.snapshot_path.clone());

    Harness::new(checked, sink, config, framebuffer).context("failed to configure render pipelines")
}

fn summarize_device_errors<D: Device>(device: &mut CheckedDevice<D>) {
    let (reports, dropped) = device.drain_reports();
    if reports.is_empty() {
        return;
    }
    log::warn!(
        "{} rejected device call(s) this session, first in {}",
        reports.len() as u64 + dropped,
        reports[0].call_site
    );
}

struct AppState {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    harness: HarnessConfig,

    entry: Option<WindowEntry>,
    fatal: Option<anyhow::Error>,
}

impl AppState {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, harness: HarnessConfig) -> Self {
        Self {
            config,
            gpu_init,
            harness,
            entry: None,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.entry = None;
        self.fatal.get_or_insert(err);
        event_loop.exit();
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let config = self.harness.clone();

        WindowEntryTryBuilder {
            pending: Vec::new(),
            window,
            harness_builder: |w| build_harness(w, gpu_init, config),
        }
        .try_build()
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let result = entry.with_mut(|fields| {
            let mut port = WinitWindowPort {
                window: fields.window,
                pending: fields.pending,
            };
            let state = fields.harness.step(&mut port);
            if !matches!(state, Ok(LoopState::Running)) {
                summarize_device_errors(fields.harness.device_mut());
            }
            state
        });

        match result {
            Ok(LoopState::Running) => {}
            Ok(LoopState::Closing) => {
                self.entry = None;
                log::info!("window closed");
                event_loop.exit();
            }
            Err(err) => self.fail(event_loop, err),
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        match self.create_window_entry(event_loop) {
            Ok(entry) => {
                entry.with_window(|w| w.request_redraw());
                self.entry = Some(entry);
            }
            Err(err) => self.fail(event_loop, err.context("failed to create initial window")),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; presentation paces the loop.
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        if let Some(ev) = translate_window_event(&event) {
            entry.with_pending_mut(|pending| pending.push(ev));
        }

        match &event {
            // The close itself happens at the top of the next iteration.
            WindowEvent::CloseRequested => {
                entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::Resized(new_size) => {
                entry.with_mut(|fields| {
                    fields.harness.device_mut().inner_mut().resize(*new_size);
                    fields.window.request_redraw();
                });
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                entry.with_mut(|fields| {
                    let new_size = fields.window.inner_size();
                    fields.harness.device_mut().inner_mut().resize(new_size);
                    fields.window.request_redraw();
                });
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
