use std::time::Instant;

use wgpu::SurfaceError;
use winit::{
    dpi::PhysicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

use crate::error::ScreenError;

/// Reference refresh rate the per-tick animation constants are tuned for.
pub const REFERENCE_HZ: f32 = 60.0;
/// Longest step a single frame may take, in reference frames.
pub const MAX_FRAME_TICKS: f32 = 4.0;
/// The scene animates every refresh, so the loop never sleeps waiting for input;
/// presenting to the surface paces it to vsync.
pub const FRAME_CONTROL_FLOW: ControlFlow = ControlFlow::Poll;

#[derive(Debug)]
pub struct AppState {
    previous_time: Instant,
    elapsed_time: f32,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            elapsed_time: 0.0,
        }
    }

    pub fn update(&mut self) {
        let current_time = Instant::now();
        self.elapsed_time = current_time
            .duration_since(self.previous_time)
            .as_secs_f32();
        self.previous_time = current_time;
    }

    /// Seconds since the previous frame.
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// Time since the previous frame in reference frames, clamped so a stall
    /// (window drag, breakpoint) does not teleport the scene.
    pub fn frame_ticks(&self) -> f32 {
        (self.elapsed_time * REFERENCE_HZ).clamp(0.0, MAX_FRAME_TICKS)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Application<L: Layer + 'static> {
    layer: Option<L>,
    screen: Screen,
    state: AppState,
}

impl<L: Layer + 'static> Application<L> {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            layer: None,
            state: AppState::new(),
        }
    }

    fn run(
        &mut self,
        event: Event<()>,
        _event_loop: &EventLoopWindowTarget<()>,
        control_flow: &mut ControlFlow,
    ) {
        *control_flow = FRAME_CONTROL_FLOW;

        if let Some(layer) = self.layer.as_mut() {
            if layer.process_event(&event, &mut self.screen) {
                control_flow.set_exit_with_code(0);
            }
        }

        match event {
            Event::NewEvents(StartCause::Init) => {
                self.layer = Some(L::start(&mut self.screen, &self.state));
            }
            Event::WindowEvent {
                window_id,
                ref event,
            } if self.screen.window().id() == window_id => match event {
                WindowEvent::CloseRequested => control_flow.set_exit_with_code(0),
                WindowEvent::Resized(physical_size) => {
                    self.resize(*physical_size);
                }
                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    self.resize(**new_inner_size);
                }
                _ => {}
            },
            Event::MainEventsCleared => {
                self.state.update();
                self.screen.window().request_redraw();
            }
            Event::RedrawRequested(window_id) if self.screen.window().id() == window_id => {
                let Some(layer) = self.layer.as_mut() else {
                    return;
                };
                layer.update(&self.state, &mut self.screen);

                match layer.render(&self.state, &mut self.screen) {
                    Ok(_) => {}
                    Err(SurfaceError::Lost) => {
                        self.screen.resize_to_current();
                        let size = self.screen.window().inner_size();
                        layer.resize(size, &self.state, &mut self.screen);
                    }
                    Err(SurfaceError::OutOfMemory) => control_flow.set_exit_with_code(137),
                    Err(e) => tracing::error!("{:?}", e),
                }
            }
            Event::LoopDestroyed => {
                if let Some(layer) = self.layer.as_mut() {
                    if let Err(error) = layer.shutdown(&self.state, &mut self.screen) {
                        tracing::error!(%error, "layer shutdown failed");
                    }
                }
            }
            _ => {}
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.screen.resize(new_size);
        if let Some(layer) = self.layer.as_mut() {
            layer.resize(new_size, &self.state, &mut self.screen);
        }
    }

    pub async fn init(title: &str) -> Result<(), ScreenError> {
        let event_loop = EventLoop::new();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let screen = Screen::new(&event_loop, &instance, title).await?;
        let mut application = Self::new(screen);
        event_loop.run(move |event, event_loop, control_flow| {
            application.run(event, event_loop, control_flow);
        });
    }
}

pub struct Screen {
    pub surface: wgpu::Surface,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    window: Window,
}

impl Screen {
    pub async fn new(
        event_loop: &EventLoopWindowTarget<()>,
        instance: &wgpu::Instance,
        title: &str,
    ) -> Result<Self, ScreenError> {
        let window = WindowBuilder::new().with_title(title).build(event_loop)?;

        // SAFETY:
        // The surface needs to live as long as the window that created it.
        // Screen owns the window so this should be safe.
        let surface = unsafe { instance.create_surface(&window) }?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ScreenError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await?;
        let size = window.inner_size();
        let config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .ok_or(ScreenError::UnsupportedSurface)?;
        surface.configure(&device, &config);

        tracing::info!(
            adapter = %adapter.get_info().name,
            width = config.width,
            height = config.height,
            "screen created"
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    /// Resize the screen to new window size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Resize the screen to current window inner size.
    pub fn resize_to_current(&mut self) {
        self.resize(self.window.inner_size());
    }
}

pub trait Layer: Sized {
    type LayerErr: std::error::Error + 'static;

    fn start(screen: &mut Screen, app: &AppState) -> Self;
    /// Returns `true` when the layer asks the application to exit.
    fn process_event(&mut self, event: &Event<()>, screen: &mut Screen) -> bool;
    fn resize(&mut self, new_size: PhysicalSize<u32>, app: &AppState, screen: &mut Screen);
    fn update(&mut self, app: &AppState, screen: &mut Screen);
    fn render(&mut self, app: &AppState, screen: &mut Screen) -> Result<(), SurfaceError>;
    fn shutdown(&mut self, app: &AppState, screen: &mut Screen) -> Result<(), Self::LayerErr>;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn frame_ticks_are_clamped() {
        let mut state = AppState::new();
        state.elapsed_time = 1.0 / 60.0;
        assert!((state.frame_ticks() - 1.0).abs() < 1e-4);

        state.elapsed_time = 5.0;
        assert_eq!(state.frame_ticks(), MAX_FRAME_TICKS);
    }

    #[test]
    fn loop_keeps_running_without_input() {
        assert_eq!(FRAME_CONTROL_FLOW, ControlFlow::Poll);
    }

    #[test]
    fn update_measures_elapsed_time() {
        let mut state = AppState::new();
        std::thread::sleep(Duration::from_millis(5));
        state.update();
        assert!(state.elapsed_time() >= 0.005);
    }
}
