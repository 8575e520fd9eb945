use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::context::{ContextOptions, RenderSurface, TransparentMode};
use crate::core::SystemFactory;
use crate::device::{GpuInit, SurfaceErrorAction, WgpuSurface};
use crate::render::Renderer;

use super::backdrop::Backdrop;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,

    pub transparent_mode: TransparentMode,
    pub antialias: bool,
    pub preserve_drawing_buffer: bool,

    pub clear_color: wgpu::Color,

    /// Toggles a forced context loss / restore while the window has focus.
    pub lose_context_key: Option<KeyCode>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "glint".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            transparent_mode: TransparentMode::Opaque,
            antialias: true,
            preserve_drawing_buffer: false,
            clear_color: wgpu::Color::BLACK,
            lose_context_key: None,
        }
    }
}

/// Builds the renderer systems once the surface exists.
pub type SystemsBuilder = Box<dyn FnOnce(&Rc<WgpuSurface>) -> Vec<SystemFactory>>;

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives its renderer until the window closes.
    ///
    /// Failing to acquire a graphics context ends the loop with an error.
    pub fn run<F>(config: RuntimeConfig, gpu_init: GpuInit, systems: F) -> Result<()>
    where
        F: FnOnce(&Rc<WgpuSurface>) -> Vec<SystemFactory> + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, Box::new(systems));

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct WindowEntry {
    // Field order is drop order: the renderer releases the context before the
    // surface and window go away.
    renderer: Renderer,
    backdrop: Backdrop,
    surface: Rc<WgpuSurface>,
    window: Arc<Window>,
}

struct AppState {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    systems: Option<SystemsBuilder>,

    entry: Option<WindowEntry>,
    fatal: Option<anyhow::Error>,
    exit_requested: bool,
}

impl AppState {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, systems: SystemsBuilder) -> Self {
        Self {
            config,
            gpu_init,
            systems: Some(systems),
            entry: None,
            fatal: None,
            exit_requested: false,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_transparent(self.config.transparent_mode.is_transparent());

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let surface = WgpuSurface::new(Arc::clone(&window), self.gpu_init.clone())?;

        let factories = match self.systems.take() {
            Some(build) => build(&surface),
            None => Vec::new(),
        };

        let options = ContextOptions {
            existing_context: None,
            surface: Some(Rc::clone(&surface) as Rc<dyn RenderSurface>),
            transparent_mode: self.config.transparent_mode,
            antialias: self.config.antialias,
            preserve_drawing_buffer: self.config.preserve_drawing_buffer,
        };

        let renderer =
            Renderer::new(options, factories).context("graphics context initialization failed")?;

        self.entry = Some(WindowEntry {
            renderer,
            backdrop: Backdrop::new(),
            surface,
            window,
        });
        Ok(())
    }

    fn toggle_context_loss(&self) {
        let Some(entry) = &self.entry else {
            return;
        };
        let Some(ext) = entry.renderer.context().lose_context_extension() else {
            log::warn!("platform cannot force context loss");
            return;
        };

        if entry.renderer.is_context_lost() {
            log::info!("requesting context restore");
            ext.restore_context();
        } else {
            log::info!("forcing context loss");
            ext.lose_context();
        }
    }

    /// Drives one frame. Returns `false` when the loop should stop.
    fn redraw(&mut self) -> bool {
        let Some(entry) = self.entry.as_mut() else {
            return true;
        };

        entry.renderer.poll_surface();
        if entry.renderer.is_context_lost() {
            return true;
        }
        let Some(ctx) = entry.surface.context() else {
            return true;
        };

        let mut frame = match entry.surface.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return entry.surface.handle_surface_error(err) != SurfaceErrorAction::Fatal;
            }
        };

        let pipeline = entry.backdrop.pipeline(&ctx);
        let msaa = entry.backdrop.msaa_view(
            &ctx,
            entry.surface.size(),
            entry.renderer.context().generation(),
        );
        let (view, resolve_target) = match &msaa {
            Some(msaa) => (msaa, Some(&frame.view)),
            None => (&frame.view, None),
        };

        {
            let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glint frame"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: color_ops(self.config.clear_color, resolve_target.is_some()),
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&pipeline);
            rpass.draw(0..3, 0..1);
        }

        entry.surface.submit(frame);
        entry.renderer.post_render();
        true
    }
}

/// Clear-and-store for the frame's color attachment. A multisampled attachment
/// only lives until it is resolved.
fn color_ops(clear: wgpu::Color, resolving: bool) -> wgpu::Operations<wgpu::Color> {
    wgpu::Operations {
        load: wgpu::LoadOp::Clear(clear),
        store: if resolving {
            wgpu::StoreOp::Discard
        } else {
            wgpu::StoreOp::Store
        },
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            log::error!("failed to start renderer: {e:#}");
            self.fatal = Some(e);
            self.request_exit(event_loop);
            return;
        }

        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw also keeps the surface polled while the context is lost.
        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.entry.as_ref().is_none_or(|e| e.window.id() != window_id) {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                if let Some(mut entry) = self.entry.take() {
                    entry.renderer.destroy();
                }
                self.request_exit(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = &self.entry {
                    entry.surface.resize(*new_size);
                    entry.window.request_redraw();
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = &self.entry {
                    entry.surface.resize(entry.window.inner_size());
                    entry.window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed && !event.repeat;
                if pressed
                    && self
                        .config
                        .lose_context_key
                        .is_some_and(|key| event.physical_key == PhysicalKey::Code(key))
                {
                    self.toggle_context_loss();
                }
            }

            WindowEvent::RedrawRequested => {
                if !self.redraw() {
                    log::error!("fatal surface error; exiting");
                    self.request_exit(event_loop);
                }
            }

            _ => {}
        }
    }
}
