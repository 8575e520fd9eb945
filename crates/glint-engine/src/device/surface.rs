use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::context::{
    ContextAttributes, ContextHandle, ContextLostEvent, GraphicsContext, RenderSurface,
};
use crate::signal::Signal;

use super::{GpuInit, SurfaceErrorAction, WgpuContext};

/// A single acquired frame.
///
/// Short-lived: holding the surface texture prevents acquisition of the next one.
pub struct WgpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

/// Window-backed [`RenderSurface`] creating [`WgpuContext`]s.
///
/// Device loss is detected off-thread by wgpu and reported from
/// [`poll_events`](RenderSurface::poll_events) on the loop thread. A loss whose
/// default is not prevented leaves the context lost for good; a prevented one is
/// restored on a later poll, as is an explicit restore request.
pub struct WgpuSurface {
    window: Arc<Window>,
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    init: GpuInit,

    context: RefCell<Weak<WgpuContext>>,
    config: RefCell<Option<wgpu::SurfaceConfiguration>>,
    size: Cell<PhysicalSize<u32>>,

    lost: Signal<ContextLostEvent>,
    restored: Signal<()>,
    tracker: Cell<LossTracker>,
}

impl WgpuSurface {
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Rc<Self>> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;

        Ok(Rc::new(Self {
            window,
            instance,
            surface,
            init,
            context: RefCell::new(Weak::new()),
            config: RefCell::new(None),
            size: Cell::new(size),
            lost: Signal::new(),
            restored: Signal::new(),
            tracker: Cell::new(LossTracker::default()),
        }))
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Context created on this surface, if it is still alive.
    pub fn context(&self) -> Option<Rc<WgpuContext>> {
        self.context.borrow().upgrade()
    }

    /// Current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size.get()
    }

    fn try_create_context(&self, attributes: &ContextAttributes) -> Result<Rc<WgpuContext>> {
        let adapter = pollster::block_on(self.instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: self.init.power_preference,
                compatible_surface: Some(&self.surface),
                force_fallback_adapter: false,
            },
        ))
        .context("failed to find a suitable GPU adapter")?;

        let caps = self.surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps, self.init.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = choose_alpha_mode(&caps, attributes);

        let context = WgpuContext::new(adapter, self.init.clone(), *attributes, format, alpha_mode)?;

        let size = self.size.get();
        let config = wgpu::SurfaceConfiguration {
            usage: surface_usage(attributes),
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: self.init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: self.init.desired_maximum_frame_latency,
        };
        self.surface.configure(&context.device(), &config);

        *self.config.borrow_mut() = Some(config);
        *self.context.borrow_mut() = Rc::downgrade(&context);
        self.tracker.set(LossTracker::default());

        Ok(context)
    }

    fn reconfigure(&self, context: &WgpuContext) {
        let size = self.size.get();
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(config) = self.config.borrow().as_ref() {
            self.surface.configure(&context.device(), config);
        }
    }

    /// Reconfigures the surface after a resize.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that case,
    /// only internal state is updated and configuration is deferred.
    pub fn resize(&self, new_size: PhysicalSize<u32>) {
        self.size.set(new_size);
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        if let Some(config) = self.config.borrow_mut().as_mut() {
            config.width = new_size.width;
            config.height = new_size.height;
        }
        if let Some(context) = self.context().filter(|c| !c.is_context_lost()) {
            self.reconfigure(&context);
        }
    }

    /// Acquires the next surface texture and creates an encoder.
    ///
    /// Without a live context this reports [`SurfaceError::Lost`].
    pub fn begin_frame(&self) -> std::result::Result<WgpuFrame, SurfaceError> {
        let context = self
            .context()
            .filter(|c| !c.is_context_lost())
            .ok_or(SurfaceError::Lost)?;

        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glint frame encoder"),
            });

        Ok(WgpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Submits the recorded commands and presents the frame.
    pub fn submit(&self, frame: WgpuFrame) {
        let WgpuFrame {
            surface_texture,
            view,
            encoder,
        } = frame;

        match self.context() {
            Some(context) => {
                context.queue().submit(std::iter::once(encoder.finish()));
                self.window.pre_present_notify();
                drop(view);
                surface_texture.present();
            }
            None => log::warn!("frame dropped: context released before submit"),
        }
    }

    /// Converts a `SurfaceError` into a higher-level action, reconfiguring when
    /// that is the remedy.
    pub fn handle_surface_error(&self, err: SurfaceError) -> SurfaceErrorAction {
        let action = SurfaceErrorAction::for_error(&err);
        if action == SurfaceErrorAction::Reconfigured {
            if let Some(context) = self.context().filter(|c| !c.is_context_lost()) {
                self.reconfigure(&context);
            }
        }
        action
    }
}

impl RenderSurface for WgpuSurface {
    fn create_context(&self, attributes: &ContextAttributes) -> Option<ContextHandle> {
        match self.try_create_context(attributes) {
            Ok(context) => Some(context),
            Err(err) => {
                log::error!("wgpu context creation failed: {err:#}");
                None
            }
        }
    }

    fn context_lost(&self) -> &Signal<ContextLostEvent> {
        &self.lost
    }

    fn context_restored(&self) -> &Signal<()> {
        &self.restored
    }

    fn poll_events(&self) {
        let Some(context) = self.context() else {
            return;
        };
        context.poll_device();

        let mut tracker = self.tracker.get();
        let step = tracker.begin_poll(context.is_context_lost(), context.take_restore_request());
        self.tracker.set(tracker);

        match step {
            PollStep::Idle => {}

            PollStep::ReportLoss => {
                let event = ContextLostEvent::new("wgpu device lost");
                self.lost.emit(&event);

                let mut tracker = self.tracker.get();
                if !tracker.loss_handled(event.default_prevented()) {
                    log::warn!("context loss not handled; the context stays lost");
                }
                self.tracker.set(tracker);
            }

            PollStep::Restore => match context.restore() {
                Ok(()) => {
                    self.reconfigure(&context);
                    self.tracker.set(LossTracker::default());
                    log::info!("wgpu device replaced");
                    self.restored.emit(&());
                }
                Err(err) => log::error!("context restore failed, retrying on next poll: {err:#}"),
            },
        }
    }
}

/// What one `poll_events` call does.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum PollStep {
    Idle,
    ReportLoss,
    Restore,
}

/// Loss/restore bookkeeping for the current device.
///
/// A loss is reported once per device. Restoration never happens on the poll
/// that reported the loss, and a pending restore stays pending until a device
/// swap succeeds.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
struct LossTracker {
    loss_reported: bool,
    restore_pending: bool,
}

impl LossTracker {
    fn begin_poll(&mut self, lost: bool, restore_requested: bool) -> PollStep {
        if !lost {
            self.restore_pending = false;
            return PollStep::Idle;
        }
        if restore_requested {
            self.restore_pending = true;
        }

        if !self.loss_reported {
            self.loss_reported = true;
            return PollStep::ReportLoss;
        }

        if self.restore_pending {
            PollStep::Restore
        } else {
            PollStep::Idle
        }
    }

    /// Returns `false` when nothing will restore the context.
    fn loss_handled(&mut self, default_prevented: bool) -> bool {
        if default_prevented {
            self.restore_pending = true;
        }
        self.restore_pending
    }
}

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        for f in preferred {
            if caps.formats.contains(&f) {
                return Some(f);
            }
        }
    }

    Some(caps.formats[0])
}

/// Composite alpha mode for the requested transparency, falling back to the
/// first supported mode.
pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    attributes: &ContextAttributes,
) -> wgpu::CompositeAlphaMode {
    let wanted = match (attributes.alpha, attributes.premultiplied_alpha) {
        (false, _) => wgpu::CompositeAlphaMode::Opaque,
        (true, true) => wgpu::CompositeAlphaMode::PreMultiplied,
        (true, false) => wgpu::CompositeAlphaMode::PostMultiplied,
    };

    if caps.alpha_modes.contains(&wanted) {
        return wanted;
    }

    let fallback = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);
    log::warn!("surface does not support {wanted:?}; using {fallback:?}");
    fallback
}

pub(crate) fn surface_usage(attributes: &ContextAttributes) -> wgpu::TextureUsages {
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
    if attributes.preserve_drawing_buffer {
        usage |= wgpu::TextureUsages::COPY_SRC;
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        formats: Vec<wgpu::TextureFormat>,
        alpha_modes: Vec<wgpu::CompositeAlphaMode>,
    ) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            alpha_modes,
            ..Default::default()
        }
    }

    fn attrs(alpha: bool, premultiplied_alpha: bool) -> ContextAttributes {
        ContextAttributes {
            alpha,
            premultiplied_alpha,
            ..Default::default()
        }
    }

    #[test]
    fn srgb_is_preferred_when_available() {
        let c = caps(
            vec![wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8UnormSrgb],
            vec![],
        );
        assert_eq!(choose_surface_format(&c, true), Some(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert_eq!(choose_surface_format(&c, false), Some(wgpu::TextureFormat::Bgra8Unorm));
    }

    #[test]
    fn no_formats_means_no_surface_format() {
        assert_eq!(choose_surface_format(&caps(vec![], vec![]), true), None);
    }

    #[test]
    fn alpha_mode_follows_transparency() {
        use wgpu::CompositeAlphaMode::*;
        let c = caps(vec![], vec![Opaque, PreMultiplied, PostMultiplied]);

        assert_eq!(choose_alpha_mode(&c, &attrs(false, false)), Opaque);
        assert_eq!(choose_alpha_mode(&c, &attrs(true, true)), PreMultiplied);
        assert_eq!(choose_alpha_mode(&c, &attrs(true, false)), PostMultiplied);
    }

    #[test]
    fn unsupported_alpha_mode_falls_back() {
        use wgpu::CompositeAlphaMode::*;
        let c = caps(vec![], vec![Opaque]);
        assert_eq!(choose_alpha_mode(&c, &attrs(true, true)), Opaque);
        assert_eq!(choose_alpha_mode(&caps(vec![], vec![]), &attrs(true, true)), Auto);
    }

    #[test]
    fn loss_is_reported_once_per_device() {
        let mut t = LossTracker::default();
        assert_eq!(t.begin_poll(false, false), PollStep::Idle);
        assert_eq!(t.begin_poll(true, false), PollStep::ReportLoss);
        assert!(!t.loss_handled(false));
        assert_eq!(t.begin_poll(true, false), PollStep::Idle);
        assert_eq!(t.begin_poll(true, false), PollStep::Idle);
    }

    #[test]
    fn prevented_loss_restores_on_a_later_poll() {
        let mut t = LossTracker::default();
        assert_eq!(t.begin_poll(true, false), PollStep::ReportLoss);
        assert!(t.loss_handled(true));
        assert_eq!(t.begin_poll(true, false), PollStep::Restore);
    }

    #[test]
    fn request_in_the_same_poll_as_the_loss_waits() {
        let mut t = LossTracker::default();
        assert_eq!(t.begin_poll(true, true), PollStep::ReportLoss);
        assert!(t.loss_handled(false));
        assert_eq!(t.begin_poll(true, false), PollStep::Restore);
    }

    #[test]
    fn explicit_request_revives_an_unhandled_loss() {
        let mut t = LossTracker::default();
        t.begin_poll(true, false);
        t.loss_handled(false);
        assert_eq!(t.begin_poll(true, false), PollStep::Idle);

        assert_eq!(t.begin_poll(true, true), PollStep::Restore);
    }

    #[test]
    fn failed_restore_is_retried() {
        let mut t = LossTracker::default();
        t.begin_poll(true, false);
        t.loss_handled(true);

        // No reset between polls: the device swap failed.
        assert_eq!(t.begin_poll(true, false), PollStep::Restore);
        assert_eq!(t.begin_poll(true, false), PollStep::Restore);
    }

    #[test]
    fn request_while_live_is_dropped() {
        let mut t = LossTracker::default();
        assert_eq!(t.begin_poll(false, true), PollStep::Idle);
        assert_eq!(t.begin_poll(true, false), PollStep::ReportLoss);
        assert!(!t.loss_handled(false));
        assert_eq!(t.begin_poll(true, false), PollStep::Idle);
    }

    #[test]
    fn preserve_adds_copy_src() {
        let keep = ContextAttributes {
            preserve_drawing_buffer: true,
            ..Default::default()
        };
        assert!(surface_usage(&keep).contains(wgpu::TextureUsages::COPY_SRC));
        assert!(!surface_usage(&ContextAttributes::default()).contains(wgpu::TextureUsages::COPY_SRC));
    }
}
