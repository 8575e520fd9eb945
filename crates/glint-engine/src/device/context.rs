use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::context::{ContextAttributes, ContextCapabilities, GraphicsContext, LoseContext};

use super::GpuInit;

const MSAA_SAMPLES: u32 = 4;

/// Device + queue pair together with the loss flag raised by that device.
///
/// Each device gets its own flag so a late callback from a replaced device
/// cannot mark its successor lost.
struct DeviceSlot {
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

/// wgpu-backed graphics context.
///
/// The handle identity survives loss: restoration requests a fresh device on the
/// same adapter and swaps it in place, so dependents keep the handle they were
/// given and only recreate their GPU objects.
pub struct WgpuContext {
    me: Weak<WgpuContext>,
    adapter: wgpu::Adapter,
    init: GpuInit,
    slot: RefCell<DeviceSlot>,
    attributes: ContextAttributes,
    capabilities: ContextCapabilities,
    surface_format: wgpu::TextureFormat,
    sample_count: u32,
    restore_requested: Cell<bool>,
    current_pipeline: RefCell<Option<wgpu::RenderPipeline>>,
}

impl WgpuContext {
    pub(crate) fn new(
        adapter: wgpu::Adapter,
        init: GpuInit,
        attributes: ContextAttributes,
        surface_format: wgpu::TextureFormat,
        alpha_mode: wgpu::CompositeAlphaMode,
    ) -> Result<Rc<Self>> {
        let slot = request_device(&adapter, &init)?;

        let stencil_supported = adapter
            .get_texture_format_features(wgpu::TextureFormat::Depth24PlusStencil8)
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);

        let msaa = attributes.antialias
            && adapter
                .get_texture_format_features(surface_format)
                .flags
                .sample_count_supported(MSAA_SAMPLES);

        let capabilities = ContextCapabilities {
            stencil: attributes.stencil && stencil_supported,
            antialias: msaa,
            alpha: alpha_mode != wgpu::CompositeAlphaMode::Opaque,
            premultiplied_alpha: alpha_mode == wgpu::CompositeAlphaMode::PreMultiplied,
            max_texture_size: slot.device.limits().max_texture_dimension_2d,
        };

        log::debug!(
            "wgpu context on {:?}: {capabilities:?}",
            adapter.get_info().name
        );

        Ok(Rc::new_cyclic(|me| Self {
            me: me.clone(),
            adapter,
            init,
            slot: RefCell::new(slot),
            attributes,
            capabilities,
            surface_format,
            sample_count: if msaa { MSAA_SAMPLES } else { 1 },
            restore_requested: Cell::new(false),
            current_pipeline: RefCell::new(None),
        }))
    }

    /// Current logical device. Replaced after a restore.
    pub fn device(&self) -> Ref<'_, wgpu::Device> {
        Ref::map(self.slot.borrow(), |s| &s.device)
    }

    pub fn queue(&self) -> Ref<'_, wgpu::Queue> {
        Ref::map(self.slot.borrow(), |s| &s.queue)
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// MSAA sample count render targets should use (1 when antialiasing is off).
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Records `pipeline` as the bound program; cleared by `unbind_program`.
    pub fn bind_pipeline(&self, pipeline: wgpu::RenderPipeline) {
        *self.current_pipeline.borrow_mut() = Some(pipeline);
    }

    pub fn current_pipeline(&self) -> Option<wgpu::RenderPipeline> {
        self.current_pipeline.borrow().clone()
    }

    /// Drives pending device callbacks, including loss notification.
    pub(crate) fn poll_device(&self) {
        if let Err(err) = self.device().poll(wgpu::PollType::Poll) {
            log::debug!("device poll failed: {err}");
        }
    }

    pub(crate) fn take_restore_request(&self) -> bool {
        self.restore_requested.replace(false)
    }

    /// Swaps in a fresh device from the same adapter.
    pub(crate) fn restore(&self) -> Result<()> {
        let slot = request_device(&self.adapter, &self.init)?;
        *self.slot.borrow_mut() = slot;
        self.current_pipeline.borrow_mut().take();
        Ok(())
    }
}

impl GraphicsContext for WgpuContext {
    fn is_context_lost(&self) -> bool {
        self.slot.borrow().lost.load(Ordering::Acquire)
    }

    fn attributes(&self) -> ContextAttributes {
        self.attributes
    }

    fn capabilities(&self) -> ContextCapabilities {
        self.capabilities
    }

    fn flush(&self) {
        self.queue().submit(std::iter::empty());
    }

    fn unbind_program(&self) {
        self.current_pipeline.borrow_mut().take();
    }

    fn lose_context_extension(&self) -> Option<Rc<dyn LoseContext>> {
        Some(Rc::new(WgpuLoseContext {
            context: self.me.clone(),
        }))
    }
}

/// Manual loss control: destroys the device / schedules a replacement.
struct WgpuLoseContext {
    context: Weak<WgpuContext>,
}

impl LoseContext for WgpuLoseContext {
    fn lose_context(&self) {
        let Some(ctx) = self.context.upgrade() else {
            return;
        };
        let slot = ctx.slot.borrow();
        slot.device.destroy();
        slot.lost.store(true, Ordering::Release);
    }

    fn restore_context(&self) {
        if let Some(ctx) = self.context.upgrade() {
            ctx.restore_requested.set(true);
        }
    }
}

fn request_device(adapter: &wgpu::Adapter, init: &GpuInit) -> Result<DeviceSlot> {
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("glint-engine device"),
        required_features: init.required_features,
        required_limits: init.required_limits.clone(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::Off,
    }))
    .context("failed to create wgpu device/queue")?;

    let lost = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&lost);
    // Runs on whichever thread wgpu detects the loss; only the flag is touched.
    device.set_device_lost_callback(move |reason, message| {
        log::warn!("wgpu device lost ({reason:?}): {message}");
        flag.store(true, Ordering::Release);
    });

    Ok(DeviceSlot { device, queue, lost })
}
