use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glint_engine::context::{ChangeReason, ContextChange, TransparentMode};
use glint_engine::core::{ContextObserver, Lifecycle, SystemFactory, SystemRef};
use glint_engine::device::{GpuInit, WgpuSurface};
use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::window::{KeyCode, Runtime, RuntimeConfig};
use winit::dpi::LogicalSize;

const CHECKER_SIZE: u32 = 256;

/// Owns one GPU texture and rebuilds it on every context change.
struct CheckerTexture {
    surface: Weak<WgpuSurface>,
    texture: Option<wgpu::Texture>,
    rebuilds: u32,
}

impl Lifecycle for CheckerTexture {
    fn destroy(&mut self) {
        if let Some(texture) = self.texture.take() {
            texture.destroy();
        }
        log::info!("checker texture released after {} builds", self.rebuilds);
    }
}

impl ContextObserver for CheckerTexture {
    fn on_context_change(&mut self, change: &ContextChange) {
        // Anything from the previous device is already gone.
        self.texture = None;

        let Some(ctx) = self.surface.upgrade().and_then(|s| s.context()) else {
            log::warn!("no wgpu context for generation {}", change.generation);
            return;
        };

        let side = CHECKER_SIZE.min(change.handle.capabilities().max_texture_size);
        let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("checker"),
            size: wgpu::Extent3d {
                width: side,
                height: side,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.texture = Some(texture);
        self.rebuilds += 1;
        log::debug!("checker texture {side}x{side} built for generation {}", change.generation);
    }
}

/// Logs every broadcast.
#[derive(Default)]
struct ContextLog {
    last_generation: u64,
}

impl Lifecycle for ContextLog {
    fn init(&mut self) {
        log::info!("press L to lose / restore the graphics context");
    }
}

impl ContextObserver for ContextLog {
    fn on_context_change(&mut self, change: &ContextChange) {
        let what = match change.reason {
            ChangeReason::Initial => "acquired",
            ChangeReason::Restored => "restored",
        };
        log::info!(
            "context {what} (generation {} -> {}): {:?}",
            self.last_generation,
            change.generation,
            change.handle.capabilities()
        );
        self.last_generation = change.generation;
    }
}

fn systems(surface: &Rc<WgpuSurface>) -> Vec<SystemFactory> {
    let surface = Rc::downgrade(surface);

    let context_log: SystemFactory =
        Box::new(|| Rc::new(RefCell::new(ContextLog::default())) as SystemRef);
    let checker: SystemFactory = Box::new(move || {
        Rc::new(RefCell::new(CheckerTexture {
            surface,
            texture: None,
            rebuilds: 0,
        })) as SystemRef
    });

    vec![context_log, checker]
}

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "Glint Studio".to_string(),
        initial_size: LogicalSize::new(960.0, 540.0),
        transparent_mode: TransparentMode::Opaque,
        clear_color: wgpu::Color {
            r: 0.08,
            g: 0.09,
            b: 0.12,
            a: 1.0,
        },
        lose_context_key: Some(KeyCode::KeyL),
        ..Default::default()
    };

    Runtime::run(config, GpuInit::default(), systems)
}
