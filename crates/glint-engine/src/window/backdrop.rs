use winit::dpi::PhysicalSize;

use crate::device::WgpuContext;

/// Fullscreen triangle darkening the corners of the cleared frame.
const SHADER: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> VsOut {
    let uv = vec2<f32>(f32((i << 1u) & 2u), f32(i & 2u));
    var out: VsOut;
    out.pos = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let d = distance(in.uv, vec2<f32>(0.5, 0.5));
    let a = smoothstep(0.35, 0.85, d) * 0.6;
    return vec4<f32>(0.0, 0.0, 0.0, a);
}
"#;

/// Multisampled color target; keyed by size and context generation.
struct MsaaTarget {
    key: (PhysicalSize<u32>, u64),
    view: wgpu::TextureView,
}

/// Per-window draw state for the frame pass.
///
/// The pipeline lives in the context as its bound program, so a restore or an
/// unbind makes the next frame rebuild it.
pub(crate) struct Backdrop {
    msaa: Option<MsaaTarget>,
}

impl Backdrop {
    pub(crate) fn new() -> Self {
        Self { msaa: None }
    }

    /// Bound pipeline, built and bound first if the context has none.
    pub(crate) fn pipeline(&self, ctx: &WgpuContext) -> wgpu::RenderPipeline {
        if let Some(pipeline) = ctx.current_pipeline() {
            return pipeline;
        }

        let pipeline = build_pipeline(ctx);
        ctx.bind_pipeline(pipeline.clone());
        log::debug!("backdrop pipeline built ({}x MSAA)", ctx.sample_count());
        pipeline
    }

    /// Multisampled view to render into, `None` when the context is single-sampled.
    pub(crate) fn msaa_view(
        &mut self,
        ctx: &WgpuContext,
        size: PhysicalSize<u32>,
        generation: u64,
    ) -> Option<wgpu::TextureView> {
        if ctx.sample_count() <= 1 {
            self.msaa = None;
            return None;
        }

        let key = (size, generation);
        if self.msaa.as_ref().is_none_or(|m| m.key != key) {
            self.msaa = Some(MsaaTarget {
                key,
                view: create_msaa_view(ctx, size),
            });
        }
        self.msaa.as_ref().map(|m| m.view.clone())
    }
}

fn build_pipeline(ctx: &WgpuContext) -> wgpu::RenderPipeline {
    let device = ctx.device();

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("glint backdrop shader"),
        source: wgpu::ShaderSource::Wgsl(SHADER.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("glint backdrop pipeline layout"),
        bind_group_layouts: &[],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("glint backdrop pipeline"),
        layout: Some(&layout),

        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },

        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: ctx.surface_format(),
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: ctx.sample_count(),
            ..Default::default()
        },

        multiview_mask: None,
        cache: None,
    })
}

fn create_msaa_view(ctx: &WgpuContext, size: PhysicalSize<u32>) -> wgpu::TextureView {
    let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("glint msaa color"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: ctx.sample_count(),
        dimension: wgpu::TextureDimension::D2,
        format: ctx.surface_format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
