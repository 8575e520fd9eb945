/// Fixed per-surface settings for the wgpu backend.
///
/// Per-context choices (alpha, antialiasing, preserved drawing buffer) come from
/// [`ContextAttributes`](crate::context::ContextAttributes) instead.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick `Bgra8UnormSrgb` / `Rgba8UnormSrgb` over the adapter's first format.
    pub prefer_srgb: bool,

    pub present_mode: wgpu::PresentMode,
    pub power_preference: wgpu::PowerPreference,

    /// Requested for the first device and for every replacement device.
    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Hint only; backends may clamp it.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
