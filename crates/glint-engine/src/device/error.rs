use wgpu::SurfaceError;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

impl SurfaceErrorAction {
    /// Action for `err`, assuming the caller reconfigures on `Reconfigured`.
    pub fn for_error(err: &SurfaceError) -> Self {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => Self::Reconfigured,
            SurfaceError::OutOfMemory => Self::Fatal,
            SurfaceError::Timeout | SurfaceError::Other => Self::SkipFrame,
        }
    }
}
