//! wgpu backend.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue behind a [`WgpuContext`]
//! - creating & configuring the window Surface as a [`RenderSurface`]
//! - turning wgpu device loss into the surface's lost/restored signals
//! - acquiring frames and providing encoders/views for rendering
//!
//! [`RenderSurface`]: crate::context::RenderSurface

mod context;
mod error;
mod init;
mod surface;

pub use context::WgpuContext;
pub use error::SurfaceErrorAction;
pub use init::GpuInit;
pub use surface::{WgpuFrame, WgpuSurface};
