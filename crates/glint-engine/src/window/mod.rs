//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and wires them to a [`Renderer`]
//! on a [`WgpuSurface`].
//!
//! [`Renderer`]: crate::render::Renderer
//! [`WgpuSurface`]: crate::device::WgpuSurface

mod backdrop;
mod runtime;

pub use runtime::{Runtime, RuntimeConfig, SystemsBuilder};
pub use winit::keyboard::KeyCode;
