//! Renderer shell.
//!
//! The renderer owns the context manager and the systems that depend on it. It
//! does not draw; it wires the frame-end signal and the context-change broadcast
//! between the runtime, the context manager and the systems.

mod renderer;

pub use renderer::Renderer;
