//! Core engine-facing contracts.
//!
//! Renderer systems are plain values implementing two narrow traits,
//! [`Lifecycle`] and [`ContextObserver`]. They are built from an explicit list
//! of [`SystemFactory`] values handed to the renderer; there is no global
//! registry.

mod system;

pub use system::{ContextObserver, Lifecycle, System, SystemFactory, SystemRef};
