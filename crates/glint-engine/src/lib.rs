//! Glint engine crate.
//!
//! This crate owns the GPU context lifecycle: acquiring or adopting a context,
//! validating it, tracking loss and restoration, and telling every dependent
//! system when its GPU-side state has to be rebuilt.

pub mod context;
pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod signal;
pub mod window;
