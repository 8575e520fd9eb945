//! GPU context lifecycle.
//!
//! This module is responsible for:
//! - adopting a caller-supplied context or creating one on a [`RenderSurface`]
//! - validating the context's capabilities
//! - tracking loss and restoration signalled by the surface
//! - broadcasting a [`ContextChange`] on every (re)acquisition
//! - flushing at frame end and releasing the context on teardown
//!
//! Dependents never replace the context. They hold the handle they were given
//! in the last broadcast and treat each new broadcast as "all GPU-side state is
//! gone".

mod error;
mod handle;
mod manager;
mod options;
mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ContextError;
pub use handle::{ContextCapabilities, ContextHandle, GraphicsContext, LoseContext};
pub use manager::{ChangeReason, ContextChange, ContextManager, ContextState};
pub use options::{ContextAttributes, ContextOptions, TransparentMode};
pub use surface::{ContextLostEvent, RenderSurface};
