use std::cell::Cell;

use crate::signal::Signal;

use super::{ContextAttributes, ContextHandle};

/// Payload of the surface's context-lost signal.
///
/// Unless a subscriber calls [`prevent_default`](Self::prevent_default) while
/// handling it, the platform applies its default behavior and the context is
/// never restored.
#[derive(Debug, Default)]
pub struct ContextLostEvent {
    reason: String,
    default_prevented: Cell<bool>,
}

impl ContextLostEvent {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            default_prevented: Cell::new(false),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Native drawing surface able to create contexts and report their loss.
pub trait RenderSurface {
    /// Creates a context with the requested attributes.
    ///
    /// Returns `None` when the platform cannot provide one.
    fn create_context(&self, attributes: &ContextAttributes) -> Option<ContextHandle>;

    fn context_lost(&self) -> &Signal<ContextLostEvent>;

    fn context_restored(&self) -> &Signal<()>;

    /// Delivers platform notifications that arrived since the last call.
    ///
    /// Surfaces whose notifications originate off the render loop queue them and
    /// emit from here, so subscribers always run on the loop thread.
    fn poll_events(&self) {}
}
