use std::rc::Rc;

use super::ContextAttributes;

/// Shared reference to the active GPU context.
///
/// Dependents borrow it through the context-change broadcast; only the
/// [`ContextManager`](super::ContextManager) decides when it is replaced.
pub type ContextHandle = Rc<dyn GraphicsContext>;

/// Capabilities queried from a context after acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct ContextCapabilities {
    /// A stencil buffer is available. Masking relies on it.
    pub stencil: bool,
    pub antialias: bool,
    pub alpha: bool,
    pub premultiplied_alpha: bool,
    /// Largest supported 2D texture edge, in texels.
    pub max_texture_size: u32,
}

/// A GPU rendering context as seen by the context manager.
pub trait GraphicsContext {
    /// Native lost state.
    fn is_context_lost(&self) -> bool;

    fn attributes(&self) -> ContextAttributes;

    fn capabilities(&self) -> ContextCapabilities;

    /// Pushes pending commands to the GPU.
    fn flush(&self);

    /// Leaves no shader program bound.
    fn unbind_program(&self);

    /// Optional manual lose/restore capability.
    ///
    /// Queried once per acquisition; the result is cached by the manager.
    fn lose_context_extension(&self) -> Option<Rc<dyn LoseContext>> {
        None
    }
}

/// Manual control over context loss, when the platform exposes it.
pub trait LoseContext {
    /// Forces the context into the lost state.
    fn lose_context(&self);

    /// Requests restoration of a lost context.
    ///
    /// Completion is reported through the surface's restored signal.
    fn restore_context(&self);
}
