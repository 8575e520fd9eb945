use std::cell::RefCell;
use std::rc::Rc;

use crate::context::ContextChange;

/// Start/stop hooks driven by the renderer.
pub trait Lifecycle {
    /// Called once, in factory order, before the first context broadcast.
    fn init(&mut self) {}

    /// Called once, in reverse factory order, before the context is released.
    fn destroy(&mut self) {}
}

/// Receives every context (re)acquisition.
pub trait ContextObserver {
    /// All GPU-side state created before `change` is invalid; recreate it
    /// against `change.handle`.
    fn on_context_change(&mut self, change: &ContextChange);
}

/// A renderer system: anything with both hooks.
pub trait System: Lifecycle + ContextObserver {}

impl<T: Lifecycle + ContextObserver> System for T {}

pub type SystemRef = Rc<RefCell<dyn System>>;

/// Builds one system. Factories run in list order inside `Renderer::new`.
pub type SystemFactory = Box<dyn FnOnce() -> SystemRef>;
