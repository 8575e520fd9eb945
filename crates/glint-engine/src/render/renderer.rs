use std::rc::Rc;

use crate::context::{ContextChange, ContextError, ContextManager, ContextOptions};
use crate::core::{ContextObserver, Lifecycle, SystemFactory, SystemRef};
use crate::signal::{Signal, Subscription};

/// Owns a [`ContextManager`] and the systems observing it.
pub struct Renderer {
    context: ContextManager,
    systems: Vec<SystemRef>,
    system_subs: Vec<Subscription>,
    post_render: Signal<()>,
    context_change: Signal<ContextChange>,
    destroyed: bool,
}

impl Renderer {
    /// Builds every system, then acquires the context.
    ///
    /// Systems are subscribed and initialized before acquisition so they receive
    /// the first broadcast. If acquisition fails the systems are destroyed again
    /// and the error is returned.
    pub fn new(options: ContextOptions, factories: Vec<SystemFactory>) -> Result<Self, ContextError> {
        let post_render = Signal::new();
        let context_change: Signal<ContextChange> = Signal::new();

        let mut systems = Vec::with_capacity(factories.len());
        let mut system_subs = Vec::with_capacity(factories.len());

        for factory in factories {
            let system = factory();
            let weak = Rc::downgrade(&system);

            system_subs.push(context_change.subscribe(move |change| {
                let Some(system) = weak.upgrade() else {
                    return;
                };
                match system.try_borrow_mut() {
                    Ok(mut s) => s.on_context_change(change),
                    Err(_) => log::warn!("system busy; context change {} not delivered", change.generation),
                }
            }));

            system.borrow_mut().init();
            systems.push(system);
        }

        let context = match ContextManager::new(options, &post_render, context_change.clone()) {
            Ok(context) => context,
            Err(err) => {
                log::error!("renderer initialization failed: {err}");
                drop(system_subs);
                for system in systems.iter().rev() {
                    system.borrow_mut().destroy();
                }
                return Err(err);
            }
        };

        log::debug!("renderer ready with {} systems", systems.len());

        Ok(Self {
            context,
            systems,
            system_subs,
            post_render,
            context_change,
            destroyed: false,
        })
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn is_context_lost(&self) -> bool {
        self.context.is_lost()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Frame-end signal; emitted by [`Renderer::post_render`].
    pub fn on_post_render(&self) -> &Signal<()> {
        &self.post_render
    }

    pub fn on_context_change(&self) -> &Signal<ContextChange> {
        &self.context_change
    }

    /// Lets the surface deliver loss/restore notifications queued since the
    /// last call. Call once per loop iteration, also while the context is lost.
    pub fn poll_surface(&self) {
        if let Some(surface) = self.context.surface() {
            surface.poll_events();
        }
    }

    /// Signals the end of a frame. Skipped while the context is lost.
    ///
    /// Returns `true` if the signal was emitted.
    pub fn post_render(&self) -> bool {
        if self.destroyed || self.context.is_lost() {
            log::trace!("post-render skipped: context unavailable");
            return false;
        }
        self.post_render.emit(&());
        true
    }

    /// Destroys systems in reverse order, then releases the context.
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.system_subs.clear();
        for system in self.systems.iter().rev() {
            match system.try_borrow_mut() {
                Ok(mut s) => s.destroy(),
                Err(_) => log::warn!("system busy during renderer teardown; skipped"),
            }
        }
        self.systems.clear();

        self.context.destroy();
        log::debug!("renderer destroyed");
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.destroy();
    }
}
