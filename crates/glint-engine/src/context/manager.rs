use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::{ContextObserver, Lifecycle};
use crate::signal::{Signal, Subscription};

use super::{
    ContextAttributes, ContextCapabilities, ContextError, ContextHandle, ContextLostEvent, ContextOptions,
    LoseContext, RenderSurface,
};

/// Loss state of the managed context.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContextState {
    Active,
    Lost,
    /// Transient: the restored broadcast is being delivered.
    Restoring,
}

/// Why a [`ContextChange`] was broadcast.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChangeReason {
    /// First acquisition after construction.
    Initial,
    /// The context came back after a loss.
    Restored,
}

/// Broadcast to dependents on every successful (re)acquisition.
///
/// Receiving one means every GPU-side object created against an earlier
/// generation is invalid and must be recreated against `handle`.
#[derive(Clone)]
pub struct ContextChange {
    pub handle: ContextHandle,
    /// Strictly increasing per manager, starting at 1.
    pub generation: u64,
    pub reason: ChangeReason,
}

impl fmt::Debug for ContextChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextChange")
            .field("generation", &self.generation)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// State reachable from signal callbacks.
struct Shared {
    handle: RefCell<Option<ContextHandle>>,
    state: Cell<ContextState>,
    lose_ext: RefCell<Option<Rc<dyn LoseContext>>>,
    capabilities: Cell<ContextCapabilities>,
    generation: Cell<u64>,
    context_change: Signal<ContextChange>,
}

impl Shared {
    fn handle(&self) -> Option<ContextHandle> {
        self.handle.borrow().clone()
    }

    fn is_lost(&self) -> bool {
        match self.handle() {
            Some(h) => self.state.get() == ContextState::Lost || h.is_context_lost(),
            None => true,
        }
    }

    fn next_change(&self, handle: ContextHandle, reason: ChangeReason) -> ContextChange {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        ContextChange {
            handle,
            generation,
            reason,
        }
    }

    fn on_context_lost(&self, event: &ContextLostEvent) {
        // Keeps the platform from tearing the context down on its own.
        event.prevent_default();

        if self.handle.borrow().is_none() {
            return;
        }
        log::info!("graphics context lost: {}", event.reason());
        self.state.set(ContextState::Lost);
    }

    fn on_context_restored(&self) {
        let state = self.state.get();
        if state != ContextState::Lost {
            log::debug!("restore signal ignored while context is {state:?}");
            return;
        }
        let Some(handle) = self.handle() else {
            return;
        };

        self.state.set(ContextState::Restoring);
        self.capabilities.set(handle.capabilities());

        let change = self.next_change(handle, ChangeReason::Restored);
        log::info!("graphics context restored (generation {})", change.generation);
        self.context_change.emit(&change);

        // A loss delivered during the broadcast stands.
        if self.state.get() == ContextState::Restoring {
            self.state.set(ContextState::Active);
        }
    }

    fn on_post_render(&self) {
        match self.handle() {
            Some(h) if !self.is_lost() => h.flush(),
            _ => log::warn!("frame-end flush skipped: no usable graphics context"),
        }
    }
}

/// Owns the renderer's GPU context: acquisition, validation, loss tracking,
/// restoration broadcast and teardown.
pub struct ContextManager {
    shared: Rc<Shared>,
    surface: Option<Weak<dyn RenderSurface>>,
    lost_sub: Option<Subscription>,
    restored_sub: Option<Subscription>,
    post_render_sub: Option<Subscription>,
    destroyed: bool,
}

impl ContextManager {
    /// Acquires a context and broadcasts the first [`ContextChange`] on
    /// `context_change`.
    ///
    /// Subscribers already attached to `context_change` receive that first
    /// broadcast before this returns. On error nothing stays subscribed and no
    /// broadcast happens.
    pub fn new(
        options: ContextOptions,
        post_render: &Signal<()>,
        context_change: Signal<ContextChange>,
    ) -> Result<Self, ContextError> {
        let handle = match &options.existing_context {
            Some(ctx) => {
                log::debug!("adopting existing graphics context");
                Rc::clone(ctx)
            }
            None => create_context(&options)?,
        };

        let shared = Rc::new(Shared {
            handle: RefCell::new(None),
            state: Cell::new(ContextState::Active),
            lose_ext: RefCell::new(None),
            capabilities: Cell::new(ContextCapabilities::default()),
            generation: Cell::new(0),
            context_change,
        });

        let mut manager = Self {
            shared,
            surface: options.surface.as_ref().map(Rc::downgrade),
            lost_sub: None,
            restored_sub: None,
            post_render_sub: None,
            destroyed: false,
        };

        manager.init_from_context(handle);

        match &options.surface {
            Some(surface) => manager.subscribe_surface(surface.as_ref()),
            None => log::warn!("adopted context has no surface; loss and restore cannot be observed"),
        }

        let weak = Rc::downgrade(&manager.shared);
        manager.post_render_sub = Some(post_render.subscribe(move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.on_post_render();
            }
        }));

        Ok(manager)
    }

    fn init_from_context(&mut self, handle: ContextHandle) {
        *self.shared.lose_ext.borrow_mut() = handle.lose_context_extension();

        let capabilities = handle.capabilities();
        validate_capabilities(&handle.attributes(), &capabilities);
        self.shared.capabilities.set(capabilities);

        let state = if handle.is_context_lost() {
            ContextState::Lost
        } else {
            ContextState::Active
        };
        self.shared.state.set(state);
        *self.shared.handle.borrow_mut() = Some(Rc::clone(&handle));

        let change = self.shared.next_change(handle, ChangeReason::Initial);
        self.on_context_change(&change);

        log::debug!("graphics context acquired (generation {})", change.generation);
        self.shared.context_change.emit(&change);
    }

    fn subscribe_surface(&mut self, surface: &dyn RenderSurface) {
        let weak = Rc::downgrade(&self.shared);
        self.lost_sub = Some(surface.context_lost().subscribe(move |event| {
            match weak.upgrade() {
                Some(shared) => shared.on_context_lost(event),
                None => event.prevent_default(),
            }
        }));

        let weak = Rc::downgrade(&self.shared);
        self.restored_sub = Some(surface.context_restored().subscribe(move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.on_context_restored();
            }
        }));
    }

    /// Releases the context. Safe to call more than once.
    ///
    /// Every step runs even if an earlier one had nothing to do.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        if let Some(sub) = self.lost_sub.take() {
            sub.detach();
        }
        if let Some(sub) = self.restored_sub.take() {
            sub.detach();
        }

        let handle = self.shared.handle();
        if let Some(handle) = &handle {
            handle.unbind_program();
        }

        let lose_ext = self.shared.lose_ext.borrow_mut().take();
        if let Some(ext) = lose_ext {
            ext.lose_context();
        }

        self.shared.handle.borrow_mut().take();
        self.shared.state.set(ContextState::Lost);

        if let Some(sub) = self.post_render_sub.take() {
            sub.detach();
        }

        log::debug!("graphics context released");
    }

    /// `true` when there is no context or the context is lost.
    pub fn is_lost(&self) -> bool {
        self.shared.is_lost()
    }

    pub fn state(&self) -> ContextState {
        self.shared.state.get()
    }

    /// Active context, `None` after teardown.
    pub fn handle(&self) -> Option<ContextHandle> {
        self.shared.handle()
    }

    /// Generation of the last broadcast.
    pub fn generation(&self) -> u64 {
        self.shared.generation.get()
    }

    pub fn capabilities(&self) -> ContextCapabilities {
        self.shared.capabilities.get()
    }

    /// Manual lose/restore capability cached at acquisition.
    pub fn lose_context_extension(&self) -> Option<Rc<dyn LoseContext>> {
        self.shared.lose_ext.borrow().clone()
    }

    /// Signal carrying every [`ContextChange`].
    pub fn context_change(&self) -> &Signal<ContextChange> {
        &self.shared.context_change
    }

    /// The surface passed at construction, if it is still alive.
    pub fn surface(&self) -> Option<Rc<dyn RenderSurface>> {
        self.surface.as_ref().and_then(Weak::upgrade)
    }
}

impl Lifecycle for ContextManager {
    fn destroy(&mut self) {
        ContextManager::destroy(self);
    }
}

impl ContextObserver for ContextManager {
    /// Forces restoration of a lost context instead of waiting for the platform.
    fn on_context_change(&mut self, change: &ContextChange) {
        if !change.handle.is_context_lost() {
            return;
        }

        let is_current = self
            .shared
            .handle()
            .is_some_and(|h| Rc::ptr_eq(&h, &change.handle));
        if !is_current {
            log::debug!("change for a context this manager does not own; not restoring");
            return;
        }

        if let Some(ext) = self.lose_context_extension() {
            log::info!("context is lost on change; requesting restore");
            ext.restore_context();
        }
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("has_context", &self.shared.handle.borrow().is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn create_context(options: &ContextOptions) -> Result<ContextHandle, ContextError> {
    let surface = options.surface.as_ref().ok_or(ContextError::MissingSurface)?;
    let attributes = options.attributes();

    log::debug!("creating graphics context with {attributes:?}");
    surface
        .create_context(&attributes)
        .ok_or(ContextError::Unsupported { attributes })
}

fn validate_capabilities(requested: &ContextAttributes, capabilities: &ContextCapabilities) {
    if !capabilities.stencil {
        log::warn!("graphics context has no stencil buffer; masking may render incorrectly");
    }
    if requested.antialias && !capabilities.antialias {
        log::info!("antialiasing requested but unavailable; rendering single-sampled");
    }
}
