//! In-memory surface and context used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::signal::Signal;

use super::{
    ContextAttributes, ContextCapabilities, ContextHandle, ContextLostEvent, GraphicsContext,
    LoseContext, RenderSurface,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Call {
    Flush,
    UnbindProgram,
    Lose,
    Restore,
}

enum Pending {
    Lost(String),
    Restored,
}

pub(crate) struct MockContext {
    me: Weak<MockContext>,
    surface: Weak<MockSurface>,
    lost: Cell<bool>,
    attributes: ContextAttributes,
    capabilities: ContextCapabilities,
    lose_extension: bool,
    calls: RefCell<Vec<Call>>,
}

impl MockContext {
    /// Context with a stencil buffer and the lose/restore capability, bound to
    /// no surface.
    pub(crate) fn new() -> Rc<Self> {
        Self::build(Weak::new(), ContextAttributes::default(), true, true)
    }

    fn build(
        surface: Weak<MockSurface>,
        attributes: ContextAttributes,
        stencil: bool,
        lose_extension: bool,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            surface,
            lost: Cell::new(false),
            attributes,
            capabilities: ContextCapabilities {
                stencil,
                antialias: attributes.antialias,
                alpha: attributes.alpha,
                premultiplied_alpha: attributes.premultiplied_alpha,
                max_texture_size: 4096,
            },
            lose_extension,
            calls: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn set_lost(&self, lost: bool) {
        self.lost.set(lost);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl GraphicsContext for MockContext {
    fn is_context_lost(&self) -> bool {
        self.lost.get()
    }

    fn attributes(&self) -> ContextAttributes {
        self.attributes
    }

    fn capabilities(&self) -> ContextCapabilities {
        self.capabilities
    }

    fn flush(&self) {
        self.record(Call::Flush);
    }

    fn unbind_program(&self) {
        self.record(Call::UnbindProgram);
    }

    fn lose_context_extension(&self) -> Option<Rc<dyn LoseContext>> {
        if !self.lose_extension {
            return None;
        }
        Some(Rc::new(MockLoseContext {
            context: self.me.clone(),
        }))
    }
}

/// Lose/restore capability; completion is queued on the owning surface and
/// delivered by [`MockSurface::poll_events`].
struct MockLoseContext {
    context: Weak<MockContext>,
}

impl LoseContext for MockLoseContext {
    fn lose_context(&self) {
        let Some(ctx) = self.context.upgrade() else {
            return;
        };
        ctx.record(Call::Lose);
        ctx.lost.set(true);
        if let Some(surface) = ctx.surface.upgrade() {
            surface.queue(Pending::Lost("forced".to_string()));
        }
    }

    fn restore_context(&self) {
        let Some(ctx) = self.context.upgrade() else {
            return;
        };
        ctx.record(Call::Restore);
        ctx.lost.set(false);
        if let Some(surface) = ctx.surface.upgrade() {
            surface.queue(Pending::Restored);
        }
    }
}

pub(crate) struct MockSurface {
    me: Weak<MockSurface>,
    fail: bool,
    stencil: bool,
    lose_extension: bool,
    lost: Signal<ContextLostEvent>,
    restored: Signal<()>,
    requested: RefCell<Vec<ContextAttributes>>,
    contexts: RefCell<Vec<Rc<MockContext>>>,
    pending: RefCell<VecDeque<Pending>>,
}

impl MockSurface {
    pub(crate) fn new() -> Rc<Self> {
        Self::build(false, true, true)
    }

    pub(crate) fn failing() -> Rc<Self> {
        Self::build(true, true, true)
    }

    pub(crate) fn without_stencil() -> Rc<Self> {
        Self::build(false, false, true)
    }

    pub(crate) fn without_lose_extension() -> Rc<Self> {
        Self::build(false, true, false)
    }

    fn build(fail: bool, stencil: bool, lose_extension: bool) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            fail,
            stencil,
            lose_extension,
            lost: Signal::new(),
            restored: Signal::new(),
            requested: RefCell::new(Vec::new()),
            contexts: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
        })
    }

    /// Context bound to this surface, created outside `create_context`.
    pub(crate) fn new_context(&self) -> Rc<MockContext> {
        let ctx = MockContext::build(
            self.me.clone(),
            ContextAttributes::default(),
            self.stencil,
            self.lose_extension,
        );
        self.contexts.borrow_mut().push(Rc::clone(&ctx));
        ctx
    }

    pub(crate) fn requested(&self) -> Vec<ContextAttributes> {
        self.requested.borrow().clone()
    }

    pub(crate) fn last_context(&self) -> Rc<MockContext> {
        Rc::clone(self.contexts.borrow().last().expect("no context was created"))
    }

    /// Marks every created context lost and emits the lost signal.
    pub(crate) fn simulate_loss(&self) -> ContextLostEvent {
        for ctx in self.contexts.borrow().iter() {
            ctx.set_lost(true);
        }
        let event = ContextLostEvent::new("simulated");
        self.lost.emit(&event);
        event
    }

    /// Marks every created context valid and emits the restored signal.
    pub(crate) fn simulate_restore(&self) {
        for ctx in self.contexts.borrow().iter() {
            ctx.set_lost(false);
        }
        self.restored.emit(&());
    }

    fn queue(&self, pending: Pending) {
        self.pending.borrow_mut().push_back(pending);
    }
}

impl RenderSurface for MockSurface {
    fn create_context(&self, attributes: &ContextAttributes) -> Option<ContextHandle> {
        self.requested.borrow_mut().push(*attributes);
        if self.fail {
            return None;
        }
        let ctx = MockContext::build(
            self.me.clone(),
            *attributes,
            self.stencil,
            self.lose_extension,
        );
        self.contexts.borrow_mut().push(Rc::clone(&ctx));
        Some(ctx)
    }

    fn context_lost(&self) -> &Signal<ContextLostEvent> {
        &self.lost
    }

    fn context_restored(&self) -> &Signal<()> {
        &self.restored
    }

    fn poll_events(&self) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(Pending::Lost(reason)) => {
                    self.lost.emit(&ContextLostEvent::new(reason));
                }
                Some(Pending::Restored) => self.restored.emit(&()),
                None => break,
            }
        }
    }
}
