use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<E> = RefCell<Box<dyn FnMut(&E)>>;

struct Slot<E> {
    id: u64,
    attached: Cell<bool>,
    callback: Callback<E>,
}

struct Inner<E> {
    next_id: Cell<u64>,
    slots: RefCell<Vec<Rc<Slot<E>>>>,
}

impl<E> Inner<E> {
    fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.borrow_mut();
        let Some(pos) = slots.iter().position(|s| s.id == id) else {
            return false;
        };
        slots.remove(pos).attached.set(false);
        true
    }
}

/// Single-threaded broadcast channel for events of type `E`.
///
/// Cloning a `Signal` yields another handle to the same channel.
pub struct Signal<E: 'static> {
    inner: Rc<Inner<E>>,
}

impl<E: 'static> Signal<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                next_id: Cell::new(0),
                slots: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Registers `f` and returns the handle that keeps it attached.
    #[must_use = "dropping the Subscription detaches the callback immediately"]
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id.wrapping_add(1));

        self.inner.slots.borrow_mut().push(Rc::new(Slot {
            id,
            attached: Cell::new(true),
            callback: RefCell::new(Box::new(f)),
        }));

        let weak: Weak<Inner<E>> = Rc::downgrade(&self.inner);
        Subscription {
            detach: Some(Box::new(move || {
                weak.upgrade().is_some_and(|inner| inner.remove(id))
            })),
        }
    }

    /// Delivers `event` to every attached subscriber, in subscription order.
    ///
    /// The subscriber list is snapshotted first: callbacks added during delivery
    /// wait for the next emission, callbacks detached during delivery are skipped.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Rc<Slot<E>>> = self.inner.slots.borrow().clone();

        for slot in snapshot {
            if !slot.attached.get() {
                continue;
            }
            match slot.callback.try_borrow_mut() {
                Ok(mut cb) => cb(event),
                Err(_) => {
                    log::warn!("re-entrant emission skipped for subscriber {}", slot.id);
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }
}

impl<E: 'static> Clone for Signal<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Owned subscription handle.
///
/// The callback stays attached for as long as this value lives. Dropping it,
/// or calling [`Subscription::detach`], removes the callback from its signal.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() -> bool>>,
}

impl Subscription {
    /// Detaches now. Returns `true` if the callback was still registered.
    pub fn detach(mut self) -> bool {
        self.detach.take().is_some_and(|f| f())
    }

    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.detach.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}
