use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifies one change listener within its nucleus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Handle returned by `add_change_listener`. Dropping it keeps the listener.
#[derive(Clone)]
pub struct Subscription {
    id: Option<ListenerId>,
    remove: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, remove: impl FnOnce() + 'static) -> Self {
        Self {
            id: Some(id),
            remove: Rc::new(RefCell::new(Some(Box::new(remove)))),
        }
    }

    /// A subscription to nothing, for inert sources.
    pub fn noop() -> Self {
        Self {
            id: None,
            remove: Rc::new(RefCell::new(None)),
        }
    }

    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    /// Runs at most once (safe to call multiple times).
    pub fn unsubscribe(&self) {
        let remove = self.remove.borrow_mut().take();
        if let Some(f) = remove {
            f()
        }
    }

    pub fn is_active(&self) -> bool {
        self.remove.borrow().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
