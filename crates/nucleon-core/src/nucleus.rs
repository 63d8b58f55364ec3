use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::ListenerId;

pub type Reducer<S, A> = Box<dyn Fn(&Rc<S>, A) -> Rc<S>>;
pub(crate) type Listener<S> = Rc<dyn Fn(&S)>;

/// State, reducer and listeners behind one atom.
///
/// Only the owning store reaches a nucleus, so every mutation goes through
/// [`Nucleus::dispatch`].
pub(crate) struct Nucleus<S, A> {
    state: RefCell<Rc<S>>,
    reducer: Reducer<S, A>,
    listeners: RefCell<SmallVec<[(ListenerId, Listener<S>); 4]>>,
    next_listener: Cell<u64>,
    notifying: Cell<bool>,
    queued: RefCell<VecDeque<Rc<S>>>,
}

impl<S: 'static, A: 'static> Nucleus<S, A> {
    pub fn new(initial: S, reducer: Reducer<S, A>) -> Self {
        Self {
            state: RefCell::new(Rc::new(initial)),
            reducer,
            listeners: RefCell::new(SmallVec::new()),
            next_listener: Cell::new(0),
            notifying: Cell::new(false),
            queued: RefCell::new(VecDeque::new()),
        }
    }

    pub fn state(&self) -> Rc<S> {
        self.state.borrow().clone()
    }

    /// Applies `action` right away. If listeners are already running, the new
    /// state is queued and they see it once the current round finishes, so
    /// every listener observes states in reducer order.
    pub fn dispatch(&self, action: A) {
        let current = self.state();
        let next = (self.reducer)(&current, action);
        if Rc::ptr_eq(&current, &next) {
            return;
        }
        *self.state.borrow_mut() = next.clone();

        if self.notifying.get() {
            log::trace!("nucleus: change during notification; deferred");
            self.queued.borrow_mut().push_back(next);
            return;
        }

        let mut next = Some(next);
        while let Some(state) = next {
            self.notify(&state);
            next = self.queued.borrow_mut().pop_front();
        }
    }

    fn notify(&self, state: &Rc<S>) {
        // snapshot so listeners may (un)subscribe while being called
        let listeners: SmallVec<[Listener<S>; 4]> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        if listeners.is_empty() {
            return;
        }

        let _round = NotifyRound::begin(self);
        for listener in listeners {
            listener(state.as_ref());
        }
    }

    pub fn add_listener(&self, listener: impl Fn(&S) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|(lid, _)| *lid == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

// Non-panicking round guard (resets on unwind)
struct NotifyRound<'a, S, A> {
    nucleus: &'a Nucleus<S, A>,
}

impl<'a, S, A> NotifyRound<'a, S, A> {
    fn begin(nucleus: &'a Nucleus<S, A>) -> Self {
        nucleus.notifying.set(true);
        Self { nucleus }
    }
}

impl<S, A> Drop for NotifyRound<'_, S, A> {
    fn drop(&mut self) {
        self.nucleus.notifying.set(false);
        if std::thread::panicking() {
            self.nucleus.queued.borrow_mut().clear();
        }
    }
}
