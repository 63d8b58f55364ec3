use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::nucleus::{Nucleus, Reducer};
use crate::{Atom, AtomKind, ListenerId, NucleusKey, StateAtom, StoreError, StoreId, Subscription};

/// Next value for a state atom: a literal, or a function of the current state.
pub enum Set<S> {
    Value(S),
    Update(Box<dyn FnOnce(&S) -> S>),
}

impl<S> Set<S> {
    pub fn update(f: impl FnOnce(&S) -> S + 'static) -> Self {
        Set::Update(Box::new(f))
    }
}

impl<S> From<S> for Set<S> {
    fn from(value: S) -> Self {
        Set::Value(value)
    }
}

/// Registry of nuclei. The only place a nucleus is mutated.
///
/// `Store` is a cheap handle; clones share the same nuclei.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

struct StoreInner {
    id: StoreId,
    nuclei: RefCell<SlotMap<NucleusKey, Rc<dyn Any>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StoreInner {
                id: StoreId::next(),
                nuclei: RefCell::new(SlotMap::with_key()),
            }),
        }
    }

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Number of atoms created by this store.
    pub fn len(&self) -> usize {
        self.inner.nuclei.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates an atom driven by `reducer`.
    ///
    /// Returning the incoming `Rc` from the reducer means "unchanged": the
    /// state is kept and no listener runs.
    pub fn reducer_atom<S: 'static, A: 'static>(
        &self,
        reducer: impl Fn(&Rc<S>, A) -> Rc<S> + 'static,
        initial: S,
    ) -> Atom<S, A> {
        self.insert(initial, Box::new(reducer), AtomKind::Reducer)
    }

    /// Creates an atom whose action is simply the next state.
    pub fn state_atom<S: 'static>(&self, initial: S) -> StateAtom<S> {
        self.insert(
            initial,
            Box::new(|_: &Rc<S>, next: S| Rc::new(next)),
            AtomKind::State,
        )
    }

    fn insert<S: 'static, A: 'static>(
        &self,
        initial: S,
        reducer: Reducer<S, A>,
        kind: AtomKind,
    ) -> Atom<S, A> {
        let nucleus: Rc<dyn Any> = Rc::new(Nucleus::new(initial, reducer));
        let key = self.inner.nuclei.borrow_mut().insert(nucleus);
        log::trace!("store {}: new {kind:?} atom {key:?}", self.inner.id.get());
        Atom::new(self.inner.id, key, kind)
    }

    fn nucleus<S: 'static, A: 'static>(
        &self,
        atom: &Atom<S, A>,
    ) -> Result<Rc<Nucleus<S, A>>, StoreError> {
        if atom.store_id() != self.inner.id {
            return Err(StoreError::NotAnAtom);
        }
        let nucleus = self
            .inner
            .nuclei
            .borrow()
            .get(atom.key())
            .cloned()
            .ok_or(StoreError::NotAnAtom)?;
        nucleus
            .downcast::<Nucleus<S, A>>()
            .map_err(|_| StoreError::NotAnAtom)
    }

    pub fn is_atom<S: 'static, A: 'static>(&self, atom: &Atom<S, A>) -> bool {
        self.nucleus(atom).is_ok()
    }

    /// Current state of `atom`.
    pub fn state<S: 'static, A: 'static>(&self, atom: &Atom<S, A>) -> Result<Rc<S>, StoreError> {
        Ok(self.nucleus(atom)?.state())
    }

    /// Runs the reducer and notifies listeners, in registration order, if the
    /// state changed.
    pub fn dispatch<S: 'static, A: 'static>(
        &self,
        atom: &Atom<S, A>,
        action: A,
    ) -> Result<(), StoreError> {
        let nucleus = self.nucleus(atom)?;
        if atom.kind() != AtomKind::Reducer {
            return Err(StoreError::NotAReducerAtom);
        }
        nucleus.dispatch(action);
        Ok(())
    }

    pub fn set<S: 'static>(
        &self,
        atom: &StateAtom<S>,
        setter: impl Into<Set<S>>,
    ) -> Result<(), StoreError> {
        let nucleus = self.nucleus(atom)?;
        if atom.kind() != AtomKind::State {
            return Err(StoreError::NotAStateAtom);
        }
        let next = match setter.into() {
            Set::Value(value) => value,
            Set::Update(f) => f(nucleus.state().as_ref()),
        };
        nucleus.dispatch(next);
        Ok(())
    }

    pub fn add_change_listener<S: 'static, A: 'static>(
        &self,
        atom: &Atom<S, A>,
        handler: impl Fn(&S) + 'static,
    ) -> Result<Subscription, StoreError> {
        let nucleus = self.nucleus(atom)?;
        let id = nucleus.add_listener(handler);
        let weak = Rc::downgrade(&nucleus);
        Ok(Subscription::new(id, move || {
            if let Some(nucleus) = weak.upgrade() {
                nucleus.remove_listener(id);
            }
        }))
    }

    /// Returns whether a listener with `id` was registered.
    pub fn remove_change_listener<S: 'static, A: 'static>(
        &self,
        atom: &Atom<S, A>,
        id: ListenerId,
    ) -> Result<bool, StoreError> {
        Ok(self.nucleus(atom)?.remove_listener(id))
    }

    pub fn listener_count<S: 'static, A: 'static>(
        &self,
        atom: &Atom<S, A>,
    ) -> Result<usize, StoreError> {
        Ok(self.nucleus(atom)?.listener_count())
    }

    /// Listens to a projection of the state; `handler` only runs when the
    /// selected value differs from the previously selected one.
    pub fn select<S: 'static, A: 'static, T: PartialEq + 'static>(
        &self,
        atom: &Atom<S, A>,
        selector: impl Fn(&S) -> T + 'static,
        handler: impl Fn(&T) + 'static,
    ) -> Result<Subscription, StoreError> {
        let last = RefCell::new(selector(self.state(atom)?.as_ref()));
        self.add_change_listener(atom, move |state| {
            let selected = selector(state);
            if *last.borrow() == selected {
                return;
            }
            *last.borrow_mut() = selected;
            handler(&*last.borrow());
        })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id.get())
            .field("atoms", &self.len())
            .finish()
    }
}
