use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

slotmap::new_key_type! {
    /// Slot of a nucleus inside its store.
    pub struct NucleusKey;
}

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Store`](crate::Store).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// Arbitrary action type, caller supplied reducer.
    Reducer,
    /// Action is the next state; only `Store::set` applies it.
    State,
}

/// Store-scoped handle to one nucleus. Holds no state itself.
///
/// An atom is only meaningful for the store that created it; every store
/// operation checks the embedded [`StoreId`] and rejects foreign atoms with
/// [`StoreError::NotAnAtom`](crate::StoreError::NotAnAtom).
pub struct Atom<S, A> {
    store: StoreId,
    key: NucleusKey,
    kind: AtomKind,
    _marker: PhantomData<fn(S, A)>,
}

/// Atom whose action is the next state value.
pub type StateAtom<S> = Atom<S, S>;

impl<S, A> Atom<S, A> {
    pub(crate) fn new(store: StoreId, key: NucleusKey, kind: AtomKind) -> Self {
        Self {
            store,
            key,
            kind,
            _marker: PhantomData,
        }
    }

    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    pub fn store_id(&self) -> StoreId {
        self.store
    }

    pub(crate) fn key(&self) -> NucleusKey {
        self.key
    }
}

impl<S, A> Clone for Atom<S, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, A> Copy for Atom<S, A> {}

impl<S, A> PartialEq for Atom<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.store == other.store && self.key == other.key
    }
}

impl<S, A> Eq for Atom<S, A> {}

impl<S, A> Hash for Atom<S, A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.store.hash(state);
        self.key.hash(state);
    }
}

impl<S, A> fmt::Debug for Atom<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("store", &self.store.0)
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}
