use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt};
use nucleon_core::{Atom, ContextError, Store, consume, provide};

use crate::state::{Action, reduce};
use crate::{
    CacheConfig, CacheError, Clock, Entry, EntryState, Key, PartialConfig, StaticKey, SystemClock,
};

pub(crate) type EntryAtom<E, D> = Atom<EntryState<E, D>, Action<E, D>>;

/// Keyed cache of fetched data. Each slot is an atom of a private [`Store`].
///
/// Entries are never evicted; the cache grows with the set of keys used.
#[derive(Clone)]
pub struct Cache {
    inner: Rc<CacheInner>,
}

struct CacheInner {
    store: Store,
    slots: RefCell<HashMap<String, Slot>>,
    config: CacheConfig,
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn LocalSpawn>,
}

struct Slot {
    atom: Box<dyn Any>,
    type_name: &'static str,
}

pub struct CacheBuilder {
    config: CacheConfig,
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn LocalSpawn>,
}

impl CacheBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }

    pub fn build(self) -> Cache {
        Cache {
            inner: Rc::new(CacheInner {
                store: Store::new(),
                slots: RefCell::new(HashMap::new()),
                config: self.config,
                clock: self.clock,
                spawner: self.spawner,
            }),
        }
    }
}

impl Cache {
    /// `spawner` runs the background half of [`Entry::fetch`].
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        Self::builder(spawner).build()
    }

    pub fn builder(spawner: impl LocalSpawn + 'static) -> CacheBuilder {
        CacheBuilder {
            config: CacheConfig::default(),
            clock: Rc::new(SystemClock),
            spawner: Rc::new(spawner),
        }
    }

    pub fn entry<E: 'static, D: Clone + 'static>(
        &self,
        key: impl Into<Key>,
    ) -> Result<Entry<E, D>, CacheError> {
        self.entry_with(key, PartialConfig::default())
    }

    /// Looks up (creating on first use) the entry for `key`. Lazy keys are
    /// resolved now; an unready key yields a starving entry.
    pub fn entry_with<E: 'static, D: Clone + 'static>(
        &self,
        key: impl Into<Key>,
        config: PartialConfig<E, D>,
    ) -> Result<Entry<E, D>, CacheError> {
        match key.into().resolve() {
            None => Ok(Entry::starving(self.clone(), config)),
            Some(key) => {
                let atom = self.atom::<E, D>(&key)?;
                Ok(Entry::new(self.clone(), key, atom, config))
            }
        }
    }

    fn atom<E: 'static, D: Clone + 'static>(
        &self,
        key: &StaticKey,
    ) -> Result<EntryAtom<E, D>, CacheError> {
        let slot_key = key.dedupe_key();
        let mut slots = self.inner.slots.borrow_mut();

        if let Some(slot) = slots.get(&slot_key) {
            return slot
                .atom
                .downcast_ref::<EntryAtom<E, D>>()
                .copied()
                .ok_or_else(|| {
                    log::warn!(
                        "cache: key '{slot_key}' holds {} entries; requested {}",
                        slot.type_name,
                        type_name::<(E, D)>()
                    );
                    CacheError::TypeMismatch {
                        key: key.clone(),
                        requested: type_name::<(E, D)>(),
                    }
                });
        }

        let atom = self
            .inner
            .store
            .reducer_atom(reduce::<E, D>, EntryState::pristine());
        log::debug!("cache: new entry '{slot_key}'");
        slots.insert(
            slot_key,
            Slot {
                atom: Box::new(atom),
                type_name: type_name::<(E, D)>(),
            },
        );
        Ok(atom)
    }

    /// Number of slots created so far.
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> &Store {
        &self.inner.store
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// A task that fails to spawn is dropped before this returns.
    pub(crate) fn spawn(
        &self,
        key: &StaticKey,
        task: impl Future<Output = ()> + 'static,
    ) -> Result<(), CacheError> {
        self.inner.spawner.spawn_local(task).map_err(|err| {
            log::error!("cache: could not spawn revalidation of '{key}': {err}");
            CacheError::Spawn(key.clone())
        })
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

pub fn with_cache<R>(cache: &Cache, f: impl FnOnce() -> R) -> R {
    provide(cache.clone(), f)
}

pub fn use_cache() -> Result<Cache, ContextError> {
    consume::<Cache>().ok_or(ContextError("fetch hooks"))
}
