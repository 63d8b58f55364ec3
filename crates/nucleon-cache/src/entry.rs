use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use nucleon_core::{ListenerId, Store, Subscription};

use crate::cache::EntryAtom;
use crate::state::Action;
use crate::{
    Cache, CacheError, Config, EntryState, FetchOutcome, Mutation, NEVER, PartialConfig, Snapshot,
    StaticKey, Status,
};

/// Handle to one cache slot, bound to the config layer it was looked up with.
///
/// A starving entry (lazy key not ready) answers every call with
/// [`Snapshot::Starving`] / `Ok(None)` and never reaches the fetcher.
pub struct Entry<E, D> {
    cache: Cache,
    slot: Option<(StaticKey, EntryAtom<E, D>)>,
    config: PartialConfig<E, D>,
}

impl<E, D> Clone for Entry<E, D> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            slot: self.slot.clone(),
            config: self.config.clone(),
        }
    }
}

/// A request that has been stamped and handed to the fetcher.
///
/// Dropped before it settles (task never spawned, caller gave up on the
/// future), it puts the entry back to the state the request replaced.
struct InFlight<E: 'static, D: Clone + 'static> {
    store: Store,
    atom: EntryAtom<E, D>,
    key: StaticKey,
    timestamp: i64,
    previous: Rc<EntryState<E, D>>,
    response: LocalBoxFuture<'static, FetchOutcome<E, D>>,
    settled: bool,
}

impl<E: 'static, D: Clone + 'static> Entry<E, D> {
    pub(crate) fn new(
        cache: Cache,
        key: StaticKey,
        atom: EntryAtom<E, D>,
        config: PartialConfig<E, D>,
    ) -> Self {
        Self {
            cache,
            slot: Some((key, atom)),
            config,
        }
    }

    pub(crate) fn starving(cache: Cache, config: PartialConfig<E, D>) -> Self {
        Self {
            cache,
            slot: None,
            config,
        }
    }

    /// `false` iff the key resolved to "not ready".
    pub fn ready(&self) -> bool {
        self.slot.is_some()
    }

    pub fn key(&self) -> Option<&StaticKey> {
        self.slot.as_ref().map(|(key, _)| key)
    }

    fn resolve(&self, call: &PartialConfig<E, D>) -> Config<E, D> {
        self.cache.config().resolve(&self.config, call)
    }

    /// Current state, without side effects.
    pub fn state(&self) -> Result<Snapshot<E, D>, CacheError> {
        match &self.slot {
            None => Ok(Snapshot::Starving),
            Some((_, atom)) => Ok(Snapshot::Ready(self.cache.store().state(atom)?)),
        }
    }

    /// Returns the cached state and, unless `revalidate` is off, starts a
    /// revalidation in the background.
    ///
    /// The request is stamped before returning, so a fetch that was actually
    /// issued is already visible as pending in the returned snapshot.
    pub fn fetch(&self, call: PartialConfig<E, D>) -> Result<Snapshot<E, D>, CacheError> {
        let Some((key, atom)) = &self.slot else {
            return Ok(Snapshot::Starving);
        };
        let config = self.resolve(&call);
        if !config.revalidate {
            return self.state();
        }

        if let Some(request) = self.begin(key, atom, &config)? {
            self.cache.spawn(key, async move {
                let key = request.key.clone();
                if let Err(err) = request.complete().await {
                    log::warn!("cache: revalidation of '{key}' failed: {err}");
                }
            })?;
        }
        self.state()
    }

    /// [`fetch`](Self::fetch) for callers that only want the side effect.
    pub fn refetch(&self, call: PartialConfig<E, D>) -> Result<(), CacheError> {
        self.fetch(call).map(|_| ())
    }

    /// Fetches now unless a request is pending or the last one is younger
    /// than the deduping interval. Resolves to the fetched data, to the
    /// still-cached data on failure, or to `None` when skipped.
    pub async fn revalidate(&self, call: PartialConfig<E, D>) -> Result<Option<D>, CacheError> {
        let Some((key, atom)) = &self.slot else {
            return Ok(None);
        };
        let config = self.resolve(&call);
        match self.begin(key, atom, &config)? {
            Some(request) => request.complete().await,
            None => Ok(None),
        }
    }

    /// Applies `mutation` optimistically, then revalidates unless told not to.
    pub async fn mutate(
        &self,
        mutation: impl Into<Mutation<D>>,
        call: PartialConfig<E, D>,
    ) -> Result<Option<D>, CacheError> {
        let Some((key, atom)) = &self.slot else {
            return Ok(None);
        };
        let config = self.resolve(&call);
        if config.revalidate && config.fetcher.is_none() {
            return Err(CacheError::NoFetcher(key.clone()));
        }

        let store = self.cache.store();
        let pending = {
            let current = store.state(atom)?;
            mutation.into().start(current.data())
        };
        let data = pending.await;
        store.dispatch(atom, Action::Mutate { data: data.clone() })?;

        if !config.revalidate {
            return Ok(Some(data));
        }
        match self.begin(key, atom, &config)? {
            Some(request) => request.complete().await,
            None => Ok(None),
        }
    }

    pub fn add_change_listener(
        &self,
        handler: impl Fn(&EntryState<E, D>) + 'static,
    ) -> Result<Subscription, CacheError> {
        match &self.slot {
            None => Ok(Subscription::noop()),
            Some((_, atom)) => Ok(self.cache.store().add_change_listener(atom, handler)?),
        }
    }

    pub fn remove_change_listener(&self, id: ListenerId) -> Result<bool, CacheError> {
        match &self.slot {
            None => Ok(false),
            Some((_, atom)) => Ok(self.cache.store().remove_change_listener(atom, id)?),
        }
    }

    /// Synchronous half of a revalidation: dedupe checks, VOID, REQUEST and
    /// the fetcher call. `None` means skipped.
    fn begin(
        &self,
        key: &StaticKey,
        atom: &EntryAtom<E, D>,
        config: &Config<E, D>,
    ) -> Result<Option<InFlight<E, D>>, CacheError> {
        let store = self.cache.store();
        let now = self.cache.now_ms();
        let state = store.state(atom)?;

        if state.status() == Status::Pending {
            log::debug!("cache: '{key}' already pending; skipping");
            return Ok(None);
        }
        let interval = i64::try_from(config.deduping_interval.as_millis()).unwrap_or(i64::MAX);
        if state.timestamp != NEVER && now - state.timestamp < interval {
            log::debug!(
                "cache: '{key}' fetched {}ms ago; deduped",
                now - state.timestamp
            );
            return Ok(None);
        }
        let fetcher = config
            .fetcher
            .clone()
            .ok_or_else(|| CacheError::NoFetcher(key.clone()))?;

        if config.void_cache {
            store.dispatch(atom, Action::Void)?;
        }
        store.dispatch(atom, Action::Request { timestamp: now })?;
        log::debug!("cache: fetching '{key}' @{now}");

        Ok(Some(InFlight {
            store: store.clone(),
            atom: *atom,
            key: key.clone(),
            timestamp: now,
            previous: state,
            response: fetcher(key.clone()),
            settled: false,
        }))
    }
}

impl<E: 'static, D: Clone + 'static> InFlight<E, D> {
    /// Awaits the fetcher and applies its outcome under the request's timestamp.
    async fn complete(mut self) -> Result<Option<D>, CacheError> {
        let outcome = (&mut self.response).await;
        self.settled = true;

        let (key, timestamp) = (&self.key, self.timestamp);
        match outcome {
            FetchOutcome::Success(data) => {
                log::debug!("cache: '{key}' @{timestamp} succeeded");
                self.store.dispatch(
                    &self.atom,
                    Action::Success {
                        data: data.clone(),
                        timestamp,
                    },
                )?;
                Ok(Some(data))
            }
            FetchOutcome::Failure(error) => {
                log::debug!("cache: '{key}' @{timestamp} failed");
                self.store
                    .dispatch(&self.atom, Action::Failure { error, timestamp })?;
                Ok(self.store.state(&self.atom)?.data().cloned())
            }
        }
    }
}

impl<E: 'static, D: Clone + 'static> Drop for InFlight<E, D> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        log::debug!(
            "cache: request for '{}' @{} abandoned; restoring entry",
            self.key,
            self.timestamp
        );
        let abort = Action::Abort {
            timestamp: self.timestamp,
            previous: self.previous.clone(),
        };
        if let Err(err) = self.store.dispatch(&self.atom, abort) {
            log::warn!("cache: could not restore '{}': {err}", self.key);
        }
    }
}

impl<E, D> fmt::Debug for Entry<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.slot.as_ref().map(|(key, _)| key))
            .finish()
    }
}
