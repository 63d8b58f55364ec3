use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::Fetcher;

pub const DEFAULT_DEDUPING_INTERVAL: Duration = Duration::from_secs(2);

/// Fully resolved options for one cache operation.
pub struct Config<E, D> {
    /// Minimum spacing between two accepted revalidations of an entry.
    pub deduping_interval: Duration,
    pub fetcher: Option<Fetcher<E, D>>,
    /// Whether `fetch`/`mutate` go to the fetcher at all.
    pub revalidate: bool,
    /// Reset the entry to pristine right before revalidating.
    pub void_cache: bool,
}

impl<E, D> Clone for Config<E, D> {
    fn clone(&self) -> Self {
        Self {
            deduping_interval: self.deduping_interval,
            fetcher: self.fetcher.clone(),
            revalidate: self.revalidate,
            void_cache: self.void_cache,
        }
    }
}

impl<E, D> fmt::Debug for Config<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("deduping_interval", &self.deduping_interval)
            .field("fetcher", &self.fetcher.is_some())
            .field("revalidate", &self.revalidate)
            .field("void_cache", &self.void_cache)
            .finish()
    }
}

/// One override layer (entry or call site). Unset fields fall through.
pub struct PartialConfig<E, D> {
    pub deduping_interval: Option<Duration>,
    pub fetcher: Option<Fetcher<E, D>>,
    pub revalidate: Option<bool>,
    pub void_cache: Option<bool>,
}

impl<E, D> Default for PartialConfig<E, D> {
    fn default() -> Self {
        Self {
            deduping_interval: None,
            fetcher: None,
            revalidate: None,
            void_cache: None,
        }
    }
}

impl<E, D> Clone for PartialConfig<E, D> {
    fn clone(&self) -> Self {
        Self {
            deduping_interval: self.deduping_interval,
            fetcher: self.fetcher.clone(),
            revalidate: self.revalidate,
            void_cache: self.void_cache,
        }
    }
}

impl<E, D> PartialConfig<E, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deduping_interval(mut self, interval: Duration) -> Self {
        self.deduping_interval = Some(interval);
        self
    }

    pub fn fetcher(mut self, fetcher: Fetcher<E, D>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn revalidate(mut self, revalidate: bool) -> Self {
        self.revalidate = Some(revalidate);
        self
    }

    pub fn void_cache(mut self, void_cache: bool) -> Self {
        self.void_cache = Some(void_cache);
        self
    }

    /// Layers `over` on top of `self`; fields set in `over` win.
    pub fn merge(&self, over: &Self) -> Self {
        Self {
            deduping_interval: over.deduping_interval.or(self.deduping_interval),
            fetcher: over.fetcher.clone().or_else(|| self.fetcher.clone()),
            revalidate: over.revalidate.or(self.revalidate),
            void_cache: over.void_cache.or(self.void_cache),
        }
    }
}

/// Cache-wide defaults, shared by every entry regardless of its data type.
///
/// Fetchers are registered per `(E, D)` pair and picked up by entries of
/// exactly that type.
#[derive(Clone, Default)]
pub struct CacheConfig {
    pub deduping_interval: Option<Duration>,
    pub revalidate: Option<bool>,
    pub void_cache: Option<bool>,
    fetchers: HashMap<TypeId, Rc<dyn Any>>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deduping_interval(mut self, interval: Duration) -> Self {
        self.deduping_interval = Some(interval);
        self
    }

    pub fn revalidate(mut self, revalidate: bool) -> Self {
        self.revalidate = Some(revalidate);
        self
    }

    pub fn void_cache(mut self, void_cache: bool) -> Self {
        self.void_cache = Some(void_cache);
        self
    }

    pub fn fetcher<E: 'static, D: 'static>(mut self, fetcher: Fetcher<E, D>) -> Self {
        self.fetchers
            .insert(TypeId::of::<Fetcher<E, D>>(), Rc::new(fetcher));
        self
    }

    fn layer<E: 'static, D: 'static>(&self) -> PartialConfig<E, D> {
        PartialConfig {
            deduping_interval: self.deduping_interval,
            fetcher: self
                .fetchers
                .get(&TypeId::of::<Fetcher<E, D>>())
                .and_then(|f| f.downcast_ref::<Fetcher<E, D>>())
                .cloned(),
            revalidate: self.revalidate,
            void_cache: self.void_cache,
        }
    }

    /// defaults <- cache <- entry <- call
    pub fn resolve<E: 'static, D: 'static>(
        &self,
        entry: &PartialConfig<E, D>,
        call: &PartialConfig<E, D>,
    ) -> Config<E, D> {
        let merged = self.layer().merge(entry).merge(call);
        Config {
            deduping_interval: merged
                .deduping_interval
                .unwrap_or(DEFAULT_DEDUPING_INTERVAL),
            fetcher: merged.fetcher,
            revalidate: merged.revalidate.unwrap_or(true),
            void_cache: merged.void_cache.unwrap_or(false),
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("deduping_interval", &self.deduping_interval)
            .field("revalidate", &self.revalidate)
            .field("void_cache", &self.void_cache)
            .field("fetchers", &self.fetchers.len())
            .finish()
    }
}
