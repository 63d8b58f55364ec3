//! # Revalidating fetch cache
//!
//! A [`Cache`] turns an async fetcher into per-key state that UI code can
//! render and subscribe to. Every key owns one entry, which moves through
//!
//! ```text
//! PRISTINE --REQUEST--> PENDING --SUCCESS--> SUCCESS
//!                              \--FAILURE--> FAILURE
//! any --VOID--> PRISTINE        any --MUTATE--> SUCCESS
//! ```
//!
//! Each request is stamped with the clock at dispatch time; its response is
//! only applied if no later request was stamped in between. Concurrent
//! requests for the same key collapse into one (an entry that is pending, or
//! was requested within `deduping_interval`, is not fetched again).
//!
//! ```rust
//! use futures::executor::LocalPool;
//! use nucleon_cache::*;
//!
//! let mut pool = LocalPool::new();
//! let users = fetcher(|key: StaticKey| async move {
//!     FetchOutcome::<String, String>::Success(format!("profile of {key}"))
//! });
//! let cache = Cache::builder(pool.spawner())
//!     .config(CacheConfig::new().fetcher(users))
//!     .build();
//!
//! let me = cache.entry::<String, String>(["user", "42"]).unwrap();
//! assert_eq!(me.fetch(PartialConfig::new()).unwrap().status(), Status::Pending);
//!
//! pool.run_until_stalled();
//! let snapshot = me.state().unwrap();
//! assert_eq!(snapshot.data().map(String::as_str), Some("profile of user:42"));
//! ```
//!
//! Configuration is layered: built-in defaults, then [`CacheConfig`], then
//! the entry's [`PartialConfig`], then the one passed to each call.
//!
//! The cache is single-threaded (`Rc` inside) and never evicts entries; key
//! spaces are expected to be bounded.

pub mod cache;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod key;
pub mod state;
mod tests;

pub use cache::{Cache, CacheBuilder, use_cache, with_cache};
pub use clock::*;
pub use config::*;
pub use entry::Entry;
pub use error::*;
pub use fetcher::*;
pub use key::*;
pub use state::{EntryState, NEVER, Phase, Snapshot, Status};

pub use nucleon_core::{ListenerId, Subscription};
