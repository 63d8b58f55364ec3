use nucleon_core::StoreError;
use thiserror::Error;

use crate::StaticKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A fetch was required but no fetcher is configured for this data type.
    #[error("no fetcher configured for `{0}`")]
    NoFetcher(StaticKey),
    /// The slot already holds entries of another `(error, data)` type.
    #[error("cache key `{key}` is already used with a different type than {requested}")]
    TypeMismatch {
        key: StaticKey,
        requested: &'static str,
    },
    /// The background half of a fetch could not be scheduled (the executor
    /// is gone). The entry is left as it was before the request.
    #[error("could not schedule revalidation of `{0}`: executor is shut down")]
    Spawn(StaticKey),
    #[error(transparent)]
    Store(#[from] StoreError),
}
