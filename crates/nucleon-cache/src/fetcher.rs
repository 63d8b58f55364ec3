use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::StaticKey;

/// Result of one fetcher call. Ordinary failures are data, not panics.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome<E, D> {
    Success(D),
    Failure(E),
}

impl<E, D> From<Result<D, E>> for FetchOutcome<E, D> {
    fn from(result: Result<D, E>) -> Self {
        match result {
            Ok(data) => FetchOutcome::Success(data),
            Err(error) => FetchOutcome::Failure(error),
        }
    }
}

/// Loads the data behind a key.
pub type Fetcher<E, D> = Rc<dyn Fn(StaticKey) -> LocalBoxFuture<'static, FetchOutcome<E, D>>>;

/// Adapts an async closure into a [`Fetcher`].
pub fn fetcher<E, D, F, Fut>(f: F) -> Fetcher<E, D>
where
    F: Fn(StaticKey) -> Fut + 'static,
    Fut: Future<Output = FetchOutcome<E, D>> + 'static,
{
    Rc::new(move |key| f(key).boxed_local())
}

/// Optimistic value for `Entry::mutate`.
pub enum Mutation<D> {
    Value(D),
    Future(LocalBoxFuture<'static, D>),
    /// Computed from the data currently cached, if any.
    Update(Box<dyn FnOnce(Option<&D>) -> D>),
    UpdateAsync(Box<dyn FnOnce(Option<&D>) -> LocalBoxFuture<'static, D>>),
}

impl<D: 'static> Mutation<D> {
    pub fn future(fut: impl Future<Output = D> + 'static) -> Self {
        Mutation::Future(fut.boxed_local())
    }

    pub fn update(f: impl FnOnce(Option<&D>) -> D + 'static) -> Self {
        Mutation::Update(Box::new(f))
    }

    pub fn update_async<Fut>(f: impl FnOnce(Option<&D>) -> Fut + 'static) -> Self
    where
        Fut: Future<Output = D> + 'static,
    {
        Mutation::UpdateAsync(Box::new(move |current| f(current).boxed_local()))
    }

    /// Calls the update function right away, leaving only the await.
    pub(crate) fn start(self, current: Option<&D>) -> LocalBoxFuture<'static, D> {
        match self {
            Mutation::Value(data) => futures::future::ready(data).boxed_local(),
            Mutation::Future(fut) => fut,
            Mutation::Update(f) => futures::future::ready(f(current)).boxed_local(),
            Mutation::UpdateAsync(f) => f(current),
        }
    }
}

impl<D> From<D> for Mutation<D> {
    fn from(data: D) -> Self {
        Mutation::Value(data)
    }
}

#[cfg(feature = "http")]
pub use http::{HttpError, http_json};

#[cfg(feature = "http")]
mod http {
    use futures::FutureExt;
    use serde::de::DeserializeOwned;
    use thiserror::Error;

    use super::{FetchOutcome, Fetcher};
    use crate::StaticKey;

    #[derive(Debug, Error)]
    pub enum HttpError {
        #[error("request failed: {0}")]
        Transport(#[from] reqwest::Error),
        #[error("server answered {0}")]
        Status(reqwest::StatusCode),
    }

    /// GETs the key (first element of a tuple key) as a URL and decodes the
    /// JSON body. Needs a tokio reactor on the spawning executor.
    ///
    /// Not installed by default; register it per data type with
    /// `CacheConfig::fetcher(http_json::<D>())`.
    pub fn http_json<D: DeserializeOwned + 'static>() -> Fetcher<HttpError, D> {
        let client = reqwest::Client::new();
        std::rc::Rc::new(move |key: StaticKey| {
            let request = client.get(key.first());
            async move {
                let run = async {
                    let response = request.send().await?;
                    if !response.status().is_success() {
                        return Err(HttpError::Status(response.status()));
                    }
                    Ok::<D, HttpError>(response.json::<D>().await?)
                };
                FetchOutcome::from(run.await)
            }
            .boxed_local()
        })
    }
}
