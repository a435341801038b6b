//! Chain combinators onto a pending `Result` before awaiting it.
//!
//! ```ignore
//! let name = mediator
//!     .send(GetInstruction { id })
//!     .map(|instruction| instruction.instruction)
//!     .map_err(|err| err.to_string())
//!     .await?;
//! ```
//!
//! Nothing runs until the final `.await`. Every combinator consumes the
//! wrapper, so a computation is awaited at most once.

use crate::BoxFuture;
use futures::FutureExt;
use std::fmt::Debug;
use std::future::{Future, IntoFuture};

/// A pending computation producing `Result<T, E>`.
#[must_use = "a ResultFuture does nothing until awaited"]
pub struct ResultFuture<'a, T, E> {
    inner: BoxFuture<'a, Result<T, E>>,
}

impl<'a, T, E> ResultFuture<'a, T, E>
where
    T: Send + 'a,
    E: Send + 'a,
{
    /// Wraps a pending computation.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// Wraps an already available result.
    pub fn ready(result: Result<T, E>) -> Self {
        Self::new(futures::future::ready(result))
    }

    /// Transforms the success value once the computation completes.
    pub fn map<U, F>(self, f: F) -> ResultFuture<'a, U, E>
    where
        U: Send + 'a,
        F: FnOnce(T) -> U + Send + 'a,
    {
        ResultFuture::new(self.inner.map(|result| result.map(f)))
    }

    /// Chains a dependent asynchronous step that runs only on success.
    pub fn and_then<U, F, Fut>(self, f: F) -> ResultFuture<'a, U, E>
    where
        U: Send + 'a,
        F: FnOnce(T) -> Fut + Send + 'a,
        Fut: IntoFuture<Output = Result<U, E>>,
        Fut::IntoFuture: Send + 'a,
    {
        ResultFuture::new(async move {
            match self.inner.await {
                Ok(value) => f(value).await,
                Err(err) => Err(err),
            }
        })
    }

    /// Transforms the error once the computation completes.
    pub fn map_err<E2, F>(self, f: F) -> ResultFuture<'a, T, E2>
    where
        E2: Send + 'a,
        F: FnOnce(E) -> E2 + Send + 'a,
    {
        ResultFuture::new(self.inner.map(|result| result.map_err(f)))
    }

    /// Awaits the computation and returns the success value.
    ///
    /// # Panics
    ///
    /// Panics with the error's `Debug` output when the computation fails.
    pub fn unwrap(self) -> BoxFuture<'a, T>
    where
        E: Debug,
    {
        self.inner
            .map(|result| match result {
                Ok(value) => value,
                Err(err) => panic!("called `ResultFuture::unwrap()` on an `Err` value: {err:?}"),
            })
            .boxed()
    }

    /// Awaits the computation and returns the success value.
    ///
    /// # Panics
    ///
    /// Panics with `message` and the error's `Debug` output when the
    /// computation fails.
    pub fn expect(self, message: &'a str) -> BoxFuture<'a, T>
    where
        E: Debug,
    {
        self.inner
            .map(move |result| match result {
                Ok(value) => value,
                Err(err) => panic!("{message}: {err:?}"),
            })
            .boxed()
    }
}

impl<'a, T, E> IntoFuture for ResultFuture<'a, T, E> {
    type Output = Result<T, E>;
    type IntoFuture = BoxFuture<'a, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

impl<T, E> std::fmt::Debug for ResultFuture<'_, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultFuture").finish_non_exhaustive()
    }
}
