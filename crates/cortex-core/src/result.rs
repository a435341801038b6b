//! Result aliases and combinators.
//!
//! Cortex uses the standard `Result` everywhere; this module adds fail-fast
//! and fail-complete aggregation plus the single place where a panic is
//! turned into an `Err`.

use crate::{CortexError, RepositoryError, UseCaseError};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

/// A specialized `Result` type for process-level operations.
pub type CortexResult<T> = Result<T, CortexError>;

/// A specialized `Result` type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A specialized `Result` type for use-case handlers.
pub type UseCaseResult<T> = Result<T, UseCaseError>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the first error in input order, or every value in input order.
pub fn combine<T, E, I>(results: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    results.into_iter().collect()
}

/// Consumes every result and collects all errors in input order.
pub fn combine_all<T, E, I>(results: I) -> Result<Vec<T>, AggregateErr<E>>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(AggregateErr { errors })
    }
}

/// Every error collected by [`combine_all`], in input order.
///
/// Only `combine_all` builds this, so the list is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateErr<E> {
    errors: Vec<E>,
}

impl<E> AggregateErr<E> {
    /// Returns the collected errors.
    #[must_use]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    /// Consumes the aggregate, returning the collected errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }

    /// Returns the number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` when no errors were collected, which `combine_all` never produces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for AggregateErr<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple errors occurred ({}): [", self.errors.len())?;
        for (index, err) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}

impl<E> std::error::Error for AggregateErr<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// Aggregation over fixed-size tuples of results sharing one error type.
pub trait Combine {
    /// Tuple of success values.
    type Output;
    /// Shared error type.
    type Error;

    /// Fail-fast: the left-most error wins.
    fn combine(self) -> Result<Self::Output, Self::Error>;

    /// Fail-complete: every error, left to right.
    fn combine_all(self) -> Result<Self::Output, AggregateErr<Self::Error>>;
}

macro_rules! impl_combine_tuple {
    ($($ty:ident $value:ident),+) => {
        impl<E, $($ty),+> Combine for ($(Result<$ty, E>,)+) {
            type Output = ($($ty,)+);
            type Error = E;

            fn combine(self) -> Result<Self::Output, E> {
                let ($($value,)+) = self;
                Ok(($($value?,)+))
            }

            fn combine_all(self) -> Result<Self::Output, AggregateErr<E>> {
                let ($($value,)+) = self;
                let mut errors = Vec::new();
                $(
                    let $value = match $value {
                        Ok(value) => Some(value),
                        Err(err) => {
                            errors.push(err);
                            None
                        }
                    };
                )+
                if let ($(Some($value),)+) = ($($value,)+) {
                    return Ok(($($value,)+));
                }
                Err(AggregateErr { errors })
            }
        }
    };
}

impl_combine_tuple!(A a, B b);
impl_combine_tuple!(A a, B b, C c);
impl_combine_tuple!(A a, B b, C c, D d);
impl_combine_tuple!(A a, B b, C c, D d, F f);
impl_combine_tuple!(A a, B b, C c, D d, F f, G g);
impl_combine_tuple!(A a, B b, C c, D d, F f, G g, H h);
impl_combine_tuple!(A a, B b, C c, D d, F f, G g, H h, I i);

/// A panic captured by [`safe`] or [`safe_async`].
///
/// The payload is kept exactly as it was thrown.
pub struct Panic {
    payload: Box<dyn Any + Send>,
}

impl Panic {
    /// Returns the raw panic payload.
    #[must_use]
    pub fn payload(&self) -> &(dyn Any + Send) {
        &*self.payload
    }

    /// Consumes the error, returning the raw payload.
    #[must_use]
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// Downcasts the payload to a concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Returns the panic message when the payload is a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        if let Some(message) = self.payload.downcast_ref::<&'static str>() {
            return Some(*message);
        }
        self.payload.downcast_ref::<String>().map(String::as_str)
    }

    /// Re-raises the captured panic.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panic").field("message", &self.message()).finish()
    }
}

impl fmt::Display for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "panicked: {message}"),
            None => f.write_str("panicked with a non-string payload"),
        }
    }
}

impl std::error::Error for Panic {}

/// Runs `f`, turning a panic into `Err(Panic)`.
pub fn safe<T, F>(f: F) -> Result<T, Panic>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Panic { payload })
}

/// Awaits `future`, turning a panic during polling into `Err(Panic)`.
pub async fn safe_async<F>(future: F) -> Result<F::Output, Panic>
where
    F: Future,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| Panic { payload })
}
