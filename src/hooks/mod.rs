//! Interception hooks.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → Misdirector (may replace the target URL)
//!     → Mangler<InboundRequest> (edits the request in place)
//!     → [relay to upstream]
//!     → Mangler<ResponseRecord> (edits the captured response in place)
//!     → replay to client
//! ```
//!
//! # Design Decisions
//! - One trait per hook shape; combinators implement the same trait so they nest
//! - Manglers receive a [`Shared`] handle instead of `&mut T` so that
//!   [`UnorderedAll`] can hand the same value to several running sub-hooks
//! - [`Identity`] is the explicit no-op injected for every unset slot

pub mod combinators;
pub mod rules;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{self, BoxFuture};

use crate::http::url::ParsedUrl;

pub use combinators::{OrderedAll, UnorderedAll};

/// Error raised by a hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The hook reported a failure.
    #[error("hook `{name}` failed: {reason}")]
    Failed { name: String, reason: String },

    /// A mangler kept a clone of its handle after completing.
    #[error("hook kept a handle to the value it was mangling")]
    Retained,
}

impl HookError {
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        HookError::Failed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type HookResult = Result<(), HookError>;

/// Handle to a value being mangled.
///
/// Locks are short and never held across an `.await`.
#[derive(Debug)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Lock the value. A poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Take the value back once every hook has finished with it.
    pub fn into_inner(self) -> Result<T, HookError> {
        Arc::try_unwrap(self.0)
            .map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
            .map_err(|_| HookError::Retained)
    }
}

/// A hook that edits a value in place and signals completion.
pub trait Mangler<T>: Send + Sync {
    fn mangle(&self, target: Shared<T>) -> BoxFuture<'_, HookResult>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<T, M> Mangler<T> for Arc<M>
where
    M: Mangler<T> + ?Sized,
{
    fn mangle(&self, target: Shared<T>) -> BoxFuture<'_, HookResult> {
        (**self).mangle(target)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A hook that may send a request to a different URL.
///
/// `Ok(None)` and `Ok(Some(url))` with `url == input` both mean "no change".
pub trait Misdirector: Send + Sync {
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<M> Misdirector for Arc<M>
where
    M: Misdirector + ?Sized,
{
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        (**self).misdirect(url)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl Misdirector for Box<dyn Misdirector> {
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        (**self).misdirect(url)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The no-op hook: leaves values untouched and never misdirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<T> Mangler<T> for Identity {
    fn mangle(&self, _target: Shared<T>) -> BoxFuture<'_, HookResult> {
        Box::pin(future::ready(Ok(())))
    }

    fn name(&self) -> &str {
        "identity"
    }
}

impl Misdirector for Identity {
    fn misdirect(&self, _url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Synchronous mangler built from a closure.
pub struct FnMangler<F> {
    name: String,
    f: F,
}

/// Wrap a synchronous closure as a mangler.
pub fn mangler_fn<T, F>(name: impl Into<String>, f: F) -> FnMangler<F>
where
    F: Fn(&mut T) -> HookResult + Send + Sync,
{
    FnMangler {
        name: name.into(),
        f,
    }
}

impl<T, F> Mangler<T> for FnMangler<F>
where
    F: Fn(&mut T) -> HookResult + Send + Sync,
{
    fn mangle(&self, target: Shared<T>) -> BoxFuture<'_, HookResult> {
        let result = target.with(|value| (self.f)(value));
        Box::pin(future::ready(result))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Asynchronous mangler built from a closure returning a future.
pub struct AsyncFnMangler<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as a mangler.
pub fn async_mangler_fn<T, F, Fut>(name: impl Into<String>, f: F) -> AsyncFnMangler<F>
where
    F: Fn(Shared<T>) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    AsyncFnMangler {
        name: name.into(),
        f,
    }
}

impl<T, F, Fut> Mangler<T> for AsyncFnMangler<F>
where
    F: Fn(Shared<T>) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    fn mangle(&self, target: Shared<T>) -> BoxFuture<'_, HookResult> {
        Box::pin((self.f)(target))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Misdirector built from a closure.
pub struct FnMisdirector<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a misdirector.
pub fn misdirector_fn<F>(name: impl Into<String>, f: F) -> FnMisdirector<F>
where
    F: Fn(&ParsedUrl) -> Option<ParsedUrl> + Send + Sync,
{
    FnMisdirector {
        name: name.into(),
        f,
    }
}

impl<F> Misdirector for FnMisdirector<F>
where
    F: Fn(&ParsedUrl) -> Option<ParsedUrl> + Send + Sync,
{
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        Ok((self.f)(url))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
