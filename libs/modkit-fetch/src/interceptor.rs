//! Request/response interceptor chains.
//!
//! Each chain is an `ArcSwap`-held list updated copy-on-write. A run loads
//! the current list once and walks that snapshot, so registrations and
//! removals made while a request is in flight only affect later runs.

use crate::error::BoxError;
use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Async transform applied to every request or response passing through a
/// [`FetchClient`](crate::FetchClient).
///
/// Implemented for any `Fn(T) -> impl Future<Output = Result<T, BoxError>>`
/// closure, so plain async closures can be registered directly:
///
/// ```ignore
/// client.add_request_interceptor(|mut req: FetchRequest| async move {
///     req.headers.insert("authorization".into(), "Bearer token".into());
///     Ok(req)
/// });
/// ```
pub trait Interceptor<T>: Send + Sync + 'static {
    /// Transform the value; an error aborts the request.
    fn intercept(&self, value: T) -> BoxFuture<'static, Result<T, BoxError>>;
}

impl<T, F, Fut> Interceptor<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    fn intercept(&self, value: T) -> BoxFuture<'static, Result<T, BoxError>> {
        Box::pin(self(value))
    }
}

struct Registered<T> {
    id: u64,
    interceptor: Arc<dyn Interceptor<T>>,
}

impl<T> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

struct Slots<T> {
    entries: ArcSwap<Vec<Registered<T>>>,
}

trait Deregister: Send + Sync {
    fn deregister(&self, id: u64);
}

impl<T: 'static> Deregister for Slots<T> {
    fn deregister(&self, id: u64) {
        self.entries.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

/// Ordered interceptor list shared by all clones of a client
pub(crate) struct InterceptorChain<T> {
    slots: Arc<Slots<T>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for InterceptorChain<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T: Send + 'static> InterceptorChain<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(Slots {
                entries: ArcSwap::from_pointee(Vec::new()),
            }),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an interceptor and return its removal handle
    pub(crate) fn register(&self, interceptor: Arc<dyn Interceptor<T>>) -> InterceptorHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Registered { id, interceptor };

        self.slots.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });

        let slots: Arc<dyn Deregister> = self.slots.clone();
        InterceptorHandle {
            id,
            slots: Arc::downgrade(&slots),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.entries.load().len()
    }

    /// Pass `value` through a snapshot of the chain, one interceptor at a time.
    pub(crate) async fn run(&self, mut value: T) -> Result<T, BoxError> {
        let snapshot = self.slots.entries.load_full();
        for entry in snapshot.iter() {
            value = entry.interceptor.intercept(value).await?;
        }
        Ok(value)
    }
}

/// Removal capability returned by interceptor registration.
///
/// Dropping the handle keeps the interceptor registered; call
/// [`remove`](Self::remove) to unregister it. Removing twice is a no-op.
#[derive(Clone)]
pub struct InterceptorHandle {
    id: u64,
    slots: Weak<dyn Deregister>,
}

impl InterceptorHandle {
    /// Remove exactly the interceptor this handle was returned for.
    pub fn remove(&self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.deregister(self.id);
        }
    }
}

impl std::fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
