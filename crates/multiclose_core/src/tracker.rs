//! A stack of resources that may close themselves before the tracker does.
//!
//! [`CloseableTracker`] closes whatever it still holds in reverse order of
//! addition, like [`CloseableCollection`](crate::collection::CloseableCollection),
//! but also lets callers hand resources back with
//! [`remove`](CloseableTracker::remove), and forgets resources that report
//! themselves closed through [`TrackedClose::is_closed`].
//!
//! # Sweeping
//!
//! Every [`add`](CloseableTracker::add) and [`remove`](CloseableTracker::remove)
//! discards entries whose `is_closed()` returns `true`. Discarded entries are
//! never closed by the tracker. Resources added with
//! [`add_auto`](CloseableTracker::add_auto) cannot report their state and are
//! only released by `remove` or `close`.
//!
//! # Example
//!
//! ```
//! use multiclose_core::close::{TrackedClose, closer};
//! use multiclose_core::tracker::CloseableTracker;
//!
//! let tracker = CloseableTracker::new();
//! let session = tracker.add(closer(|| Ok(())));
//! let lease = tracker.add(closer(|| Ok(())));
//!
//! // The session is handed off elsewhere; the tracker no longer owns it.
//! assert!(tracker.remove(&session));
//!
//! tracker.close()?;
//! assert!(lease.is_closed());
//! assert!(!session.is_closed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::close::{BoxError, Close, TrackedClose};
use crate::drain::{ErrorFactory, drain};
use crate::error::{AggregateError, ClosingResourceFailed};
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// A held resource.
enum Entry {
    /// Can report its own closed state and is eligible for sweeping.
    Tracked(Arc<dyn TrackedClose>),
    /// Added with `add_auto`; never swept.
    Plain(Arc<dyn Close>),
}

impl Entry {
    fn is_closed(&self) -> bool {
        match self {
            Self::Tracked(resource) => resource.is_closed(),
            Self::Plain(_) => false,
        }
    }

    /// Identity comparison by allocation address.
    fn is<T: ?Sized>(&self, resource: &Arc<T>) -> bool {
        let target = Arc::as_ptr(resource);
        match self {
            Self::Tracked(held) => core::ptr::addr_eq(Arc::as_ptr(held), target),
            Self::Plain(held) => core::ptr::addr_eq(Arc::as_ptr(held), target),
        }
    }
}

impl Close for Entry {
    fn close(&self) -> Result<(), BoxError> {
        match self {
            Self::Tracked(resource) => resource.close(),
            Self::Plain(resource) => resource.close(),
        }
    }
}

/// Drops entries that report themselves closed, without closing them.
fn sweep(entries: &mut Vec<Entry>) {
    let before = entries.len();
    entries.retain(|entry| !entry.is_closed());
    let swept = before - entries.len();
    if swept > 0 {
        tracing::trace!(swept, remaining = entries.len(), "swept closed resources");
    }
}

/// A thread-safe stack of resources supporting early removal.
///
/// Unlike the collection, the tracker keeps no closed flag: `close()` simply
/// drains whatever is held, so a tracker can keep accepting resources after it
/// has been closed and repeated calls on an empty tracker do nothing. Every
/// pop is atomic, so concurrent `close()` calls never close the same resource
/// twice, but their failures are split between the callers that popped the
/// failing resources.
///
/// `is_closed()` is called while the tracker's lock is held and must not call
/// back into the tracker.
pub struct CloseableTracker<E: AggregateError = ClosingResourceFailed> {
    /// Held resources in acquisition order; the top of the stack is the end.
    entries: Mutex<Vec<Entry>>,
    errors: ErrorFactory<E>,
}

impl CloseableTracker<ClosingResourceFailed> {
    /// Creates an empty tracker that reports failures as
    /// [`ClosingResourceFailed`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_errors(ClosingResourceFailed::aggregate)
    }
}

impl Default for CloseableTracker<ClosingResourceFailed> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: AggregateError> CloseableTracker<E> {
    /// Creates an empty tracker whose close failures are aggregated into errors
    /// produced by `errors`.
    #[must_use]
    pub fn with_errors<F>(errors: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        Self {
            entries: Mutex::new(Vec::new()),
            errors: Box::new(errors),
        }
    }

    /// Tracks `resource`, then sweeps entries that report themselves closed.
    ///
    /// A resource that is already closed when added is swept right away.
    pub fn add<T: TrackedClose + 'static>(&self, resource: Arc<T>) -> Arc<T> {
        let mut entries = self.entries.lock();
        entries.push(Entry::Tracked(Arc::clone(&resource) as Arc<dyn TrackedClose>));
        sweep(&mut entries);
        resource
    }

    /// Tracks a resource that cannot report its own closed state.
    ///
    /// Such a resource stays tracked until it is removed or the tracker is
    /// closed. No sweep is performed.
    pub fn add_auto<T: Close + 'static>(&self, resource: Arc<T>) -> Arc<T> {
        self.entries
            .lock()
            .push(Entry::Plain(Arc::clone(&resource) as Arc<dyn Close>));
        resource
    }

    /// Stops tracking `resource` without closing it, then sweeps.
    ///
    /// Matching is by identity: `resource` must point to the same allocation
    /// that was added. If it was added more than once, the most recent entry
    /// is removed. Returns `false` if the resource was not tracked.
    pub fn remove<T: ?Sized>(&self, resource: &Arc<T>) -> bool {
        let mut entries = self.entries.lock();
        let position = entries.iter().rposition(|entry| entry.is(resource));
        if let Some(position) = position {
            entries.remove(position);
        }
        sweep(&mut entries);
        position.is_some()
    }

    /// Returns the number of tracked resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Closes every tracked resource, most recently added first.
    ///
    /// Every resource is attempted even if some fail. Calling this on an empty
    /// tracker returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns one aggregate error carrying every close failure observed by
    /// this call, in the order the failing resources were closed.
    pub fn close(&self) -> Result<(), E> {
        drain(|| self.entries.lock().pop(), &*self.errors)
    }
}

impl<E: AggregateError> Drop for CloseableTracker<E> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(
                error = %error,
                failed = error.suppressed().len(),
                "resources failed to close while dropping tracker"
            );
        }
    }
}

impl<E: AggregateError> fmt::Debug for CloseableTracker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseableTracker")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
