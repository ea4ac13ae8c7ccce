//! Closing capabilities.
//!
//! This module provides the two capability traits the containers work with:
//!
//! - [`Close`] - Anything that can be closed, possibly failing
//! - [`TrackedClose`] - A [`Close`] that can also report whether it is already closed
//!
//! Containers hold resources as `Arc<T>` so that the caller keeps its own
//! handle and may still use, or close, the resource directly.
//!
//! [`closer`] adapts a one-shot teardown closure into a resource.

use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// Error produced by a single resource that failed to close.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A resource with a fallible close operation.
///
/// Implementations take `&self` because containers share the resource with the
/// caller. Use interior mutability (atomics, locks) to record closed state.
///
/// # Example
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use multiclose_core::close::{BoxError, Close};
///
/// struct Socket {
///     open: AtomicBool,
/// }
///
/// impl Close for Socket {
///     fn close(&self) -> Result<(), BoxError> {
///         self.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Close: Send + Sync {
    /// Closes the resource.
    ///
    /// # Errors
    ///
    /// Returns whatever error the underlying resource reports. Containers fold
    /// it into their aggregate error and keep closing the remaining resources.
    fn close(&self) -> Result<(), BoxError>;
}

/// A resource that can report whether it has already been closed.
///
/// [`CloseableTracker`](crate::tracker::CloseableTracker) uses this to forget
/// resources that were closed by someone else, without closing them again.
pub trait TrackedClose: Close {
    /// Returns `true` once the resource has been closed.
    fn is_closed(&self) -> bool;
}

impl<T: Close + ?Sized> Close for Arc<T> {
    fn close(&self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: Close + ?Sized> Close for Box<T> {
    fn close(&self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: TrackedClose + ?Sized> TrackedClose for Arc<T> {
    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CloseFn
// ─────────────────────────────────────────────────────────────────────────────

/// A resource backed by a teardown closure.
///
/// The closure runs on the first call to [`Close::close`]; later calls do
/// nothing and succeed. Created with [`closer`].
pub struct CloseFn<F> {
    teardown: Mutex<Option<F>>,
}

impl<F> CloseFn<F>
where
    F: FnOnce() -> Result<(), BoxError> + Send,
{
    /// Wraps a teardown closure.
    #[must_use]
    pub fn new(teardown: F) -> Self {
        Self {
            teardown: Mutex::new(Some(teardown)),
        }
    }
}

impl<F> Close for CloseFn<F>
where
    F: FnOnce() -> Result<(), BoxError> + Send,
{
    fn close(&self) -> Result<(), BoxError> {
        // Take the closure out before running it so the lock is not held
        // across user code.
        let teardown = self.teardown.lock().take();
        match teardown {
            Some(teardown) => teardown(),
            None => Ok(()),
        }
    }
}

impl<F> TrackedClose for CloseFn<F>
where
    F: FnOnce() -> Result<(), BoxError> + Send,
{
    fn is_closed(&self) -> bool {
        self.teardown.lock().is_none()
    }
}

impl<F> fmt::Debug for CloseFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseFn")
            .field("closed", &self.teardown.lock().is_none())
            .finish()
    }
}

/// Creates a shareable resource that runs `teardown` when closed.
///
/// # Example
///
/// ```
/// use multiclose_core::close::{Close, TrackedClose, closer};
///
/// let guard = closer(|| {
///     // release a lock, remove a temp dir, ...
///     Ok(())
/// });
///
/// assert!(!guard.is_closed());
/// guard.close().unwrap();
/// assert!(guard.is_closed());
/// ```
#[must_use]
pub fn closer<F>(teardown: F) -> Arc<CloseFn<F>>
where
    F: FnOnce() -> Result<(), BoxError> + Send,
{
    Arc::new(CloseFn::new(teardown))
}
