//! A stack of resources closed together, last in first out.
//!
//! [`CloseableCollection`] accumulates resources as they are acquired and
//! closes all of them when the collection is closed, in reverse order of
//! acquisition. Closing is one-shot: the first `close()` drains the stack,
//! every later or concurrent call returns immediately, and the collection
//! rejects further additions.
//!
//! # Example
//!
//! ```
//! use core::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use multiclose_core::close::{BoxError, Close};
//! use multiclose_core::collection::CloseableCollection;
//!
//! #[derive(Default)]
//! struct Handle {
//!     closed: AtomicBool,
//! }
//!
//! impl Close for Handle {
//!     fn close(&self) -> Result<(), BoxError> {
//!         self.closed.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let resources = CloseableCollection::new();
//! let config = resources.add(Arc::new(Handle::default()))?;
//! let data = resources.add(Arc::new(Handle::default()))?;
//! assert_eq!(resources.len(), 2);
//!
//! // `data` is closed first, then `config`.
//! resources.close()?;
//!
//! assert!(config.closed.load(Ordering::SeqCst));
//! assert!(data.closed.load(Ordering::SeqCst));
//! assert!(resources.add(Arc::new(Handle::default())).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::close::Close;
use crate::drain::{ErrorFactory, drain};
use crate::error::{AggregateError, ClosingResourceFailed, CollectionClosed};
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;

/// A thread-safe stack of resources closed in reverse order of addition.
///
/// `E` is the aggregate error returned when at least one resource fails to
/// close. It is created by the factory given to
/// [`with_errors`](CloseableCollection::with_errors), only when a failure
/// actually occurs.
///
/// Dropping a collection closes anything it still holds. Failures observed
/// during drop cannot be returned and are logged instead, so prefer calling
/// [`close`](CloseableCollection::close) explicitly.
pub struct CloseableCollection<E: AggregateError = ClosingResourceFailed> {
    /// Held resources in acquisition order; the top of the stack is the end.
    stack: Mutex<Vec<Arc<dyn Close>>>,
    /// Set by the one caller allowed to drain.
    closed: AtomicBool,
    errors: ErrorFactory<E>,
}

impl CloseableCollection<ClosingResourceFailed> {
    /// Creates an empty collection that reports failures as
    /// [`ClosingResourceFailed`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_errors(ClosingResourceFailed::aggregate)
    }
}

impl Default for CloseableCollection<ClosingResourceFailed> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: AggregateError> CloseableCollection<E> {
    /// Creates an empty collection whose close failures are aggregated into
    /// errors produced by `errors`.
    ///
    /// # Example
    ///
    /// ```
    /// use multiclose_core::collection::CloseableCollection;
    /// use multiclose_core::error::ClosingResourceFailed;
    ///
    /// let resources = CloseableCollection::with_errors(|| {
    ///     ClosingResourceFailed::with_message("worker shutdown failed")
    /// });
    /// assert!(resources.close().is_ok());
    /// ```
    #[must_use]
    pub fn with_errors<F>(errors: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        Self {
            stack: Mutex::new(Vec::with_capacity(16)),
            closed: AtomicBool::new(false),
            errors: Box::new(errors),
        }
    }

    /// Pushes `resource` onto the stack and hands it back.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionClosed`] if the collection has already been closed.
    /// The resource is not taken in that case.
    pub fn add<T: Close + 'static>(&self, resource: Arc<T>) -> Result<Arc<T>, CollectionClosed> {
        let mut stack = self.stack.lock();
        // Checked under the lock: a concurrent close either drains this
        // resource or makes us reject it.
        if self.closed.load(Ordering::Acquire) {
            return Err(CollectionClosed);
        }
        stack.push(Arc::clone(&resource) as Arc<dyn Close>);
        Ok(resource)
    }

    /// Returns the number of resources not yet closed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.lock().len()
    }

    /// Returns `true` if no resources are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.lock().is_empty()
    }

    /// Returns `true` once [`close`](CloseableCollection::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes every held resource, most recently added first.
    ///
    /// Only the first call drains; any other call, including concurrent ones,
    /// returns `Ok(())` immediately. Every resource is attempted even if some
    /// fail.
    ///
    /// # Errors
    ///
    /// Returns one aggregate error carrying every close failure, in the order
    /// the failing resources were closed.
    pub fn close(&self) -> Result<(), E> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!("collection already closed");
            return Ok(());
        }

        drain(|| self.stack.lock().pop(), &*self.errors)
    }
}

impl<E: AggregateError> Drop for CloseableCollection<E> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(
                error = %error,
                failed = error.suppressed().len(),
                "resources failed to close while dropping collection"
            );
        }
    }
}

impl<E: AggregateError> fmt::Debug for CloseableCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseableCollection")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
