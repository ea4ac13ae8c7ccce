//! Reverse-order closing of acquired resources.
//!
//! `multiclose_core` provides two containers that unwind a sequence of
//! acquired resources deterministically, on success and failure paths alike:
//!
//! - [`collection`] - [`CloseableCollection`](collection::CloseableCollection), a one-shot stack of resources
//! - [`tracker`] - [`CloseableTracker`](tracker::CloseableTracker), a stack that supports early removal
//! - [`close`] - The [`Close`](close::Close) and [`TrackedClose`](close::TrackedClose) capabilities
//! - [`drain`] - The closing algorithm both containers share
//! - [`error`] - Aggregate and misuse errors
//!
//! # Guarantees
//!
//! - Resources are closed in reverse order of addition.
//! - Every held resource is attempted, even when earlier ones fail.
//! - All failures of one `close()` call are returned as a single aggregate
//!   error, built lazily so that a clean close never allocates one.
//! - Both containers are `Send + Sync` and may be closed from several threads.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use multiclose_core::prelude::*;
//!
//! struct Lock(&'static str);
//!
//! impl Close for Lock {
//!     fn close(&self) -> Result<(), BoxError> {
//!         Err(format!("{} is stuck", self.0).into())
//!     }
//! }
//!
//! let resources = CloseableCollection::new();
//! resources.add(Arc::new(Lock("outer")))?;
//! resources.add(Arc::new(Lock("inner")))?;
//!
//! let error = resources.close().unwrap_err();
//! let causes: Vec<String> = error.suppressed().iter().map(ToString::to_string).collect();
//! assert_eq!(causes, ["inner is stuck", "outer is stuck"]);
//! # Ok::<(), CollectionClosed>(())
//! ```

/// Closing capabilities.
pub mod close;

/// One-shot resource collections.
pub mod collection;

/// Shared closing algorithm.
pub mod drain;

/// Aggregate and misuse errors.
pub mod error;

/// Resource trackers with early removal.
pub mod tracker;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::close::{BoxError, Close, CloseFn, TrackedClose, closer};
    pub use crate::collection::CloseableCollection;
    pub use crate::error::{AggregateError, ClosingResourceFailed, CollectionClosed};
    pub use crate::tracker::CloseableTracker;
}
