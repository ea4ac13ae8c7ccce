//! Error types for closing resources.
//!
//! - [`AggregateError`] - Contract for errors that collect individual close failures
//! - [`ClosingResourceFailed`] - The default aggregate error
//! - [`CollectionClosed`] - Misuse error for adding to a spent collection

use crate::close::BoxError;

/// Message used by the default error factory of both containers.
pub const DEFAULT_MESSAGE: &str = "One or more resources could not be closed.";

/// An error that collects the individual failures of a drain.
///
/// Containers create at most one aggregate per `close()` call, lazily on the
/// first failure, and attach every failure to it with
/// [`add_suppressed`](AggregateError::add_suppressed) in the order the failures
/// occurred.
///
/// # Example
///
/// ```
/// use multiclose_core::close::BoxError;
/// use multiclose_core::error::AggregateError;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("shutdown failed ({} resources)", .causes.len())]
/// struct ShutdownError {
///     causes: Vec<BoxError>,
/// }
///
/// impl AggregateError for ShutdownError {
///     fn add_suppressed(&mut self, error: BoxError) {
///         self.causes.push(error);
///     }
///
///     fn suppressed(&self) -> &[BoxError] {
///         &self.causes
///     }
/// }
/// ```
pub trait AggregateError: std::error::Error {
    /// Attaches a close failure as a suppressed cause.
    fn add_suppressed(&mut self, error: BoxError);

    /// Returns the attached failures in the order they were added.
    fn suppressed(&self) -> &[BoxError];
}

/// One or more resources could not be closed.
///
/// The individual failures are available through
/// [`AggregateError::suppressed`], ordered as the resources were closed, which
/// is the reverse of the order in which they were added.
#[derive(Debug, Default, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or("closing resources failed"))]
pub struct ClosingResourceFailed {
    message: Option<String>,
    #[source]
    source: Option<BoxError>,
    suppressed: Vec<BoxError>,
}

impl ClosingResourceFailed {
    /// Creates an error with no message and no cause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an error with the given message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Creates an error caused by `source`.
    #[must_use]
    pub fn with_source(source: impl Into<BoxError>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Creates an error with both a message and a cause.
    #[must_use]
    pub fn with_message_and_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            message: Some(message.into()),
            source: Some(source.into()),
            suppressed: Vec::new(),
        }
    }

    /// The error produced by the default factories.
    #[must_use]
    pub fn aggregate() -> Self {
        Self::with_message(DEFAULT_MESSAGE)
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Consumes the error, returning the suppressed failures.
    #[must_use]
    pub fn into_suppressed(self) -> Vec<BoxError> {
        self.suppressed
    }
}

impl AggregateError for ClosingResourceFailed {
    fn add_suppressed(&mut self, error: BoxError) {
        self.suppressed.push(error);
    }

    fn suppressed(&self) -> &[BoxError] {
        &self.suppressed
    }
}

/// A resource was added to a collection that has already been closed.
///
/// This signals a programming error in the caller, not a resource failure, and
/// is never folded into an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("resource collection already closed")]
pub struct CollectionClosed;
