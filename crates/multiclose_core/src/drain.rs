//! The closing algorithm shared by both containers.
//!
//! A drain pops resources one at a time and closes each of them. A failure
//! never stops the drain: the first failure creates the aggregate error through
//! the container's factory, and every failure is attached to it. A drain
//! without failures never calls the factory.

use crate::close::Close;
use crate::error::AggregateError;

/// Produces a fresh aggregate error on demand.
pub type ErrorFactory<E> = Box<dyn Fn() -> E + Send + Sync>;

/// Closes every resource yielded by `pop` until it returns `None`.
///
/// `pop` should remove the resource from its container atomically, so that
/// concurrent drains never yield the same resource twice. It is called
/// without any lock held across the resource's own `close()`.
///
/// # Errors
///
/// Returns the aggregate built by `errors` if at least one resource failed to
/// close. Its suppressed causes follow the order in which resources were
/// popped.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use multiclose_core::close::{Close, closer};
/// use multiclose_core::drain::drain;
/// use multiclose_core::error::{AggregateError, ClosingResourceFailed};
///
/// let mut stack: Vec<Arc<dyn Close>> = vec![
///     closer(|| Ok(())),
///     closer(|| Err("broken pipe".into())),
/// ];
///
/// let error = drain(|| stack.pop(), &ClosingResourceFailed::aggregate).unwrap_err();
/// assert_eq!(error.suppressed().len(), 1);
/// assert!(stack.is_empty());
/// ```
pub fn drain<R, E, P>(mut pop: P, errors: &dyn Fn() -> E) -> Result<(), E>
where
    R: Close,
    E: AggregateError,
    P: FnMut() -> Option<R>,
{
    let mut failure: Option<E> = None;
    let mut closed = 0usize;

    while let Some(resource) = pop() {
        closed += 1;
        if let Err(error) = resource.close() {
            tracing::warn!(error = %error, "resource failed to close");
            failure.get_or_insert_with(errors).add_suppressed(error);
        }
    }

    match failure {
        Some(failure) => {
            tracing::debug!(
                closed,
                failed = failure.suppressed().len(),
                "drain finished with failures"
            );
            Err(failure)
        }
        None => {
            tracing::debug!(closed, "drain finished");
            Ok(())
        }
    }
}
