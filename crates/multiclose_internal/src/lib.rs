//! # Multiclose Internal Library
//!
//! Re-exports the core multiclose crates for convenience.

/// Closing traits, aggregate errors, collections and trackers.
pub use multiclose_core;

/// Subscriber configuration and capture for the `tracing` events emitted while closing.
#[cfg(feature = "tracing")]
pub use multiclose_tracing;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use multiclose_core::prelude::*;
    #[cfg(feature = "tracing")]
    pub use multiclose_tracing::{CloseEvent, CloseEvents, LogConfig};
}
