//! Close a stack of acquired resources in reverse order, exactly once.
//!

pub use multiclose_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use multiclose_internal::prelude::*;
}
