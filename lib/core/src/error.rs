//! Error handling foundation for the sidekick workspace.
//!
//! Each crate defines its own domain-specific error enums in its own error
//! module. This module only provides the boxed error used at the seams where
//! a failure is logged rather than matched on (scheduled job callbacks,
//! debounced callbacks).

/// A type-erased error that can cross task boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A Result type alias defaulting to [`BoxError`].
pub type Result<T, E = BoxError> = std::result::Result<T, E>;
