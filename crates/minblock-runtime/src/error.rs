//! Runtime error types
//!
//! Orchestration errors are `anyhow` errors carrying context for each
//! pipeline step. The core error that caused a failure stays reachable
//! through [`core_error`].

/// Result type for runtime operations
pub type Result<T> = anyhow::Result<T>;

/// Runtime error
pub type Error = anyhow::Error;

/// The core error behind a runtime error, if one caused it
pub fn core_error(err: &Error) -> Option<&minblock_core::Error> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<minblock_core::Error>())
}

/// Whether the run was rejected because the document's build markers are malformed
pub fn is_structural(err: &Error) -> bool {
    core_error(err).is_some_and(minblock_core::Error::is_structural)
}
