//! Error types for registration and configuration.

use crate::notify::ListenerId;

/// Errors surfaced by the public registration API.
///
/// Mutation operations (`set`, `splice_at`) never fail. A corrupted dependency
/// graph is not represented here: it is a programming error and panics.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// The property path could not be parsed.
    #[error("invalid property path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// No handler could be resolved for a convention-based listener.
    ///
    /// Only returned when `unresolved_handlers` is strict.
    #[error("no handler resolved for {listener} on path {path:?}")]
    UnresolvedHandler {
        /// The listener that was being registered.
        listener: ListenerId,
        /// The path it was registered for.
        path: String,
    },

    /// The listener is not registered for the given path.
    ///
    /// Only returned when `missing_listeners` is strict.
    #[error("{listener} is not registered on path {path:?}")]
    ListenerNotFound {
        /// The listener that was being removed.
        listener: ListenerId,
        /// The path it was removed from.
        path: String,
    },

    /// Configuration could not be parsed, or a snapshot could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
