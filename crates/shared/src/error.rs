//! Error types for the Domain Store seam

use thiserror::Error;

/// Errors surfaced by Domain Store implementations.
///
/// The store is the source of truth for tenant and domain records; callers
/// on the request path treat `Unavailable` as fatal for the current request
/// (fail closed) and never grant access on the basis of a store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
