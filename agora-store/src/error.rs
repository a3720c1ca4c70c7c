//! Error taxonomy for the store contract.
//!
//! Three failure families propagate to the application core:
//! - `Auth` — login challenge send/verify failures (retryable by the user)
//! - `Query` — subscription failures (blocking, no partial results)
//! - `Mutation` — rejected write batches
//!
//! `Upload` covers the blob path and `Closed` a torn-down stream.

use thiserror::Error;

/// Errors surfaced by any [`StoreClient`](crate::StoreClient) implementation.
///
/// Clone is required so errors can ride inside `watch` snapshots.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Login challenge could not be sent or verified.
    #[error("auth failed: {0}")]
    Auth(String),

    /// A query subscription failed; no partial result set is delivered.
    #[error("query failed: {0}")]
    Query(String),

    /// A mutation batch was rejected; no operation in the batch applied.
    #[error("mutation rejected: {0}")]
    Mutation(String),

    /// Blob upload failed; no durable reference exists.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The underlying subscription or connection was torn down.
    #[error("store connection closed")]
    Closed,
}
