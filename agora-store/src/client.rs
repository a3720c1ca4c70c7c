//! The abstract store client contract.
//!
//! The application core never talks to a concrete backend directly; it is
//! handed an `Arc<dyn StoreClient>` at construction time. Tests substitute
//! [`MemStore`](crate::MemStore), production wires a remote-backed
//! implementation with the same subscribe/mutate/presence surface.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::query::{Query, QuerySnapshot};
use crate::room::RoomHandle;
use crate::types::{Identity, StoredRef, TxOp};

/// One state of the asynchronous identity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityState {
    /// True until resolution has produced a result.
    pub loading: bool,
    pub identity: Option<Identity>,
    pub error: Option<StoreError>,
}

impl IdentityState {
    /// Resolution still in flight.
    pub fn resolving() -> Self {
        Self {
            loading: true,
            identity: None,
            error: None,
        }
    }

    /// Resolved: no authenticated identity.
    pub fn signed_out() -> Self {
        Self {
            loading: false,
            identity: None,
            error: None,
        }
    }

    /// Resolved to an authenticated identity.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            loading: false,
            identity: Some(identity),
            error: None,
        }
    }

    /// Resolution failed.
    pub fn failed(error: StoreError) -> Self {
        Self {
            loading: false,
            identity: None,
            error: Some(error),
        }
    }
}

/// The remote synchronized store, as consumed by this core.
///
/// Reactive reads are `watch` streams: a receiver always holds the latest
/// state and wakes on every change. Mutations are atomic batches. Rooms
/// carry presence rosters and ephemeral topic broadcast.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Stream of identity-resolution states for the current session.
    fn resolve_identity(&self) -> watch::Receiver<IdentityState>;

    /// Send a login code to the given email.
    async fn send_login_challenge(&self, email: &str) -> Result<(), StoreError>;

    /// Verify a login code, establishing the session identity on success.
    async fn complete_login(&self, email: &str, code: &str) -> Result<Identity, StoreError>;

    /// Subscribe to a live query. Every committed mutation that could
    /// affect the result set re-publishes a fresh snapshot.
    fn subscribe(&self, query: Query) -> watch::Receiver<QuerySnapshot>;

    /// Apply a mutation batch atomically.
    async fn submit(&self, ops: Vec<TxOp>) -> Result<(), StoreError>;

    /// Upload a blob, returning a durable reference.
    async fn upload_blob(&self, path: &str, bytes: Vec<u8>) -> Result<StoredRef, StoreError>;

    /// Join a named room under a fresh connection-scoped peer id.
    fn join_room(&self, name: &str) -> RoomHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_state_constructors() {
        assert!(IdentityState::resolving().loading);
        assert!(!IdentityState::signed_out().loading);
        assert!(IdentityState::signed_out().identity.is_none());

        let identity = Identity::new("u1@example.com");
        let state = IdentityState::signed_in(identity.clone());
        assert_eq!(state.identity, Some(identity));
        assert!(state.error.is_none());

        let failed = IdentityState::failed(StoreError::Auth("denied".into()));
        assert!(failed.error.is_some());
        assert!(!failed.loading);
    }
}
