//! # agora-store — synchronized store contract for agora clients
//!
//! The remote store is an external collaborator; this crate pins down the
//! exact surface the application core consumes and ships an in-memory
//! implementation of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   Arc<dyn StoreClient>   ┌──────────────────┐
//! │  agora-client    │ ◄──────────────────────► │  StoreClient     │
//! │  (session, live) │   watch / broadcast      │  implementation  │
//! └──────────────────┘                          └────────┬─────────┘
//!                                                        │
//!                                          ┌─────────────┼─────────────┐
//!                                          ▼             ▼             ▼
//!                                      records        rooms         blobs
//!                                      (atomic     (roster watch   (path →
//!                                       batches,    + topic         StoredRef)
//!                                       live        broadcast)
//!                                       queries)
//! ```
//!
//! ## Modules
//!
//! - [`types`] — records, identities, profiles, mutation ops
//! - [`query`] — query descriptors and live result snapshots
//! - [`client`] — the [`StoreClient`] trait and identity resolution states
//! - [`room`] — presence rosters and ephemeral topic fan-out
//! - [`mem`] — [`MemStore`], the in-memory reference implementation
//! - [`error`] — [`StoreError`] taxonomy

pub mod client;
pub mod error;
pub mod mem;
pub mod query;
pub mod room;
pub mod types;

// Re-exports for convenience
pub use client::{IdentityState, StoreClient};
pub use error::StoreError;
pub use mem::MemStore;
pub use query::{Filter, Order, Query, QuerySnapshot};
pub use room::{RoomCore, RoomDirectory, RoomHandle, TopicEnvelope, DEFAULT_TOPIC_CAPACITY};
pub use types::{Identity, PeerId, Profile, Record, RecordId, StoredRef, TxOp};
