//! # agora-client — application core for a multi-user synchronized client
//!
//! Everything here runs against an `Arc<dyn StoreClient>` handed in by
//! the embedder; no module reaches for a global store. Swapping the
//! in-memory store for a networked one changes construction, not logic.
//!
//! ## Architecture
//!
//! ```text
//!              ┌───────────────────────────────────────────┐
//!              │              SessionController            │
//!              │  identity watch ─► profile query ─► Ready │
//!              └───────┬───────────────────────────────────┘
//!                      │ Arc<dyn StoreClient>
//!        ┌─────────────┼──────────────┬──────────────────┐
//!        ▼             ▼              ▼                  ▼
//!    LoginFlow   CollectionHandle  PresenceTracker   ShoutChannel
//!    (email +    (todos/posts,     (online count     (ephemeral
//!     code)       atomic batches)   from roster)      broadcast)
//! ```
//!
//! ## Modules
//!
//! - [`session`] — identity/profile bootstrap state machine
//! - [`login`] — two-step email + code sign-in
//! - [`handle`] — generated display handles for fresh profiles
//! - [`collection`] — typed mutations over list collections
//! - [`presence`] — room roster tracking and online counts
//! - [`shout`] — ephemeral broadcast with transient rendering

pub mod collection;
pub mod handle;
pub mod login;
pub mod presence;
pub mod session;
pub mod shout;

pub use collection::{CollectionHandle, Item};
pub use login::LoginFlow;
pub use presence::PresenceTracker;
pub use session::{ProvisioningMode, SessionController, SessionPhase, SessionState};
pub use shout::{
    ShoutChannel, ShoutElement, ShoutError, ShoutMessage, ShoutPhase, ShoutStage, StageTiming,
    Viewport, SHOUT_TOPIC,
};

pub use agora_store::StoreClient;
