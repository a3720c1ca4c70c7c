//! Session bootstrap: identity resolution, profile provisioning, and the
//! derived session state the presentation layer renders from.
//!
//! ## State machine
//!
//! ```text
//!                 identity resolved (none)
//!        ┌──────────────────────────────────► Unauthenticated
//!        │
//! (resolving) ── identity resolved ──► ResolvingProfile
//!        │                                   │
//!        │                      profile snapshot: absent
//!        │                                   ▼
//!        │                             Provisioning ── submit + wait ──┐
//!        │                                   ▲                         │
//!        │                                   └── snapshot still absent ┘
//!        │                                   │
//!        │                      profile snapshot: present
//!        │                                   ▼
//!        └── identity/query error ──►      Ready
//!                    │
//!                    ▼
//!                  Failed
//! ```
//!
//! Transitions are driven by discrete events (identity update, profile
//! snapshot update, provisioning submit completion), never re-entrant on a
//! re-render. The provisioning trigger `(identity, !loading, profile
//! absent)` is re-evaluated on every snapshot and guarded by an in-flight
//! flag, so a session fires at most one create per identity; concurrent
//! *processes* may still both create, and the store is the deduplication
//! authority for that accepted race.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use agora_store::{
    Identity, Profile, Query, QuerySnapshot, RecordId, StoreClient, StoreError, TxOp,
};

use crate::handle;

/// Collection holding profile records.
pub const PROFILES: &str = "profiles";
/// Relation field linking a profile to its owning identity.
pub const OWNER_LINK: &str = "owner";

/// Bootstrap phase of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Identity resolved: nobody is signed in.
    Unauthenticated,
    /// Identity known, profile subscription pending its first result.
    ResolvingProfile,
    /// Identity known, no profile yet; a create is (or has been) submitted.
    Provisioning,
    /// Identity and profile both present.
    Ready,
    /// Identity resolution or the profile subscription failed.
    Failed,
}

/// How the profile-creation submit is driven.
///
/// Blocking is the default contract; detached is the accepted
/// fire-and-forget alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningMode {
    /// Await the submit before processing further session events.
    Blocking,
    /// Fire-and-forget: submit errors surface only if the profile
    /// subscription later reports one.
    Detached,
}

/// Derived session state exposed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub phase: SessionPhase,
    /// First error from identity resolution or the profile subscription;
    /// identity errors take precedence.
    pub error: Option<StoreError>,
    identity_loading: bool,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            identity: None,
            profile: None,
            phase: SessionPhase::Unauthenticated,
            error: None,
            identity_loading: true,
        }
    }

    /// True while identity resolution or the profile subscription has not
    /// produced a result, or while an identity has no profile yet (the
    /// provisioning gap).
    pub fn is_loading(&self) -> bool {
        self.identity_loading
            || matches!(
                self.phase,
                SessionPhase::ResolvingProfile | SessionPhase::Provisioning
            )
    }
}

/// Drives the session state machine over an injected store handle.
pub struct SessionController {
    store: Arc<dyn StoreClient>,
    mode: ProvisioningMode,
    state_tx: watch::Sender<SessionState>,
}

impl SessionController {
    /// Create with the default blocking provisioning contract.
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self::with_mode(store, ProvisioningMode::Blocking)
    }

    pub fn with_mode(store: Arc<dyn StoreClient>, mode: ProvisioningMode) -> Self {
        let (state_tx, _) = watch::channel(SessionState::initial());
        Self {
            store,
            mode,
            state_tx,
        }
    }

    /// Live session state for the presentation layer.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Spawn the bootstrap event loop.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move { controller.run().await })
    }

    fn set(&self, f: impl FnOnce(&mut SessionState)) {
        self.state_tx.send_modify(f);
    }

    async fn run(self: Arc<Self>) {
        let mut identity_rx = self.store.resolve_identity();
        let mut profile_rx: Option<watch::Receiver<QuerySnapshot>> = None;
        // Identity the current profile subscription belongs to.
        let mut watched: Option<RecordId> = None;
        // At most one provisioning submit per identity per process.
        let mut provisioned = false;

        loop {
            let ident = identity_rx.borrow_and_update().clone();

            if let Some(err) = ident.error.clone() {
                // Identity errors take precedence over anything the
                // profile subscription reports.
                log::warn!("identity resolution failed: {err}");
                self.set(|s| {
                    s.phase = SessionPhase::Failed;
                    s.error = Some(err);
                    s.identity_loading = false;
                });
                profile_rx = None;
                watched = None;
            } else if ident.loading {
                self.set(|s| s.identity_loading = true);
            } else {
                match ident.identity {
                    None => {
                        profile_rx = None;
                        watched = None;
                        provisioned = false;
                        self.set(|s| {
                            s.identity = None;
                            s.profile = None;
                            s.phase = SessionPhase::Unauthenticated;
                            s.error = None;
                            s.identity_loading = false;
                        });
                    }
                    Some(identity) => {
                        if watched != Some(identity.id) {
                            let query = Query::collection(PROFILES)
                                .link_eq(OWNER_LINK, identity.id)
                                .limit(1);
                            profile_rx = Some(self.store.subscribe(query));
                            watched = Some(identity.id);
                            provisioned = false;
                            log::info!("session identity resolved: {}", identity.email);
                            self.set(|s| {
                                s.identity = Some(identity.clone());
                                s.phase = SessionPhase::ResolvingProfile;
                                s.error = None;
                                s.identity_loading = false;
                            });
                        }
                        if let Some(rx) = profile_rx.as_mut() {
                            let snapshot = rx.borrow_and_update().clone();
                            self.apply_snapshot(&identity, snapshot, &mut provisioned)
                                .await;
                        }
                    }
                }
            }

            // Park until the next discrete event.
            match profile_rx.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        changed = identity_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                self.set(|s| {
                                    s.phase = SessionPhase::Failed;
                                    s.error = Some(StoreError::Closed);
                                });
                                return;
                            }
                        }
                    }
                }
                None => {
                    if identity_rx.changed().await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn apply_snapshot(
        &self,
        identity: &Identity,
        snapshot: QuerySnapshot,
        provisioned: &mut bool,
    ) {
        if let Some(err) = snapshot.error {
            log::warn!("profile subscription failed: {err}");
            self.set(|s| {
                s.phase = SessionPhase::Failed;
                s.error = Some(err);
            });
            return;
        }

        if snapshot.loading {
            self.set(|s| s.phase = SessionPhase::ResolvingProfile);
            return;
        }

        if let Some((id, record)) = snapshot.rows.first() {
            let profile = Profile::from_record(*id, record);
            // A profile exists: never provision again for this identity.
            *provisioned = true;
            self.set(|s| {
                s.profile = Some(profile);
                s.phase = SessionPhase::Ready;
            });
            return;
        }

        // The provisioning gap: identity known, subscription resolved,
        // no profile. Fire the create at most once; the condition itself
        // is re-checked on every snapshot.
        self.set(|s| {
            s.profile = None;
            s.phase = SessionPhase::Provisioning;
        });
        if *provisioned {
            return;
        }
        *provisioned = true;

        let ops = provision_ops(identity.id);
        match self.mode {
            ProvisioningMode::Blocking => {
                if let Err(err) = self.store.submit(ops).await {
                    // No retry here; the error reaches the session only
                    // if the subscription later reports one.
                    log::warn!("profile provisioning failed: {err}");
                }
            }
            ProvisioningMode::Detached => {
                let store = self.store.clone();
                tokio::spawn(async move {
                    if let Err(err) = store.submit(ops).await {
                        log::warn!("profile provisioning failed: {err}");
                    }
                });
            }
        }
    }

    /// Upload a new avatar and attach it to the current profile.
    ///
    /// Failures on either step are logged and swallowed; the session
    /// state is left unchanged. This mirrors the presentation contract:
    /// avatar errors are diagnostic only, never user-facing.
    pub async fn set_avatar(&self, path: &str, bytes: Vec<u8>) {
        let profile = self.state_tx.borrow().profile.clone();
        let Some(profile) = profile else {
            log::warn!("avatar upload ignored: no profile yet");
            return;
        };
        let stored = match self.store.upload_blob(path, bytes).await {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("avatar upload failed: {err}");
                return;
            }
        };
        let value = serde_json::to_value(&stored).unwrap_or(serde_json::Value::Null);
        let ops = vec![TxOp::put(PROFILES, profile.id, [("avatarRef", value)])];
        if let Err(err) = self.store.submit(ops).await {
            log::warn!("avatar update failed: {err}");
        }
    }
}

/// The single atomic batch that provisions a profile: create a fresh
/// UUID-keyed record, set its handle, and link it to the identity.
fn provision_ops(owner: RecordId) -> Vec<TxOp> {
    let id = RecordId::new();
    let display = handle::generate(&mut rand::thread_rng());
    log::debug!("provisioning profile {id} with handle {display}");
    vec![
        TxOp::put(PROFILES, id, [("handle", json!(display))]),
        TxOp::link(PROFILES, id, OWNER_LINK, owner),
    ]
}
