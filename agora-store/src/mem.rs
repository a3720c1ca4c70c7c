//! In-memory store implementing the full [`StoreClient`] contract.
//!
//! `MemStore` is both the test double injected into the application core
//! and the reference semantics for the contract: atomic batches, reactive
//! query re-evaluation after every commit, magic-code auth, rooms with
//! live rosters and ephemeral topics, and blob uploads.
//!
//! It deliberately does NOT deduplicate concurrent profile creates: the
//! store is the deduplication authority in production, and the accepted
//! behavior under the cross-session race is duplicate tolerance, with
//! `limit(1)` queries picking a deterministic winner per store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::client::{IdentityState, StoreClient};
use crate::error::StoreError;
use crate::query::{Query, QuerySnapshot};
use crate::room::{RoomDirectory, RoomHandle};
use crate::types::{Identity, Record, RecordId, StoredRef, TxOp};

struct Subscription {
    query: Query,
    tx: watch::Sender<QuerySnapshot>,
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<String, Identity>,
    codes: HashMap<String, String>,
    code_seq: u32,
}

/// In-memory [`StoreClient`].
pub struct MemStore {
    identity_tx: watch::Sender<IdentityState>,
    auth: Mutex<AuthState>,
    data: RwLock<HashMap<String, BTreeMap<RecordId, Record>>>,
    subs: Mutex<Vec<Subscription>>,
    rooms: RoomDirectory,
    blobs: Mutex<HashMap<String, (Uuid, Vec<u8>)>>,
    fail_next_submit: Mutex<Option<StoreError>>,
}

impl MemStore {
    pub fn new() -> Self {
        let (identity_tx, _) = watch::channel(IdentityState::resolving());
        Self {
            identity_tx,
            auth: Mutex::new(AuthState::default()),
            data: RwLock::new(HashMap::new()),
            subs: Mutex::new(Vec::new()),
            rooms: RoomDirectory::default(),
            blobs: Mutex::new(HashMap::new()),
            fail_next_submit: Mutex::new(None),
        }
    }

    /// Resolve the current session to an already-authenticated identity.
    pub fn sign_in_as(&self, identity: Identity) {
        let mut auth = self.auth.lock().unwrap_or_else(|e| e.into_inner());
        auth.accounts.insert(identity.email.clone(), identity.clone());
        drop(auth);
        self.identity_tx
            .send_replace(IdentityState::signed_in(identity));
    }

    /// Resolve the current session as unauthenticated.
    pub fn resolve_signed_out(&self) {
        self.identity_tx.send_replace(IdentityState::signed_out());
    }

    /// Make identity resolution report a failure.
    pub fn fail_identity(&self, error: StoreError) {
        self.identity_tx.send_replace(IdentityState::failed(error));
    }

    /// Reject the next `submit` call with the given error.
    pub fn fail_next_submit(&self, error: StoreError) {
        *self
            .fail_next_submit
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    /// Publish a failure to every live subscription on a collection.
    ///
    /// The failed snapshot replaces the current one; the next committed
    /// batch republishes a fresh result set and clears the error.
    pub fn fail_subscriptions(&self, collection: &str, error: StoreError) {
        let mut subs = self.subs.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|s| !s.tx.is_closed());
        for sub in subs.iter() {
            if sub.query.collection == collection {
                sub.tx.send_replace(QuerySnapshot::failed(error.clone()));
            }
        }
    }

    /// The most recently issued login code for an email, if any.
    pub fn issued_code(&self, email: &str) -> Option<String> {
        self.auth
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .codes
            .get(email)
            .cloned()
    }

    /// Snapshot of every record in a collection (id order).
    pub fn records_in(&self, collection: &str) -> Vec<(RecordId, Record)> {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(collection)
            .map(|m| m.iter().map(|(id, r)| (*id, r.clone())).collect())
            .unwrap_or_default()
    }

    /// Fetch one record.
    pub fn record(&self, collection: &str, id: RecordId) -> Option<Record> {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(collection)
            .and_then(|m| m.get(&id))
            .cloned()
    }

    /// Raw bytes of an uploaded blob.
    pub fn blob(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .map(|(_, bytes)| bytes.clone())
    }

    fn apply(ops: Vec<TxOp>, data: &mut HashMap<String, BTreeMap<RecordId, Record>>) {
        for op in ops {
            match op {
                TxOp::Put {
                    collection,
                    id,
                    fields,
                } => {
                    data.entry(collection)
                        .or_default()
                        .entry(id)
                        .or_default()
                        .merge_fields(fields);
                }
                TxOp::Link {
                    collection,
                    id,
                    field,
                    target,
                } => {
                    data.entry(collection)
                        .or_default()
                        .entry(id)
                        .or_default()
                        .links
                        .insert(field, target);
                }
                TxOp::Delete { collection, id } => {
                    if let Some(records) = data.get_mut(&collection) {
                        records.remove(&id);
                    }
                }
            }
        }
    }

    /// Re-evaluate and republish every live subscription.
    ///
    /// MemStore does not track which queries a batch could affect; it
    /// republishes all of them, so consumers see the re-evaluation-on-
    /// every-commit behavior the contract promises.
    fn notify_subscribers(&self) {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let mut subs = self.subs.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|s| !s.tx.is_closed());
        for sub in subs.iter() {
            let rows = data
                .get(&sub.query.collection)
                .map(|records| sub.query.evaluate(records))
                .unwrap_or_default();
            sub.tx.send_replace(QuerySnapshot::ready(rows));
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemStore {
    fn resolve_identity(&self) -> watch::Receiver<IdentityState> {
        self.identity_tx.subscribe()
    }

    async fn send_login_challenge(&self, email: &str) -> Result<(), StoreError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(StoreError::Auth(format!("invalid email: {email:?}")));
        }
        let mut auth = self.auth.lock().unwrap_or_else(|e| e.into_inner());
        auth.code_seq += 1;
        let code = format!("{:06}", 100_000 + auth.code_seq);
        auth.codes.insert(email.to_string(), code);
        log::info!("login code issued for {email}");
        Ok(())
    }

    async fn complete_login(&self, email: &str, code: &str) -> Result<Identity, StoreError> {
        let mut auth = self.auth.lock().unwrap_or_else(|e| e.into_inner());
        match auth.codes.get(email) {
            None => {
                return Err(StoreError::Auth(format!(
                    "no login challenge in flight for {email}"
                )))
            }
            Some(expected) if expected != code => {
                return Err(StoreError::Auth("invalid login code".into()))
            }
            Some(_) => {
                auth.codes.remove(email);
            }
        }
        let identity = auth
            .accounts
            .entry(email.to_string())
            .or_insert_with(|| Identity::new(email))
            .clone();
        drop(auth);
        log::info!("login completed for {email}");
        self.identity_tx
            .send_replace(IdentityState::signed_in(identity.clone()));
        Ok(identity)
    }

    fn subscribe(&self, query: Query) -> watch::Receiver<QuerySnapshot> {
        let rows = {
            let data = self.data.read().unwrap_or_else(|e| e.into_inner());
            data.get(&query.collection)
                .map(|records| query.evaluate(records))
                .unwrap_or_default()
        };
        let (tx, rx) = watch::channel(QuerySnapshot::ready(rows));
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscription { query, tx });
        rx
    }

    async fn submit(&self, ops: Vec<TxOp>) -> Result<(), StoreError> {
        if let Some(err) = self
            .fail_next_submit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            log::debug!("submit rejected by fault injection: {err}");
            return Err(err);
        }
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            Self::apply(ops, &mut data);
        }
        self.notify_subscribers();
        Ok(())
    }

    async fn upload_blob(&self, path: &str, bytes: Vec<u8>) -> Result<StoredRef, StoreError> {
        if path.is_empty() {
            return Err(StoreError::Upload("empty path".into()));
        }
        let key = Uuid::new_v4();
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), (key, bytes));
        Ok(StoredRef {
            path: path.to_string(),
            key,
        })
    }

    fn join_room(&self, name: &str) -> RoomHandle {
        self.rooms.get_or_create(name).join()
    }
}
