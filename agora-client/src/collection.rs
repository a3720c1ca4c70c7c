//! Collection mutation layer: typed operations over list-shaped
//! collections (todos, posts) backed by the synchronized store.
//!
//! Every mutation is a transactional batch submitted through the store
//! handle; multi-record operations (`toggle_all`, `delete_completed`)
//! commit atomically in one batch rather than as per-item submits.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tokio::sync::watch;

use agora_store::{Query, QuerySnapshot, Record, RecordId, StoreClient, StoreError, TxOp};

const TEXT_FIELD: &str = "text";
const DONE_FIELD: &str = "done";
const CREATED_AT_FIELD: &str = "createdAt";
const AUTHOR_LINK: &str = "author";

/// Milliseconds since the Unix epoch; creation timestamps order items.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One list item as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: RecordId,
    pub text: String,
    pub done: bool,
    pub created_at: u64,
    pub author: Option<RecordId>,
}

impl Item {
    /// Lenient projection: missing fields default rather than fail, so a
    /// half-written record from a concurrent client still renders.
    pub fn from_record(id: RecordId, record: &Record) -> Self {
        Self {
            id,
            text: record.str_field(TEXT_FIELD).unwrap_or_default().to_string(),
            done: record.bool_field(DONE_FIELD),
            created_at: record.u64_field(CREATED_AT_FIELD).unwrap_or(0),
            author: record.links.get(AUTHOR_LINK).copied(),
        }
    }
}

/// Typed handle over one collection.
///
/// Cloneable and cheap: state lives in the store, not here.
#[derive(Clone)]
pub struct CollectionHandle {
    store: Arc<dyn StoreClient>,
    collection: String,
    author: Option<RecordId>,
}

impl CollectionHandle {
    pub fn new(store: Arc<dyn StoreClient>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            author: None,
        }
    }

    /// Stamp every created item with an `author` link to this profile.
    pub fn authored_by(mut self, profile: RecordId) -> Self {
        self.author = Some(profile);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Live view of the collection ordered by creation time.
    pub fn watch(&self) -> watch::Receiver<QuerySnapshot> {
        self.store
            .subscribe(Query::collection(&self.collection).order_asc(CREATED_AT_FIELD))
    }

    /// Project a snapshot's rows into items.
    pub fn items(snapshot: &QuerySnapshot) -> Vec<Item> {
        snapshot
            .rows
            .iter()
            .map(|(id, record)| Item::from_record(*id, record))
            .collect()
    }

    /// Create a new item, not-done, timestamped now.
    pub async fn create(&self, text: impl Into<String>) -> Result<RecordId, StoreError> {
        let id = RecordId::new();
        let mut ops = vec![TxOp::put(
            &self.collection,
            id,
            [
                (TEXT_FIELD, json!(text.into())),
                (DONE_FIELD, json!(false)),
                (CREATED_AT_FIELD, json!(now_ms())),
            ],
        )];
        if let Some(author) = self.author {
            ops.push(TxOp::link(&self.collection, id, AUTHOR_LINK, author));
        }
        self.store.submit(ops).await?;
        Ok(id)
    }

    pub async fn set_text(&self, id: RecordId, text: impl Into<String>) -> Result<(), StoreError> {
        self.store
            .submit(vec![TxOp::put(
                &self.collection,
                id,
                [(TEXT_FIELD, json!(text.into()))],
            )])
            .await
    }

    /// Flip one item's done flag.
    pub async fn toggle(&self, item: &Item) -> Result<(), StoreError> {
        self.store
            .submit(vec![TxOp::put(
                &self.collection,
                item.id,
                [(DONE_FIELD, json!(!item.done))],
            )])
            .await
    }

    pub async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.store
            .submit(vec![TxOp::delete(&self.collection, id)])
            .await
    }

    /// Drive every item to a single shared target state, atomically.
    ///
    /// The target is computed once from the whole list — not-all-done
    /// means everything becomes done; all-done means everything clears.
    /// Items already at the target are still written, which keeps the
    /// batch uniform. Empty input is a no-op, not an error.
    pub async fn toggle_all(&self, items: &[Item]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        let target = !items.iter().all(|item| item.done);
        let ops = items
            .iter()
            .map(|item| TxOp::put(&self.collection, item.id, [(DONE_FIELD, json!(target))]))
            .collect();
        self.store.submit(ops).await
    }

    /// Delete exactly the done items, atomically. No-op when none are.
    pub async fn delete_completed(&self, items: &[Item]) -> Result<(), StoreError> {
        let ops: Vec<TxOp> = items
            .iter()
            .filter(|item| item.done)
            .map(|item| TxOp::delete(&self.collection, item.id))
            .collect();
        if ops.is_empty() {
            return Ok(());
        }
        self.store.submit(ops).await
    }
}
