//! Contract tests over the public store surface, driven through
//! `Arc<dyn StoreClient>` the way the application core consumes it.
//!
//! Verifies:
//! - Live queries re-evaluate after every commit with ordering and limits
//! - Batches are atomic under concurrent submitters
//! - Identity resolution, login, and sign-out flow through the watch stream
//! - Rooms expose roster and topic behavior through the trait object

use std::sync::Arc;

use serde_json::json;
use tokio::time::{timeout, Duration};

use agora_store::{MemStore, Query, RecordId, StoreClient, TxOp};

fn store() -> Arc<dyn StoreClient> {
    Arc::new(MemStore::new())
}

#[tokio::test]
async fn test_live_query_orders_and_limits() {
    let store = store();
    for (i, text) in ["c", "a", "b"].iter().enumerate() {
        store
            .submit(vec![TxOp::put(
                "posts",
                RecordId::new(),
                [("text", json!(text)), ("createdAt", json!(i as u64))],
            )])
            .await
            .unwrap();
    }

    let mut rx = store.subscribe(Query::collection("posts").order_asc("createdAt").limit(2));
    let snap = rx.borrow_and_update().clone();
    assert_eq!(snap.rows.len(), 2);
    assert_eq!(snap.rows[0].1.str_field("text"), Some("c"));
    assert_eq!(snap.rows[1].1.str_field("text"), Some("a"));
}

#[tokio::test]
async fn test_field_filter_tracks_mutations() {
    let store = store();
    let id = RecordId::new();
    store
        .submit(vec![TxOp::put(
            "todos",
            id,
            [("text", json!("x")), ("done", json!(false))],
        )])
        .await
        .unwrap();

    let mut done_rx = store.subscribe(Query::collection("todos").field_eq("done", json!(true)));
    assert!(done_rx.borrow_and_update().is_empty());

    store
        .submit(vec![TxOp::put("todos", id, [("done", json!(true))])])
        .await
        .unwrap();
    timeout(Duration::from_secs(1), done_rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done_rx.borrow_and_update().rows.len(), 1);
}

#[tokio::test]
async fn test_concurrent_batches_stay_atomic() {
    let store = store();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let id = RecordId::new();
            store
                .submit(vec![
                    TxOp::put("todos", id, [("text", json!(format!("t{i}")))]),
                    TxOp::put("todos", id, [("done", json!(false))]),
                ])
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let rx = store.subscribe(Query::collection("todos"));
    let snap = rx.borrow().clone();
    assert_eq!(snap.rows.len(), 16);
    // Every record carries both fields of its batch.
    for (_, record) in &snap.rows {
        assert!(record.str_field("text").is_some());
        assert!(record.fields.contains_key("done"));
    }
}

#[tokio::test]
async fn test_identity_stream_through_login() {
    let store = Arc::new(MemStore::new());
    let client: Arc<dyn StoreClient> = store.clone();

    let mut identity_rx = client.resolve_identity();
    assert!(identity_rx.borrow_and_update().loading);

    client.send_login_challenge("pat@example.com").await.unwrap();
    let code = store.issued_code("pat@example.com").unwrap();
    let identity = client.complete_login("pat@example.com", &code).await.unwrap();

    timeout(Duration::from_secs(1), identity_rx.changed())
        .await
        .unwrap()
        .unwrap();
    let state = identity_rx.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.identity, Some(identity));

    store.resolve_signed_out();
    timeout(Duration::from_secs(1), identity_rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(identity_rx.borrow().identity.is_none());
}

#[tokio::test]
async fn test_rooms_through_trait_object() {
    let store = store();
    let a = store.join_room("main");
    let b = store.join_room("main");
    let _other = store.join_room("lobby");

    assert_eq!(a.roster().borrow().len(), 2);
    assert_eq!(a.room_name(), "main");

    let mut rx = b.subscribe("pings");
    let reached = a.publish("pings", Arc::new(vec![42]));
    assert_eq!(reached, 1);
    let env = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(env.sender, a.peer_id());
    assert_eq!(*env.payload, vec![42]);

    drop(b);
    assert_eq!(a.roster().borrow().len(), 1);
}
