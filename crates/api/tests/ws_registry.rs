//! Unit tests for `ConnectionRegistry`.
//!
//! These tests exercise the owner-keyed WebSocket registry directly,
//! without performing any HTTP upgrades. They verify register/unregister
//! semantics, owner-scoped broadcast delivery, pruning of dead connections,
//! and graceful shutdown behaviour.

use axum::extract::ws::Message;
use chrono::Utc;
use uuid::Uuid;

use resona_api::ws::ConnectionRegistry;
use resona_db::models::{Job, JobStatus};

/// Build an in-memory job snapshot for broadcast tests.
fn sample_job(owner_id: Uuid) -> Job {
    let now = Utc::now();
    Job {
        id: Uuid::new_v4(),
        owner_id,
        input_object_key: "uploads/track.wav".to_string(),
        reference_object_key: None,
        status: JobStatus::Processing,
        result_object_key: None,
        preview_object_key: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

/// Extract the text payload from a broadcast message.
fn text_of(msg: &Message) -> &str {
    match msg {
        Message::Text(t) => t.as_str(),
        other => panic!("Expected Text message, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: new registry starts empty
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_registry_is_empty() {
    let registry = ConnectionRegistry::new();

    assert_eq!(registry.owner_count().await, 0);
    assert_eq!(registry.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: register/unregister bookkeeping and owner pruning
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregister_prunes_owner_on_last_connection() {
    let registry = ConnectionRegistry::new();
    let owner = Uuid::new_v4();

    let _rx1 = registry.register(owner, "conn-1".to_string()).await;
    let _rx2 = registry.register(owner, "conn-2".to_string()).await;
    assert_eq!(registry.owner_count().await, 1);
    assert_eq!(registry.connection_count().await, 2);

    registry.unregister(owner, "conn-1").await;
    assert_eq!(registry.owner_count().await, 1, "owner still has conn-2");

    registry.unregister(owner, "conn-2").await;
    assert_eq!(
        registry.owner_count().await,
        0,
        "owner entry must be pruned with its last connection"
    );
}

// ---------------------------------------------------------------------------
// Test: unregister with unknown ID is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregister_unknown_id_is_noop() {
    let registry = ConnectionRegistry::new();
    let owner = Uuid::new_v4();

    let _rx = registry.register(owner, "conn-1".to_string()).await;
    registry.unregister(owner, "nonexistent").await;
    registry.unregister(Uuid::new_v4(), "conn-1").await;

    assert_eq!(registry.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: broadcast reaches every connection of the owner, and only them
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_is_scoped_to_owner() {
    let registry = ConnectionRegistry::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mut alice_rx1 = registry.register(alice, "a-1".to_string()).await;
    let mut alice_rx2 = registry.register(alice, "a-2".to_string()).await;
    let mut bob_rx = registry.register(bob, "b-1".to_string()).await;

    let job = sample_job(alice);
    let sent = registry.broadcast_job(alice, &job).await;
    assert_eq!(sent, 2);

    // Both of Alice's connections receive the envelope.
    for rx in [&mut alice_rx1, &mut alice_rx2] {
        let msg = rx.recv().await.expect("Alice should receive the update");
        let value: serde_json::Value = serde_json::from_str(text_of(&msg)).unwrap();
        assert_eq!(value["type"], "job.update");
        assert_eq!(value["job"]["id"], job.id.to_string());
        assert_eq!(value["job"]["status"], "processing");
    }

    // Bob receives nothing.
    assert!(
        bob_rx.try_recv().is_err(),
        "Broadcast must not leak to other owners"
    );
}

// ---------------------------------------------------------------------------
// Test: broadcast to an owner with no connections sends nowhere
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_without_connections_is_noop() {
    let registry = ConnectionRegistry::new();
    let owner = Uuid::new_v4();

    let sent = registry.broadcast_job(owner, &sample_job(owner)).await;
    assert_eq!(sent, 0);
}

// ---------------------------------------------------------------------------
// Test: a dead connection is dropped without affecting its siblings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_drops_dead_connection_and_keeps_siblings() {
    let registry = ConnectionRegistry::new();
    let owner = Uuid::new_v4();

    let rx_dead = registry.register(owner, "dead".to_string()).await;
    let mut rx_live = registry.register(owner, "live".to_string()).await;

    // Drop the receiver to close its channel.
    drop(rx_dead);

    let sent = registry.broadcast_job(owner, &sample_job(owner)).await;
    assert_eq!(sent, 1, "only the live connection counts");
    assert_eq!(
        registry.connection_count().await,
        1,
        "dead connection must be removed from the registry"
    );

    let msg = rx_live.recv().await.expect("live connection still receives");
    assert!(text_of(&msg).contains("job.update"));
}

// ---------------------------------------------------------------------------
// Test: dropping every connection prunes the owner during broadcast
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_prunes_owner_when_all_connections_dead() {
    let registry = ConnectionRegistry::new();
    let owner = Uuid::new_v4();

    let rx1 = registry.register(owner, "conn-1".to_string()).await;
    let rx2 = registry.register(owner, "conn-2".to_string()).await;
    drop(rx1);
    drop(rx2);

    let sent = registry.broadcast_job(owner, &sample_job(owner)).await;
    assert_eq!(sent, 0);
    assert_eq!(registry.owner_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: registration churn across owners stays consistent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_unregister_churn() {
    let registry = ConnectionRegistry::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let _a1 = registry.register(alice, "a-1".to_string()).await;
    let _b1 = registry.register(bob, "b-1".to_string()).await;
    assert_eq!(registry.owner_count().await, 2);

    registry.unregister(alice, "a-1").await;
    assert_eq!(registry.owner_count().await, 1);

    let _a2 = registry.register(alice, "a-2".to_string()).await;
    assert_eq!(registry.owner_count().await, 2);
    assert_eq!(registry.connection_count().await, 2);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all sends Close and clears the registry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let registry = ConnectionRegistry::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mut rx1 = registry.register(alice, "a-1".to_string()).await;
    let mut rx2 = registry.register(bob, "b-1".to_string()).await;
    assert_eq!(registry.connection_count().await, 2);

    registry.shutdown_all().await;

    assert_eq!(registry.owner_count().await, 0);
    assert_eq!(registry.connection_count().await, 0);

    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert!(
        matches!(msg1, Message::Close(None)),
        "Expected Close(None), got: {msg1:?}"
    );
    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert!(
        matches!(msg2, Message::Close(None)),
        "Expected Close(None), got: {msg2:?}"
    );

    // After Close, the channel should be closed (no more messages).
    assert!(
        rx1.recv().await.is_none(),
        "Channel should be closed after shutdown"
    );
}
