mod common;

use std::time::Duration;

use common::{MockTransport, id_for, init_tracing};
use serde_json::json;
use weave_store::ConversationState;
use weave_sync::{ConversationRegistry, ConversationStore, subscription};
use weave_types::{ConversationId, Timestamp};

async fn wait_until(store: &ConversationStore, pred: impl FnMut(&ConversationState) -> bool) {
    let mut rx = store.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("state never reached")
        .expect("store dropped");
}

fn add(key: u128, replying: Option<String>) -> serde_json::Value {
    json!({
        "id": id_for(key),
        "response": { "add": {
            "memo": {
                "replying": replying,
                "author": "~zod",
                "sent": 1_700_000_000_000_i64,
                "content": { "story": { "block": [], "inline": ["hi"] } }
            },
            "time": Timestamp::new(key).to_ud(),
        } }
    })
}

async fn live_store(transport: &std::sync::Arc<MockTransport>) -> (ConversationStore, subscription::SubscriptionHandle) {
    let registry = ConversationRegistry::new();
    let store = registry.store(&ConversationId::chat("~zod/live")).await;
    let handle = subscription::subscribe(transport.clone(), store.clone())
        .await
        .unwrap();
    (store, handle)
}

#[tokio::test]
async fn deltas_apply_in_delivery_order() {
    init_tracing();
    let transport = MockTransport::new(|_: &str| Ok(json!({})));
    let (store, _handle) = live_store(&transport).await;

    transport.emit("writ-response", add(100, None));
    transport.emit("writ-response", add(200, Some(id_for(100))));
    transport.emit(
        "writ-response",
        json!({ "id": id_for(200), "response": { "add-feel": { "ship": "~bus", "feel": "+1" } } }),
    );
    transport.emit("writ-response", json!({ "id": id_for(100), "response": { "del": null } }));

    wait_until(&store, |s| s.pact.len() == 1).await;
    let state = store.snapshot();
    let reply = state.pact.get(&id_for(200)).unwrap();
    assert_eq!(reply.reactions.get("~bus").map(String::as_str), Some("+1"));
    assert!(state.pact.replies_linked());
    assert!(state.pact.orphans_of(&id_for(100)).is_some());
}

#[tokio::test]
async fn foreign_marks_and_malformed_events_are_skipped() {
    let transport = MockTransport::new(|_: &str| Ok(json!({})));
    let (store, handle) = live_store(&transport).await;

    transport.emit("heap-response", add(50, None));
    transport.emit("writ-response", json!({ "response": { "del": null } }));
    transport.emit("writ-response", json!({ "id": id_for(60), "response": { "zap": 1 } }));
    transport.emit("writ-response", add(70, None));

    wait_until(&store, |s| s.pact.len() == 1).await;
    assert!(store.snapshot().pact.contains(&id_for(70)));
    assert!(handle.is_running());
}

#[tokio::test]
async fn stopped_pump_ignores_later_events() {
    let transport = MockTransport::new(|_: &str| Ok(json!({})));
    let (store, handle) = live_store(&transport).await;

    handle.stop().await;
    transport.emit("writ-response", add(10, None));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.snapshot().pact.is_empty());
}
