mod common;

use std::sync::Arc;
use std::time::Duration;

use weave_db::SnapshotDb;
use weave_sync::{Client, ConversationRegistry, Persister, SyncConfig, persist};
use weave_types::{Brief, Content, ConversationId, ConversationMeta, Entry, Memo, SortMode, Timestamp};

fn entry(key: u128, replying: Option<String>) -> Entry {
    Entry::from_memo(
        common::id_for(key),
        Memo {
            replying,
            author: "~zod".into(),
            sent: 0,
            content: Content::text(format!("entry {key}")),
        },
    )
}

async fn populated(registry: &ConversationRegistry, id: &ConversationId) {
    let store = registry.store(id).await;
    store.update(|s| {
        s.pact.insert(Timestamp::new(10), entry(10, None));
        s.pact.insert(Timestamp::new(20), entry(20, Some(common::id_for(10))));
    });
    registry
        .set_brief(id.clone(), Brief { count: 3, ..Brief::default() })
        .await;
    registry
        .set_meta(
            id.clone(),
            ConversationMeta {
                sort: SortMode::TimeAsc,
                ..ConversationMeta::default()
            },
        )
        .await;
}

#[tokio::test]
async fn persister_writes_after_changes_settle() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(SnapshotDb::open(&dir.path().join("weave.db")).unwrap());
    let registry = ConversationRegistry::new();
    let persister = Persister::spawn(registry.clone(), db.clone(), Duration::from_millis(10));

    let id = ConversationId::chat("~zod/test");
    populated(&registry, &id).await;

    let mut saved = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if db.load_snapshot().unwrap().timelines.get(&id).map(Vec::len) == Some(2) {
            saved = true;
            break;
        }
    }
    assert!(saved, "snapshot never written");
    persister.shutdown().await;
}

#[tokio::test]
async fn restart_restores_timelines_and_stash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weave.db");
    let id = ConversationId::chat("~zod/test");

    {
        let db = Arc::new(SnapshotDb::open(&path).unwrap());
        let registry = ConversationRegistry::new();
        populated(&registry, &id).await;
        persist::flush(&registry, &db).await.unwrap();
    }

    let db = Arc::new(SnapshotDb::open(&path).unwrap());
    let registry = ConversationRegistry::load(db).await;
    let state = registry.store(&id).await.snapshot();
    assert_eq!(state.pact.len(), 2);
    assert!(state.pact.replies_linked());
    assert!(state.windows.is_empty());
    assert_eq!(registry.brief(&id).await.map(|b| b.count), Some(3));
    assert_eq!(registry.meta(&id).await.sort, SortMode::TimeAsc);
}

#[tokio::test]
async fn shutdown_flushes_pending_changes() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(SnapshotDb::open(&dir.path().join("weave.db")).unwrap());
    let registry = ConversationRegistry::new();
    // Long debounce: only the shutdown flush can write.
    let persister = Persister::spawn(registry.clone(), db.clone(), Duration::from_secs(60));

    let id = ConversationId::dm("~bus");
    populated(&registry, &id).await;
    persister.shutdown().await;

    assert_eq!(db.load_snapshot().unwrap().timelines.get(&id).map(Vec::len), Some(2));
}

#[tokio::test]
async fn client_restarts_from_its_db_path() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        db_path: dir.path().join("client.db"),
        persist_debounce: Duration::from_secs(60),
        ..SyncConfig::default()
    };
    let id = ConversationId::chat("~zod/test");
    let memo = Memo {
        replying: None,
        author: "~zod".into(),
        sent: 0,
        content: Content::text("kept"),
    };

    let transport = common::MockTransport::new(|_: &str| Ok(serde_json::json!({})));
    let client = Client::start(transport.clone(), config.clone()).await.unwrap();
    let sent = client.actions.send(&id, memo).await.unwrap();
    client.shutdown().await;

    let client = Client::start(transport, config).await.unwrap();
    let state = client.registry.store(&id).await.snapshot();
    assert!(state.pact.get(&sent).is_some());
    client.shutdown().await;
}
