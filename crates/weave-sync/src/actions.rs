//! User actions: optimistic sends plus pokes whose effects arrive through the
//! subscription.

use std::sync::Arc;

use tracing::{info, warn};
use weave_types::api::ActionPayload;
use weave_types::models::{entry_id, is_entry_id};
use weave_types::{ConversationId, Delta, Diff, Memo, Timestamp};

use crate::error::SyncError;
use crate::registry::ConversationRegistry;
use crate::transport::Transport;

#[derive(Clone)]
pub struct Actions {
    transport: Arc<dyn Transport>,
    registry: ConversationRegistry,
}

impl Actions {
    pub fn new(transport: Arc<dyn Transport>, registry: ConversationRegistry) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Show `memo` immediately, then send it. A rejected send is rolled back.
    /// Returns the new entry's id.
    pub async fn send(&self, conv: &ConversationId, memo: Memo) -> Result<String, SyncError> {
        let now = Timestamp::now();
        let id = entry_id(&memo.author, &now);
        let diff = Diff {
            id: id.clone(),
            delta: Delta::add(memo, None),
        };
        let payload = serde_json::to_value(ActionPayload::writs(conv, diff.clone()))?;

        let store = self.registry.store(conv).await;
        store.update(|s| {
            s.pending.insert(id.clone());
            s.apply_at(diff, now)
        });

        if let Err(e) = self.poke(conv, payload).await {
            warn!("{}: send of {} failed, rolling back: {}", conv, id, e);
            store.update(|s| {
                s.pending.remove(&id);
                s.apply(Diff {
                    id: id.clone(),
                    delta: Delta::Del,
                })
            });
            return Err(e);
        }
        Ok(id)
    }

    pub async fn delete(&self, conv: &ConversationId, id: &str) -> Result<(), SyncError> {
        self.poke_delta(conv, id, Delta::Del).await
    }

    pub async fn add_reaction(
        &self,
        conv: &ConversationId,
        id: &str,
        ship: &str,
        feel: &str,
    ) -> Result<(), SyncError> {
        let delta = Delta::AddFeel {
            ship: ship.to_string(),
            feel: feel.to_string(),
        };
        self.poke_delta(conv, id, delta).await
    }

    pub async fn del_reaction(
        &self,
        conv: &ConversationId,
        id: &str,
        ship: &str,
    ) -> Result<(), SyncError> {
        self.poke_delta(conv, id, Delta::DelFeel(ship.to_string()))
            .await
    }

    /// Clear the unread count locally and tell the backend.
    pub async fn mark_read(&self, conv: &ConversationId) -> Result<(), SyncError> {
        let latest = match self.registry.get(conv).await {
            Some(store) => store
                .snapshot()
                .pact
                .latest()
                .map(|(_, e)| e.id.clone()),
            None => None,
        };
        self.registry
            .update_brief(conv, |brief| {
                brief.count = 0;
                if latest.is_some() {
                    brief.read_id = latest;
                }
            })
            .await;

        let payload = serde_json::to_value(ActionPayload::read(conv))?;
        self.poke(conv, payload).await
    }

    async fn poke_delta(&self, conv: &ConversationId, id: &str, delta: Delta) -> Result<(), SyncError> {
        if !is_entry_id(id) {
            return Err(SyncError::InvalidId(id.to_string()));
        }
        let kind = delta.kind();
        let payload = serde_json::to_value(ActionPayload::writs(
            conv,
            Diff {
                id: id.to_string(),
                delta,
            },
        ))?;
        self.poke(conv, payload).await?;
        info!("{}: {} {}", conv, kind, id);
        Ok(())
    }

    async fn poke(&self, conv: &ConversationId, payload: serde_json::Value) -> Result<(), SyncError> {
        self.transport
            .poke(conv.app(), conv.kind.action_mark(), payload)
            .await
            .map_err(SyncError::from)
    }
}
