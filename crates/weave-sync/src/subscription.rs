//! Live delta delivery for one conversation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weave_types::{DeltaEvent, TransportEvent};

use crate::error::TransportError;
use crate::store::ConversationStore;
use crate::transport::Transport;

/// Keeps a subscription pump alive. Dropping it stops the pump.
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the pump and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Subscribe to `store`'s conversation and apply its deltas in delivery order.
pub async fn subscribe(
    transport: Arc<dyn Transport>,
    store: ConversationStore,
) -> Result<SubscriptionHandle, TransportError> {
    let id = store.id().clone();
    let rx = transport
        .subscribe(id.app(), &id.subscription_path())
        .await?;

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_pump(rx, store, cancel.clone()));
    info!("Subscribed to {}", id);

    Ok(SubscriptionHandle {
        cancel,
        task: Some(task),
    })
}

async fn run_pump(
    mut rx: mpsc::UnboundedReceiver<TransportEvent>,
    store: ConversationStore,
    cancel: CancellationToken,
) {
    let id = store.id().clone();
    let mark = id.kind.response_mark();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else {
                    warn!("Subscription to {} closed by backend", id);
                    break;
                };
                if event.mark != mark {
                    debug!("{}: ignoring {} event", id, event.mark);
                    continue;
                }
                match DeltaEvent::parse(&event.json) {
                    Ok(diff) => {
                        let applied = store.update(|s| s.apply(diff));
                        debug!("{}: {:?}", id, applied);
                    }
                    Err(e) => warn!("{}: dropping malformed event: {}", id, e),
                }
            }
        }
    }

    debug!("Subscription pump for {} stopped", id);
}
