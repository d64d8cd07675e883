use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use weave_types::TransportEvent;

use crate::error::TransportError;

/// The backend channel. Implementations own encoding, auth and reconnects.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Point-in-time read.
    async fn scry(&self, app: &str, path: &str) -> Result<Value, TransportError>;

    /// Fire an action; resolves once the backend acknowledges it.
    async fn poke(&self, app: &str, mark: &str, payload: Value) -> Result<(), TransportError>;

    /// Open a long-lived event stream. Events arrive in server send order.
    async fn subscribe(
        &self,
        app: &str,
        path: &str,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError>;
}
