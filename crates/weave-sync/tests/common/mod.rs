#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};
use weave_sync::{Transport, TransportError};
use weave_types::{Timestamp, TransportEvent};

type Responder = Box<dyn Fn(&str) -> Result<Value, TransportError> + Send + Sync>;

/// Scripted backend that records every call.
pub struct MockTransport {
    responder: Responder,
    pub scries: Mutex<Vec<String>>,
    pub scry_count: AtomicUsize,
    pub pokes: Mutex<Vec<(String, String, Value)>>,
    pub fail_pokes: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
}

impl MockTransport {
    pub fn new(responder: impl Fn(&str) -> Result<Value, TransportError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            scries: Mutex::new(Vec::new()),
            scry_count: AtomicUsize::new(0),
            pokes: Mutex::new(Vec::new()),
            fail_pokes: AtomicBool::new(false),
            gate: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Make scries wait until the returned notify is signalled.
    pub fn hold_scries(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn scry_count(&self) -> usize {
        self.scry_count.load(Ordering::SeqCst)
    }

    pub fn emit(&self, mark: &str, json: Value) {
        for tx in self.subscribers.lock().unwrap().iter() {
            let _ = tx.send(TransportEvent {
                mark: mark.to_string(),
                json: json.clone(),
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn scry(&self, _app: &str, path: &str) -> Result<Value, TransportError> {
        self.scries.lock().unwrap().push(path.to_string());
        self.scry_count.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        (self.responder)(path)
    }

    async fn poke(&self, app: &str, mark: &str, payload: Value) -> Result<(), TransportError> {
        self.pokes
            .lock()
            .unwrap()
            .push((app.to_string(), mark.to_string(), payload));
        if self.fail_pokes.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected {
                app: app.to_string(),
                reason: "nack".into(),
            });
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        _app: &str,
        _path: &str,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn id_for(key: u128) -> String {
    format!("~zod/{}", Timestamp::new(key).to_ud())
}

pub fn writ_json(key: u128, replying: Option<&str>) -> Value {
    json!({
        "seal": { "id": id_for(key), "feels": {}, "replied": [] },
        "memo": {
            "replying": replying,
            "author": "~zod",
            "sent": 1_700_000_000_000_i64,
            "content": { "story": { "block": [], "inline": [format!("entry {key}")] } }
        }
    })
}

/// A `{ud-key: writ}` page for the given keys.
pub fn page(keys: impl IntoIterator<Item = u128>) -> Value {
    let mut map = serde_json::Map::new();
    for key in keys {
        map.insert(Timestamp::new(key).to_ud(), writ_json(key, None));
    }
    Value::Object(map)
}

/// The `<anchor>/<count>` tail of a directional scry path, as numbers.
pub fn anchor_of(path: &str, dir: &str) -> Option<(u128, usize)> {
    let (_, tail) = path.split_once(&format!("/{dir}/"))?;
    let (anchor, count) = tail.split_once('/')?;
    let anchor = anchor.replace('.', "").parse().ok()?;
    Some((anchor, count.parse().ok()?))
}
