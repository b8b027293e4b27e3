//! In-process loopback backend.
//!
//! Honours the backend event contract without a network: sent messages are
//! echoed back as `chatMessage`, history is replayed from what was sent in
//! this process, and the metrics queries report a mixnode pool that grows by
//! one per query up to a configured target. Events are emitted from a
//! dedicated thread, like a real backend's I/O thread would.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::backend::{
    Backend, EventHandler, InitPayload, EVENT_CHAT_MESSAGE, EVENT_HISTORY_MESSAGE,
    EVENT_LIGHTPUSH_PEERS_COUNT, EVENT_MIXNODE_POOL_SIZE,
};
use crate::identity::NodeKey;
use crate::util::timestamp_now;

const KNOWN_EVENTS: [&str; 4] = [
    EVENT_CHAT_MESSAGE,
    EVENT_HISTORY_MESSAGE,
    EVENT_MIXNODE_POOL_SIZE,
    EVENT_LIGHTPUSH_PEERS_COUNT,
];

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Pool size the simulated mixnet settles at.
    pub mixnode_target: u64,
    pub lightpush_peers: u64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            mixnode_target: 5,
            lightpush_peers: 2,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    timestamp: String,
    sender: String,
    text: String,
}

#[derive(Default)]
struct LoopbackState {
    initialized: bool,
    joined: HashSet<String>,
    history: HashMap<String, Vec<StoredMessage>>,
    pool_size: u64,
}

type Emission = (&'static str, Vec<Value>);
type HandlerMap = Arc<Mutex<HashMap<String, EventHandler>>>;

pub struct LoopbackBackend {
    config: LoopbackConfig,
    handlers: HandlerMap,
    emit_tx: mpsc::UnboundedSender<Emission>,
    state: Mutex<LoopbackState>,
    connected: AtomicBool,
}

impl LoopbackBackend {
    /// Create the backend and its emitter thread. The thread exits when the
    /// backend is dropped.
    pub fn start(config: LoopbackConfig) -> Arc<Self> {
        let (emit_tx, emit_rx) = mpsc::unbounded_channel();
        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));

        let emitter_handlers = Arc::clone(&handlers);
        std::thread::Builder::new()
            .name("loopback-emitter".to_string())
            .spawn(move || Self::emit_loop(emit_rx, emitter_handlers))
            .map_err(|e| log::error!("Failed to spawn loopback emitter: {}", e))
            .ok();

        Arc::new(Self {
            config,
            handlers,
            emit_tx,
            state: Mutex::new(LoopbackState::default()),
            connected: AtomicBool::new(false),
        })
    }

    fn emit_loop(mut rx: mpsc::UnboundedReceiver<Emission>, handlers: HandlerMap) {
        while let Some((event, args)) = rx.blocking_recv() {
            let handlers = handlers.lock().unwrap();
            match handlers.get(event) {
                Some(handler) => handler(args),
                None => log::trace!("No subscriber for {}, event discarded", event),
            }
        }
        log::debug!("Loopback emitter stopped");
    }

    /// Simulate losing (or regaining) the backend connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    fn emit(&self, event: &'static str, args: Vec<Value>) {
        if self.emit_tx.send((event, args)).is_err() {
            log::warn!("Loopback emitter gone, dropping {} event", event);
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }
}

#[async_trait]
impl Backend for LoopbackBackend {
    fn name(&self) -> &str {
        "loopback"
    }

    fn on(&self, event: &str, handler: EventHandler) -> bool {
        if !KNOWN_EVENTS.contains(&event) {
            return false;
        }
        self.handlers
            .lock()
            .unwrap()
            .insert(event.to_string(), handler);
        true
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn initialize(&self, payload: &InitPayload) -> bool {
        if NodeKey::from_hex(&payload.node_key).is_none() {
            log::error!("Loopback initialize rejected: malformed node key");
            return false;
        }

        log::info!(
            "Loopback initialized (mode={}, bootstrap=[{}], mixnodes=[{}], store={:?})",
            payload.mode,
            payload.bootstrap_nodes,
            payload.mixnodes,
            payload.store_node
        );
        self.state.lock().unwrap().initialized = true;
        self.set_connected(true);
        true
    }

    async fn join_channel(&self, name: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.initialized {
            return false;
        }
        state.joined.insert(name.to_string());
        true
    }

    async fn send_message(&self, channel: &str, sender: &str, text: &str) {
        let stored = {
            let mut state = self.state.lock().unwrap();
            if !state.joined.contains(channel) {
                log::warn!("Loopback: not joined to {}, message dropped", channel);
                return;
            }
            let stored = StoredMessage {
                timestamp: timestamp_now(),
                sender: sender.to_string(),
                text: text.to_string(),
            };
            state
                .history
                .entry(channel.to_string())
                .or_default()
                .push(stored.clone());
            stored
        };

        self.emit(
            EVENT_CHAT_MESSAGE,
            vec![json!(stored.timestamp), json!(stored.sender), json!(stored.text)],
        );
    }

    async fn retrieve_history(&self, channel: &str) -> bool {
        let entries = {
            let state = self.state.lock().unwrap();
            if !state.initialized {
                return false;
            }
            state.history.get(channel).cloned().unwrap_or_default()
        };

        for entry in entries {
            self.emit(
                EVENT_HISTORY_MESSAGE,
                vec![json!(entry.timestamp), json!(entry.sender), json!(entry.text)],
            );
        }
        true
    }

    async fn get_mixnode_pool_size(&self) {
        let size = {
            let mut state = self.state.lock().unwrap();
            if state.initialized && state.pool_size < self.config.mixnode_target {
                state.pool_size += 1;
            }
            state.pool_size
        };
        self.emit(EVENT_MIXNODE_POOL_SIZE, vec![json!(size)]);
    }

    async fn get_lightpush_peers_count(&self) {
        let count = if self.is_initialized() {
            self.config.lightpush_peers
        } else {
            0
        };
        self.emit(EVENT_LIGHTPUSH_PEERS_COUNT, vec![json!(count)]);
    }
}
