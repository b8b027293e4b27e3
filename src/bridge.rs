//! Event bridge between the messaging backend and the session controller.
//!
//! Backend callbacks may fire on any thread. Each callback validates its
//! positional payload into a [`BackendEvent`] and hands it to the controller
//! task through a bounded queue. The emitting side never waits: a full or
//! closed queue drops the event with a warning.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::backend::{
    Backend, EventHandler, EVENT_CHAT_MESSAGE, EVENT_HISTORY_MESSAGE,
    EVENT_LIGHTPUSH_PEERS_COUNT, EVENT_MIXNODE_POOL_SIZE,
};

/// A validated backend event.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Chat {
        timestamp: String,
        sender: String,
        text: String,
    },
    History {
        timestamp: String,
        sender: String,
        text: String,
    },
    MixnodePoolSize {
        size: u64,
    },
    LightpushPeersCount {
        count: u64,
    },
}

/// Sender half used by backend callbacks.
pub type EventSender = mpsc::Sender<BackendEvent>;

/// Receiver half drained by the controller task.
pub type EventReceiver = mpsc::Receiver<BackendEvent>;

#[derive(Debug, PartialEq)]
pub enum PayloadError {
    UnknownEvent(String),
    MissingFields {
        event: &'static str,
        expected: usize,
        got: usize,
    },
    InvalidCount {
        event: &'static str,
        value: String,
    },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::UnknownEvent(name) => write!(f, "unknown event {:?}", name),
            PayloadError::MissingFields {
                event,
                expected,
                got,
            } => write!(
                f,
                "{} payload missing fields (expected {}, got {})",
                event, expected, got
            ),
            PayloadError::InvalidCount { event, value } => {
                write!(f, "{} payload has invalid count {}", event, value)
            }
        }
    }
}

impl std::error::Error for PayloadError {}

fn text_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn count_field(event: &'static str, value: &Value) -> Result<u64, PayloadError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| PayloadError::InvalidCount {
        event,
        value: value.to_string(),
    })
}

fn require(event: &'static str, args: &[Value], expected: usize) -> Result<(), PayloadError> {
    if args.len() < expected {
        return Err(PayloadError::MissingFields {
            event,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Validate a positional payload for the named event.
pub fn parse_event(event: &str, args: &[Value]) -> Result<BackendEvent, PayloadError> {
    match event {
        EVENT_CHAT_MESSAGE => {
            require(EVENT_CHAT_MESSAGE, args, 3)?;
            Ok(BackendEvent::Chat {
                timestamp: text_field(&args[0]),
                sender: text_field(&args[1]),
                text: text_field(&args[2]),
            })
        }
        EVENT_HISTORY_MESSAGE => {
            require(EVENT_HISTORY_MESSAGE, args, 3)?;
            Ok(BackendEvent::History {
                timestamp: text_field(&args[0]),
                sender: text_field(&args[1]),
                text: text_field(&args[2]),
            })
        }
        EVENT_MIXNODE_POOL_SIZE => {
            require(EVENT_MIXNODE_POOL_SIZE, args, 1)?;
            Ok(BackendEvent::MixnodePoolSize {
                size: count_field(EVENT_MIXNODE_POOL_SIZE, &args[0])?,
            })
        }
        EVENT_LIGHTPUSH_PEERS_COUNT => {
            require(EVENT_LIGHTPUSH_PEERS_COUNT, args, 1)?;
            Ok(BackendEvent::LightpushPeersCount {
                count: count_field(EVENT_LIGHTPUSH_PEERS_COUNT, &args[0])?,
            })
        }
        other => Err(PayloadError::UnknownEvent(other.to_string())),
    }
}

/// Per-controller event bridge. Handlers capture only this bridge's queue.
pub struct EventBridge {
    owner: String,
    tx: EventSender,
    dropped: Arc<AtomicUsize>,
}

impl EventBridge {
    /// Create a bridge for `owner` (used in log lines) and the receiver the
    /// controller drains.
    pub fn new(owner: &str, capacity: usize) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bridge = Self {
            owner: owner.to_string(),
            tx,
            dropped: Arc::new(AtomicUsize::new(0)),
        };
        (bridge, rx)
    }

    /// Register a handler for `event` with the backend. A refusal is logged
    /// and reported, never fatal.
    pub fn subscribe(&self, backend: &dyn Backend, event: &str) -> bool {
        let accepted = backend.on(event, self.handler_for(event));
        if accepted {
            log::debug!("[{}] subscribed to {} events", self.owner, event);
        } else {
            log::warn!(
                "[{}] {} rejected subscription to {} events",
                self.owner,
                backend.name(),
                event
            );
        }
        accepted
    }

    /// Build the callback for `event`.
    pub fn handler_for(&self, event: &str) -> EventHandler {
        let event = event.to_string();
        let owner = self.owner.clone();
        let tx = self.tx.clone();
        let dropped = Arc::clone(&self.dropped);

        Box::new(move |args: Vec<Value>| {
            let parsed = match parse_event(&event, &args) {
                Ok(parsed) => parsed,
                Err(e) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("[{}] dropping event: {}", owner, e);
                    return;
                }
            };

            match tx.try_send(parsed) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("[{}] event queue full, dropping {} event", owner, event);
                }
                Err(TrySendError::Closed(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[{}] controller gone, dropping {} event", owner, event);
                }
            }
        })
    }

    /// Number of events dropped so far (malformed payloads or a full queue).
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
