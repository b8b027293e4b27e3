use std::sync::Arc;

use serde::Serialize;

use crate::backend::Backend;
use crate::bridge::{EventBridge, EventReceiver};
use crate::config::SessionConfig;
use crate::identity::Identity;
use crate::message::{Message, MessageLog};
use crate::settings::{BootstrapNode, DiscoveryConfig, SettingsRegistry};
use crate::store::SettingsStore;

mod commands;
mod events;
mod handle;
mod metrics;
mod notifier;
mod runtime;


pub use handle::{Command, CommandReceiver, SessionHandle};
pub use notifier::Change;

use metrics::{MetricsPoller, SLOW_POLL_INTERVAL};
use notifier::ChangeNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    NotInitialized,
    Initializing,
    Ready,
    Error,
}

/// Everything a UI may observe, read in one piece.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: SessionStatus,
    pub current_channel: String,
    pub username: String,
    pub messages: Vec<Message>,
    pub mixnode_pool_size: u64,
    pub lightpush_peers_count: u64,
    pub poll_interval_ms: u64,
    pub slow_mode_engaged: bool,
    pub discovery_mode: u8,
    pub bootstrap_nodes: Vec<BootstrapNode>,
    pub store_node: String,
    pub restart_required: bool,
    /// Backend events dropped at the bridge (malformed or queue overflow).
    pub dropped_events: usize,
}

pub struct SessionController {
    backend: Arc<dyn Backend>,
    settings: SettingsRegistry,
    identity: Identity,
    discovery: DiscoveryConfig,
    status: SessionStatus,
    current_channel: Option<String>,
    messages: MessageLog,
    poller: MetricsPoller,
    /// Backend subscriptions owned by this controller alone.
    bridge: EventBridge,
    events: EventReceiver,
    notifier: ChangeNotifier,
    default_channel: String,
    /// Set once the node key changed under a running backend.
    restart_required: bool,
}

impl SessionController {
    /// Build a controller over `backend`, loading discovery settings and the
    /// node key from `store`. A missing node key is generated and persisted.
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn SettingsStore>,
        config: &SessionConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let settings = SettingsRegistry::new(store);
        let (discovery, node_key) = settings.load_or_init()?;
        let identity = Identity::new(node_key);
        let (bridge, events) = EventBridge::new(identity.username(), config.event_queue_capacity);

        Ok(Self {
            backend,
            settings,
            identity,
            discovery,
            status: SessionStatus::NotInitialized,
            current_channel: None,
            messages: MessageLog::new(),
            poller: MetricsPoller::new(),
            bridge,
            events,
            notifier: ChangeNotifier::new(),
            default_channel: config.default_channel.clone(),
            restart_required: false,
        })
    }

    pub fn view(&self) -> SessionView {
        let metrics = self.poller.metrics();
        SessionView {
            status: self.status,
            current_channel: self.current_channel.clone().unwrap_or_default(),
            username: self.identity.username().to_string(),
            messages: self.messages.entries().to_vec(),
            mixnode_pool_size: metrics.mixnode_pool_size,
            lightpush_peers_count: metrics.lightpush_peers_count,
            poll_interval_ms: metrics.poll_interval_ms,
            slow_mode_engaged: metrics.slow_mode_engaged,
            discovery_mode: self.discovery.mode.as_int(),
            bootstrap_nodes: self.discovery.bootstrap_nodes().to_vec(),
            store_node: self.discovery.store_node.clone(),
            restart_required: self.restart_required,
            dropped_events: self.bridge.dropped_count(),
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            log::info!("Session status {:?} -> {:?}", self.status, status);
            self.status = status;
            self.notifier.notify(Change::Status);
        }
    }

    fn set_current_channel(&mut self, channel: String) {
        if self.current_channel.as_deref() != Some(channel.as_str()) {
            log::debug!("Current channel changed to {}", channel);
            self.current_channel = Some(channel);
            self.notifier.notify(Change::CurrentChannel);
        }
    }

    fn append_message(&mut self, msg: Message) {
        self.messages.append(msg);
        self.notifier.notify(Change::Messages);
    }
}

#[cfg(test)]
impl SessionController {
    pub fn username(&self) -> &str {
        self.identity.username()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_channel(&self) -> Option<&str> {
        self.current_channel.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        self.messages.entries()
    }

    pub fn metrics(&self) -> &metrics::NetworkMetrics {
        self.poller.metrics()
    }

    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    pub fn restart_required(&self) -> bool {
        self.restart_required
    }

    pub fn dropped_events(&self) -> usize {
        self.bridge.dropped_count()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Change> {
        self.notifier.subscribe()
    }
}
