//! Contract with the external messaging backend.
//!
//! The backend is an opaque peer-to-peer module: commands go in through
//! [`Backend`], results come back later as named events carrying positional
//! JSON arguments.

use async_trait::async_trait;
use serde::Serialize;

use crate::identity::NodeKey;
use crate::settings::DiscoveryConfig;

pub const EVENT_CHAT_MESSAGE: &str = "chatMessage";
pub const EVENT_HISTORY_MESSAGE: &str = "historyMessage";
pub const EVENT_MIXNODE_POOL_SIZE: &str = "mixnodePoolSizeResponse";
pub const EVENT_LIGHTPUSH_PEERS_COUNT: &str = "lightpushPeersCountResponse";

/// Callback the backend invokes for each emitted event. It may be called
/// from any thread.
pub type EventHandler = Box<dyn Fn(Vec<serde_json::Value>) + Send + Sync>;

/// Payload handed to [`Backend::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub mode: u8,
    pub bootstrap_nodes: String,
    pub mixnodes: String,
    pub store_node: String,
    pub node_key: String,
}

impl InitPayload {
    pub fn new(discovery: &DiscoveryConfig, node_key: &NodeKey) -> Self {
        Self {
            mode: discovery.mode.as_int(),
            bootstrap_nodes: discovery.bootstrap_addresses(),
            mixnodes: discovery.mixnodes(),
            store_node: discovery.store_node.clone(),
            node_key: node_key.to_hex(),
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Register `handler` for `event`. Returns false if the backend refuses
    /// the subscription.
    fn on(&self, event: &str, handler: EventHandler) -> bool;

    fn is_connected(&self) -> bool;

    async fn initialize(&self, payload: &InitPayload) -> bool;

    async fn join_channel(&self, name: &str) -> bool;

    async fn send_message(&self, channel: &str, sender: &str, text: &str);

    /// Ask for stored history; entries arrive as `historyMessage` events.
    async fn retrieve_history(&self, channel: &str) -> bool;

    /// Answered by a `mixnodePoolSizeResponse` event.
    async fn get_mixnode_pool_size(&self);

    /// Answered by a `lightpushPeersCountResponse` event.
    async fn get_lightpush_peers_count(&self);
}
