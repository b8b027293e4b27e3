use crate::backend::{
    InitPayload, EVENT_CHAT_MESSAGE, EVENT_HISTORY_MESSAGE, EVENT_LIGHTPUSH_PEERS_COUNT,
    EVENT_MIXNODE_POOL_SIZE,
};
use crate::message::Message;
use crate::settings::DiscoveryMode;
use crate::util::non_empty_trimmed;

use super::*;

const SUBSCRIBED_EVENTS: [&str; 4] = [
    EVENT_CHAT_MESSAGE,
    EVENT_HISTORY_MESSAGE,
    EVENT_MIXNODE_POOL_SIZE,
    EVENT_LIGHTPUSH_PEERS_COUNT,
];

impl SessionController {
    /// Bring the backend up. Only valid once, from `NotInitialized`; a
    /// failure leaves the controller in `Error` for good.
    pub async fn initialize(&mut self) {
        if self.status != SessionStatus::NotInitialized {
            log::warn!("Initialize ignored, session is {:?}", self.status);
            return;
        }
        self.set_status(SessionStatus::Initializing);

        let mut subscribed = 0;
        for event in SUBSCRIBED_EVENTS {
            if self.bridge.subscribe(self.backend.as_ref(), event) {
                subscribed += 1;
            }
        }
        log::debug!(
            "Subscribed to {}/{} backend events",
            subscribed,
            SUBSCRIBED_EVENTS.len()
        );

        let payload = InitPayload::new(&self.discovery, self.identity.node_key());
        if !self.backend.initialize(&payload).await {
            log::error!("Backend {} failed to initialize", self.backend.name());
            self.set_status(SessionStatus::Error);
            return;
        }

        self.set_status(SessionStatus::Ready);
        self.poller.start();
        self.notifier.notify(Change::PollInterval);
        self.refresh_metrics().await;

        let channel = self.default_channel.clone();
        self.join_channel(&channel).await;
    }

    pub async fn join_channel(&mut self, name: &str) {
        let name = match non_empty_trimmed(name) {
            Some(name) => name.to_string(),
            None => {
                log::warn!("Cannot join channel with empty name");
                return;
            }
        };

        if self.status != SessionStatus::Ready {
            log::warn!("Session not ready, cannot join channel {}", name);
            return;
        }

        if !self.backend.join_channel(&name).await {
            log::warn!("Failed to join channel: {}", name);
            return;
        }

        // Only after the backend accepted the join: a failed join keeps the old log.
        self.messages.clear();
        self.set_current_channel(name.clone());
        self.append_message(Message::joined(&name));
        log::info!("Joined channel: {}", name);

        self.request_history(&name).await;
    }

    /// Hand `text` to the backend. Nothing is appended locally; the backend
    /// echoes our own messages back as `chatMessage` events.
    pub async fn send_message(&mut self, text: &str) {
        let text = match non_empty_trimmed(text) {
            Some(text) => text,
            None => return,
        };

        if self.status != SessionStatus::Ready {
            log::warn!("Session not ready, cannot send message");
            return;
        }

        let channel = match &self.current_channel {
            Some(channel) => channel.clone(),
            None => {
                log::warn!("No channel selected, cannot send message");
                return;
            }
        };

        if !self.backend.is_connected() {
            log::warn!("Backend {} not connected, dropping message", self.backend.name());
            return;
        }

        self.backend
            .send_message(&channel, self.identity.username(), text)
            .await;
        log::debug!("Sent message to channel {}", channel);
    }

    /// Ask again for the current channel's history.
    pub async fn retrieve_history(&mut self) {
        if self.status != SessionStatus::Ready {
            log::warn!("Session not ready, cannot retrieve history");
            return;
        }
        match self.current_channel.clone() {
            Some(channel) => self.request_history(&channel).await,
            None => log::warn!("No channel selected, cannot retrieve history"),
        }
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.notifier.notify(Change::Messages);
    }

    /// Replace the node key and persist it right away. The running backend
    /// keeps the old identity until it is restarted.
    pub fn reset_peer_id(&mut self) {
        let key = self.identity.regenerate_node_key().clone();
        match self.settings.save_node_key(&key) {
            Ok(()) => log::info!("Node key reset to {:?}, backend restart required", key),
            Err(e) => log::error!("Failed to persist new node key: {}", e),
        }

        if !self.restart_required {
            self.restart_required = true;
            self.notifier.notify(Change::RestartRequired);
        }
    }

    pub fn set_discovery_mode(&mut self, mode: DiscoveryMode) {
        if self.discovery.mode != mode {
            self.discovery.mode = mode;
            self.notifier.notify(Change::DiscoveryMode);
        }
    }

    pub fn set_store_node(&mut self, address: &str) {
        let address = address.trim();
        if self.discovery.store_node != address {
            self.discovery.store_node = address.to_string();
            self.notifier.notify(Change::StoreNode);
        }
    }

    pub fn add_bootstrap_node(&mut self, address: &str, mix_pub_key: Option<&str>) -> bool {
        let added = self.discovery.add_bootstrap_node(address, mix_pub_key);
        if added {
            self.notifier.notify(Change::BootstrapNodes);
        } else {
            log::debug!("Bootstrap node {:?} not added (blank or duplicate)", address);
        }
        added
    }

    pub fn update_bootstrap_mix_key(&mut self, index: usize, mix_pub_key: &str) -> bool {
        let updated = self.discovery.update_mix_key(index, mix_pub_key);
        if updated {
            self.notifier.notify(Change::BootstrapNodes);
        } else {
            log::debug!("No bootstrap node at index {}", index);
        }
        updated
    }

    pub fn remove_bootstrap_node(&mut self, index: usize) -> bool {
        let removed = self.discovery.remove_bootstrap_node(index);
        if removed {
            self.notifier.notify(Change::BootstrapNodes);
        } else {
            log::debug!("No bootstrap node at index {}", index);
        }
        removed
    }

    /// Persist the discovery settings and node key in one batch.
    pub fn save_settings(&mut self) -> bool {
        match self.settings.save(&self.discovery, self.identity.node_key()) {
            Ok(()) => {
                log::info!(
                    "Saved settings ({} bootstrap node(s))",
                    self.discovery.bootstrap_nodes().len()
                );
                true
            }
            Err(e) => {
                log::error!("Failed to save settings: {}", e);
                false
            }
        }
    }

    async fn request_history(&mut self, channel: &str) {
        self.append_message(Message::history_marker());
        let requested = self.backend.retrieve_history(channel).await;
        if requested {
            log::debug!("Requested message history for {}", channel);
        } else {
            log::warn!("Failed to request message history for {}", channel);
        }
    }
}
