use crate::bridge::BackendEvent;
use crate::message::Message;

use super::*;

impl SessionController {
    /// Apply one validated backend event. Runs on the controller task only.
    pub fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Chat {
                timestamp,
                sender,
                text,
            } => {
                log::debug!("chatMessage [{}] {}: {}", timestamp, sender, text);
                self.append_message(Message::chat(&sender, &text));
            }
            BackendEvent::History {
                timestamp,
                sender,
                text,
            } => {
                log::debug!("historyMessage [{}] {}: {}", timestamp, sender, text);
                self.append_message(Message::history(&sender, &text));
            }
            BackendEvent::MixnodePoolSize { size } => {
                let update = self.poller.record_mixnode_pool_size(size);
                if update.changed {
                    self.notifier.notify(Change::MixnodePoolSize);
                }
                if update.engaged_slow_mode {
                    log::info!(
                        "Mixnode pool size reached {}, polling every {:?} from now on",
                        size,
                        SLOW_POLL_INTERVAL
                    );
                    self.notifier.notify(Change::PollInterval);
                }
            }
            BackendEvent::LightpushPeersCount { count } => {
                if self.poller.record_lightpush_peers_count(count) {
                    self.notifier.notify(Change::LightpushPeersCount);
                }
            }
        }
    }

    /// Timer tick. Suppressed while the session is not ready.
    pub(super) async fn poll_metrics(&mut self) {
        if self.status != SessionStatus::Ready {
            log::debug!("Skipping metrics poll, session is {:?}", self.status);
            return;
        }
        self.refresh_metrics().await;
    }

    /// Fire both network-health queries. Answers come back as events.
    pub(super) async fn refresh_metrics(&self) {
        self.backend.get_mixnode_pool_size().await;
        self.backend.get_lightpush_peers_count().await;
    }

    /// Apply every event already queued by the bridge, in order.
    pub fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }
}
