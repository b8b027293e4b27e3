use tokio::sync::{broadcast, mpsc, oneshot};

use crate::settings::DiscoveryMode;

use super::*;

/// Requests a UI (or any other task) can make of the controller task.
#[derive(Debug)]
pub enum Command {
    Initialize,
    JoinChannel(String),
    SendMessage(String),
    RetrieveHistory,
    ClearMessages,
    ResetPeerId,
    SetDiscoveryMode(DiscoveryMode),
    SetStoreNode(String),
    AddBootstrapNode {
        address: String,
        mix_pub_key: Option<String>,
    },
    UpdateBootstrapMixKey {
        index: usize,
        mix_pub_key: String,
    },
    RemoveBootstrapNode(usize),
    SaveSettings,
    Snapshot(oneshot::Sender<SessionView>),
}

pub type CommandReceiver = mpsc::Receiver<Command>;

/// Cloneable handle to a running controller.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    changes: broadcast::Sender<Change>,
}

impl SessionHandle {
    /// Queue a command. Returns false once the controller has stopped.
    pub async fn send(&self, command: Command) -> bool {
        match self.tx.send(command).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Session controller stopped, dropping {:?}", e.0);
                false
            }
        }
    }

    pub async fn initialize(&self) -> bool {
        self.send(Command::Initialize).await
    }

    /// Current observable state, or `None` if the controller has stopped.
    pub async fn snapshot(&self) -> Option<SessionView> {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::Snapshot(tx)).await {
            return None;
        }
        rx.await.ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}

impl SessionController {
    /// Create the command channel the run loop drains, plus a handle for
    /// other tasks.
    pub fn handle(&self, capacity: usize) -> (SessionHandle, CommandReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = SessionHandle {
            tx,
            changes: self.notifier.sender(),
        };
        (handle, rx)
    }

    pub(super) async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initialize => self.initialize().await,
            Command::JoinChannel(name) => self.join_channel(&name).await,
            Command::SendMessage(text) => self.send_message(&text).await,
            Command::RetrieveHistory => self.retrieve_history().await,
            Command::ClearMessages => self.clear_messages(),
            Command::ResetPeerId => self.reset_peer_id(),
            Command::SetDiscoveryMode(mode) => self.set_discovery_mode(mode),
            Command::SetStoreNode(address) => self.set_store_node(&address),
            Command::AddBootstrapNode {
                address,
                mix_pub_key,
            } => {
                self.add_bootstrap_node(&address, mix_pub_key.as_deref());
            }
            Command::UpdateBootstrapMixKey { index, mix_pub_key } => {
                self.update_bootstrap_mix_key(index, &mix_pub_key);
            }
            Command::RemoveBootstrapNode(index) => {
                self.remove_bootstrap_node(index);
            }
            Command::SaveSettings => {
                self.save_settings();
            }
            Command::Snapshot(reply) => {
                // The requester may have given up; nothing to do then.
                let _ = reply.send(self.view());
            }
        }
    }
}
