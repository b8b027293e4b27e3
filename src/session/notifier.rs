use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Which observable property changed. Observers re-read state on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Status,
    CurrentChannel,
    Messages,
    MixnodePoolSize,
    LightpushPeersCount,
    PollInterval,
    DiscoveryMode,
    BootstrapNodes,
    StoreNode,
    RestartRequired,
}

impl Change {
    pub fn name(self) -> &'static str {
        match self {
            Change::Status => "status",
            Change::CurrentChannel => "currentChannel",
            Change::Messages => "messages",
            Change::MixnodePoolSize => "mixnodePoolSize",
            Change::LightpushPeersCount => "lightpushPeersCount",
            Change::PollInterval => "pollInterval",
            Change::DiscoveryMode => "discoveryMode",
            Change::BootstrapNodes => "bootstrapNodes",
            Change::StoreNode => "storeNode",
            Change::RestartRequired => "restartRequired",
        }
    }
}

pub(super) struct ChangeNotifier {
    tx: broadcast::Sender<Change>,
}

impl ChangeNotifier {
    pub(super) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(super) fn sender(&self) -> broadcast::Sender<Change> {
        self.tx.clone()
    }

    #[cfg(test)]
    pub(super) fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    /// Non-blocking, best-effort: no subscribers is not an error.
    pub(super) fn notify(&self, change: Change) {
        let _ = self.tx.send(change);
    }
}
