use serde::Serialize;

use crate::util::timestamp_now;

pub const SYSTEM_SENDER: &str = "System";
pub const HISTORY_PREFIX: &str = "[HISTORY] ";
pub const HISTORY_MARKER: &str = "--- Message History ---";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender: String,
    pub text: String,
    /// Local generation time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub is_system: bool,
    pub is_history: bool,
}

impl Message {
    pub fn chat(sender: &str, text: &str) -> Self {
        Self {
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: timestamp_now(),
            is_system: false,
            is_history: false,
        }
    }

    pub fn history(sender: &str, text: &str) -> Self {
        Self {
            sender: format!("{}{}", HISTORY_PREFIX, sender),
            is_history: true,
            ..Self::chat(sender, text)
        }
    }

    pub fn system(text: &str) -> Self {
        Self {
            is_system: true,
            ..Self::chat(SYSTEM_SENDER, text)
        }
    }

    pub fn joined(channel: &str) -> Self {
        Self::system(&format!("You have joined channel: {}", channel))
    }

    pub fn history_marker() -> Self {
        Self::system(HISTORY_MARKER)
    }
}

/// Messages for the current channel, in arrival order.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, msg: Message) {
        self.entries.push(msg);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }
}
