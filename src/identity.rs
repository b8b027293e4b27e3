//! Session identity: the persisted node key and the per-session display name.

use std::fmt;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

const ADJECTIVES: &[&str] = &[
    "Amber", "Bold", "Brisk", "Calm", "Clever", "Cosmic", "Crimson", "Curious", "Dapper", "Eager",
    "Fuzzy", "Gentle", "Golden", "Happy", "Hidden", "Jolly", "Lucky", "Mellow", "Misty", "Nimble",
    "Quiet", "Rapid", "Rustic", "Silent", "Sleepy", "Snowy", "Sunny", "Swift", "Velvet", "Witty",
];

const NOUNS: &[&str] = &[
    "Badger", "Beacon", "Comet", "Cricket", "Falcon", "Ferret", "Fox", "Gecko", "Harbor", "Heron",
    "Lantern", "Lynx", "Meadow", "Otter", "Owl", "Panda", "Pebble", "Pine", "Raven", "River",
    "Sparrow", "Squid", "Tiger", "Tortoise", "Walrus", "Willow", "Wolf", "Wren", "Yak", "Zebra",
];

pub const NODE_KEY_BYTES: usize = 32;

/// 256-bit node key used by the backend as its stable network identity.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeKey([u8; NODE_KEY_BYTES]);

impl NodeKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; NODE_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a 64-character hex string. Returns `None` for anything else.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; NODE_KEY_BYTES];
        hex::decode_to_slice(s.trim(), &mut bytes).ok()?;
        Some(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// Keep the full key out of debug logs.
impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({}..)", &self.to_hex()[..8])
    }
}

/// Compose a display name from one adjective and one noun.
pub fn generate_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Anonymous");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Peer");
    format!("{}{}", adjective, noun)
}

#[derive(Debug, Clone)]
pub struct Identity {
    node_key: NodeKey,
    username: String,
}

impl Identity {
    /// Build an identity around a loaded (or freshly generated) node key.
    /// The username is drawn here and never changes afterwards.
    pub fn new(node_key: NodeKey) -> Self {
        let username = generate_username(&mut rand::thread_rng());
        log::info!("Generated username for this session: {}", username);
        Self { node_key, username }
    }

    pub fn node_key(&self) -> &NodeKey {
        &self.node_key
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Replace the node key. The caller is responsible for persisting it.
    pub fn regenerate_node_key(&mut self) -> &NodeKey {
        self.node_key = NodeKey::generate();
        &self.node_key
    }
}
