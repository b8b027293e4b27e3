use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::NodeKey;
use crate::store::{SettingsStore, StoreResult};
use crate::util::non_empty_trimmed;

pub const KEY_NODE_KEY: &str = "nodeKey";
pub const KEY_DISCOVERY_MODE: &str = "discoveryMode";
pub const KEY_BOOTSTRAP_NODES: &str = "bootstrapNodes";
pub const KEY_STORE_NODE: &str = "storeNode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    ExtKadOnly,
    StdDiscovery,
    #[default]
    All,
}

impl DiscoveryMode {
    pub fn as_int(self) -> u8 {
        match self {
            DiscoveryMode::ExtKadOnly => 0,
            DiscoveryMode::StdDiscovery => 1,
            DiscoveryMode::All => 2,
        }
    }

    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(DiscoveryMode::ExtKadOnly),
            1 => Some(DiscoveryMode::StdDiscovery),
            2 => Some(DiscoveryMode::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapNode {
    pub address: String,
    #[serde(default)]
    pub mix_pub_key: Option<String>,
}

impl BootstrapNode {
    /// `None` when the address is blank. Blank mix keys are stored as absent.
    pub fn new(address: &str, mix_pub_key: Option<&str>) -> Option<Self> {
        let address = non_empty_trimmed(address)?;
        Some(Self {
            address: address.to_string(),
            mix_pub_key: mix_pub_key.and_then(non_empty_trimmed).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoveryConfig {
    pub mode: DiscoveryMode,
    bootstrap_nodes: Vec<BootstrapNode>,
    pub store_node: String,
}

impl DiscoveryConfig {
    pub fn bootstrap_nodes(&self) -> &[BootstrapNode] {
        &self.bootstrap_nodes
    }

    /// Append a node unless its trimmed address is blank or already listed.
    pub fn add_bootstrap_node(&mut self, address: &str, mix_pub_key: Option<&str>) -> bool {
        let node = match BootstrapNode::new(address, mix_pub_key) {
            Some(node) => node,
            None => return false,
        };
        if self.bootstrap_nodes.iter().any(|n| n.address == node.address) {
            return false;
        }
        self.bootstrap_nodes.push(node);
        true
    }

    pub fn update_mix_key(&mut self, index: usize, mix_pub_key: &str) -> bool {
        match self.bootstrap_nodes.get_mut(index) {
            Some(node) => {
                node.mix_pub_key = non_empty_trimmed(mix_pub_key).map(str::to_string);
                true
            }
            None => false,
        }
    }

    pub fn remove_bootstrap_node(&mut self, index: usize) -> bool {
        if index < self.bootstrap_nodes.len() {
            self.bootstrap_nodes.remove(index);
            true
        } else {
            false
        }
    }

    /// Comma-joined bootstrap addresses, in list order.
    pub fn bootstrap_addresses(&self) -> String {
        self.bootstrap_nodes
            .iter()
            .map(|n| n.address.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Comma-joined `address:mixPubKey` pairs for nodes that carry a mix key.
    pub fn mixnodes(&self) -> String {
        self.bootstrap_nodes
            .iter()
            .filter_map(|n| {
                n.mix_pub_key
                    .as_deref()
                    .map(|key| format!("{}:{}", n.address, key))
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn set_bootstrap_nodes(&mut self, nodes: Vec<BootstrapNode>) {
        self.bootstrap_nodes.clear();
        for node in nodes {
            if !self.add_bootstrap_node(&node.address, node.mix_pub_key.as_deref()) {
                log::warn!("Skipping invalid or duplicate stored bootstrap node {:?}", node.address);
            }
        }
    }
}

/// What was found in the store.
#[derive(Debug, Clone)]
pub struct StoredSettings {
    pub discovery: DiscoveryConfig,
    pub node_key: Option<NodeKey>,
}

/// Typed view over the settings store.
pub struct SettingsRegistry {
    store: Arc<dyn SettingsStore>,
}

impl SettingsRegistry {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> StoreResult<StoredSettings> {
        let mut discovery = DiscoveryConfig::default();

        if let Some(raw) = self.store.get(KEY_DISCOVERY_MODE)? {
            match raw.trim().parse::<i64>().ok().and_then(DiscoveryMode::from_int) {
                Some(mode) => discovery.mode = mode,
                None => log::warn!("Ignoring stored discovery mode {:?}, using default", raw),
            }
        }

        if let Some(raw) = self.store.get(KEY_BOOTSTRAP_NODES)? {
            match serde_json::from_str::<Vec<BootstrapNode>>(&raw) {
                Ok(nodes) => discovery.set_bootstrap_nodes(nodes),
                Err(e) => log::warn!("Ignoring stored bootstrap nodes: {}", e),
            }
        }

        if let Some(raw) = self.store.get(KEY_STORE_NODE)? {
            discovery.store_node = raw.trim().to_string();
        }

        let node_key = match self.store.get(KEY_NODE_KEY)? {
            Some(raw) => {
                let parsed = NodeKey::from_hex(&raw);
                if parsed.is_none() {
                    log::warn!("Stored node key is not a 256-bit hex value, discarding it");
                }
                parsed
            }
            None => None,
        };

        Ok(StoredSettings {
            discovery,
            node_key,
        })
    }

    /// Load settings, generating and persisting a node key on first run.
    pub fn load_or_init(&self) -> StoreResult<(DiscoveryConfig, NodeKey)> {
        let stored = self.load()?;
        let node_key = match stored.node_key {
            Some(key) => {
                log::debug!("Loaded node key {:?}", key);
                key
            }
            None => {
                let key = NodeKey::generate();
                self.save_node_key(&key)?;
                log::info!("Generated and persisted new node key {:?}", key);
                key
            }
        };
        Ok((stored.discovery, node_key))
    }

    pub fn save(&self, discovery: &DiscoveryConfig, node_key: &NodeKey) -> StoreResult<()> {
        let nodes = serde_json::to_string(discovery.bootstrap_nodes())?;
        self.store.set_all(&[
            (KEY_NODE_KEY, node_key.to_hex()),
            (KEY_DISCOVERY_MODE, discovery.mode.as_int().to_string()),
            (KEY_BOOTSTRAP_NODES, nodes),
            (KEY_STORE_NODE, discovery.store_node.clone()),
        ])?;
        self.store.sync()
    }

    pub fn save_node_key(&self, node_key: &NodeKey) -> StoreResult<()> {
        self.store.set(KEY_NODE_KEY, &node_key.to_hex())?;
        self.store.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySettingsStore;

    fn registry() -> (Arc<MemorySettingsStore>, SettingsRegistry) {
        let store = Arc::new(MemorySettingsStore::new());
        let registry = SettingsRegistry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn test_discovery_mode_ints() {
        for mode in [DiscoveryMode::ExtKadOnly, DiscoveryMode::StdDiscovery, DiscoveryMode::All] {
            assert_eq!(DiscoveryMode::from_int(mode.as_int() as i64), Some(mode));
        }
        assert_eq!(DiscoveryMode::from_int(3), None);
        assert_eq!(DiscoveryMode::from_int(-1), None);
    }

    #[test]
    fn test_add_bootstrap_node_dedups_by_trimmed_address() {
        let mut cfg = DiscoveryConfig::default();
        assert!(cfg.add_bootstrap_node("/ip4/1.2.3.4/tcp/60000", None));
        assert!(!cfg.add_bootstrap_node("  /ip4/1.2.3.4/tcp/60000  ", Some("key")));
        assert!(!cfg.add_bootstrap_node("   ", None));
        assert_eq!(cfg.bootstrap_nodes().len(), 1);
        assert_eq!(cfg.bootstrap_nodes()[0].mix_pub_key, None);
    }

    #[test]
    fn test_update_and_remove_respect_bounds() {
        let mut cfg = DiscoveryConfig::default();
        cfg.add_bootstrap_node("a", None);
        cfg.add_bootstrap_node("b", None);

        assert!(cfg.update_mix_key(1, "mixkey"));
        assert!(!cfg.update_mix_key(2, "mixkey"));
        assert_eq!(cfg.bootstrap_nodes()[1].mix_pub_key.as_deref(), Some("mixkey"));

        assert!(cfg.update_mix_key(1, "  "));
        assert_eq!(cfg.bootstrap_nodes()[1].mix_pub_key, None);

        assert!(!cfg.remove_bootstrap_node(5));
        assert!(cfg.remove_bootstrap_node(0));
        assert_eq!(cfg.bootstrap_addresses(), "b");
    }

    #[test]
    fn test_joined_lists() {
        let mut cfg = DiscoveryConfig::default();
        cfg.add_bootstrap_node("a", Some("ka"));
        cfg.add_bootstrap_node("b", None);
        cfg.add_bootstrap_node("c", Some("kc"));

        assert_eq!(cfg.bootstrap_addresses(), "a,b,c");
        assert_eq!(cfg.mixnodes(), "a:ka,c:kc");
    }

    #[test]
    fn test_load_defaults_from_empty_store() {
        let (_store, registry) = registry();
        let stored = registry.load().unwrap();
        assert_eq!(stored.discovery, DiscoveryConfig::default());
        assert!(stored.node_key.is_none());
    }

    #[test]
    fn test_load_or_init_persists_new_key() {
        let (store, registry) = registry();
        let (_, key) = registry.load_or_init().unwrap();
        assert_eq!(store.get(KEY_NODE_KEY).unwrap(), Some(key.to_hex()));

        let (_, again) = registry.load_or_init().unwrap();
        assert_eq!(again, key);
    }

    #[test]
    fn test_save_then_load() {
        let (_store, registry) = registry();
        let mut cfg = DiscoveryConfig::default();
        cfg.mode = DiscoveryMode::StdDiscovery;
        cfg.store_node = "/dns4/store/tcp/1".to_string();
        cfg.add_bootstrap_node("a", Some("ka"));
        cfg.add_bootstrap_node("b", None);
        let key = NodeKey::generate();

        registry.save(&cfg, &key).unwrap();

        let stored = registry.load().unwrap();
        assert_eq!(stored.discovery, cfg);
        assert_eq!(stored.node_key, Some(key));
    }

    #[test]
    fn test_load_tolerates_garbage() {
        let (store, registry) = registry();
        store.set(KEY_DISCOVERY_MODE, "seven").unwrap();
        store.set(KEY_BOOTSTRAP_NODES, "{not json").unwrap();
        store.set(KEY_NODE_KEY, "short").unwrap();

        let stored = registry.load().unwrap();
        assert_eq!(stored.discovery.mode, DiscoveryMode::All);
        assert!(stored.discovery.bootstrap_nodes().is_empty());
        assert!(stored.node_key.is_none());

        // A bad key is replaced on init.
        let (_, key) = registry.load_or_init().unwrap();
        assert_eq!(store.get(KEY_NODE_KEY).unwrap(), Some(key.to_hex()));
    }

    #[test]
    fn test_load_drops_duplicate_stored_nodes() {
        let (store, registry) = registry();
        store
            .set(
                KEY_BOOTSTRAP_NODES,
                r#"[{"address":"a","mixPubKey":"k"},{"address":"a"},{"address":" "}]"#,
            )
            .unwrap();

        let stored = registry.load().unwrap();
        assert_eq!(stored.discovery.bootstrap_nodes().len(), 1);
        assert_eq!(stored.discovery.mixnodes(), "a:k");
    }
}
