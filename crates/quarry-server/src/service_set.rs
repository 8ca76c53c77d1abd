//! In-process set of backend nodes

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use quarry_common::config::LocalConfig;

use crate::node::{Node, NodeId};

/// Backend nodes living in this process, used by local mode
pub struct LocalServiceSet {
    nodes: RwLock<Vec<Arc<Node>>>,
    next_id: AtomicU64,
    cursor: AtomicUsize,
}

impl LocalServiceSet {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Start `config.bits` nodes
    pub fn start(config: &LocalConfig) -> Arc<Self> {
        if config.bits == 0 {
            warn!("local.bits is 0, starting a single node");
        }
        let services = Arc::new(Self::new());
        for _ in 0..config.bits.max(1) {
            services.launch(config);
        }
        info!("Local service set started with {} node(s)", services.len());
        services
    }

    /// Start one more node and register it
    pub fn launch(&self, config: &LocalConfig) -> Arc<Node> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let node = Arc::new(Node::new(id, config));
        self.register(Arc::clone(&node));
        node
    }

    pub fn register(&self, node: Arc<Node>) {
        self.nodes.write().push(node);
    }

    pub fn unregister(&self, id: NodeId) -> Option<Arc<Node>> {
        let mut nodes = self.nodes.write();
        let position = nodes.iter().position(|node| node.id() == id)?;
        Some(nodes.remove(position))
    }

    /// Next running node, round-robin
    pub fn pick(&self) -> Option<Arc<Node>> {
        let nodes = self.nodes.read();
        let running: Vec<&Arc<Node>> = nodes.iter().filter(|node| node.is_running()).collect();
        if running.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % running.len();
        Some(Arc::clone(running[index]))
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Stop every node
    pub fn shutdown(&self) {
        for node in self.nodes.read().iter() {
            node.stop();
        }
        info!("Local service set shut down");
    }
}

impl Default for LocalServiceSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_launches_bits_nodes() {
        let config = LocalConfig {
            bits: 3,
            ..LocalConfig::default()
        };
        let services = LocalServiceSet::start(&config);
        assert_eq!(services.len(), 3);

        let ids: Vec<NodeId> = services.nodes().iter().map(|node| node.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_bits_starts_one_node() {
        let config = LocalConfig {
            bits: 0,
            ..LocalConfig::default()
        };
        let services = LocalServiceSet::start(&config);
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_pick_round_robins_over_running_nodes() {
        let config = LocalConfig {
            bits: 3,
            ..LocalConfig::default()
        };
        let services = LocalServiceSet::start(&config);
        services.nodes()[1].stop();

        let picked: Vec<NodeId> = (0..4).filter_map(|_| services.pick()).map(|n| n.id()).collect();
        assert_eq!(picked, vec![1, 3, 1, 3]);
    }

    #[test]
    fn test_pick_after_shutdown_is_none() {
        let services = LocalServiceSet::start(&LocalConfig::default());
        services.shutdown();
        assert!(services.pick().is_none());
        assert!(!services.is_empty());
    }

    #[test]
    fn test_unregister() {
        let services = LocalServiceSet::start(&LocalConfig::default());
        assert!(services.unregister(1).is_some());
        assert!(services.unregister(1).is_none());
        assert!(services.is_empty());
    }
}
