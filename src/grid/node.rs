//! Grid Nodes
//!
//! A node is a single worker process of the cluster. The registry only cares
//! about its identifier; everything else is deployment specific.

use super::ids::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A member of the grid that can be stored in a [`ContainerGrid`](super::ContainerGrid)
pub trait GridNode: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Identifier of this node, immutable once registered
    fn id(&self) -> &NodeId;
}

// =============================================================================
// Container Node
// =============================================================================

/// Default node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerNode {
    /// Node ID
    pub id: NodeId,
    /// Hostname the container runs on
    pub hostname: Option<String>,
    /// Deployment labels
    pub labels: BTreeMap<String, String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ContainerNode {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            hostname: None,
            labels: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl GridNode for ContainerNode {
    fn id(&self) -> &NodeId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_node_builder() {
        let node = ContainerNode::new("node-001")
            .with_hostname("host-001.local")
            .with_label("zone", "eu-1");

        assert_eq!(node.id().as_str(), "node-001");
        assert_eq!(node.hostname.as_deref(), Some("host-001.local"));
        assert_eq!(node.labels.get("zone").map(String::as_str), Some("eu-1"));
    }
}
