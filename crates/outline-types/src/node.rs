//! The node and URL record types (spec §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ContainerId, NodeId, UserId};

/// One line of outline content with parent/prev pointers.
///
/// `parent_id`/`prev_id` are identifier references rather than structural
/// pointers (spec §9) — the repository is an arena keyed by `NodeId`, not a
/// tree of owned child nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique, stable for the node's life.
    pub uuid: NodeId,
    /// UTF-8 text; may be empty; no length cap enforced here.
    pub content: String,
    /// Container this node belongs to. Immutable except via cross-container
    /// move.
    pub container_id: ContainerId,
    /// Parent node, or `None` if this node sits at the container's root.
    pub parent_id: Option<NodeId>,
    /// Immediately preceding sibling, or `None` if this is the head of its
    /// sibling group.
    pub prev_id: Option<NodeId>,
    /// User who created the node. Immutable.
    pub creator_id: UserId,
    /// URL records derived from `content`, ordered by first appearance.
    pub urls: Vec<UrlRecord>,
    /// Creation timestamp.
    pub inserted_at: DateTime<Utc>,
    /// Last-modified timestamp (content, position, or url set).
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Construct a brand-new node with no urls and inserted/updated stamped
    /// to `now`.
    pub fn new(
        uuid: NodeId,
        container_id: ContainerId,
        parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        content: String,
        creator_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid,
            content,
            container_id,
            parent_id,
            prev_id,
            creator_id,
            urls: Vec::new(),
            inserted_at: now,
            updated_at: now,
        }
    }

    /// Sibling-group key: nodes with the same `(container_id, parent_id)`
    /// are linked by the `prev_id` chain (spec §3 invariant 1).
    pub fn sibling_group(&self) -> (ContainerId, Option<NodeId>) {
        (self.container_id, self.parent_id)
    }
}

/// A URL discovered in a node's content, with optional enrichment metadata
/// (spec §3, §4.7). `metadata` is `None` until enrichment succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Byte offset of the URL's first byte within `content`.
    pub start_bytes: usize,
    /// Length in bytes of the URL token.
    pub size_bytes: usize,
    /// The URL text as it appeared in content.
    pub url: String,
    /// Owning node.
    pub node_id: NodeId,
    /// Loosely-typed enrichment map (title, description, image, ...), `None`
    /// until the analyzer succeeds for this URL.
    pub metadata: Option<HashMap<String, Value>>,
}

impl UrlRecord {
    /// A freshly-extracted URL record with no metadata yet.
    pub fn unenriched(node_id: NodeId, start_bytes: usize, url: String) -> Self {
        let size_bytes = url.len();
        Self { start_bytes, size_bytes, url, node_id, metadata: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn sibling_group_ignores_prev_id() {
        let container = ContainerId(Uuid::new_v4());
        let parent = Some(NodeId(Uuid::new_v4()));
        let now = Utc::now();
        let a = Node::new(NodeId::new(), container, parent, None, "a".into(), "u1".into(), now);
        let b = Node::new(NodeId::new(), container, parent, Some(a.uuid), "b".into(), "u1".into(), now);
        assert_eq!(a.sibling_group(), b.sibling_group());
    }
}
