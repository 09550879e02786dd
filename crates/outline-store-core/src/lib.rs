#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-store-core** – Core storage abstractions for the outline
//! engine.
//!
//! This crate defines the `NodeStore` contract: persistence and read
//! queries over nodes (spec §4.5), plus the append-only per-container event
//! log (spec §4.6). Concrete backends (in-memory, SQLite, ...) implement
//! this trait in separate driver crates.
//!
//! The trait's `commit` method *is* the `WithinTransaction` primitive named
//! in spec §4.5: it bundles the node changeset and the event append into a
//! single atomic operation and assigns the event's `sequence`, so the
//! Container Serializer never has to coordinate two separate calls that
//! could commit independently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outline_types::{ContainerId, Event, EventId, EventPayload, Node, NodeId, Sequence, UserId};

/// A batch of node-table writes to apply together with one event append.
#[derive(Debug, Clone, Default)]
pub struct NodeChangeSet {
    /// Nodes to insert or overwrite (position, content, or url-list change).
    pub upserts: Vec<Node>,
    /// Nodes to remove entirely.
    pub deletes: Vec<NodeId>,
}

impl NodeChangeSet {
    /// An empty changeset (used by pure URL-record updates, which only
    /// touch `urls` via `upserts` of the affected node).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: queue a node for upsert.
    pub fn upsert(mut self, node: Node) -> Self {
        self.upserts.push(node);
        self
    }

    /// Builder-style: queue a node for deletion.
    pub fn delete(mut self, node_id: NodeId) -> Self {
        self.deletes.push(node_id);
        self
    }
}

/// Errors surfaced by a `NodeStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store detected a concurrent modification to the same container
    /// between the Serializer's read and write phase (spec §7
    /// `ConflictError`). The caller may retry.
    #[error("conflicting concurrent modification, retry")]
    Conflict,
    /// A referenced node does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// Underlying I/O or serialization failure.
    #[error("store backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Persistent CRUD and read queries over nodes and containers, plus the
/// append-only event log for one outline engine (spec §4.5, §4.6).
///
/// Implementations must provide snapshot isolation or equivalent so that a
/// Serializer sees a consistent view across its read/write phase (spec
/// §4.5).
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Fetch a single node by id.
    async fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError>;

    /// Full pre-order, root-first traversal of a container's tree, built
    /// from the parent/prev chains.
    async fn list_by_container(&self, container_id: ContainerId) -> Result<Vec<Node>, StoreError>;

    /// The node count of a container (spec §3 invariant 5, §8 law).
    async fn count_by_container(&self, container_id: ContainerId) -> Result<usize, StoreError>;

    /// Every descendant of `id`, recursively, in pre-order.
    async fn all_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError>;

    /// The direct children of `id`, in sibling-chain order.
    async fn direct_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError>;

    /// Every other node sharing `id`'s sibling group (same `parent_id`,
    /// same `container_id`), excluding `id` itself.
    async fn direct_siblings(&self, id: NodeId) -> Result<Vec<Node>, StoreError>;

    /// Predecessor of `id` in the flat visual (pre-order) ordering: follow
    /// `prev`; when null, ascend to the parent.
    async fn node_above(&self, id: NodeId) -> Result<Option<Node>, StoreError>;

    /// Successor of `id` in the flat visual ordering.
    async fn node_below(&self, id: NodeId) -> Result<Option<Node>, StoreError>;

    /// The head (node with `prev_id = None`) of a sibling group, if the
    /// group is non-empty.
    async fn sibling_head(
        &self,
        container_id: ContainerId,
        parent_id: Option<NodeId>,
    ) -> Result<Option<Node>, StoreError>;

    /// The node whose `prev_id` currently points at `id`, if any (the
    /// "next" sibling used throughout §4.3's rewiring contracts).
    async fn next_sibling(&self, id: NodeId) -> Result<Option<Node>, StoreError>;

    /// The most recently assigned event sequence for a container, or
    /// `Sequence::ZERO` if none have been committed yet. Used by a
    /// cold-started Serializer to initialize its counter (spec §4.2).
    async fn latest_sequence(&self, container_id: ContainerId) -> Result<Sequence, StoreError>;

    /// The full event log for a container, ordered by sequence.
    async fn list_events(&self, container_id: ContainerId) -> Result<Vec<Event>, StoreError>;

    /// Atomically apply a node changeset and append the event describing
    /// it, assigning `sequence = latest_sequence(container_id) + 1`.
    ///
    /// Implementations must reject the call with `StoreError::Conflict` if
    /// the container's latest sequence advanced between the Serializer's
    /// read phase and this call (spec §5 failure model: "a crash mid-
    /// transaction aborts the transaction; the event is not appended").
    async fn commit(
        &self,
        container_id: ContainerId,
        changes: NodeChangeSet,
        event_id: EventId,
        user_id: UserId,
        payload: EventPayload,
        created_at: DateTime<Utc>,
    ) -> Result<Event, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_types::ContainerId;

    #[test]
    fn changeset_builder_accumulates() {
        let container = ContainerId::new();
        let node = Node::new(
            NodeId::new(),
            container,
            None,
            None,
            "x".into(),
            "u".into(),
            Utc::now(),
        );
        let changes = NodeChangeSet::new().upsert(node.clone()).delete(NodeId::new());
        assert_eq!(changes.upserts.len(), 1);
        assert_eq!(changes.deletes.len(), 1);
    }
}
