//! Canonical events emitted on every committed command (spec §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ContainerId, EventId, NodeId, Sequence, UserId};
use crate::node::{Node, UrlRecord};

/// The typed payload of a committed mutation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A node was created. `next` is the node whose `prev_id` now points at
    /// `node`, or `None` if `node` became (or stayed) the tail.
    NodeInserted {
        /// The newly created node, post-insert.
        node: Node,
        /// The sibling re-pointed to follow `node`, if any.
        next: Option<NodeId>,
        /// The content at creation time (redundant with `node.content`,
        /// kept for payload stability under future node-shape changes).
        content: String,
        /// Owning container.
        container_id: ContainerId,
    },
    /// A node's content was replaced.
    NodeContentChanged {
        /// Node updated.
        node_id: NodeId,
        /// New content.
        content: String,
        /// Owning container.
        container_id: ContainerId,
    },
    /// A node was repositioned within its container.
    NodeMoved {
        /// The node, post-move.
        node: Node,
        /// New next sibling, if any.
        next: Option<NodeId>,
        /// Previous sibling before the move, if any.
        old_prev: Option<NodeId>,
        /// Next sibling before the move, if any.
        old_next: Option<NodeId>,
        /// New set of direct children, if the move altered them (e.g. an
        /// Indent/Outdent/Delete-via-move cascade); `None` if unchanged.
        children: Option<Vec<NodeId>>,
        /// Owning container.
        container_id: ContainerId,
    },
    /// A node was moved into a different container.
    NodeMovedToNewContainer {
        /// The node, post-move (with updated `container_id`).
        node: Node,
        /// Previous container.
        old_container_id: ContainerId,
        /// New container.
        new_container_id: ContainerId,
        /// New next sibling in the destination, if any.
        next: Option<NodeId>,
    },
    /// A batch of nodes was moved into a different container.
    NodesMovedToContainer {
        /// Nodes, post-move.
        nodes: Vec<Node>,
        /// Previous container (all nodes shared it, spec batch contract).
        old_container_id: ContainerId,
        /// New container.
        new_container_id: ContainerId,
    },
    /// A node was removed; its children reparented to its former parent.
    NodeDeleted {
        /// The deleted node, as it existed immediately before removal.
        node: Node,
        /// Former children, now reparented, in their preserved order.
        children: Vec<NodeId>,
        /// New next sibling at the deleted node's former position, if any.
        next: Option<NodeId>,
        /// Owning container.
        container_id: ContainerId,
    },
    /// The analyzer finished (re)computing a node's URL records.
    UrlsAnalyzed {
        /// Node analyzed.
        node_id: NodeId,
        /// Freshly computed URL records, in first-appearance order.
        urls: Vec<UrlRecord>,
        /// Owning container.
        container_id: ContainerId,
    },
}

impl EventPayload {
    /// The stable `event_type` discriminant string stored alongside the
    /// payload (spec §4.6, §6 `event_data.event_type`).
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::NodeInserted { .. } => "node_inserted",
            EventPayload::NodeContentChanged { .. } => "node_content_changed",
            EventPayload::NodeMoved { .. } => "node_moved",
            EventPayload::NodeMovedToNewContainer { .. } => "node_moved_to_new_container",
            EventPayload::NodesMovedToContainer { .. } => "nodes_moved_to_container",
            EventPayload::NodeDeleted { .. } => "node_deleted",
            EventPayload::UrlsAnalyzed { .. } => "urls_analyzed",
        }
    }

    /// The container this event concerns. `NodesMovedToContainer` and
    /// `NodeMovedToNewContainer` straddle two containers; both events are
    /// topic-routed under the *destination* container, matching the spec's
    /// cross-container-move framing (the move "completes" in the target).
    pub fn container_id(&self) -> ContainerId {
        match self {
            EventPayload::NodeInserted { container_id, .. }
            | EventPayload::NodeContentChanged { container_id, .. }
            | EventPayload::NodeMoved { container_id, .. }
            | EventPayload::NodeDeleted { container_id, .. }
            | EventPayload::UrlsAnalyzed { container_id, .. } => *container_id,
            EventPayload::NodeMovedToNewContainer { new_container_id, .. } => *new_container_id,
            EventPayload::NodesMovedToContainer { new_container_id, .. } => *new_container_id,
        }
    }
}

/// An immutable, committed event (spec §3, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Caller-supplied correlation token.
    pub event_id: EventId,
    /// Typed payload.
    pub payload: EventPayload,
    /// Issuing user.
    pub user_id: UserId,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
    /// Monotonic per-container sequence, assigned at commit time.
    pub sequence: Sequence,
}

impl Event {
    /// The container this event belongs to, for Event Bus topic routing.
    pub fn container_id(&self) -> ContainerId {
        self.payload.container_id()
    }
}
