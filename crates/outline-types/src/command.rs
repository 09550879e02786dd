//! The Command API (spec §4.1).
//!
//! Commands are a tagged union; new variants are expected over time, so
//! consumers should match exhaustively rather than rely on structural
//! subtyping (spec §9).

use serde::{Deserialize, Serialize};

use crate::ids::{ContainerId, EventId, NodeId, UserId};

/// A caller-issued mutation request against a container's outline tree.
///
/// Every command carries `event_id` (the correlation token used for
/// persistence and echo suppression) and `user_id` (the issuing user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Create a new node at the given sibling-chain position.
    InsertNode {
        /// Id the caller pre-assigns to the new node.
        uuid: NodeId,
        /// Container the node will live in.
        container_id: ContainerId,
        /// Parent node, or `None` for a root-level node.
        parent_id: Option<NodeId>,
        /// Preceding sibling, or `None` to become the head of its group.
        prev_id: Option<NodeId>,
        /// Initial content.
        content: String,
        /// Creating user.
        creator_id: UserId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Replace a node's content.
    ChangeContent {
        /// Node to update.
        node_id: NodeId,
        /// New content.
        content: String,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Reposition a node within its own container.
    MoveNode {
        /// Node to move.
        node_id: NodeId,
        /// New parent, or `None` for root level.
        parent_id: Option<NodeId>,
        /// New preceding sibling, or `None` to become head.
        prev_id: Option<NodeId>,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Move a single node into a different container.
    MoveNodeToContainer {
        /// Node to move.
        node_id: NodeId,
        /// Destination container.
        target_container_id: ContainerId,
        /// New parent within the destination container.
        parent_id: Option<NodeId>,
        /// New preceding sibling within the destination container.
        prev_id: Option<NodeId>,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Move a batch of nodes into a different container, each becoming a
    /// new root in the destination, in the given order.
    MoveNodesToContainer {
        /// Nodes to move, in the order they should appear in the
        /// destination.
        node_ids: Vec<NodeId>,
        /// Destination container.
        target_container_id: ContainerId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Swap a node with its immediately preceding sibling.
    MoveUp {
        /// Node to move.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Swap a node with its immediately following sibling.
    MoveDown {
        /// Node to move.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Reparent a node under its previous sibling, as that sibling's last
    /// child.
    Indent {
        /// Node to indent.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Reparent a node to its grandparent, positioned after its current
    /// parent.
    Outdent {
        /// Node to outdent.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Split a node's content at `selection.1`; the suffix becomes a new
    /// sibling immediately after the node.
    SplitNode {
        /// Node to split.
        node_id: NodeId,
        /// `(start, stop)` byte offsets; `[0, start)` stays on `node_id`,
        /// `[stop, len)` becomes the new sibling's content.
        selection: (usize, usize),
        /// Id the caller pre-assigns to the new sibling.
        new_uuid: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Concatenate a node's content onto its previous sibling and delete the
    /// node.
    MergePrev {
        /// Node being merged away.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Concatenate the next sibling's content onto this node and delete the
    /// next sibling.
    MergeNext {
        /// Node receiving the merged content.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
    /// Remove a node; its children reparent to its former parent, preserving
    /// order.
    DeleteNode {
        /// Node to delete.
        node_id: NodeId,
        /// Correlation token.
        event_id: EventId,
        /// Issuing user.
        user_id: UserId,
    },
}

impl Command {
    /// The correlation token carried by every command variant.
    pub fn event_id(&self) -> &EventId {
        match self {
            Command::InsertNode { event_id, .. }
            | Command::ChangeContent { event_id, .. }
            | Command::MoveNode { event_id, .. }
            | Command::MoveNodeToContainer { event_id, .. }
            | Command::MoveNodesToContainer { event_id, .. }
            | Command::MoveUp { event_id, .. }
            | Command::MoveDown { event_id, .. }
            | Command::Indent { event_id, .. }
            | Command::Outdent { event_id, .. }
            | Command::SplitNode { event_id, .. }
            | Command::MergePrev { event_id, .. }
            | Command::MergeNext { event_id, .. }
            | Command::DeleteNode { event_id, .. } => event_id,
        }
    }

    /// The issuing user carried by every command variant.
    pub fn user_id(&self) -> &UserId {
        match self {
            Command::InsertNode { user_id, .. }
            | Command::ChangeContent { user_id, .. }
            | Command::MoveNode { user_id, .. }
            | Command::MoveNodeToContainer { user_id, .. }
            | Command::MoveNodesToContainer { user_id, .. }
            | Command::MoveUp { user_id, .. }
            | Command::MoveDown { user_id, .. }
            | Command::Indent { user_id, .. }
            | Command::Outdent { user_id, .. }
            | Command::SplitNode { user_id, .. }
            | Command::MergePrev { user_id, .. }
            | Command::MergeNext { user_id, .. }
            | Command::DeleteNode { user_id, .. } => user_id,
        }
    }

    /// The explicit `container_id` carried only by `InsertNode`; every other
    /// variant requires the Dispatcher to resolve the container by loading
    /// the referenced node (spec §4.1).
    pub fn explicit_container_id(&self) -> Option<ContainerId> {
        match self {
            Command::InsertNode { container_id, .. } => Some(*container_id),
            _ => None,
        }
    }

    /// True for commands that may change a node's `content` field, which
    /// triggers a URL analyzer job enqueue (spec §4.2 step 5, §4.7).
    pub fn may_change_content(&self) -> bool {
        matches!(
            self,
            Command::InsertNode { .. }
                | Command::ChangeContent { .. }
                | Command::SplitNode { .. }
                | Command::MergePrev { .. }
                | Command::MergeNext { .. }
        )
    }
}
