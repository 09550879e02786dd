//! Error kinds propagated to the command caller (spec §7).

use crate::ids::{ContainerId, NodeId};

/// All error kinds a caller of the Command API may observe.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutlineError {
    /// Referenced node, container, or sibling-chain position does not
    /// exist.
    #[error("not found: {0}")]
    NotFound(NotFoundKind),

    /// `prev_id` belongs to a different sibling group than `parent_id`.
    #[error("prev_id {prev_id} does not share a sibling group with parent_id {parent_id:?}")]
    ParentPrevInconsistent {
        /// The `prev_id` named by the command.
        prev_id: NodeId,
        /// The `parent_id` named by the command.
        parent_id: Option<NodeId>,
    },

    /// Proposed move would place a node under its own descendant.
    #[error("moving {node} under {new_parent} would create a cycle")]
    CycleError {
        /// Node being moved.
        node: NodeId,
        /// Proposed new parent.
        new_parent: NodeId,
    },

    /// `Indent` has no `prev_id` to reparent under.
    #[error("node {0} has no previous sibling to indent under")]
    CannotIndent(NodeId),

    /// `Outdent` was issued at the root.
    #[error("node {0} is already at the root and cannot be outdented")]
    CannotOutdent(NodeId),

    /// A move targeted the node's current position; idempotent, not an
    /// error for the caller, but no event was emitted.
    #[error("move is a no-op")]
    NoOp,

    /// A Split selection does not align to UTF-8 character boundaries.
    #[error("selection ({start}, {stop}) in node {node} is not on a char boundary")]
    InvalidSelection {
        /// Node being split.
        node: NodeId,
        /// Selection start byte offset.
        start: usize,
        /// Selection stop byte offset.
        stop: usize,
    },

    /// The underlying store detected a concurrent modification; the caller
    /// may retry.
    #[error("conflicting concurrent modification, retry")]
    ConflictError,

    /// The command did not reach the Serializer's head-of-queue before its
    /// deadline.
    #[error("command timed out before execution")]
    Timeout,

    /// Transport or infrastructure failure; distinct from `ConflictError`
    /// in that retry is idempotent given the same `event_id`/`uuid`.
    #[error("transient infrastructure failure: {0}")]
    TransientError(String),
}

/// What kind of reference a `NotFound` error failed to resolve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotFoundKind {
    /// No node with this id exists.
    #[error("node {0}")]
    Node(NodeId),
    /// No container with this id exists.
    #[error("container {0}")]
    Container(ContainerId),
    /// `prev_id` named a node that doesn't exist, or exists in a different
    /// sibling group (spec §4.3 `PositionNotFound`).
    #[error("sibling position referencing {0}")]
    Position(NodeId),
}

impl OutlineError {
    /// True for error kinds the Dispatcher treats as synchronous validation
    /// failures that left state unchanged (spec §5 Failure model) — every
    /// kind except `ConflictError`/`Timeout`/`TransientError`, which
    /// describe infrastructure-level outcomes rather than rejected commands.
    pub fn is_validation_failure(&self) -> bool {
        !matches!(
            self,
            OutlineError::ConflictError | OutlineError::Timeout | OutlineError::TransientError(_)
        )
    }
}
