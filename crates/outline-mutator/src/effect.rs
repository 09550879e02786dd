//! The result of applying one Tree Mutator algorithm.

use outline_types::{Event, EventPayload, Node, NodeId};

/// The node-level side effects and canonical event produced by a single
/// Tree Mutator operation. Pure data — no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEffect {
    /// Nodes to insert or overwrite.
    pub upserts: Vec<Node>,
    /// Nodes to remove entirely.
    pub deletes: Vec<NodeId>,
    /// The canonical event describing this mutation.
    pub event: EventPayload,
}

impl MutationEffect {
    /// Render this effect as the persisted event, given the envelope
    /// fields the Serializer attaches at commit time.
    pub fn into_event(
        self,
        event_id: outline_types::EventId,
        user_id: outline_types::UserId,
        sequence: outline_types::Sequence,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Event {
        Event { event_id, payload: self.event, user_id, created_at, sequence }
    }
}
