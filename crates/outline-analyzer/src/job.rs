//! The coalescing content-rescan queue (spec §4.7: "if a new job for the
//! same node_id arrives while one is queued, the older one is discarded").

use outline_types::{ContainerId, NodeId};

/// A pending rescan for one node, carrying the container it belongs to so
/// the worker can emit `UrlsAnalyzed` on the right topic without a store
/// round-trip just to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentJob {
    /// Container the node lives in.
    pub container_id: ContainerId,
    /// Node whose content should be rescanned.
    pub node_id: NodeId,
}
