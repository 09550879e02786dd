//! The seam between the Serializer and the URL Analyzer Worker (spec §4.2
//! step 5, §4.7).
//!
//! `outline-kernel` does not depend on `outline-analyzer` — the dependency
//! points the other way in the demo CLI's wiring — so the trigger is a
//! small trait object the Serializer holds and the analyzer crate
//! implements, the same way the Serializer takes its `EventBus` as an
//! `Arc<dyn EventBus>` rather than depending on a concrete bus crate.

use outline_types::{ContainerId, NodeId};

/// Enqueues a content-rescan job for a node whose content may have changed.
///
/// Implementations must be cheap and non-blocking: the Serializer calls
/// this from inside its critical section only after the commit and publish
/// have already completed (spec §4.2 step 5), but it still must not stall
/// the per-container single-writer on slow I/O — the contract is "hand off
/// and return", not "wait for the scan".
pub trait AnalyzerTrigger: Send + Sync {
    /// Queue (or re-queue, coalescing with any pending job for the same
    /// node) a rescan of `node_id`'s content.
    fn enqueue(&self, container_id: ContainerId, node_id: NodeId);
}

/// A trigger that drops every job; used when no analyzer is wired up (e.g.
/// a unit test exercising only the Tree Mutator/Serializer contract).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalyzerTrigger;

impl AnalyzerTrigger for NoopAnalyzerTrigger {
    fn enqueue(&self, _container_id: ContainerId, _node_id: NodeId) {}
}
