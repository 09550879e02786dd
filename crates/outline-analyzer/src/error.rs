//! Error kinds internal to the analyzer worker. These never propagate to a
//! command caller (spec §4.7 runs entirely outside the Serializer's
//! critical section); they are logged, not returned.

use outline_types::NodeId;

/// Failure of one content-rescan job.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The node was deleted before its queued job ran.
    #[error("node {0} no longer exists")]
    NodeGone(NodeId),
    /// The node store rejected the read or the `UrlsAnalyzed` commit.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
    /// The job's overall time budget (spec §6
    /// `analyzer_job_budget_ms`) elapsed before every URL was processed.
    #[error("job for node {0} exceeded its time budget")]
    BudgetExceeded(NodeId),
}
