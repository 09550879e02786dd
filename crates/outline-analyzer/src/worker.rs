//! The URL Analyzer Worker (spec §4.7): a coalescing job queue drained by a
//! bounded pool of concurrent fetch-and-enrich tasks, rate-limited per host
//! with `governor` and concurrency-bounded with a `Semaphore`.

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::Utc;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use outline_bus_core::EventBus;
use outline_kernel::AnalyzerTrigger;
use outline_store_core::{NodeChangeSet, NodeStore};
use outline_types::{ContainerId, EventId, EventPayload, NodeId, UrlRecord, UserId};
use reqwest::Client;
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::extract::extract_urls;
use crate::fetch::fetch_metadata;
use crate::job::ContentJob;

/// Fetches this worker issues carry its own correlation-token originator,
/// distinct from any caller session, so subscribers' echo suppression
/// (spec §9) never mistakes an analyzer-emitted event for their own.
const ANALYZER_ORIGINATOR: &str = "outline-analyzer";

/// Conservative default: no more than 4 outbound fetches per second to any
/// single host, regardless of how many nodes reference it.
const PER_HOST_QUOTA_PER_SECOND: u32 = 4;

type HostRateLimiter = RateLimiter<String, DashMapStateStore<String>, governor::clock::DefaultClock>;

/// Coalescing queue plus bounded worker pool that turns enqueued
/// [`ContentJob`]s into committed `UrlsAnalyzed` events.
pub struct AnalyzerWorker {
    queue: dashmap::DashMap<NodeId, ContentJob>,
    notify: Notify,
    store: Arc<dyn NodeStore>,
    bus: Arc<dyn EventBus>,
    client: Client,
    host_limiter: HostRateLimiter,
    semaphore: Arc<Semaphore>,
    config: AnalyzerConfig,
}

impl AnalyzerWorker {
    /// Build a worker over a shared store and bus. Does not start draining
    /// the queue; call [`spawn`](Self::spawn) for that.
    pub fn new(store: Arc<dyn NodeStore>, bus: Arc<dyn EventBus>, config: AnalyzerConfig) -> Arc<Self> {
        let quota = Quota::per_second(NonZeroU32::new(PER_HOST_QUOTA_PER_SECOND).unwrap());
        Arc::new(Self {
            queue: dashmap::DashMap::new(),
            notify: Notify::new(),
            store,
            bus,
            client: Client::new(),
            host_limiter: RateLimiter::keyed(quota),
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
        })
    }

    /// Spawn the background task that drains the queue as jobs arrive,
    /// running up to `config.concurrency` jobs at once. The handle may be
    /// dropped without affecting in-flight jobs; it only governs the
    /// drain loop itself.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move {
            loop {
                worker.notify.notified().await;
                let jobs: Vec<ContentJob> = worker.queue.iter().map(|e| e.value().clone()).collect();
                for job in jobs {
                    // Remove only if still the latest enqueue for this node;
                    // a re-enqueue that raced this drain stays queued for
                    // the next wakeup rather than being silently dropped.
                    if worker.queue.remove_if(&job.node_id, |_, v| v == &job).is_none() {
                        continue;
                    }
                    let worker = worker.clone();
                    tokio::spawn(async move {
                        worker.run_job(job).await;
                    });
                }
            }
        })
    }

    async fn run_job(self: Arc<Self>, job: ContentJob) {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let node_id = job.node_id;
        let budget = self.config.job_budget;
        match tokio::time::timeout(budget, self.process_job(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%node_id, error = %err, "url analyzer job failed"),
            Err(_) => {
                let err = AnalyzerError::BudgetExceeded(node_id);
                tracing::warn!(%node_id, error = %err, "url analyzer job exceeded its time budget");
            }
        }
    }

    async fn process_job(&self, job: ContentJob) -> Result<(), AnalyzerError> {
        let node = self
            .store
            .get(job.node_id)
            .await
            .map_err(|e| AnalyzerError::Store(e.into()))?
            .ok_or(AnalyzerError::NodeGone(job.node_id))?;

        let spans = extract_urls(&node.content);
        let mut urls = Vec::with_capacity(spans.len());
        for span in spans {
            let host = url::Url::parse(&span.text).ok().and_then(|u| u.host_str().map(str::to_string));
            if let Some(host) = host {
                if self.host_limiter.check_key(&host).is_err() {
                    tracing::debug!(%host, "per-host rate limit hit, skipping enrichment this round");
                    urls.push(UrlRecord { start_bytes: span.start_bytes, size_bytes: span.size_bytes, url: span.text, node_id: job.node_id, metadata: None });
                    continue;
                }
            }
            let metadata = fetch_metadata(&self.client, &span.text, self.config.per_url_timeout).await;
            let metadata = if metadata.is_empty() { None } else { Some(metadata) };
            urls.push(UrlRecord { start_bytes: span.start_bytes, size_bytes: span.size_bytes, url: span.text, node_id: job.node_id, metadata });
        }

        let mut updated = node.clone();
        updated.urls = urls.clone();
        updated.updated_at = Utc::now();

        let changes = NodeChangeSet::new().upsert(updated);
        let payload = EventPayload::UrlsAnalyzed { node_id: job.node_id, urls, container_id: job.container_id };
        let event_id = EventId::new(Uuid::new_v4(), ANALYZER_ORIGINATOR).expect("static originator is non-empty");

        let event = self
            .store
            .commit(job.container_id, changes, event_id, UserId::from(ANALYZER_ORIGINATOR), payload, Utc::now())
            .await
            .map_err(|e| AnalyzerError::Store(e.into()))?;
        let _ = self.bus.publish(event);
        Ok(())
    }

    /// Number of jobs currently queued, not yet picked up by the worker
    /// loop. Exposed for the demo CLI's status output.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}

impl AnalyzerTrigger for AnalyzerWorker {
    fn enqueue(&self, container_id: ContainerId, node_id: NodeId) {
        self.queue.insert(node_id, ContentJob { container_id, node_id });
        self.notify.notify_one();
    }
}
