//! Lazy creation and idle teardown of per-container [`SerializerHandle`]s
//! (spec §4.2: "a Serializer is created lazily on first command and torn
//! down after an idle period").

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use outline_bus_core::EventBus;
use outline_store_core::NodeStore;
use outline_types::ContainerId;

use crate::analyzer_trigger::AnalyzerTrigger;
use crate::serializer::SerializerHandle;

/// Holds one [`SerializerHandle`] per container with an active or recently
/// active writer, sweeping out handles that have sat idle past
/// `idle_teardown` and are not referenced anywhere else.
pub struct SerializerRegistry {
    handles: DashMap<ContainerId, Arc<SerializerHandle>>,
    store: Arc<dyn NodeStore>,
    bus: Arc<dyn EventBus>,
    analyzer: Arc<dyn AnalyzerTrigger>,
    idle_teardown: Duration,
}

impl SerializerRegistry {
    /// Build a registry sharing the given store, bus, and analyzer trigger
    /// across every container's serializer.
    pub fn new(
        store: Arc<dyn NodeStore>,
        bus: Arc<dyn EventBus>,
        analyzer: Arc<dyn AnalyzerTrigger>,
        idle_teardown: Duration,
    ) -> Self {
        Self { handles: DashMap::new(), store, bus, analyzer, idle_teardown }
    }

    /// Fetch the handle for `container_id`, creating it if this is the
    /// first command ever addressed to it.
    pub fn handle_for(&self, container_id: ContainerId) -> Arc<SerializerHandle> {
        self.handles
            .entry(container_id)
            .or_insert_with(|| {
                Arc::new(SerializerHandle::new(
                    container_id,
                    self.store.clone(),
                    self.bus.clone(),
                    self.analyzer.clone(),
                ))
            })
            .clone()
    }

    /// Drop handles that are both idle past `idle_teardown` and unreferenced
    /// outside this map — a handle still held by an in-flight `execute`
    /// call has a strong count above 1 and is skipped. Safe to call
    /// concurrently with command execution; never blocks on a contended
    /// handle (`try_lock` skips it for this sweep rather than waiting).
    pub async fn sweep_idle(&self) {
        let mut stale = Vec::new();
        for entry in self.handles.iter() {
            let handle = entry.value();
            if Arc::strong_count(handle) > 1 {
                continue;
            }
            match handle.state.try_lock() {
                Ok(state) if state.last_activity.elapsed() >= self.idle_teardown => {
                    stale.push(*entry.key());
                }
                _ => {}
            }
        }
        for container_id in stale {
            // Re-check strong count under removal: a command may have
            // grabbed the handle between the scan above and this point.
            if let Some((_, handle)) = self.handles.remove_if(&container_id, |_, h| Arc::strong_count(h) == 1) {
                drop(handle);
            }
        }
    }

    /// Spawn a background task that calls [`sweep_idle`](Self::sweep_idle)
    /// on a fixed interval for as long as `self` (held via `Arc`) is alive.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(registry) => registry.sweep_idle().await,
                    None => break,
                }
            }
        })
    }

    /// Number of containers with a currently live (not necessarily active)
    /// serializer handle. Exposed for the demo CLI's status output.
    pub fn live_container_count(&self) -> usize {
        self.handles.len()
    }
}
