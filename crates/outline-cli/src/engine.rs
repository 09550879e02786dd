//! Wires a storage driver, bus, analyzer worker, and kernel together into
//! the single engine handle one CLI invocation dispatches against.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use outline_analyzer::{AnalyzerConfig, AnalyzerWorker};
use outline_bus_core::{EventBus, InMemoryBus};
use outline_kernel::{AnalyzerTrigger, Dispatcher, KernelConfig, NoopAnalyzerTrigger, SerializerRegistry};
use outline_store_core::NodeStore;
use outline_store_memory::MemoryStore;
use outline_store_sqlite::SqliteStore;

/// The fully wired engine a single CLI invocation dispatches against.
pub struct Engine {
    pub store: Arc<dyn NodeStore>,
    pub bus: Arc<dyn EventBus>,
    pub registry: Arc<SerializerRegistry>,
    pub dispatcher: Dispatcher,
    pub analyzer: Option<Arc<AnalyzerWorker>>,
}

impl Engine {
    /// Build the engine. `db_path` selects the SQLite driver; `None` uses
    /// the in-memory driver. `with_analyzer` controls whether content
    /// changes enqueue URL rescans. `command_timeout` overrides the
    /// environment-derived default (spec §6 `command_timeout_ms`).
    pub async fn build(db_path: Option<&str>, with_analyzer: bool, command_timeout: Duration) -> Result<Self> {
        let store: Arc<dyn NodeStore> = match db_path {
            Some(path) => Arc::new(SqliteStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::default());

        let kernel_config = KernelConfig { command_timeout, ..KernelConfig::from_env() };

        let (analyzer_trigger, analyzer): (Arc<dyn AnalyzerTrigger>, Option<Arc<AnalyzerWorker>>) = if with_analyzer {
            let worker = AnalyzerWorker::new(store.clone(), bus.clone(), AnalyzerConfig::from_env());
            worker.spawn();
            (worker.clone(), Some(worker))
        } else {
            (Arc::new(NoopAnalyzerTrigger), None)
        };

        let registry = Arc::new(SerializerRegistry::new(
            store.clone(),
            bus.clone(),
            analyzer_trigger,
            kernel_config.serializer_idle_teardown,
        ));
        registry.spawn_idle_sweeper(kernel_config.serializer_idle_teardown);

        let dispatcher = Dispatcher::new(registry.clone(), store.clone(), kernel_config.command_timeout);

        Ok(Self { store, bus, registry, dispatcher, analyzer })
    }
}
