//! The Container Serializer (spec §4.2): the per-container single-writer
//! that executes one command at a time, in strict FIFO arrival order.
//!
//! Rather than a literal actor task reading off an `mpsc` channel, this
//! implementation serializes execution with a per-container
//! `tokio::sync::Mutex` guarding the six-step critical section. `tokio`'s
//! mutex queues waiters in arrival order and does not poison on panic, so
//! the same FIFO-ordering and crash-isolation properties spec §4.2/§5
//! require ("a Serializer's lifetime crash does not corrupt state; the
//! next command spawns a fresh one") fall out of the primitive directly —
//! a panicking command simply releases the guard on unwind, and the
//! sequence counter of record lives in the store, not in the guard. This
//! also makes cross-container lock-ordering (spec §5) trivial: acquiring
//! two containers' exclusive sections in `container_id` order is just
//! acquiring two `Mutex` guards in that order, with no separate actor
//! coordination protocol needed (see `dispatcher::cross_container`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use outline_bus_core::EventBus;
use outline_mutator::Tree;
use outline_store_core::{NodeChangeSet, NodeStore, StoreError};
use outline_types::{Command, ContainerId, Event, NodeId, NotFoundKind, OutlineError};
use tokio::sync::Mutex;

use crate::analyzer_trigger::AnalyzerTrigger;

/// The cached, lightweight state a container's serializer carries across
/// commands — nothing that the store doesn't already persist, per spec
/// §4.2 ("no in-memory state beyond the sequence counter").
#[derive(Debug)]
pub(crate) struct SerializerState {
    pub(crate) last_activity: Instant,
}

impl Default for SerializerState {
    fn default() -> Self {
        Self { last_activity: Instant::now() }
    }
}

/// One container's single-writer handle: the `Mutex` is the serialization
/// point, `store`/`bus`/`analyzer` are shared across every container's
/// handle.
pub struct SerializerHandle {
    container_id: ContainerId,
    pub(crate) state: Arc<Mutex<SerializerState>>,
    store: Arc<dyn NodeStore>,
    bus: Arc<dyn EventBus>,
    analyzer: Arc<dyn AnalyzerTrigger>,
}

impl SerializerHandle {
    pub(crate) fn new(
        container_id: ContainerId,
        store: Arc<dyn NodeStore>,
        bus: Arc<dyn EventBus>,
        analyzer: Arc<dyn AnalyzerTrigger>,
    ) -> Self {
        Self { container_id, state: Arc::new(Mutex::new(SerializerState::default())), store, bus, analyzer }
    }

    /// Acquire the container's exclusive section, subject to
    /// `deadline` (spec §5: "if exceeded before it reaches the
    /// Serializer's head-of-queue, rejected with `Timeout`"), then run the
    /// command to completion — once started, a command is never cancelled.
    pub async fn execute(&self, command: Command, deadline: Duration) -> Result<Event, OutlineError> {
        let mut guard = tokio::time::timeout(deadline, self.state.clone().lock_owned())
            .await
            .map_err(|_| OutlineError::Timeout)?;
        guard.last_activity = Instant::now();

        let result = execute_single(&*self.store, &*self.bus, self.container_id, command.clone(), Utc::now()).await;

        if result.is_ok() {
            for node_id in content_changed_node_ids(&command) {
                self.analyzer.enqueue(self.container_id, node_id);
            }
        }
        result
    }
}

/// True if `command` can alter a node's `content` field and therefore must
/// trigger a URL analyzer job enqueue (spec §4.2 step 5, §4.7). Returns the
/// node ids whose content may have changed.
fn content_changed_node_ids(command: &Command) -> Vec<NodeId> {
    if !command.may_change_content() {
        return Vec::new();
    }
    match command {
        Command::InsertNode { uuid, .. } => vec![*uuid],
        Command::ChangeContent { node_id, .. } => vec![*node_id],
        Command::SplitNode { node_id, new_uuid, .. } => vec![*node_id, *new_uuid],
        Command::MergePrev { node_id, .. } | Command::MergeNext { node_id, .. } => vec![*node_id],
        _ => Vec::new(),
    }
}

fn store_err_to_outline(err: StoreError) -> OutlineError {
    match err {
        StoreError::Conflict => OutlineError::ConflictError,
        StoreError::NodeNotFound(id) => OutlineError::NotFound(NotFoundKind::Node(id)),
        StoreError::Backend(e) => OutlineError::TransientError(e.to_string()),
    }
}

/// Execute every command variant whose effect is confined to a single
/// container (everything except `MoveNodeToContainer`/
/// `MoveNodesToContainer`, which the Dispatcher handles directly while
/// holding both containers' exclusive sections — see
/// `dispatcher::cross_container`).
pub(crate) async fn execute_single(
    store: &dyn NodeStore,
    bus: &dyn EventBus,
    container_id: ContainerId,
    command: Command,
    now: chrono::DateTime<Utc>,
) -> Result<Event, OutlineError> {
    let event_id = command.event_id().clone();
    let user_id = command.user_id().clone();

    let nodes = store.list_by_container(container_id).await.map_err(store_err_to_outline)?;
    let tree = Tree::from_nodes(container_id, nodes);

    let effect = match command {
        Command::InsertNode { uuid, parent_id, prev_id, content, creator_id, .. } => {
            tree.insert(parent_id, prev_id, content, uuid, creator_id, now)?
        }
        Command::ChangeContent { node_id, content, .. } => tree.change_content(node_id, content, now)?,
        Command::MoveNode { node_id, parent_id, prev_id, .. } => tree.move_node(node_id, parent_id, prev_id, now)?,
        Command::MoveUp { node_id, .. } => tree.move_up(node_id, now)?,
        Command::MoveDown { node_id, .. } => tree.move_down(node_id, now)?,
        Command::Indent { node_id, .. } => tree.indent(node_id, now)?,
        Command::Outdent { node_id, .. } => tree.outdent(node_id, now)?,
        Command::SplitNode { node_id, selection: (start, stop), new_uuid, .. } => {
            tree.split(node_id, start, stop, new_uuid, now)?
        }
        Command::MergePrev { node_id, .. } => tree.merge_prev(node_id, now)?,
        Command::MergeNext { node_id, .. } => tree.merge_next(node_id, now)?,
        Command::DeleteNode { node_id, .. } => tree.delete(node_id, now)?,
        Command::MoveNodeToContainer { .. } | Command::MoveNodesToContainer { .. } => {
            unreachable!("cross-container commands never reach execute_single")
        }
    };

    let changes = NodeChangeSet { upserts: effect.upserts, deletes: effect.deletes };
    let event = store
        .commit(container_id, changes, event_id, user_id, effect.event, now)
        .await
        .map_err(store_err_to_outline)?;
    tracing::debug!(%container_id, sequence = %event.sequence, event_type = event.payload.type_name(), "serializer committed command");
    let _ = bus.publish(event.clone());
    Ok(event)
}
