//! The Command Dispatcher (spec §4.1, §4.2 step 1-2): resolves which
//! container(s) a command addresses, routes single-container commands to
//! that container's [`SerializerHandle`], and drives the two-container
//! protocol for `MoveNodeToContainer`/`MoveNodesToContainer` itself, since
//! that protocol spans two serializers at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use outline_mutator::Tree;
use outline_store_core::{NodeChangeSet, NodeStore, StoreError};
use outline_types::{
    Command, ContainerId, Event, EventPayload, Node, NodeId, NotFoundKind, OutlineError,
};

use crate::registry::SerializerRegistry;

/// The outcome of a dispatched command: either it committed a new event, or
/// it was recognized as a no-op (e.g. a move to the node's current
/// position) and nothing was persisted.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A new event was committed and published.
    Committed(Event),
    /// The command had no effect; no event was created.
    NoOp,
}

/// Resolves containers and routes commands to the right
/// [`SerializerHandle`](crate::serializer::SerializerHandle), enforcing
/// spec §5's lock-ordering rule for commands that touch two containers at
/// once.
pub struct Dispatcher {
    registry: Arc<SerializerRegistry>,
    store: Arc<dyn NodeStore>,
    command_timeout: Duration,
}

impl Dispatcher {
    /// Build a dispatcher over a shared registry and store, using
    /// `command_timeout` as the deadline for acquiring every serializer
    /// lock a command needs.
    pub fn new(registry: Arc<SerializerRegistry>, store: Arc<dyn NodeStore>, command_timeout: Duration) -> Self {
        Self { registry, store, command_timeout }
    }

    fn store_err(err: StoreError) -> OutlineError {
        match err {
            StoreError::Conflict => OutlineError::ConflictError,
            StoreError::NodeNotFound(id) => OutlineError::NotFound(NotFoundKind::Node(id)),
            StoreError::Backend(e) => OutlineError::TransientError(e.to_string()),
        }
    }

    async fn container_of(&self, node_id: NodeId) -> Result<ContainerId, OutlineError> {
        self.store
            .get(node_id)
            .await
            .map_err(Self::store_err)?
            .map(|n| n.container_id)
            .ok_or(OutlineError::NotFound(NotFoundKind::Node(node_id)))
    }

    /// Dispatch one command end to end: resolve its container(s), acquire
    /// the necessary serializer lock(s) in a deadlock-free order, execute,
    /// and return the committed event or `NoOp`.
    pub async fn dispatch(&self, command: Command) -> Result<Outcome, OutlineError> {
        match &command {
            Command::MoveNodeToContainer { node_id, target_container_id, parent_id, prev_id, .. } => {
                self.dispatch_single_cross_container(*node_id, *target_container_id, *parent_id, *prev_id, command.clone()).await
            }
            Command::MoveNodesToContainer { node_ids, target_container_id, .. } => {
                self.dispatch_batch_cross_container(node_ids.clone(), *target_container_id, command.clone()).await
            }
            _ => self.dispatch_single_container(command).await,
        }
    }

    async fn dispatch_single_container(&self, command: Command) -> Result<Outcome, OutlineError> {
        let container_id = match command.explicit_container_id() {
            Some(id) => id,
            None => {
                let node_id = single_container_node_id(&command);
                self.container_of(node_id).await?
            }
        };

        let handle = self.registry.handle_for(container_id);
        match handle.execute(command, self.command_timeout).await {
            Ok(event) => Ok(Outcome::Committed(event)),
            Err(OutlineError::NoOp) => Ok(Outcome::NoOp),
            Err(err) => Err(err),
        }
    }

    async fn dispatch_single_cross_container(
        &self,
        node_id: NodeId,
        target: ContainerId,
        parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        command: Command,
    ) -> Result<Outcome, OutlineError> {
        let source = self.container_of(node_id).await?;
        if source == target {
            return Ok(Outcome::NoOp);
        }
        let event_id = command.event_id().clone();
        let user_id = command.user_id().clone();

        let (low, high) = ordered_pair(source, target);
        let low_handle = self.registry.handle_for(low);
        let high_handle = self.registry.handle_for(high);
        let _low_guard = tokio::time::timeout(self.command_timeout, low_handle.state.clone().lock_owned())
            .await
            .map_err(|_| OutlineError::Timeout)?;
        let _high_guard = tokio::time::timeout(self.command_timeout, high_handle.state.clone().lock_owned())
            .await
            .map_err(|_| OutlineError::Timeout)?;

        let now = Utc::now();
        let source_nodes = self.store.list_by_container(source).await.map_err(Self::store_err)?;
        let source_tree = Tree::from_nodes(source, source_nodes);
        let mut upserts = source_tree.detach(node_id, now)?;

        let mut subtree = vec![
            self.store.get(node_id).await.map_err(Self::store_err)?.ok_or(OutlineError::NotFound(NotFoundKind::Node(node_id)))?
        ];
        subtree.extend(self.store.all_children(node_id).await.map_err(Self::store_err)?);

        let dest_nodes = self.store.list_by_container(target).await.map_err(Self::store_err)?;
        let dest_tree = Tree::from_nodes(target, dest_nodes);
        let (mut spliced, next) = dest_tree.splice_subtree(subtree, node_id, parent_id, prev_id, now)?;
        upserts.append(&mut spliced);

        let moved_node = upserts
            .iter()
            .find(|n| n.uuid == node_id)
            .cloned()
            .ok_or(OutlineError::NotFound(NotFoundKind::Node(node_id)))?;

        let payload = EventPayload::NodeMovedToNewContainer {
            node: moved_node,
            old_container_id: source,
            new_container_id: target,
            next,
        };
        let changes = NodeChangeSet { upserts, deletes: Vec::new() };
        let event = self
            .store
            .commit(target, changes, event_id, user_id, payload, now)
            .await
            .map_err(Self::store_err)?;
        tracing::debug!(%source, %target, %node_id, "cross-container move committed");
        Ok(Outcome::Committed(event))
    }

    async fn dispatch_batch_cross_container(
        &self,
        node_ids: Vec<NodeId>,
        target: ContainerId,
        command: Command,
    ) -> Result<Outcome, OutlineError> {
        if node_ids.is_empty() {
            return Err(OutlineError::TransientError("batch move requires at least one node".into()));
        }
        let event_id = command.event_id().clone();
        let user_id = command.user_id().clone();

        let mut source: Option<ContainerId> = None;
        for id in &node_ids {
            let c = self.container_of(*id).await?;
            match source {
                Some(existing) if existing != c => {
                    return Err(OutlineError::TransientError(
                        "batch cross-container move requires all nodes to share one source container".into(),
                    ));
                }
                Some(_) => {}
                None => source = Some(c),
            }
        }
        let source = source.expect("checked non-empty above");
        if source == target {
            return Ok(Outcome::NoOp);
        }

        let (low, high) = ordered_pair(source, target);
        let low_handle = self.registry.handle_for(low);
        let high_handle = self.registry.handle_for(high);
        let _low_guard = tokio::time::timeout(self.command_timeout, low_handle.state.clone().lock_owned())
            .await
            .map_err(|_| OutlineError::Timeout)?;
        let _high_guard = tokio::time::timeout(self.command_timeout, high_handle.state.clone().lock_owned())
            .await
            .map_err(|_| OutlineError::Timeout)?;

        let now = Utc::now();
        let mut touched: HashMap<NodeId, Node> = HashMap::new();
        let mut moved_roots: Vec<Node> = Vec::new();

        for node_id in &node_ids {
            let mut source_snapshot = self.store.list_by_container(source).await.map_err(Self::store_err)?;
            for n in source_snapshot.iter_mut() {
                if let Some(newer) = touched.get(&n.uuid) {
                    *n = newer.clone();
                }
            }
            let source_tree = Tree::from_nodes(source, source_snapshot);
            for n in source_tree.detach(*node_id, now)? {
                touched.insert(n.uuid, n);
            }

            let node = self.store.get(*node_id).await.map_err(Self::store_err)?.ok_or(OutlineError::NotFound(NotFoundKind::Node(*node_id)))?;
            let mut subtree = vec![touched.get(node_id).cloned().unwrap_or(node)];
            subtree.extend(self.store.all_children(*node_id).await.map_err(Self::store_err)?);

            let mut dest_snapshot = self.store.list_by_container(target).await.map_err(Self::store_err)?;
            for n in dest_snapshot.iter_mut() {
                if let Some(newer) = touched.get(&n.uuid) {
                    *n = newer.clone();
                }
            }
            for root in &moved_roots {
                dest_snapshot.push(root.clone());
            }
            let dest_tree = Tree::from_nodes(target, dest_snapshot);
            let new_prev = moved_roots.last().map(|n| n.uuid);
            let (spliced, _next) = dest_tree.splice_subtree(subtree, *node_id, None, new_prev, now)?;
            for n in spliced {
                touched.insert(n.uuid, n.clone());
                if n.uuid == *node_id {
                    moved_roots.push(n);
                }
            }
        }

        let payload = EventPayload::NodesMovedToContainer {
            nodes: moved_roots,
            old_container_id: source,
            new_container_id: target,
        };
        let changes = NodeChangeSet { upserts: touched.into_values().collect(), deletes: Vec::new() };
        let event = self
            .store
            .commit(target, changes, event_id, user_id, payload, now)
            .await
            .map_err(Self::store_err)?;
        tracing::debug!(%source, %target, count = node_ids.len(), "cross-container batch move committed");
        Ok(Outcome::Committed(event))
    }
}

fn ordered_pair(a: ContainerId, b: ContainerId) -> (ContainerId, ContainerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The single node id a (non-`InsertNode`, non-cross-container) command
/// targets, used to resolve its container by lookup.
fn single_container_node_id(command: &Command) -> NodeId {
    match command {
        Command::ChangeContent { node_id, .. }
        | Command::MoveNode { node_id, .. }
        | Command::MoveUp { node_id, .. }
        | Command::MoveDown { node_id, .. }
        | Command::Indent { node_id, .. }
        | Command::Outdent { node_id, .. }
        | Command::SplitNode { node_id, .. }
        | Command::MergePrev { node_id, .. }
        | Command::MergeNext { node_id, .. }
        | Command::DeleteNode { node_id, .. } => *node_id,
        Command::InsertNode { .. } | Command::MoveNodeToContainer { .. } | Command::MoveNodesToContainer { .. } => {
            unreachable!("handled by explicit_container_id or the cross-container branches")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use outline_bus_core::InMemoryBus;
    use outline_store_memory::MemoryStore;
    use outline_types::{EventId, Node, UserId};
    use uuid::Uuid;

    use super::*;
    use crate::analyzer_trigger::NoopAnalyzerTrigger;

    fn dispatcher() -> (Dispatcher, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(InMemoryBus::default());
        let registry = Arc::new(SerializerRegistry::new(
            store.clone(),
            bus,
            Arc::new(NoopAnalyzerTrigger),
            Duration::from_secs(60),
        ));
        (Dispatcher::new(registry, store.clone(), Duration::from_secs(5)), store)
    }

    fn event_id() -> EventId {
        EventId::new(Uuid::new_v4(), "test-session").unwrap()
    }

    #[tokio::test]
    async fn insert_then_change_content_commits_sequentially() {
        let (dispatcher, _store) = dispatcher();
        let container = ContainerId::new();
        let node_id = NodeId::new();

        let insert = Command::InsertNode {
            uuid: node_id,
            container_id: container,
            parent_id: None,
            prev_id: None,
            content: "hello".into(),
            creator_id: UserId::from("alice"),
            event_id: event_id(),
            user_id: UserId::from("alice"),
        };
        let outcome = dispatcher.dispatch(insert).await.unwrap();
        assert!(matches!(outcome, Outcome::Committed(_)));

        let change = Command::ChangeContent {
            node_id,
            content: "world".into(),
            event_id: event_id(),
            user_id: UserId::from("alice"),
        };
        let outcome = dispatcher.dispatch(change).await.unwrap();
        assert!(matches!(outcome, Outcome::Committed(_)));
    }

    #[tokio::test]
    async fn move_to_current_position_is_noop() {
        let (dispatcher, _store) = dispatcher();
        let container = ContainerId::new();
        let node_id = NodeId::new();
        let second_id = NodeId::new();

        for (uuid, prev) in [(node_id, None), (second_id, Some(node_id))] {
            let insert = Command::InsertNode {
                uuid,
                container_id: container,
                parent_id: None,
                prev_id: prev,
                content: "x".into(),
                creator_id: UserId::from("alice"),
                event_id: event_id(),
                user_id: UserId::from("alice"),
            };
            dispatcher.dispatch(insert).await.unwrap();
        }

        let noop_move = Command::MoveNode {
            node_id: second_id,
            parent_id: None,
            prev_id: Some(node_id),
            event_id: event_id(),
            user_id: UserId::from("alice"),
        };
        let outcome = dispatcher.dispatch(noop_move).await.unwrap();
        assert!(matches!(outcome, Outcome::NoOp));
    }

    #[tokio::test]
    async fn move_node_to_container_relocates_subtree() {
        let (dispatcher, store) = dispatcher();
        let source = ContainerId::new();
        let target = ContainerId::new();
        let node_id = NodeId::new();

        let insert = Command::InsertNode {
            uuid: node_id,
            container_id: source,
            parent_id: None,
            prev_id: None,
            content: "movable".into(),
            creator_id: UserId::from("alice"),
            event_id: event_id(),
            user_id: UserId::from("alice"),
        };
        dispatcher.dispatch(insert).await.unwrap();

        let move_cmd = Command::MoveNodeToContainer {
            node_id,
            target_container_id: target,
            parent_id: None,
            prev_id: None,
            event_id: event_id(),
            user_id: UserId::from("alice"),
        };
        let outcome = dispatcher.dispatch(move_cmd).await.unwrap();
        assert!(matches!(outcome, Outcome::Committed(_)));

        let moved: Node = store.get(node_id).await.unwrap().unwrap();
        assert_eq!(moved.container_id, target);
        assert_eq!(store.list_by_container(source).await.unwrap().len(), 0);
        assert_eq!(store.list_by_container(target).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn move_nodes_to_container_rejects_mixed_sources() {
        let (dispatcher, _store) = dispatcher();
        let a_container = ContainerId::new();
        let b_container = ContainerId::new();
        let target = ContainerId::new();
        let a = NodeId::new();
        let b = NodeId::new();

        for (uuid, container) in [(a, a_container), (b, b_container)] {
            let insert = Command::InsertNode {
                uuid,
                container_id: container,
                parent_id: None,
                prev_id: None,
                content: "x".into(),
                creator_id: UserId::from("alice"),
                event_id: event_id(),
                user_id: UserId::from("alice"),
            };
            dispatcher.dispatch(insert).await.unwrap();
        }

        let batch = Command::MoveNodesToContainer {
            node_ids: vec![a, b],
            target_container_id: target,
            event_id: event_id(),
            user_id: UserId::from("alice"),
        };
        let err = dispatcher.dispatch(batch).await.unwrap_err();
        assert!(matches!(err, OutlineError::TransientError(_)));
    }
}
