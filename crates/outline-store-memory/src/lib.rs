#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-store-memory** – In-memory storage driver for the outline
//! engine.
//!
//! Fast, non-persistent backend suitable for tests, the demo CLI, and any
//! scenario where durability is not required. All data is lost when the
//! process terminates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outline_store_core::{NodeChangeSet, NodeStore, StoreError};
use outline_types::{ContainerId, Event, EventId, EventPayload, Node, NodeId, Sequence, UserId};
use tokio::sync::RwLock;

/// An in-memory, non-persistent node and event store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: Arc<RwLock<HashMap<NodeId, Node>>>,
    events: Arc<RwLock<HashMap<ContainerId, Vec<Event>>>>,
}

impl MemoryStore {
    /// Create a new, empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sibling_chain_locked(
        nodes: &HashMap<NodeId, Node>,
        container_id: ContainerId,
        parent_id: Option<NodeId>,
    ) -> Vec<Node> {
        let group: Vec<&Node> = nodes
            .values()
            .filter(|n| n.container_id == container_id && n.parent_id == parent_id)
            .collect();
        let mut by_prev: HashMap<Option<NodeId>, &Node> = HashMap::new();
        for n in &group {
            by_prev.insert(n.prev_id, n);
        }
        let mut chain = Vec::with_capacity(group.len());
        let mut cursor = None;
        while let Some(n) = by_prev.get(&cursor) {
            chain.push((*n).clone());
            cursor = Some(n.uuid);
        }
        chain
    }

    fn pre_order_locked(
        nodes: &HashMap<NodeId, Node>,
        container_id: ContainerId,
        parent_id: Option<NodeId>,
        out: &mut Vec<Node>,
    ) {
        for n in Self::sibling_chain_locked(nodes, container_id, parent_id) {
            let id = n.uuid;
            out.push(n);
            Self::pre_order_locked(nodes, container_id, Some(id), out);
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        Ok(self.nodes.read().await.get(&id).cloned())
    }

    async fn list_by_container(&self, container_id: ContainerId) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let mut out = Vec::new();
        Self::pre_order_locked(&nodes, container_id, None, &mut out);
        Ok(out)
    }

    async fn count_by_container(&self, container_id: ContainerId) -> Result<usize, StoreError> {
        Ok(self.nodes.read().await.values().filter(|n| n.container_id == container_id).count())
    }

    async fn all_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let root = nodes.get(&id).ok_or(StoreError::NodeNotFound(id))?.clone();
        let mut out = Vec::new();
        Self::pre_order_locked(&nodes, root.container_id, Some(id), &mut out);
        Ok(out)
    }

    async fn direct_children(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let root = nodes.get(&id).ok_or(StoreError::NodeNotFound(id))?.clone();
        Ok(Self::sibling_chain_locked(&nodes, root.container_id, Some(id)))
    }

    async fn direct_siblings(&self, id: NodeId) -> Result<Vec<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let node = nodes.get(&id).ok_or(StoreError::NodeNotFound(id))?.clone();
        let chain = Self::sibling_chain_locked(&nodes, node.container_id, node.parent_id);
        Ok(chain.into_iter().filter(|n| n.uuid != id).collect())
    }

    async fn node_above(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let node = nodes.get(&id).ok_or(StoreError::NodeNotFound(id))?.clone();
        match node.prev_id {
            Some(prev_id) => {
                // Predecessor is prev's deepest last descendant, or prev
                // itself if it has no children.
                let mut cursor = nodes.get(&prev_id).cloned().ok_or(StoreError::NodeNotFound(prev_id))?;
                loop {
                    let children = Self::sibling_chain_locked(&nodes, cursor.container_id, Some(cursor.uuid));
                    match children.last() {
                        Some(last) => cursor = last.clone(),
                        None => break,
                    }
                }
                Ok(Some(cursor))
            }
            None => Ok(node.parent_id.and_then(|p| nodes.get(&p).cloned())),
        }
    }

    async fn node_below(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        let node = nodes.get(&id).ok_or(StoreError::NodeNotFound(id))?.clone();
        let children = Self::sibling_chain_locked(&nodes, node.container_id, Some(id));
        if let Some(first_child) = children.first() {
            return Ok(Some(first_child.clone()));
        }
        // No children: ascend until we find an ancestor with a next sibling.
        let mut cursor = node;
        loop {
            let siblings = Self::sibling_chain_locked(&nodes, cursor.container_id, cursor.parent_id);
            let next = siblings.iter().find(|n| n.prev_id == Some(cursor.uuid)).cloned();
            if let Some(next) = next {
                return Ok(Some(next));
            }
            match cursor.parent_id {
                Some(parent_id) => cursor = nodes.get(&parent_id).cloned().ok_or(StoreError::NodeNotFound(parent_id))?,
                None => return Ok(None),
            }
        }
    }

    async fn sibling_head(
        &self,
        container_id: ContainerId,
        parent_id: Option<NodeId>,
    ) -> Result<Option<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        Ok(Self::sibling_chain_locked(&nodes, container_id, parent_id).into_iter().next())
    }

    async fn next_sibling(&self, id: NodeId) -> Result<Option<Node>, StoreError> {
        let nodes = self.nodes.read().await;
        Ok(nodes.values().find(|n| n.prev_id == Some(id)).cloned())
    }

    async fn latest_sequence(&self, container_id: ContainerId) -> Result<Sequence, StoreError> {
        let events = self.events.read().await;
        Ok(events.get(&container_id).and_then(|v| v.last()).map(|e| e.sequence).unwrap_or(Sequence::ZERO))
    }

    async fn list_events(&self, container_id: ContainerId) -> Result<Vec<Event>, StoreError> {
        Ok(self.events.read().await.get(&container_id).cloned().unwrap_or_default())
    }

    async fn commit(
        &self,
        container_id: ContainerId,
        changes: NodeChangeSet,
        event_id: EventId,
        user_id: UserId,
        payload: EventPayload,
        created_at: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let mut nodes = self.nodes.write().await;
        let mut events = self.events.write().await;

        // Idempotent retry: a caller may resubmit with the same event_id
        // after a TransientError; return the prior outcome rather
        // than re-applying the mutation.
        if let Some(existing) = events.get(&container_id).and_then(|v| v.iter().find(|e| e.event_id == event_id)) {
            return Ok(existing.clone());
        }

        let sequence = events.get(&container_id).and_then(|v| v.last()).map(|e| e.sequence.next()).unwrap_or(Sequence(1));

        for id in &changes.deletes {
            nodes.remove(id);
        }
        for node in changes.upserts {
            nodes.insert(node.uuid, node);
        }

        let event = Event { event_id, payload, user_id, created_at, sequence };
        events.entry(container_id).or_default().push(event.clone());
        tracing::debug!(%container_id, sequence = %sequence, "committed outline event");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_types::UrlRecord;
    use uuid::Uuid;

    fn node(container: ContainerId, parent: Option<NodeId>, prev: Option<NodeId>, content: &str) -> Node {
        Node::new(NodeId::new(), container, parent, prev, content.into(), "u1".into(), Utc::now())
    }

    #[tokio::test]
    async fn commit_assigns_increasing_sequence() {
        let store = MemoryStore::new();
        let container = ContainerId::new();
        let a = node(container, None, None, "a");

        let e1 = store
            .commit(
                container,
                NodeChangeSet::new().upsert(a.clone()),
                EventId::new(Uuid::new_v4(), "s1").unwrap(),
                "u1".into(),
                EventPayload::NodeInserted { node: a.clone(), next: None, content: "a".into(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(e1.sequence, Sequence(1));

        let e2 = store
            .commit(
                container,
                NodeChangeSet::new(),
                EventId::new(Uuid::new_v4(), "s1").unwrap(),
                "u1".into(),
                EventPayload::NodeContentChanged { node_id: a.uuid, content: "aa".into(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(e2.sequence, Sequence(2));
    }

    #[tokio::test]
    async fn list_by_container_is_preorder() {
        let store = MemoryStore::new();
        let container = ContainerId::new();
        let a = node(container, None, None, "a");
        let b = node(container, None, Some(a.uuid), "b");
        let x = node(container, Some(a.uuid), None, "x");

        for n in [a.clone(), b.clone(), x.clone()] {
            store.commit(
                container,
                NodeChangeSet::new().upsert(n.clone()),
                EventId::new(Uuid::new_v4(), "s1").unwrap(),
                "u1".into(),
                EventPayload::NodeContentChanged { node_id: n.uuid, content: n.content.clone(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();
        }

        let traversal = store.list_by_container(container).await.unwrap();
        let contents: Vec<&str> = traversal.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "x", "b"]);
    }

    #[tokio::test]
    async fn urls_survive_round_trip_through_upsert() {
        let store = MemoryStore::new();
        let container = ContainerId::new();
        let mut a = node(container, None, None, "see https://x.test");
        a.urls.push(UrlRecord::unenriched(a.uuid, 4, "https://x.test".into()));

        store
            .commit(
                container,
                NodeChangeSet::new().upsert(a.clone()),
                EventId::new(Uuid::new_v4(), "s1").unwrap(),
                "u1".into(),
                EventPayload::UrlsAnalyzed { node_id: a.uuid, urls: a.urls.clone(), container_id: container },
                Utc::now(),
            )
            .await
            .unwrap();

        let fetched = store.get(a.uuid).await.unwrap().unwrap();
        assert_eq!(fetched.urls.len(), 1);
        assert_eq!(fetched.urls[0].url, "https://x.test");
    }
}
