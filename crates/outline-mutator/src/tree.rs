//! Pure, in-memory tree algorithms: insert, move, split, merge, indent,
//! outdent and delete over a single container's node set.
//!
//! A [`Tree`] is a snapshot taken by the caller (normally the Serializer,
//! after loading the affected subtree from a [`outline_store_core::NodeStore`]).
//! None of the methods here perform I/O; they compute the node-level deltas
//! and the canonical event for one command, leaving persistence to the
//! caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use outline_types::{ContainerId, EventPayload, Node, NodeId, NotFoundKind, OutlineError, UserId};

use crate::effect::MutationEffect;

/// A snapshot of one container's nodes, used to compute tree mutations.
#[derive(Debug, Clone)]
pub struct Tree {
    container_id: ContainerId,
    nodes: HashMap<NodeId, Node>,
}

impl Tree {
    /// Build a snapshot from a flat node list. Nodes belonging to other
    /// containers are ignored.
    pub fn from_nodes(container_id: ContainerId, nodes: Vec<Node>) -> Self {
        let nodes = nodes.into_iter().filter(|n| n.container_id == container_id).map(|n| (n.uuid, n)).collect();
        Self { container_id, nodes }
    }

    /// The container this snapshot covers.
    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    fn get(&self, id: NodeId) -> Result<&Node, OutlineError> {
        self.nodes.get(&id).ok_or(OutlineError::NotFound(NotFoundKind::Node(id)))
    }

    fn require_position(&self, id: NodeId) -> Result<&Node, OutlineError> {
        self.nodes.get(&id).ok_or(OutlineError::NotFound(NotFoundKind::Position(id)))
    }

    fn head_of(&self, parent_id: Option<NodeId>) -> Option<NodeId> {
        self.nodes.values().find(|n| n.parent_id == parent_id && n.prev_id.is_none()).map(|n| n.uuid)
    }

    fn next_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.values().find(|n| n.prev_id == Some(id)).map(|n| n.uuid)
    }

    /// The sibling chain under `parent_id`, in head-to-tail order.
    pub fn sibling_chain(&self, parent_id: Option<NodeId>) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.head_of(parent_id);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.next_of(id);
        }
        chain
    }

    /// True if `candidate` is `ancestor` itself or lies within `ancestor`'s
    /// subtree (walks the parent chain from `candidate` toward the root).
    fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(candidate);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }

    /// Insert a new node at `(parent_id, prev_id)`. `prev_id = None` makes
    /// the new node the head of its sibling group.
    pub fn insert(
        &self,
        parent_id: Option<NodeId>,
        prev_id: Option<NodeId>,
        content: String,
        uuid: NodeId,
        creator_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<MutationEffect, OutlineError> {
        if let Some(parent) = parent_id {
            self.get(parent)?;
        }
        if let Some(prev) = prev_id {
            let prev_node = self.require_position(prev)?;
            if prev_node.parent_id != parent_id {
                return Err(OutlineError::ParentPrevInconsistent { prev_id: prev, parent_id });
            }
        }

        let next_id = match prev_id {
            Some(prev) => self.next_of(prev),
            None => self.head_of(parent_id),
        };

        let new_node = Node::new(uuid, self.container_id, parent_id, prev_id, content.clone(), creator_id, now);
        let mut upserts = vec![new_node.clone()];
        if let Some(next_id) = next_id {
            let mut next_node = self.get(next_id)?.clone();
            next_node.prev_id = Some(uuid);
            next_node.updated_at = now;
            upserts.push(next_node);
        }

        Ok(MutationEffect {
            upserts,
            deletes: Vec::new(),
            event: EventPayload::NodeInserted { node: new_node, next: next_id, content, container_id: self.container_id },
        })
    }

    /// Change a node's content in place. Indentation and position are
    /// untouched.
    pub fn change_content(&self, node_id: NodeId, content: String, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let mut node = self.get(node_id)?.clone();
        node.content = content.clone();
        node.updated_at = now;
        Ok(MutationEffect {
            upserts: vec![node],
            deletes: Vec::new(),
            event: EventPayload::NodeContentChanged { node_id, content, container_id: self.container_id },
        })
    }

    /// Rewire `node_id` to sit at `(new_parent_id, new_prev_id)` within the
    /// same container. Fails closed on no-op moves, inconsistent prev/parent
    /// pairs, and cycles.
    pub fn move_node(
        &self,
        node_id: NodeId,
        new_parent_id: Option<NodeId>,
        new_prev_id: Option<NodeId>,
        now: DateTime<Utc>,
    ) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?.clone();

        if new_parent_id == node.parent_id && new_prev_id == node.prev_id {
            return Err(OutlineError::NoOp);
        }
        if let Some(prev) = new_prev_id {
            let prev_node = self.require_position(prev)?;
            if prev_node.parent_id != new_parent_id {
                return Err(OutlineError::ParentPrevInconsistent { prev_id: prev, parent_id: new_parent_id });
            }
        }
        if let Some(new_parent) = new_parent_id {
            if self.is_descendant(new_parent, node_id) {
                return Err(OutlineError::CycleError { node: node_id, new_parent });
            }
        }

        let old_prev = node.prev_id;
        let old_next = self.next_of(node_id);
        let mut upserts = Vec::new();

        if let Some(old_next_id) = old_next {
            let mut n = self.get(old_next_id)?.clone();
            n.prev_id = old_prev;
            n.updated_at = now;
            upserts.push(n);
        }

        let new_next = match new_prev_id {
            Some(prev) => self.next_of(prev),
            None => self.head_of(new_parent_id),
        };

        let mut moved = node;
        moved.parent_id = new_parent_id;
        moved.prev_id = new_prev_id;
        moved.updated_at = now;
        upserts.push(moved.clone());

        if let Some(new_next_id) = new_next {
            if new_next_id != node_id {
                let mut n = self.get(new_next_id)?.clone();
                n.prev_id = Some(node_id);
                n.updated_at = now;
                upserts.retain(|u| u.uuid != n.uuid);
                upserts.push(n);
            }
        }

        Ok(MutationEffect {
            upserts,
            deletes: Vec::new(),
            event: EventPayload::NodeMoved {
                node: moved,
                next: new_next,
                old_prev,
                old_next,
                children: None,
                container_id: self.container_id,
            },
        })
    }

    /// Swap position with the immediately preceding sibling.
    pub fn move_up(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?;
        let prev_id = node.prev_id.ok_or(OutlineError::NotFound(NotFoundKind::Position(node_id)))?;
        let prev = self.get(prev_id)?;
        let new_prev_id = prev.prev_id;
        let parent_id = node.parent_id;
        self.move_node(node_id, parent_id, new_prev_id, now)
    }

    /// Swap position with the immediately following sibling.
    pub fn move_down(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?;
        let next_id = self.next_of(node_id).ok_or(OutlineError::NotFound(NotFoundKind::Position(node_id)))?;
        let parent_id = node.parent_id;
        self.move_node(node_id, parent_id, Some(next_id), now)
    }

    /// Nest `node_id` under its previous sibling, as that sibling's last
    /// child. Fails if there is no previous sibling to nest under.
    pub fn indent(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?;
        let new_parent_id = node.prev_id.ok_or(OutlineError::CannotIndent(node_id))?;
        let new_prev_id = self.sibling_chain(Some(new_parent_id)).last().copied();
        self.move_node(node_id, Some(new_parent_id), new_prev_id, now)
    }

    /// Lift `node_id` out to sit right after its current parent, at the
    /// parent's own level. Fails at the root.
    pub fn outdent(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?;
        let parent_id = node.parent_id.ok_or(OutlineError::CannotOutdent(node_id))?;
        let parent = self.get(parent_id)?;
        let grandparent_id = parent.parent_id;
        self.move_node(node_id, grandparent_id, Some(parent_id), now)
    }

    /// Split `node_id`'s content at the byte range `[start, stop)`: the
    /// bytes before `start` stay on `node_id`, the bytes from `stop` onward
    /// move to a freshly inserted sibling placed right after it. Both
    /// boundaries must land on UTF-8 character boundaries.
    pub fn split(
        &self,
        node_id: NodeId,
        start: usize,
        stop: usize,
        new_uuid: NodeId,
        now: DateTime<Utc>,
    ) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?.clone();
        let valid_range = start <= stop
            && stop <= node.content.len()
            && node.content.is_char_boundary(start)
            && node.content.is_char_boundary(stop);
        if !valid_range {
            return Err(OutlineError::InvalidSelection { node: node_id, start, stop });
        }

        let prefix = node.content[..start].to_string();
        let suffix = node.content[stop..].to_string();
        let next_id = self.next_of(node_id);

        let new_node = Node::new(new_uuid, self.container_id, node.parent_id, Some(node_id), suffix.clone(), node.creator_id.clone(), now);

        let mut upserts = Vec::new();
        for child_id in self.sibling_chain(Some(node_id)) {
            let mut child = self.get(child_id)?.clone();
            child.parent_id = Some(new_uuid);
            child.updated_at = now;
            upserts.push(child);
        }

        let mut truncated = node;
        truncated.content = prefix;
        truncated.updated_at = now;
        upserts.push(truncated);
        upserts.push(new_node.clone());

        if let Some(next_id) = next_id {
            let mut n = self.get(next_id)?.clone();
            n.prev_id = Some(new_uuid);
            n.updated_at = now;
            upserts.push(n);
        }

        Ok(MutationEffect {
            upserts,
            deletes: Vec::new(),
            event: EventPayload::NodeInserted { node: new_node, next: next_id, content: suffix, container_id: self.container_id },
        })
    }

    /// Prepend the previous sibling's content onto `node_id` and delete
    /// that sibling, reparenting its children as `node_id`'s trailing
    /// children.
    pub fn merge_prev(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?.clone();
        let deleted_id = node.prev_id.ok_or(OutlineError::NotFound(NotFoundKind::Position(node_id)))?;
        let deleted = self.get(deleted_id)?.clone();

        let mut survivor = node.clone();
        survivor.content = format!("{}{}", deleted.content, node.content);
        survivor.prev_id = deleted.prev_id;
        survivor.updated_at = now;

        let deleted_children = self.sibling_chain(Some(deleted_id));
        let mut tail_prev = self.sibling_chain(Some(node_id)).last().copied();
        let mut upserts = Vec::new();
        for child_id in &deleted_children {
            let mut child = self.get(*child_id)?.clone();
            child.parent_id = Some(node_id);
            if child.prev_id.is_none() {
                child.prev_id = tail_prev;
            }
            child.updated_at = now;
            tail_prev = Some(child.uuid);
            upserts.push(child);
        }
        upserts.push(survivor);

        Ok(MutationEffect {
            upserts,
            deletes: vec![deleted_id],
            event: EventPayload::NodeDeleted { node: deleted, children: deleted_children, next: Some(node_id), container_id: self.container_id },
        })
    }

    /// Append the next sibling's content onto `node_id` and delete that
    /// sibling, reparenting its children as `node_id`'s trailing children.
    pub fn merge_next(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?.clone();
        let deleted_id = self.next_of(node_id).ok_or(OutlineError::NotFound(NotFoundKind::Position(node_id)))?;
        let deleted = self.get(deleted_id)?.clone();

        let mut survivor = node.clone();
        survivor.content = format!("{}{}", node.content, deleted.content);
        survivor.updated_at = now;

        let deleted_children = self.sibling_chain(Some(deleted_id));
        let mut tail_prev = self.sibling_chain(Some(node_id)).last().copied();
        let mut upserts = Vec::new();
        for child_id in &deleted_children {
            let mut child = self.get(*child_id)?.clone();
            child.parent_id = Some(node_id);
            if child.prev_id.is_none() {
                child.prev_id = tail_prev;
            }
            child.updated_at = now;
            tail_prev = Some(child.uuid);
            upserts.push(child);
        }

        let after_deleted = self.next_of(deleted_id);
        if let Some(after_id) = after_deleted {
            let mut n = self.get(after_id)?.clone();
            n.prev_id = Some(node_id);
            n.updated_at = now;
            upserts.push(n);
        }
        upserts.push(survivor);

        Ok(MutationEffect {
            upserts,
            deletes: vec![deleted_id],
            event: EventPayload::NodeDeleted { node: deleted, children: deleted_children, next: after_deleted, container_id: self.container_id },
        })
    }

    /// Compute the rewiring needed to close the gap left behind when
    /// `node_id` (and its whole subtree) is lifted out of this tree, e.g.
    /// ahead of a move into a different container. Does not remove
    /// `node_id` itself from this snapshot; the caller is expected to
    /// discard it separately.
    pub fn detach(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<Vec<Node>, OutlineError> {
        let node = self.get(node_id)?;
        match self.next_of(node_id) {
            Some(next_id) => {
                let mut n = self.get(next_id)?.clone();
                n.prev_id = node.prev_id;
                n.updated_at = now;
                Ok(vec![n])
            }
            None => Ok(Vec::new()),
        }
    }

    /// Splice an externally-supplied subtree (root plus descendants,
    /// typically loaded from a different container's store) into this
    /// tree at `(new_parent_id, new_prev_id)`, retagging every member's
    /// `container_id` to this tree's own. Returns the full set of upserts
    /// needed on the destination side, and the node (if any) that now
    /// follows the spliced-in root.
    pub fn splice_subtree(
        &self,
        mut subtree: Vec<Node>,
        root_id: NodeId,
        new_parent_id: Option<NodeId>,
        new_prev_id: Option<NodeId>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Node>, Option<NodeId>), OutlineError> {
        if let Some(prev) = new_prev_id {
            let prev_node = self.require_position(prev)?;
            if prev_node.parent_id != new_parent_id {
                return Err(OutlineError::ParentPrevInconsistent { prev_id: prev, parent_id: new_parent_id });
            }
        }
        let new_next = match new_prev_id {
            Some(prev) => self.next_of(prev),
            None => self.head_of(new_parent_id),
        };

        for n in subtree.iter_mut() {
            n.container_id = self.container_id;
            n.updated_at = now;
            if n.uuid == root_id {
                n.parent_id = new_parent_id;
                n.prev_id = new_prev_id;
            }
        }

        if let Some(new_next_id) = new_next {
            let mut n = self.get(new_next_id)?.clone();
            n.prev_id = Some(root_id);
            n.updated_at = now;
            subtree.push(n);
        }

        Ok((subtree, new_next))
    }

    /// Remove `node_id`. Its children are reparented to `node_id`'s own
    /// parent, spliced in where `node_id` used to sit, preserving their
    /// relative order.
    pub fn delete(&self, node_id: NodeId, now: DateTime<Utc>) -> Result<MutationEffect, OutlineError> {
        let node = self.get(node_id)?.clone();
        let old_next = self.next_of(node_id);
        let children = self.sibling_chain(Some(node_id));
        let mut upserts = Vec::new();

        if children.is_empty() {
            if let Some(next_id) = old_next {
                let mut n = self.get(next_id)?.clone();
                n.prev_id = node.prev_id;
                n.updated_at = now;
                upserts.push(n);
            }
        } else {
            let mut cursor_prev = node.prev_id;
            for child_id in &children {
                let mut child = self.get(*child_id)?.clone();
                child.parent_id = node.parent_id;
                child.prev_id = cursor_prev;
                child.updated_at = now;
                cursor_prev = Some(child.uuid);
                upserts.push(child);
            }
            if let Some(next_id) = old_next {
                let mut n = self.get(next_id)?.clone();
                n.prev_id = cursor_prev;
                n.updated_at = now;
                upserts.push(n);
            }
        }

        Ok(MutationEffect {
            upserts,
            deletes: vec![node_id],
            event: EventPayload::NodeDeleted { node, children, next: old_next, container_id: self.container_id },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outline_types::UserId;
    use uuid::Uuid;

    fn uid() -> UserId {
        "alice".into()
    }

    fn new_node(container: ContainerId, parent: Option<NodeId>, prev: Option<NodeId>, content: &str) -> Node {
        Node::new(NodeId::new(), container, parent, prev, content.into(), uid(), Utc::now())
    }

    fn chain(container: ContainerId, contents: &[&str]) -> (Tree, Vec<NodeId>) {
        let mut nodes = Vec::new();
        let mut prev = None;
        let mut ids = Vec::new();
        for c in contents {
            let n = new_node(container, None, prev, c);
            prev = Some(n.uuid);
            ids.push(n.uuid);
            nodes.push(n);
        }
        (Tree::from_nodes(container, nodes), ids)
    }

    #[test]
    fn insert_at_head_becomes_new_head() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b"]);
        let new_id = NodeId::new();
        let effect = tree.insert(None, None, "z".into(), new_id, uid(), Utc::now()).unwrap();
        let a_update = effect.upserts.iter().find(|n| n.uuid == ids[0]).unwrap();
        assert_eq!(a_update.prev_id, Some(new_id));
    }

    #[test]
    fn insert_with_unrelated_prev_group_is_rejected() {
        let container = ContainerId::new();
        let parent = new_node(container, None, None, "p");
        let sibling_under_parent = new_node(container, Some(parent.uuid), None, "child");
        let tree = Tree::from_nodes(container, vec![parent.clone(), sibling_under_parent.clone()]);

        let result = tree.insert(None, Some(sibling_under_parent.uuid), "x".into(), NodeId::new(), uid(), Utc::now());
        assert!(matches!(result, Err(OutlineError::ParentPrevInconsistent { .. })));
    }

    #[test]
    fn move_to_same_position_is_noop() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b"]);
        let result = tree.move_node(ids[1], None, Some(ids[0]), Utc::now());
        assert!(matches!(result, Err(OutlineError::NoOp)));
    }

    #[test]
    fn move_into_own_subtree_is_cycle() {
        let container = ContainerId::new();
        let parent = new_node(container, None, None, "parent");
        let child = new_node(container, Some(parent.uuid), None, "child");
        let tree = Tree::from_nodes(container, vec![parent.clone(), child.clone()]);

        let result = tree.move_node(parent.uuid, Some(child.uuid), None, Utc::now());
        assert!(matches!(result, Err(OutlineError::CycleError { .. })));
    }

    #[test]
    fn move_down_swaps_adjacent_siblings() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b", "c"]);
        let effect = tree.move_down(ids[1], Utc::now()).unwrap();

        let updated: HashMap<NodeId, Node> = effect.upserts.into_iter().map(|n| (n.uuid, n)).collect();
        assert_eq!(updated[&ids[2]].prev_id, Some(ids[0]));
        assert_eq!(updated[&ids[1]].prev_id, Some(ids[2]));
    }

    #[test]
    fn indent_nests_under_previous_sibling() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b"]);
        let effect = tree.indent(ids[1], Utc::now()).unwrap();
        let moved = effect.upserts.iter().find(|n| n.uuid == ids[1]).unwrap();
        assert_eq!(moved.parent_id, Some(ids[0]));
        assert_eq!(moved.prev_id, None);
    }

    #[test]
    fn indent_at_head_fails() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a"]);
        let result = tree.indent(ids[0], Utc::now());
        assert!(matches!(result, Err(OutlineError::CannotIndent(_))));
    }

    #[test]
    fn outdent_moves_to_grandparent_level() {
        let container = ContainerId::new();
        let root = new_node(container, None, None, "root");
        let child = new_node(container, Some(root.uuid), None, "child");
        let tree = Tree::from_nodes(container, vec![root.clone(), child.clone()]);

        let effect = tree.outdent(child.uuid, Utc::now()).unwrap();
        let moved = effect.upserts.iter().find(|n| n.uuid == child.uuid).unwrap();
        assert_eq!(moved.parent_id, None);
        assert_eq!(moved.prev_id, Some(root.uuid));
    }

    #[test]
    fn outdent_at_root_fails() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a"]);
        let result = tree.outdent(ids[0], Utc::now());
        assert!(matches!(result, Err(OutlineError::CannotOutdent(_))));
    }

    #[test]
    fn split_creates_sibling_with_tail_content() {
        let container = ContainerId::new();
        let node = new_node(container, None, None, "hello world");
        let tree = Tree::from_nodes(container, vec![node.clone()]);

        let new_id = NodeId::new();
        let effect = tree.split(node.uuid, 5, 6, new_id, Utc::now()).unwrap();
        let truncated = effect.upserts.iter().find(|n| n.uuid == node.uuid).unwrap();
        let created = effect.upserts.iter().find(|n| n.uuid == new_id).unwrap();
        assert_eq!(truncated.content, "hello");
        assert_eq!(created.content, "world");
    }

    #[test]
    fn split_on_non_char_boundary_is_rejected() {
        let container = ContainerId::new();
        let node = new_node(container, None, None, "héllo");
        let tree = Tree::from_nodes(container, vec![node.clone()]);
        // 'é' occupies bytes 1..3; byte 2 is not a char boundary.
        let result = tree.split(node.uuid, 2, 3, NodeId::new(), Utc::now());
        assert!(matches!(result, Err(OutlineError::InvalidSelection { .. })));
    }

    #[test]
    fn split_moves_children_to_new_sibling() {
        let container = ContainerId::new();
        let node = new_node(container, None, None, "abcdef");
        let child = new_node(container, Some(node.uuid), None, "child");
        let tree = Tree::from_nodes(container, vec![node.clone(), child.clone()]);

        let new_id = NodeId::new();
        let effect = tree.split(node.uuid, 3, 3, new_id, Utc::now()).unwrap();
        let moved_child = effect.upserts.iter().find(|n| n.uuid == child.uuid).unwrap();
        assert_eq!(moved_child.parent_id, Some(new_id));
    }

    #[test]
    fn merge_prev_concatenates_and_deletes_sibling() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["hello ", "world"]);
        let effect = tree.merge_prev(ids[1], Utc::now()).unwrap();
        assert_eq!(effect.deletes, vec![ids[0]]);
        let survivor = effect.upserts.iter().find(|n| n.uuid == ids[1]).unwrap();
        assert_eq!(survivor.content, "hello world");
    }

    #[test]
    fn merge_next_concatenates_and_deletes_sibling() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["hello ", "world"]);
        let effect = tree.merge_next(ids[0], Utc::now()).unwrap();
        assert_eq!(effect.deletes, vec![ids[1]]);
        let survivor = effect.upserts.iter().find(|n| n.uuid == ids[0]).unwrap();
        assert_eq!(survivor.content, "hello world");
    }

    #[test]
    fn merge_prev_reparents_deleted_siblings_children() {
        let container = ContainerId::new();
        let a = new_node(container, None, None, "a");
        let b = new_node(container, None, Some(a.uuid), "b");
        let x = new_node(container, Some(a.uuid), None, "x");
        let tree = Tree::from_nodes(container, vec![a.clone(), b.clone(), x.clone()]);

        let effect = tree.merge_prev(b.uuid, Utc::now()).unwrap();
        let moved_child = effect.upserts.iter().find(|n| n.uuid == x.uuid).unwrap();
        assert_eq!(moved_child.parent_id, Some(b.uuid));
    }

    #[test]
    fn delete_without_children_rewires_next() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b", "c"]);
        let effect = tree.delete(ids[1], Utc::now()).unwrap();
        let c_update = effect.upserts.iter().find(|n| n.uuid == ids[2]).unwrap();
        assert_eq!(c_update.prev_id, Some(ids[0]));
    }

    #[test]
    fn delete_with_children_splices_them_into_parent_level() {
        let container = ContainerId::new();
        let a = new_node(container, None, None, "a");
        let x = new_node(container, Some(a.uuid), None, "x");
        let y = new_node(container, Some(a.uuid), Some(x.uuid), "y");
        let b = new_node(container, None, Some(a.uuid), "b");
        let tree = Tree::from_nodes(container, vec![a.clone(), x.clone(), y.clone(), b.clone()]);

        let effect = tree.delete(a.uuid, Utc::now()).unwrap();
        let updated: HashMap<NodeId, Node> = effect.upserts.into_iter().map(|n| (n.uuid, n)).collect();
        assert_eq!(updated[&x.uuid].parent_id, None);
        assert_eq!(updated[&x.uuid].prev_id, None);
        assert_eq!(updated[&y.uuid].prev_id, Some(x.uuid));
        assert_eq!(updated[&b.uuid].prev_id, Some(y.uuid));
    }

    #[test]
    fn detach_closes_gap_left_by_removed_node() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b", "c"]);
        let upserts = tree.detach(ids[1], Utc::now()).unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].uuid, ids[2]);
        assert_eq!(upserts[0].prev_id, Some(ids[0]));
    }

    #[test]
    fn detach_at_tail_produces_no_upserts() {
        let container = ContainerId::new();
        let (tree, ids) = chain(container, &["a", "b"]);
        let upserts = tree.detach(ids[1], Utc::now()).unwrap();
        assert!(upserts.is_empty());
    }

    #[test]
    fn splice_subtree_retags_container_and_appends_at_tail() {
        let source_container = ContainerId::new();
        let dest_container = ContainerId::new();
        let root = new_node(source_container, None, None, "root");
        let child = new_node(source_container, Some(root.uuid), None, "child");

        let (dest_tree, dest_ids) = chain(dest_container, &["x", "y"]);
        let (upserts, next) = dest_tree.splice_subtree(vec![root.clone(), child.clone()], root.uuid, None, dest_ids.last().copied(), Utc::now()).unwrap();

        assert_eq!(next, None);
        let by_id: HashMap<NodeId, Node> = upserts.into_iter().map(|n| (n.uuid, n)).collect();
        assert_eq!(by_id[&root.uuid].container_id, dest_container);
        assert_eq!(by_id[&root.uuid].prev_id, dest_ids.last().copied());
        assert_eq!(by_id[&child.uuid].container_id, dest_container);
        assert_eq!(by_id[&child.uuid].parent_id, Some(root.uuid));
    }
}
