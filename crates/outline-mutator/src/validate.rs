//! Full-tree consistency checking, used by tests and the demo CLI to assert
//! that a container's nodes still form a well-formed forest after a batch
//! of mutations.

use std::collections::{HashMap, HashSet};

use outline_types::{ContainerId, Node, NodeId};

/// One broken invariant found while walking a container's nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A node's `prev_id` points at a node that does not exist.
    DanglingPrev { node: NodeId, missing_prev: NodeId },
    /// A node's `prev_id` points at a node with a different parent.
    PrevCrossesSiblingGroup { node: NodeId, prev: NodeId },
    /// Two or more nodes in the same sibling group claim the same `prev_id`.
    ForkedPrev { parent: Option<NodeId>, prev: Option<NodeId>, holders: Vec<NodeId> },
    /// A non-empty sibling group has no node with `prev_id = None`.
    MissingHead { parent: Option<NodeId> },
    /// A sibling group's prev-chain does not reach every member (a cycle,
    /// or a chain shorter than the group).
    BrokenChain { parent: Option<NodeId>, reached: usize, expected: usize },
    /// The parent chain from some node back to the root revisits a node,
    /// meaning the forest contains a cycle.
    CycleInParentChain { node: NodeId },
    /// A node's `parent_id` points at a node that does not exist.
    DanglingParent { node: NodeId, missing_parent: NodeId },
}

/// Walk every node belonging to `container_id` and report every invariant
/// violation found. An empty result means the container is well-formed:
/// every sibling group is a proper linked list with exactly one head, the
/// parent graph is acyclic, and every reference resolves.
pub fn validate_container(container_id: ContainerId, nodes: &[Node]) -> Vec<InvariantViolation> {
    let by_id: HashMap<NodeId, &Node> = nodes.iter().filter(|n| n.container_id == container_id).map(|n| (n.uuid, *n)).collect();
    let mut violations = Vec::new();

    for node in by_id.values() {
        if let Some(parent_id) = node.parent_id {
            if !by_id.contains_key(&parent_id) {
                violations.push(InvariantViolation::DanglingParent { node: node.uuid, missing_parent: parent_id });
            }
        }
        if let Some(prev_id) = node.prev_id {
            match by_id.get(&prev_id) {
                None => violations.push(InvariantViolation::DanglingPrev { node: node.uuid, missing_prev: prev_id }),
                Some(prev) if prev.parent_id != node.parent_id => {
                    violations.push(InvariantViolation::PrevCrossesSiblingGroup { node: node.uuid, prev: prev_id })
                }
                Some(_) => {}
            }
        }
    }

    let mut groups: HashMap<Option<NodeId>, Vec<&Node>> = HashMap::new();
    for node in by_id.values() {
        groups.entry(node.parent_id).or_default().push(node);
    }

    for (parent, members) in &groups {
        let mut by_prev: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
        for m in members {
            by_prev.entry(m.prev_id).or_default().push(m.uuid);
        }
        for (prev, holders) in &by_prev {
            if holders.len() > 1 {
                violations.push(InvariantViolation::ForkedPrev { parent: *parent, prev: *prev, holders: holders.clone() });
            }
        }

        let heads = by_prev.get(&None).cloned().unwrap_or_default();
        if heads.is_empty() {
            violations.push(InvariantViolation::MissingHead { parent: *parent });
            continue;
        }

        let mut reached = HashSet::new();
        let mut cursor = Some(heads[0]);
        while let Some(id) = cursor {
            if !reached.insert(id) {
                break;
            }
            cursor = by_prev.get(&Some(id)).and_then(|v| v.first()).copied();
        }
        if reached.len() != members.len() {
            violations.push(InvariantViolation::BrokenChain { parent: *parent, reached: reached.len(), expected: members.len() });
        }
    }

    for node in by_id.values() {
        let mut seen = HashSet::new();
        let mut cursor = Some(node.uuid);
        while let Some(id) = cursor {
            if !seen.insert(id) {
                violations.push(InvariantViolation::CycleInParentChain { node: node.uuid });
                break;
            }
            cursor = by_id.get(&id).and_then(|n| n.parent_id);
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node(container: ContainerId, parent: Option<NodeId>, prev: Option<NodeId>) -> Node {
        Node::new(NodeId::new(), container, parent, prev, String::new(), "u".into(), Utc::now())
    }

    #[test]
    fn well_formed_chain_has_no_violations() {
        let container = ContainerId::new();
        let a = node(container, None, None);
        let b = node(container, None, Some(a.uuid));
        let violations = validate_container(container, &[a, b]);
        assert!(violations.is_empty());
    }

    #[test]
    fn two_heads_in_same_group_is_reported() {
        let container = ContainerId::new();
        let a = node(container, None, None);
        let b = node(container, None, None);
        let violations = validate_container(container, &[a, b]);
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::ForkedPrev { prev: None, .. })));
    }

    #[test]
    fn dangling_prev_is_reported() {
        let container = ContainerId::new();
        let ghost = NodeId::new();
        let a = node(container, None, Some(ghost));
        let violations = validate_container(container, &[a]);
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::DanglingPrev { .. })));
    }

    #[test]
    fn parent_cycle_is_reported() {
        let container = ContainerId::new();
        let mut a = node(container, None, None);
        let mut b = node(container, Some(a.uuid), None);
        a.parent_id = Some(b.uuid);
        b.parent_id = Some(a.uuid);
        let violations = validate_container(container, &[a, b]);
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::CycleInParentChain { .. })));
    }
}
