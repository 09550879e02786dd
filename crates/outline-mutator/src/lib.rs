#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-mutator** – Pure tree algorithms for the collaborative outline
//! engine.
//!
//! Everything here operates on an in-memory snapshot of a container's nodes
//! and returns the node-level deltas plus the canonical event for one
//! command. No network, no disk, no locking: the Serializer loads the
//! affected subtree, hands it to a [`Tree`] method, and persists the
//! resulting [`MutationEffect`] atomically.

mod effect;
mod tree;
mod validate;

pub use effect::MutationEffect;
pub use tree::Tree;
pub use validate::{validate_container, InvariantViolation};

#[cfg(test)]
mod proptests {
    use chrono::Utc;
    use outline_types::{ContainerId, Node, NodeId};
    use proptest::prelude::*;

    use crate::{validate_container, Tree};

    fn chain_of(container: ContainerId, n: usize) -> (Vec<Node>, Vec<NodeId>) {
        let mut nodes = Vec::new();
        let mut prev = None;
        let mut ids = Vec::new();
        for i in 0..n {
            let node = Node::new(NodeId::new(), container, None, prev, format!("node-{i}"), "u".into(), Utc::now());
            prev = Some(node.uuid);
            ids.push(node.uuid);
            nodes.push(node);
        }
        (nodes, ids)
    }

    proptest! {
        /// Inserting a node and then deleting it returns the remaining
        /// nodes to their original sibling order.
        #[test]
        fn insert_then_delete_is_identity_on_survivors(len in 1usize..8, at in 0usize..8) {
            let container = ContainerId::new();
            let (nodes, ids) = chain_of(container, len);
            let tree = Tree::from_nodes(container, nodes.clone());

            let prev_id = if at == 0 { None } else { ids.get(at - 1).copied() };
            let new_id = NodeId::new();
            let insert_effect = tree.insert(None, prev_id, "new".into(), new_id, "u".into(), Utc::now());
            prop_assume!(insert_effect.is_ok());
            let insert_effect = insert_effect.unwrap();

            let mut after_insert: std::collections::HashMap<NodeId, Node> = nodes.into_iter().map(|n| (n.uuid, n)).collect();
            for u in insert_effect.upserts {
                after_insert.insert(u.uuid, u);
            }

            let tree2 = Tree::from_nodes(container, after_insert.values().cloned().collect());
            let delete_effect = tree2.delete(new_id, Utc::now()).unwrap();
            for u in delete_effect.upserts {
                after_insert.insert(u.uuid, u);
            }
            after_insert.remove(&new_id);

            let violations = validate_container(container, &after_insert.values().cloned().collect::<Vec<_>>());
            prop_assert!(violations.is_empty());
        }

        /// Splitting a node and then merging the halves back together
        /// restores the original content.
        #[test]
        fn split_then_merge_prev_restores_content(prefix in "[a-z]{0,6}", suffix in "[a-z]{0,6}") {
            let container = ContainerId::new();
            let original = format!("{prefix}{suffix}");
            let node = Node::new(NodeId::new(), container, None, None, original.clone(), "u".into(), Utc::now());
            let tree = Tree::from_nodes(container, vec![node.clone()]);

            let new_id = NodeId::new();
            let split_effect = tree.split(node.uuid, prefix.len(), prefix.len(), new_id, Utc::now()).unwrap();

            let mut by_id: std::collections::HashMap<NodeId, Node> = std::collections::HashMap::new();
            for u in split_effect.upserts {
                by_id.insert(u.uuid, u);
            }

            let tree2 = Tree::from_nodes(container, by_id.values().cloned().collect());
            let merge_effect = tree2.merge_prev(new_id, Utc::now()).unwrap();
            let survivor = merge_effect.upserts.into_iter().find(|n| n.uuid == node.uuid).unwrap();
            prop_assert_eq!(survivor.content, original);
        }

        /// Indenting a node and then outdenting it restores its original
        /// parent and sibling position.
        #[test]
        fn indent_then_outdent_is_identity(len in 2usize..6) {
            let container = ContainerId::new();
            let (nodes, ids) = chain_of(container, len);
            let tree = Tree::from_nodes(container, nodes.clone());

            let target = ids[len - 1];
            let original: Node = nodes.iter().find(|n| n.uuid == target).unwrap().clone();

            let indent_effect = tree.indent(target, Utc::now()).unwrap();
            let mut by_id: std::collections::HashMap<NodeId, Node> = nodes.into_iter().map(|n| (n.uuid, n)).collect();
            for u in indent_effect.upserts {
                by_id.insert(u.uuid, u);
            }

            let tree2 = Tree::from_nodes(container, by_id.values().cloned().collect());
            let outdent_effect = tree2.outdent(target, Utc::now()).unwrap();
            for u in outdent_effect.upserts {
                by_id.insert(u.uuid, u);
            }

            let restored = &by_id[&target];
            prop_assert_eq!(restored.parent_id, original.parent_id);
            prop_assert_eq!(restored.prev_id, original.prev_id);
        }
    }
}
