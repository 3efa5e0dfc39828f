//! The node store: three content-addressed indexes kept in sync.
//!
//! - `id → node` (plus an insertion-order list backing `get_nodes`)
//! - `id → parent id` (redundant with the node's own field, but O(1) and
//!   stable while a node is detached mid-move)
//! - `parent id → child list`, sorted by `(v_pos, t)` with stable
//!   insertion-order tiebreak
//!
//! All structural mutation goes through four primitives: `add_node`,
//! `remove_node`, `set_parent`, `unset_parent`. A move is `unset_parent`
//! followed by reinsertion under the new parent.
//!
//! The child index is keyed by parent id, not by parent node: entries can be
//! stored under an id whose node has not arrived yet (or was purged), which is
//! what lets remote inserts apply in any delivery order.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::id::NodeId;
use super::multimap::MultiMap;
use super::node::Node;
use crate::clock::Timestamp;

/// One element of a sibling list: the child's id plus the `(v_pos, t)` sort
/// key it is filed under.
///
/// Slices of `ChildEntry` are the live child-list view returned by
/// [`Tree::child_list`](crate::Tree::child_list): they index into the store
/// rather than snapshotting nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildEntry<T> {
    pub(crate) id: NodeId,
    pub(crate) v_pos: f64,
    pub(crate) t: T,
}

impl<T: Timestamp> ChildEntry<T> {
    /// The child's id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The child's virtual position.
    pub fn v_pos(&self) -> f64 {
        self.v_pos
    }

    /// The child's structural timestamp.
    pub fn t(&self) -> &T {
        &self.t
    }
}

/// Ascending `(v_pos, t)` order. Positions are always finite, and ties on
/// both fields fall back to the sequence's stable insertion order.
fn by_order<T: Timestamp>(a: &ChildEntry<T>, b: &ChildEntry<T>) -> Ordering {
    a.v_pos.total_cmp(&b.v_pos).then_with(|| a.t.cmp(&b.t))
}

#[derive(Debug, Clone)]
pub(crate) struct NodeStore<T> {
    nodes: HashMap<NodeId, Node<T>>,
    order: Vec<NodeId>,
    parents: HashMap<NodeId, NodeId>,
    children: MultiMap<NodeId, ChildEntry<T>>,
}

impl<T: Timestamp> NodeStore<T> {
    /// Creates a store holding only the root sentinel.
    pub(crate) fn new() -> Self {
        let root = Node::root();
        let mut nodes = HashMap::new();
        let order = vec![root.id.clone()];
        nodes.insert(root.id.clone(), root);
        Self {
            nodes,
            order,
            parents: HashMap::new(),
            children: MultiMap::with_comparator(by_order::<T>),
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Node<T>> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Node<T>> {
        self.nodes.get_mut(id)
    }

    /// All nodes (root sentinel included) in insertion order.
    pub(crate) fn nodes_in_order(&self) -> impl Iterator<Item = &Node<T>> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Number of live (non-tombstone) nodes, root excluded.
    pub(crate) fn live_len(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| !n.id.is_root() && !n.is_tombstone())
            .count()
    }

    pub(crate) fn child_list(&self, parent: &str) -> &[ChildEntry<T>] {
        self.children.get(parent)
    }

    pub(crate) fn parent_of(&self, id: &str) -> Option<&NodeId> {
        self.parents.get(id)
    }

    /// True if `id` is currently filed under `parent`.
    pub(crate) fn is_child_of(&self, id: &str, parent: &NodeId) -> bool {
        self.parents.get(id) == Some(parent)
    }

    /// Stores `node` under `parent_id`, updating all three indexes. The
    /// caller guarantees the id is not already present.
    pub(crate) fn add_node(&mut self, mut node: Node<T>, parent_id: NodeId) {
        node.parent_id = parent_id.clone();
        let entry = ChildEntry {
            id: node.id.clone(),
            v_pos: node.v_pos,
            t: node.t.clone(),
        };
        self.order.push(node.id.clone());
        self.parents.insert(node.id.clone(), parent_id.clone());
        self.nodes.insert(node.id.clone(), node);
        self.children.insert(parent_id, entry);
    }

    /// Physically removes `id` from all three indexes. The removed node's own
    /// child list (if any) is left in place: orphans stay listed under the
    /// dead id.
    pub(crate) fn remove_node(&mut self, id: &NodeId) {
        self.unset_parent(id);
        if self.nodes.remove(id).is_some() {
            self.order.retain(|other| other != id);
        }
    }

    /// Files `id` under `parent`, using the node's current `(v_pos, t)` as
    /// its sort key.
    pub(crate) fn set_parent(&mut self, id: &NodeId, parent: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.as_str()) {
            node.parent_id = parent.clone();
            let entry = ChildEntry {
                id: id.clone(),
                v_pos: node.v_pos,
                t: node.t.clone(),
            };
            self.parents.insert(id.clone(), parent.clone());
            self.children.insert(parent, entry);
        }
    }

    /// Detaches `id` from its current parent's child list.
    pub(crate) fn unset_parent(&mut self, id: &NodeId) {
        if let Some(parent) = self.parents.remove(id) {
            self.children.remove(&parent, |entry| entry.id == *id);
        }
    }

    /// Repositions `id`: detach, adopt the new sort key, reattach under
    /// `parent`.
    pub(crate) fn place(&mut self, id: &NodeId, parent: NodeId, v_pos: f64, t: T) {
        self.unset_parent(id);
        if let Some(node) = self.nodes.get_mut(id.as_str()) {
            node.v_pos = v_pos;
            node.t = t;
        }
        self.set_parent(id, parent);
    }
}
