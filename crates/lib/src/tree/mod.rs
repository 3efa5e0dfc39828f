//! The replicated tree engine.
//!
//! A [`Tree`] is one replica of a rooted, ordered, labeled tree. Local edits
//! go through four precondition-checked mutators ([`Tree::insert`],
//! [`Tree::move_node`], [`Tree::remove`], [`Tree::set_value`]), each of which
//! appends exactly one [`Operation`] to the outbound log. Remote edits arrive
//! through [`Tree::merge`], whose handlers are idempotent, commutative under
//! concurrency, and tolerant of out-of-order delivery: operations that target
//! a node this replica has not seen yet park on a deferred queue and replay
//! when the node arrives.
//!
//! Replicas that have merged the same set of operations present identical
//! observable state, regardless of delivery order or duplication.
//!
//! # Example
//!
//! ```
//! use arbor::{CounterClock, Tree};
//!
//! let mut a = Tree::new(CounterClock::new());
//! let mut b = Tree::new(CounterClock::starting_at(1_000));
//!
//! a.insert("", "", "tasks").unwrap();
//! a.insert("tasks", "", "buy-milk").unwrap();
//! a.set_value("buy-milk", "done", false).unwrap();
//!
//! // Ship A's log to B, in any order, as often as the transport likes.
//! b.merge(a.log().records().to_vec());
//! b.merge(a.log().records().to_vec());
//!
//! assert_eq!(*b.get_value("buy-milk", "done").unwrap(), false);
//! assert_eq!(b.child_list("tasks")[0].id(), "buy-milk");
//! ```

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, trace, warn};

use crate::clock::{Clock, Timestamp};

pub mod errors;
pub mod id;
pub mod log;
pub mod node;
pub mod op;
pub mod queue;
pub mod value;

mod multimap;
mod position;
mod store;


pub use errors::TreeError;
pub use id::NodeId;
pub use log::{MemoryLog, OperationLog};
pub use node::{Node, NodeInit, Timestamped};
pub use op::Operation;
pub use queue::{DeferredQueue, MemoryQueue};
pub use store::ChildEntry;
pub use value::Value;

use store::NodeStore;

/// One replica of the replicated tree.
///
/// A replica owns its node store, its outbound operation log, and its
/// deferred queue, and is single-threaded: one owner performs all mutations,
/// merges, and reads. Cross-replica concurrency is resolved by the merge
/// rules, not by locking; hosts that share a replica across threads must
/// serialize access themselves.
///
/// The type is generic over the host's [`Clock`] and, for hosts with their
/// own persistence, over the [`OperationLog`] sink and [`DeferredQueue`]
/// store (both default to in-memory implementations).
pub struct Tree<C, L = MemoryLog<<C as Clock>::Time>, Q = MemoryQueue<<C as Clock>::Time>>
where
    C: Clock,
{
    store: NodeStore<C::Time>,
    log: L,
    queue: Q,
    clock: C,
    rng: Box<dyn RngCore>,
}

impl<C: Clock> Tree<C> {
    /// Creates an empty replica holding only the root sentinel.
    pub fn new(clock: C) -> Self {
        Self {
            store: NodeStore::new(),
            log: MemoryLog::new(),
            queue: MemoryQueue::new(),
            clock,
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    /// Rebuilds a replica from a flat, unordered node list, e.g. one loaded
    /// from host persistence. Indexes are content-addressed by id and parent,
    /// so input order does not affect the resulting tree. Applied state lives
    /// in the nodes; the operation log needs no replay.
    pub fn with_nodes(clock: C, nodes: impl IntoIterator<Item = Node<C::Time>>) -> Self {
        let mut tree = Self::new(clock);
        for node in nodes {
            if node.id().is_root() || tree.store.contains(node.id()) {
                continue;
            }
            let parent_id = node.parent_id().clone();
            tree.store.add_node(node, parent_id);
        }
        tree
    }
}

impl<C, L, Q> Tree<C, L, Q>
where
    C: Clock,
    L: OperationLog<C::Time>,
    Q: DeferredQueue<C::Time>,
{
    /// Replaces the outbound log sink.
    pub fn with_log<L2: OperationLog<C::Time>>(self, log: L2) -> Tree<C, L2, Q> {
        Tree {
            store: self.store,
            log,
            queue: self.queue,
            clock: self.clock,
            rng: self.rng,
        }
    }

    /// Replaces the deferred-queue store.
    pub fn with_queue<Q2: DeferredQueue<C::Time>>(self, queue: Q2) -> Tree<C, L, Q2> {
        Tree {
            store: self.store,
            log: self.log,
            queue,
            clock: self.clock,
            rng: self.rng,
        }
    }

    /// Replaces the position-jitter randomness source. Tests inject a seeded
    /// generator to make allocation deterministic.
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    // --- local mutators -----------------------------------------------------

    /// Creates a node under `parent_id`, directly after the sibling `ref_id`
    /// (at the head of the child list when `ref_id` is the root id `""`).
    ///
    /// Preconditions: `parent_id` exists, `ref_id` is `""` or a current child
    /// of `parent_id`, and the payload's id is not already in use.
    ///
    /// Returns the new node's id and appends one `insert` record to the log.
    pub fn insert(
        &mut self,
        parent_id: impl Into<NodeId>,
        ref_id: impl Into<NodeId>,
        node: impl Into<NodeInit>,
    ) -> crate::Result<NodeId> {
        let parent_id: NodeId = parent_id.into();
        let ref_id: NodeId = ref_id.into();
        let init: NodeInit = node.into();
        if !self.store.contains(&parent_id) {
            return Err(TreeError::ParentNotFound { id: parent_id }.into());
        }
        if !ref_id.is_root() && !self.store.is_child_of(&ref_id, &parent_id) {
            return Err(TreeError::ReferenceNotFound {
                id: ref_id,
                parent_id,
            }
            .into());
        }
        if self.store.contains(&init.id) {
            return Err(TreeError::DuplicateId { id: init.id }.into());
        }

        let t = self.clock.now();
        let v_pos = position::allocate(self.store.child_list(&parent_id), &ref_id, &mut self.rng);
        let node = Node::create(init, parent_id.clone(), t.clone(), v_pos);
        let id = node.id().clone();
        self.store.add_node(node.clone(), parent_id.clone());
        self.log.push(Operation::Insert {
            t,
            parent_id,
            node,
        });
        Ok(id)
    }

    /// Moves `node_id` under `parent_id`, directly after the sibling
    /// `ref_id` (head when `""`). Moving a tombstone restores it.
    ///
    /// Preconditions: `node_id` exists (the root sentinel is not movable),
    /// `ref_id` is `""` or a current child of `parent_id`, and the move does
    /// not land the node in the slot it already occupies.
    ///
    /// Ancestry is not checked: moving a node under its own descendant
    /// detaches that subtree into a cycle, exactly as on any other replica
    /// applying the same operation. Hosts that cannot tolerate this must
    /// check before calling.
    pub fn move_node(
        &mut self,
        node_id: impl Into<NodeId>,
        parent_id: impl Into<NodeId>,
        ref_id: impl Into<NodeId>,
    ) -> crate::Result<()> {
        let node_id: NodeId = node_id.into();
        let parent_id: NodeId = parent_id.into();
        let ref_id: NodeId = ref_id.into();
        if node_id.is_root() || !self.store.contains(&node_id) {
            return Err(TreeError::NodeNotFound { id: node_id }.into());
        }
        if !ref_id.is_root() && !self.store.is_child_of(&ref_id, &parent_id) {
            return Err(TreeError::ReferenceNotFound {
                id: ref_id,
                parent_id,
            }
            .into());
        }
        if self.is_same_slot(&node_id, &parent_id, &ref_id) {
            return Err(TreeError::NoOpMove { id: node_id }.into());
        }

        let t = self.clock.now();
        self.store.unset_parent(&node_id);
        let v_pos = position::allocate(self.store.child_list(&parent_id), &ref_id, &mut self.rng);
        self.store.place(&node_id, parent_id.clone(), v_pos, t.clone());
        if let Some(node) = self.store.get_mut(&node_id) {
            node.removed = None;
        }
        self.log.push(Operation::Move {
            t,
            node_id,
            parent_id,
            v_pos,
        });
        Ok(())
    }

    /// Tombstones `node_id`. The node stays addressable, movable, and listed
    /// among its siblings until purged.
    ///
    /// Precondition: `node_id` exists. Removing a tombstone is a no-op: no
    /// record is logged and no state changes.
    pub fn remove(&mut self, node_id: impl Into<NodeId>) -> crate::Result<()> {
        let node_id: NodeId = node_id.into();
        if node_id.is_root() || !self.store.contains(&node_id) {
            return Err(TreeError::NodeNotFound { id: node_id }.into());
        }
        if self.store.get(&node_id).is_some_and(Node::is_tombstone) {
            return Ok(());
        }

        let t = self.clock.now();
        if let Some(node) = self.store.get_mut(&node_id) {
            node.removed = Some(t.clone());
        }
        self.log.push(Operation::Remove { t, node_id });
        Ok(())
    }

    /// Writes `data[key] = value` on `node_id`, stamped with a fresh
    /// timestamp. Writing to a tombstone is permitted; the entry is visible
    /// if the node is later restored by a move.
    ///
    /// Precondition: `node_id` exists.
    pub fn set_value(
        &mut self,
        node_id: impl Into<NodeId>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> crate::Result<()> {
        let node_id: NodeId = node_id.into();
        let key: String = key.into();
        let value: Value = value.into();
        if node_id.is_root() || !self.store.contains(&node_id) {
            return Err(TreeError::NodeNotFound { id: node_id }.into());
        }

        let t = self.clock.now();
        if let Some(node) = self.store.get_mut(&node_id) {
            node.set_data(key.clone(), value.clone(), t.clone());
        }
        self.log.push(Operation::SetValue {
            t,
            node_id,
            key,
            value,
        });
        Ok(())
    }

    // --- merge engine -------------------------------------------------------

    /// Applies a batch of remote operation records.
    ///
    /// Merging never fails and never logs: duplicates and stale records are
    /// dropped, and records targeting nodes this replica has not seen yet
    /// park on the deferred queue until the node arrives. The state reached
    /// after merging a set of records depends only on the set, not on the
    /// order or multiplicity of delivery.
    pub fn merge(&mut self, records: impl IntoIterator<Item = Operation<C::Time>>) {
        for record in records {
            self.merge_record(record);
        }
    }

    fn merge_record(&mut self, record: Operation<C::Time>) {
        match record {
            Operation::Insert {
                parent_id, node, ..
            } => self.merge_insert(parent_id, node),
            Operation::Move {
                t,
                node_id,
                parent_id,
                v_pos,
            } => self.merge_move(t, node_id, parent_id, v_pos),
            Operation::Remove { t, node_id } => self.merge_remove(t, node_id),
            Operation::SetValue {
                t,
                node_id,
                key,
                value,
            } => self.merge_set_value(t, node_id, key, value),
        }
    }

    /// Adds the node as shipped, preserving the remote `t` and `v_pos` so
    /// all replicas agree on structural tie-breaks, then replays anything
    /// parked on the new id. The parent need not exist yet: the child index
    /// is keyed by id, and the structure knits together when the parent's
    /// own insert arrives.
    fn merge_insert(&mut self, parent_id: NodeId, node: Node<C::Time>) {
        if self.store.contains(node.id()) {
            trace!(node = %node.id(), "dropping duplicate insert");
            return;
        }
        let id = node.id().clone();
        self.store.add_node(node, parent_id);
        for parked in self.queue.pop(&id) {
            trace!(node = %id, op = parked.name(), "replaying parked operation");
            self.merge_record(parked);
        }
    }

    fn merge_move(&mut self, t: C::Time, node_id: NodeId, parent_id: NodeId, v_pos: f64) {
        match self.store.get(&node_id) {
            None => {
                trace!(node = %node_id, "parking move until its node arrives");
                self.queue.push(
                    node_id.clone(),
                    Operation::Move {
                        t,
                        node_id,
                        parent_id,
                        v_pos,
                    },
                );
                return;
            }
            Some(node) if *node.t() > t => {
                debug!(node = %node_id, "dropping move superseded by a newer touch");
                return;
            }
            Some(_) => {}
        }
        self.store.place(&node_id, parent_id, v_pos, t.clone());
        if let Some(node) = self.store.get_mut(&node_id) {
            // move wins over an older remove
            if node.removed.as_ref().is_some_and(|removed| *removed < t) {
                node.removed = None;
            }
        }
    }

    fn merge_remove(&mut self, t: C::Time, node_id: NodeId) {
        match self.store.get(&node_id) {
            None => {
                trace!(node = %node_id, "parking remove until its node arrives");
                self.queue
                    .push(node_id.clone(), Operation::Remove { t, node_id });
                return;
            }
            Some(node) if *node.t() > t => {
                debug!(node = %node_id, "dropping remove superseded by a newer move");
                return;
            }
            Some(node) if node.removed.as_ref().is_some_and(|removed| *removed > t) => {
                debug!(node = %node_id, "dropping remove older than the existing tombstone");
                return;
            }
            Some(_) => {}
        }
        if let Some(node) = self.store.get_mut(&node_id) {
            node.removed = Some(t);
        }
    }

    fn merge_set_value(&mut self, t: C::Time, node_id: NodeId, key: String, value: Value) {
        match self.store.get_mut(&node_id) {
            Some(node) => node.merge_data(key, value, t),
            None => {
                trace!(node = %node_id, "parking value write until its node arrives");
                self.queue.push(
                    node_id.clone(),
                    Operation::SetValue {
                        t,
                        node_id,
                        key,
                        value,
                    },
                );
            }
        }
    }

    // --- purge --------------------------------------------------------------

    /// Physically removes every tombstone at least `min_age` old, returning
    /// the purged ids. This is the only destructive operation; purged nodes
    /// cannot be recovered, and a late-arriving operation for a purged id
    /// parks forever.
    ///
    /// Purging does not cascade: children of a purged tombstone are left in
    /// place with a dangling parent id. Hosts choose a `min_age` large enough
    /// that no live descendants of a tombstone remain by purge time.
    pub fn purge(&mut self, min_age: <C::Time as Timestamp>::Age) -> Vec<NodeId> {
        let now = self.clock.now();
        let purged: Vec<NodeId> = self
            .store
            .nodes_in_order()
            .filter(|node| {
                node.removed()
                    .is_some_and(|removed| now.age_since(removed) >= min_age)
            })
            .map(|node| node.id().clone())
            .collect();
        for id in &purged {
            let orphans = self.store.child_list(id).len();
            if orphans > 0 {
                warn!(node = %id, orphans, "purging tombstone with surviving children");
            }
            self.store.remove_node(id);
        }
        purged
    }

    // --- query surface ------------------------------------------------------

    /// Returns the node with the given id, tombstones included. The empty id
    /// returns the root sentinel.
    pub fn get_node(&self, id: impl AsRef<str>) -> Option<&Node<C::Time>> {
        self.store.get(id.as_ref())
    }

    /// All nodes (root sentinel first) in insertion order.
    pub fn get_nodes(&self) -> impl Iterator<Item = &Node<C::Time>> {
        self.store.nodes_in_order()
    }

    /// The ordered child list of `parent`, tombstones included — a live view
    /// into the sibling index, not a snapshot.
    pub fn child_list(&self, parent: impl AsRef<str>) -> &[ChildEntry<C::Time>] {
        self.store.child_list(parent.as_ref())
    }

    /// The node's data flattened to `key → value`, timestamps stripped.
    pub fn get_data(&self, id: impl AsRef<str>) -> Option<HashMap<&str, &Value>> {
        let node = self.store.get(id.as_ref())?;
        Some(
            node.data()
                .iter()
                .map(|(key, cell)| (key.as_str(), cell.value()))
                .collect(),
        )
    }

    /// A single data value. Absence does not distinguish a missing node from
    /// a missing key.
    pub fn get_value(&self, id: impl AsRef<str>, key: impl AsRef<str>) -> Option<&Value> {
        self.store.get(id.as_ref())?.get(key.as_ref())
    }

    /// Number of live (non-tombstone) nodes, root excluded.
    pub fn len(&self) -> usize {
        self.store.live_len()
    }

    /// Returns true if the replica holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the node exists and is a tombstone.
    pub fn is_tombstone(&self, id: impl AsRef<str>) -> bool {
        self.store.get(id.as_ref()).is_some_and(Node::is_tombstone)
    }

    /// The outbound operation log.
    pub fn log(&self) -> &L {
        &self.log
    }

    /// The deferred-operation queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// True when the move would land `node_id` in the slot it already
    /// occupies: moving after itself, or after its current predecessor under
    /// its current parent (head included).
    fn is_same_slot(&self, node_id: &NodeId, parent_id: &NodeId, ref_id: &NodeId) -> bool {
        if ref_id == node_id {
            return true;
        }
        if self.store.parent_of(node_id) != Some(parent_id) {
            return false;
        }
        let siblings = self.store.child_list(parent_id);
        match siblings.iter().position(|entry| entry.id() == node_id) {
            Some(0) => ref_id.is_root(),
            Some(index) => siblings[index - 1].id() == ref_id,
            None => false,
        }
    }
}
