//! The deferred-operation queue.
//!
//! Remote operations can arrive before the node they target: a move shipped
//! ahead of the insert that creates its subject, a value write for a node
//! whose insert is still in flight. Such operations park here, keyed by the
//! missing id, and drain when that id finally appears through any channel.
//!
//! No ordering among parked records is needed; each merge handler re-checks
//! staleness when a drained record is replayed. Ids that never arrive leave
//! their records parked indefinitely.

use super::id::NodeId;
use super::multimap::MultiMap;
use super::op::Operation;
use crate::clock::Timestamp;

/// A multi-map from a missing node id to the operations awaiting it.
///
/// The default is the in-memory [`MemoryQueue`]; hosts that persist the
/// replica across restarts supply a durable implementation via
/// [`Tree::with_queue`](crate::Tree::with_queue) so parked operations survive
/// a reload.
pub trait DeferredQueue<T: Timestamp> {
    /// Parks `record` under the id whose absence blocked it.
    fn push(&mut self, id: NodeId, record: Operation<T>);

    /// Removes and returns everything parked under `id`, in arrival order;
    /// empty if nothing is parked.
    fn pop(&mut self, id: &NodeId) -> Vec<Operation<T>>;
}

/// In-memory deferred queue.
#[derive(Debug, Clone)]
pub struct MemoryQueue<T> {
    parked: MultiMap<NodeId, Operation<T>>,
}

impl<T: Timestamp> MemoryQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            parked: MultiMap::new(),
        }
    }

    /// The records currently parked under `id`, in arrival order.
    pub fn parked_for(&self, id: impl AsRef<str>) -> &[Operation<T>] {
        self.parked.get(id.as_ref())
    }

    /// Total number of parked records.
    pub fn len(&self) -> usize {
        self.parked.len()
    }

    /// Returns true if nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}

impl<T: Timestamp> Default for MemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timestamp> DeferredQueue<T> for MemoryQueue<T> {
    fn push(&mut self, id: NodeId, record: Operation<T>) {
        self.parked.insert(id, record);
    }

    fn pop(&mut self, id: &NodeId) -> Vec<Operation<T>> {
        self.parked.take(id.as_str())
    }
}
