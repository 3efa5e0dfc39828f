//! Node records for the replicated tree.
//!
//! A [`Node`] is the unit of replication: an id, a parent, a structural
//! timestamp, a virtual position among its siblings, an optional removal
//! timestamp (the tombstone marker), and a map of timestamped data values.
//!
//! Nodes serialize in full (including `parent_id`) so hosts can persist the
//! flat node list and rebuild a replica from it.

use std::collections::HashMap;

use super::id::NodeId;
use super::value::Value;
use crate::clock::Timestamp;

/// A value paired with the timestamp of the write that produced it.
///
/// Conflicting writes to the same `(node, key)` resolve by last-write-wins:
/// the stored timestamp is always the maximum timestamp of any applied write
/// for that key.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timestamped<T> {
    pub(crate) value: Value,
    pub(crate) t: T,
}

impl<T: Timestamp> Timestamped<T> {
    /// The stored value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The timestamp of the write that stored it.
    pub fn t(&self) -> &T {
        &self.t
    }
}

/// A node in the replicated tree.
///
/// Nodes are created by `insert` (local or merged), mutated by `move`,
/// `remove`, and `setValue`, and physically destroyed only by `purge`.
/// A node whose removal timestamp is set is a tombstone: hidden from
/// live-node counts but still addressable, movable, and listed among its
/// siblings, so that concurrent remote operations keep commuting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node<T> {
    pub(crate) id: NodeId,
    #[serde(default)]
    pub(crate) parent_id: NodeId,
    pub(crate) t: T,
    pub(crate) v_pos: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) removed: Option<T>,
    #[serde(default)]
    pub(crate) data: HashMap<String, Timestamped<T>>,
}

impl<T: Timestamp> Node<T> {
    /// Builds the root sentinel: empty id, minimal timestamp, no data.
    pub(crate) fn root() -> Self {
        Self {
            id: NodeId::root(),
            parent_id: NodeId::root(),
            t: T::default(),
            v_pos: 0.0,
            removed: None,
            data: HashMap::new(),
        }
    }

    /// Builds a fresh node from a local insert payload, stamping any initial
    /// data entries with the insert timestamp.
    pub(crate) fn create(init: NodeInit, parent_id: NodeId, t: T, v_pos: f64) -> Self {
        let data = init
            .data
            .into_iter()
            .map(|(key, value)| (key, Timestamped { value, t: t.clone() }))
            .collect();
        Self {
            id: init.id,
            parent_id,
            t,
            v_pos,
            removed: None,
            data,
        }
    }

    /// The node's id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The id of the node's parent; the root id for top-level nodes.
    pub fn parent_id(&self) -> &NodeId {
        &self.parent_id
    }

    /// Timestamp of the last structural touch (creation, move, restoration).
    pub fn t(&self) -> &T {
        &self.t
    }

    /// The node's virtual position within its sibling list, in (0, 1).
    pub fn v_pos(&self) -> f64 {
        self.v_pos
    }

    /// The removal timestamp, if this node is a tombstone.
    pub fn removed(&self) -> Option<&T> {
        self.removed.as_ref()
    }

    /// Returns true if this node is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.removed.is_some()
    }

    /// The raw data map, timestamps included.
    pub fn data(&self) -> &HashMap<String, Timestamped<T>> {
        &self.data
    }

    /// Gets a data value by key, stripped of its timestamp.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.data.get(key.as_ref()).map(|cell| &cell.value)
    }

    /// Overwrites a data entry unconditionally. Local writes always carry a
    /// fresh timestamp, so no comparison is needed.
    pub(crate) fn set_data(&mut self, key: String, value: Value, t: T) {
        self.data.insert(key, Timestamped { value, t });
    }

    /// Applies a remote write under last-write-wins: the entry is replaced
    /// only when the incoming timestamp is strictly newer.
    pub(crate) fn merge_data(&mut self, key: String, value: Value, t: T) {
        match self.data.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if entry.get().t < t {
                    entry.insert(Timestamped { value, t });
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Timestamped { value, t });
            }
        }
    }
}

/// Payload for a local insert: the host-supplied id plus any initial data
/// entries. Initial entries are stamped with the insert's timestamp.
///
/// Anything convertible to [`NodeId`] converts to an id-only payload:
///
/// ```
/// use arbor::{CounterClock, Tree};
///
/// let mut tree = Tree::new(CounterClock::new());
/// tree.insert("", "", "a").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct NodeInit {
    pub(crate) id: NodeId,
    pub(crate) data: Vec<(String, Value)>,
}

impl NodeInit {
    /// Creates an id-only payload.
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            data: Vec::new(),
        }
    }

    /// Adds an initial data entry.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }
}

impl From<NodeId> for NodeInit {
    fn from(id: NodeId) -> Self {
        Self::new(id)
    }
}

impl From<&NodeId> for NodeInit {
    fn from(id: &NodeId) -> Self {
        Self::new(id.clone())
    }
}

impl From<&str> for NodeInit {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeInit {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
