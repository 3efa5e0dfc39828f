//! Operation records.
//!
//! An [`Operation`] describes one mutation of the tree and is the unit of
//! replication: local mutators append them to the log, and `merge` applies
//! records received from peers.
//!
//! On the wire, a record is the three-element array `[name, t, details]`
//! with `name` one of `"insert"`, `"move"`, `"remove"`, `"setValue"` and
//! `details` an object carrying only that operation's fields. In memory the
//! record is a sum type; the serde implementations below bridge the two
//! forms. A record whose name is not one of the four is a protocol mismatch
//! and is rejected at deserialization.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize};

use super::id::NodeId;
use super::node::{Node, Timestamped};
use super::value::Value;
use crate::clock::Timestamp;

const INSERT: &str = "insert";
const MOVE: &str = "move";
const REMOVE: &str = "remove";
const SET_VALUE: &str = "setValue";

const NAMES: &[&str] = &[SET_VALUE, INSERT, MOVE, REMOVE];

/// One replicated tree mutation.
///
/// Every variant carries the timestamp assigned by the originating replica's
/// clock; merge handlers compare it against the target node's timestamps to
/// resolve concurrent edits.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<T> {
    /// A node was created under `parent_id`. The embedded node carries the
    /// creating replica's `t` and `v_pos`, which receiving replicas preserve
    /// so that structural tie-breaks agree everywhere.
    Insert {
        t: T,
        parent_id: NodeId,
        node: Node<T>,
    },
    /// A node was repositioned (and possibly restored from tombstone).
    Move {
        t: T,
        node_id: NodeId,
        parent_id: NodeId,
        v_pos: f64,
    },
    /// A node was tombstoned.
    Remove { t: T, node_id: NodeId },
    /// A data entry was written.
    SetValue {
        t: T,
        node_id: NodeId,
        key: String,
        value: Value,
    },
}

impl<T: Timestamp> Operation<T> {
    /// The wire name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => INSERT,
            Operation::Move { .. } => MOVE,
            Operation::Remove { .. } => REMOVE,
            Operation::SetValue { .. } => SET_VALUE,
        }
    }

    /// The timestamp assigned by the originating replica.
    pub fn t(&self) -> &T {
        match self {
            Operation::Insert { t, .. }
            | Operation::Move { t, .. }
            | Operation::Remove { t, .. }
            | Operation::SetValue { t, .. } => t,
        }
    }

    /// The id of the node this operation targets (for an insert, the node
    /// being created).
    pub fn target_id(&self) -> &NodeId {
        match self {
            Operation::Insert { node, .. } => node.id(),
            Operation::Move { node_id, .. }
            | Operation::Remove { node_id, .. }
            | Operation::SetValue { node_id, .. } => node_id,
        }
    }

    /// Encodes this record as its JSON wire form.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a record from its JSON wire form.
    ///
    /// An unknown operation name indicates a protocol mismatch and is
    /// reported as a serialization error.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The node payload embedded in an insert record: the stored node minus its
/// `parent_id`, which travels alongside in the details object.
#[derive(Serialize, Deserialize)]
struct NodeRecord<T: Default> {
    id: NodeId,
    t: T,
    v_pos: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    removed: Option<T>,
    #[serde(default)]
    data: HashMap<String, Timestamped<T>>,
}

impl<T: Timestamp> NodeRecord<T> {
    fn from_node(node: &Node<T>) -> Self {
        Self {
            id: node.id.clone(),
            t: node.t.clone(),
            v_pos: node.v_pos,
            removed: node.removed.clone(),
            data: node.data.clone(),
        }
    }

    fn into_node(self, parent_id: NodeId) -> Node<T> {
        Node {
            id: self.id,
            parent_id,
            t: self.t,
            v_pos: self.v_pos,
            removed: self.removed,
            data: self.data,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct InsertDetails<T: Default> {
    parent_id: NodeId,
    node: NodeRecord<T>,
}

#[derive(Serialize, Deserialize)]
struct MoveDetails {
    node_id: NodeId,
    parent_id: NodeId,
    v_pos: f64,
}

#[derive(Serialize, Deserialize)]
struct RemoveDetails {
    node_id: NodeId,
}

#[derive(Serialize, Deserialize)]
struct SetValueDetails {
    node_id: NodeId,
    key: String,
    value: Value,
}

impl<T: Timestamp> Serialize for Operation<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut record = serializer.serialize_tuple(3)?;
        record.serialize_element(self.name())?;
        record.serialize_element(self.t())?;
        match self {
            Operation::Insert {
                parent_id, node, ..
            } => {
                record.serialize_element(&InsertDetails {
                    parent_id: parent_id.clone(),
                    node: NodeRecord::from_node(node),
                })?;
            }
            Operation::Move {
                node_id,
                parent_id,
                v_pos,
                ..
            } => {
                record.serialize_element(&MoveDetails {
                    node_id: node_id.clone(),
                    parent_id: parent_id.clone(),
                    v_pos: *v_pos,
                })?;
            }
            Operation::Remove { node_id, .. } => {
                record.serialize_element(&RemoveDetails {
                    node_id: node_id.clone(),
                })?;
            }
            Operation::SetValue {
                node_id,
                key,
                value,
                ..
            } => {
                record.serialize_element(&SetValueDetails {
                    node_id: node_id.clone(),
                    key: key.clone(),
                    value: value.clone(),
                })?;
            }
        }
        record.end()
    }
}

impl<'de, T: Timestamp> Deserialize<'de> for Operation<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct RecordVisitor<T>(PhantomData<T>);

        impl<'de, T: Timestamp> Visitor<'de> for RecordVisitor<T> {
            type Value = Operation<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "an operation record `[name, t, details]`")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Operation<T>, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let name: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let t: T = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                match name.as_str() {
                    INSERT => {
                        let details: InsertDetails<T> = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        Ok(Operation::Insert {
                            t,
                            parent_id: details.parent_id.clone(),
                            node: details.node.into_node(details.parent_id),
                        })
                    }
                    MOVE => {
                        let details: MoveDetails = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        Ok(Operation::Move {
                            t,
                            node_id: details.node_id,
                            parent_id: details.parent_id,
                            v_pos: details.v_pos,
                        })
                    }
                    REMOVE => {
                        let details: RemoveDetails = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        Ok(Operation::Remove {
                            t,
                            node_id: details.node_id,
                        })
                    }
                    SET_VALUE => {
                        let details: SetValueDetails = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                        Ok(Operation::SetValue {
                            t,
                            node_id: details.node_id,
                            key: details.key,
                            value: details.value,
                        })
                    }
                    other => Err(de::Error::unknown_variant(other, NAMES)),
                }
            }
        }

        deserializer.deserialize_tuple(3, RecordVisitor(PhantomData))
    }
}
