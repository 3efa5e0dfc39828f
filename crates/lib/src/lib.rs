//!
//! Arbor: an operation-based CRDT for rooted, ordered, labeled trees.
//!
//! Each participant in a collaborative session holds a local [`Tree`]
//! replica. Replicas mutate independently through a small operation
//! vocabulary — `insert`, `move`, `remove`, `setValue` — exchange operation
//! logs over whatever transport the host provides, and converge to identical
//! state regardless of delivery order, duplication, or concurrency.
//!
//! ## Core Concepts
//!
//! * **Replica ([`Tree`])**: one participant's copy of the tree, plus its
//!   outbound operation log and its deferred-operation queue.
//! * **Operations ([`Operation`])**: the replicated records. Local mutators
//!   append them to the log; [`Tree::merge`] applies records received from
//!   peers. Merge handlers are idempotent and commutative, so transports may
//!   reorder and duplicate freely.
//! * **Tombstones**: removed nodes are retained (addressable, movable,
//!   listed among their siblings) so concurrent remote operations keep
//!   commuting; [`Tree::purge`] physically drops old tombstones.
//! * **Virtual positions**: each node orders among its siblings by a real
//!   number in (0, 1), so inserting between neighbors never renumbers them.
//! * **Clocks ([`Clock`], [`Timestamp`])**: the engine is generic over the
//!   host's time source; it only compares timestamps (and subtracts them to
//!   age tombstones at purge). [`SystemClock`] and [`CounterClock`] are
//!   provided.
//!
//! Out of scope, by design: transport, persistence, id generation (hosts
//! supply sufficiently unique ids, typically UUIDs), and clock
//! synchronization. Hosts persist `(node list, operation log)` however they
//! like and rebuild a replica with [`Tree::with_nodes`].
//!
//! ## Example
//!
//! ```
//! use arbor::{CounterClock, Tree};
//!
//! let mut alice = Tree::new(CounterClock::new());
//! let mut bob = Tree::new(CounterClock::starting_at(1_000_000));
//!
//! alice.insert("", "", "shopping").unwrap();
//! alice.insert("shopping", "", "milk").unwrap();
//!
//! // Bob catches up, then edits concurrently with Alice.
//! bob.merge(alice.log().records().to_vec());
//! bob.insert("shopping", "milk", "eggs").unwrap();
//! alice.set_value("milk", "qty", 2).unwrap();
//!
//! alice.merge(bob.log().records().to_vec());
//! bob.merge(alice.log().records().to_vec());
//!
//! assert_eq!(alice.get_value("milk", "qty"), bob.get_value("milk", "qty"));
//! assert_eq!(
//!     alice.child_list("shopping"),
//!     bob.child_list("shopping"),
//! );
//! ```

pub mod clock;
pub mod tree;

pub use clock::{Clock, CounterClock, SystemClock, Timestamp};
pub use tree::{
    ChildEntry, DeferredQueue, MemoryLog, MemoryQueue, Node, NodeId, NodeInit, Operation,
    OperationLog, Timestamped, Tree, TreeError, Value,
};

/// Result type used throughout the arbor library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the arbor library.
///
/// Local mutators surface unmet preconditions; the wire helpers surface
/// serialization failures (including the protocol mismatch of an unknown
/// operation name). Remote merges never fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Structured precondition errors from the tree module
    #[error(transparent)]
    Tree(tree::TreeError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error reports an unmet precondition on a local mutator.
    pub fn is_unmet_preconditions(&self) -> bool {
        matches!(self, Error::Tree(_))
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Tree(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates an id conflict.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Tree(err) => err.is_duplicate(),
            _ => false,
        }
    }

    /// Check if this error is serialization-related (wire decode/encode,
    /// including unknown operation names).
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::Serialize(_))
    }
}
