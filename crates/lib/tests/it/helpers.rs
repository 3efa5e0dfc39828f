use std::collections::BTreeMap;

use arbor::{CounterClock, Tree, Value};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// The replica type used across the suite: counter clocks and in-memory
/// collaborators.
pub type TestTree = Tree<CounterClock>;

/// Creates an empty replica with a deterministic jitter source and a clock
/// range disjoint from every other replica index.
pub fn replica(index: u64) -> TestTree {
    Tree::new(CounterClock::starting_at(index * 1_000_000))
        .with_rng(StdRng::seed_from_u64(0xA5B0 + index))
}

/// Builds the shared starting tree: `a` with children `a1`, `a2`, then `b`
/// with children `b1`..`b4`, all appended at the tail of their sibling list.
///
/// Deterministic: repeated calls produce identical logs, so a fresh replica
/// can always be brought to the fixture state by merging `fixture().log()`.
pub fn fixture() -> TestTree {
    let mut tree = replica(0);
    tree.insert("", "", "a").unwrap();
    tree.insert("a", "", "a1").unwrap();
    tree.insert("a", "a1", "a2").unwrap();
    tree.insert("", "a", "b").unwrap();
    tree.insert("b", "", "b1").unwrap();
    tree.insert("b", "b1", "b2").unwrap();
    tree.insert("b", "b2", "b3").unwrap();
    tree.insert("b", "b3", "b4").unwrap();
    tree
}

/// A replica at the fixture state, reached the way a real peer reaches it:
/// by merging the fixture author's log. Its own log starts empty.
pub fn fixture_replica(index: u64) -> TestTree {
    let mut tree = replica(index);
    tree.merge(fixture().log().records().to_vec());
    tree
}

/// Two fixture replicas ready for a concurrent-editing scenario.
pub fn fixture_pair() -> (TestTree, TestTree) {
    (fixture_replica(1), fixture_replica(2))
}

/// Replays every record of `from`'s log into `to`.
pub fn pull(to: &mut TestTree, from: &TestTree) {
    to.merge(from.log().records().to_vec());
}

/// Exchanges logs both ways.
pub fn sync(a: &mut TestTree, b: &mut TestTree) {
    let from_a = a.log().records().to_vec();
    let from_b = b.log().records().to_vec();
    a.merge(from_b);
    b.merge(from_a);
}

/// The observable state of one node, everything convergence promises to
/// agree on: parent, structural timestamp, position, tombstone, and data
/// with per-key write timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub parent: String,
    pub t: u64,
    pub v_pos: f64,
    pub removed: Option<u64>,
    pub data: BTreeMap<String, (Value, u64)>,
}

/// Captures the full observable state of a replica, keyed by node id.
pub fn snapshot(tree: &TestTree) -> BTreeMap<String, NodeSnapshot> {
    tree.get_nodes()
        .map(|node| {
            let data = node
                .data()
                .iter()
                .map(|(key, cell)| (key.clone(), (cell.value().clone(), *cell.t())))
                .collect();
            (
                node.id().to_string(),
                NodeSnapshot {
                    parent: node.parent_id().to_string(),
                    t: *node.t(),
                    v_pos: node.v_pos(),
                    removed: node.removed().copied(),
                    data,
                },
            )
        })
        .collect()
}

/// Asserts two replicas present identical observable state, sibling order
/// included.
pub fn assert_converged(a: &TestTree, b: &TestTree) {
    assert_eq!(snapshot(a), snapshot(b), "replica state diverged");
    for node in a.get_nodes() {
        assert_eq!(
            a.child_list(node.id()),
            b.child_list(node.id()),
            "sibling order diverged under {:?}",
            node.id()
        );
    }
}

/// The child ids under `parent`, in sibling order.
pub fn child_ids(tree: &TestTree, parent: &str) -> Vec<String> {
    tree.child_list(parent)
        .iter()
        .map(|entry| entry.id().to_string())
        .collect()
}
