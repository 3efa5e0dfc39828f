//! Concurrent-editing scenarios over the shared fixture: `a` holding `a1`,
//! `a2`, and `b` holding `b1`..`b4`.

use crate::helpers::*;

#[test]
fn concurrent_inserts_after_the_same_sibling() {
    let (mut a, mut b) = fixture_pair();

    a.insert("a", "a2", "a3").unwrap();
    b.insert("a", "a2", "a4").unwrap();
    sync(&mut a, &mut b);

    assert_converged(&a, &b);
    let children = child_ids(&a, "a");
    assert_eq!(&children[..2], &["a1", "a2"]);
    // both newcomers follow a2; their relative order is decided by
    // (v_pos, t) and agrees on every replica
    let mut tail = children[2..].to_vec();
    tail.sort();
    assert_eq!(tail, vec!["a3", "a4"]);
}

#[test]
fn concurrent_moves_of_the_same_node() {
    let (mut a, mut b) = fixture_pair();

    a.move_node("b3", "a", "a1").unwrap();
    b.move_node("b3", "b", "").unwrap(); // later clock range: this one wins
    sync(&mut a, &mut b);

    assert_converged(&a, &b);
    assert_eq!(child_ids(&a, "b"), vec!["b3", "b1", "b2", "b4"]);
    assert_eq!(child_ids(&a, "a"), vec!["a1", "a2"]);
}

#[test]
fn concurrent_move_beats_earlier_remove() {
    let (mut a, mut b) = fixture_pair();

    a.remove("a2").unwrap();
    b.move_node("a2", "b", "").unwrap(); // the move's t exceeds the removal's
    sync(&mut a, &mut b);

    assert_converged(&a, &b);
    assert!(!a.is_tombstone("a2"), "the newer move restores the node");
    assert_eq!(child_ids(&a, "b")[0], "a2");
    assert_eq!(child_ids(&a, "a"), vec!["a1"]);
}

#[test]
fn remove_then_insert_merged_in_reverse() {
    let (mut a, mut b) = fixture_pair();

    a.remove("a1").unwrap();
    a.insert("a", "", "a3").unwrap();

    let mut reversed = a.log().records().to_vec();
    reversed.reverse();
    b.merge(reversed);

    assert_converged(&a, &b);
    assert!(b.is_tombstone("a1"));
    assert_eq!(child_ids(&b, "a"), vec!["a3", "a1", "a2"]);
}

#[test]
fn insert_after_a_concurrently_removed_reference() {
    let (mut a, mut b) = fixture_pair();

    a.insert("a", "a1", "a3").unwrap();
    b.remove("a1").unwrap();
    sync(&mut a, &mut b);

    assert_converged(&a, &b);
    assert!(a.is_tombstone("a1"), "the reference stays as a tombstone");
    // the newcomer keeps its slot right after the tombstoned reference
    assert_eq!(child_ids(&a, "a"), vec!["a1", "a3", "a2"]);
}

#[test]
fn duplicate_delivery_changes_nothing() {
    let (mut a, _) = fixture_pair();
    a.move_node("b2", "a", "a2").unwrap();
    a.remove("b1").unwrap();
    a.set_value("a1", "done", true).unwrap();
    let log = a.log().records().to_vec();

    let mut once = fixture_replica(3);
    once.merge(log.clone());

    // merged twice
    let mut twice = fixture_replica(4);
    twice.merge(log.clone());
    twice.merge(log.clone());
    assert_converged(&once, &twice);

    // concatenated with itself in reverse order
    let mut doubled = log.clone();
    doubled.extend(log.iter().rev().cloned());
    let mut shaken = fixture_replica(5);
    shaken.merge(doubled);
    assert_converged(&once, &shaken);
}

#[test]
fn uuid_ids_flow_end_to_end() {
    // Ids are host-supplied; UUIDs are the expected shape.
    let id = uuid::Uuid::new_v4().to_string();
    let child = uuid::Uuid::new_v4().to_string();

    let mut a = replica(1);
    a.insert("", "", id.as_str()).unwrap();
    a.insert(id.as_str(), "", child.as_str()).unwrap();
    a.set_value(child.as_str(), "title", "leaf").unwrap();

    let mut b = replica(2);
    pull(&mut b, &a);

    assert_converged(&a, &b);
    assert_eq!(child_ids(&b, id.as_str()), vec![child.clone()]);
    assert_eq!(b.get_value(&child, "title").unwrap(), "leaf");
}
