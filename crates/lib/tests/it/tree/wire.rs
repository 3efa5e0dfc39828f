//! Shipping logs through the JSON wire form `[name, t, details]`.

use arbor::{CounterClock, Operation, OperationLog, Tree};

use crate::helpers::*;

#[test]
fn a_log_round_trips_through_json_lines() {
    let mut a = fixture_replica(1);
    a.insert("a", "a2", "a3").unwrap();
    a.move_node("b2", "a3", "").unwrap();
    a.remove("b1").unwrap();
    a.set_value("a3", "title", "shipped").unwrap();

    // encode each record as one JSON line, as a transport would
    let lines: Vec<String> = a
        .log()
        .records()
        .iter()
        .map(|record| record.to_json().unwrap())
        .collect();

    let decoded: Vec<Operation<u64>> = lines
        .iter()
        .map(|line| Operation::from_json(line).unwrap())
        .collect();

    let mut b = fixture_replica(2);
    b.merge(decoded);

    assert_converged(&a, &b);
    assert_eq!(b.get_value("a3", "title").unwrap(), "shipped");
}

#[test]
fn every_record_is_a_three_element_array() {
    let mut a = fixture_replica(1);
    a.insert("a", "", "a3").unwrap();
    a.move_node("a3", "b", "b4").unwrap();
    a.remove("a3").unwrap();
    a.set_value("b1", "k", 1).unwrap();

    for record in a.log().records() {
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        let array = json.as_array().expect("record must be an array");
        assert_eq!(array.len(), 3);
        assert_eq!(array[0], record.name());
        assert!(array[1].is_u64());
        assert!(array[2].is_object());
    }
}

/// A host-supplied sink that encodes records to JSON lines as they are
/// produced, the way a streaming transport would.
#[derive(Debug, Default)]
struct JsonLineLog {
    lines: Vec<String>,
}

impl OperationLog<u64> for JsonLineLog {
    fn push(&mut self, record: Operation<u64>) {
        self.lines.push(record.to_json().unwrap());
    }
}

#[test]
fn a_custom_log_sink_sees_every_local_record() {
    let mut a = Tree::new(CounterClock::new()).with_log(JsonLineLog::default());
    a.insert("", "", "x").unwrap();
    a.set_value("x", "k", 1).unwrap();
    a.remove("x").unwrap();

    assert_eq!(a.log().lines.len(), 3);

    let mut b = replica(2);
    b.merge(
        a.log()
            .lines
            .iter()
            .map(|line| Operation::from_json(line).unwrap())
            .collect::<Vec<_>>(),
    );
    assert!(b.is_tombstone("x"));
    assert_eq!(*b.get_value("x", "k").unwrap(), 1);
}

#[test]
fn draining_the_memory_log_empties_it() {
    let mut a = fixture_replica(1);
    a.insert("a", "", "a3").unwrap();

    let mut log = a.log().clone();
    let shipped = log.drain();
    assert_eq!(shipped.len(), 1);
    assert!(log.is_empty());

    let mut b = fixture_replica(2);
    b.merge(shipped);
    assert_eq!(child_ids(&b, "a"), vec!["a3", "a1", "a2"]);
}

#[test]
fn unknown_operation_names_are_a_protocol_mismatch() {
    let err = Operation::<u64>::from_json(r#"["merge", 1, {"node_id": "x"}]"#).unwrap_err();
    assert!(err.is_serialization_error());

    // a valid name with mangled details is rejected too
    assert!(Operation::<u64>::from_json(r#"["remove", 1, {"id": "x"}]"#).is_err());
}
