//! Seeded randomized editing sessions.
//!
//! Three replicas each apply a random mix of inserts, moves, removes, and
//! value writes on top of the fixture, then exchange logs. A fourth replica
//! rebuilds from nothing by merging a shuffled concatenation of every log,
//! which forces heavy use of the deferred queue. Seeds are fixed, so a
//! failure reproduces exactly.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::helpers::*;

/// Applies `rounds` random operations to `tree`, drawing targets from the
/// fixture ids and from nodes inserted here. Precondition failures from
/// randomly chosen no-op moves are expected and skipped.
fn random_edits(tree: &mut TestTree, rng: &mut StdRng, prefix: &str, rounds: usize) {
    let mut known: Vec<String> = ["a", "a1", "a2", "b", "b1", "b2", "b3", "b4"]
        .iter()
        .map(|id| id.to_string())
        .collect();

    for round in 0..rounds {
        match rng.gen_range(0..10) {
            0..=3 => {
                let parent = pick_parent(&known, rng);
                let ref_id = pick_ref(tree, &parent, rng);
                let id = format!("{prefix}-{round}");
                tree.insert(parent.as_str(), ref_id.as_str(), id.as_str())
                    .unwrap();
                known.push(id);
            }
            4..=6 => {
                let node = pick_node(&known, rng);
                let parent = pick_parent(&known, rng);
                let ref_id = pick_ref(tree, &parent, rng);
                // moving into the current slot (or under itself) may raise;
                // a random editor just skips those
                let _ = tree.move_node(node.as_str(), parent.as_str(), ref_id.as_str());
            }
            7 => {
                let node = pick_node(&known, rng);
                tree.remove(node.as_str()).unwrap();
            }
            _ => {
                let node = pick_node(&known, rng);
                tree.set_value(node.as_str(), "round", round as i64).unwrap();
            }
        }
    }
}

fn pick_node(known: &[String], rng: &mut StdRng) -> String {
    known[rng.gen_range(0..known.len())].clone()
}

fn pick_parent(known: &[String], rng: &mut StdRng) -> String {
    // the root is a valid parent too
    if rng.gen_range(0..4) == 0 {
        String::new()
    } else {
        pick_node(known, rng)
    }
}

fn pick_ref(tree: &TestTree, parent: &str, rng: &mut StdRng) -> String {
    let children = tree.child_list(parent);
    if children.is_empty() || rng.gen_bool(0.3) {
        String::new()
    } else {
        children[rng.gen_range(0..children.len())].id().to_string()
    }
}

#[test]
fn randomized_sessions_converge() {
    for seed in [1u64, 2, 3] {
        let mut replicas = vec![fixture_replica(1), fixture_replica(2), fixture_replica(3)];
        for (index, replica) in replicas.iter_mut().enumerate() {
            let mut rng = StdRng::seed_from_u64(seed * 100 + index as u64);
            random_edits(replica, &mut rng, &format!("r{index}"), 40);
        }

        let logs: Vec<_> = replicas
            .iter()
            .map(|replica| replica.log().records().to_vec())
            .collect();
        for (i, replica) in replicas.iter_mut().enumerate() {
            for (j, log) in logs.iter().enumerate() {
                if i != j {
                    replica.merge(log.clone());
                }
            }
        }

        assert_converged(&replicas[0], &replicas[1]);
        assert_converged(&replicas[1], &replicas[2]);

        // a cold replica rebuilds from a shuffled concatenation of all logs
        let mut pool = fixture().log().records().to_vec();
        for log in &logs {
            pool.extend(log.clone());
        }
        pool.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut cold = replica(7);
        cold.merge(pool);
        assert!(cold.queue().is_empty(), "every parked record must drain");
        assert_converged(&replicas[0], &cold);
    }
}
