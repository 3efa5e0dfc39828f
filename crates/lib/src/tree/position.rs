//! Virtual position allocation.
//!
//! Every node orders among its siblings by a real number in the open interval
//! (0, 1). Inserting between two neighbors picks a point inside their gap, so
//! no existing sibling ever needs renumbering. The point is biased toward the
//! head of the gap (appends dominate, so more room is left at the tail) and
//! jittered so that concurrent replicas inserting into the same gap almost
//! always pick distinct positions.
//!
//! # Precision floor
//!
//! Positions are `f64`. Once a gap shrinks below `f64` resolution (roughly
//! after 50-odd repeated bisections of the same gap, long before that in
//! pathological editing patterns), a fresh position can no longer be
//! distinguished from its neighbor. Ordering then degrades to the timestamp
//! tiebreak and stable insertion order; replicas still converge.

use rand::Rng;

use super::id::NodeId;
use super::store::ChildEntry;
use crate::clock::Timestamp;

/// Virtual endpoints of every sibling list.
const HEAD: f64 = 0.0;
const TAIL: f64 = 1.0;

/// Fraction of the gap at which the new position sits.
const BIAS: f64 = 0.4;

/// Maximum jitter magnitude, as a fraction of the gap. Must stay below
/// `min(BIAS, 1.0 - BIAS)` so the jittered position cannot cross a neighbor.
const JITTER: f64 = 0.005;

/// Computes a position for a new sibling entering `siblings` directly after
/// `ref_id`, or at the head when `ref_id` is the root id.
///
/// The caller has already validated that `ref_id`, when not the root id,
/// names an entry of `siblings`.
pub(crate) fn allocate<T: Timestamp, R: Rng + ?Sized>(
    siblings: &[ChildEntry<T>],
    ref_id: &NodeId,
    rng: &mut R,
) -> f64 {
    let target = if ref_id.is_root() {
        0
    } else {
        siblings
            .iter()
            .position(|entry| entry.id() == ref_id)
            .map_or(0, |index| index + 1)
    };

    let prev = if target == 0 {
        HEAD
    } else {
        siblings[target - 1].v_pos()
    };
    let next = siblings.get(target).map_or(TAIL, ChildEntry::v_pos);

    let gap = next - prev;
    let jitter = rng.gen_range(-JITTER..=JITTER);
    prev + (BIAS + jitter) * gap
}
