//! Key → ordered-sequence container.
//!
//! One container backs two indexes with different ordering needs: the
//! child-list index keeps every sequence sorted by a configured comparator
//! (stable, so equal elements retain relative insertion order), and the
//! deferred queue keeps plain insertion order by configuring no comparator.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// A map from key to a mutable ordered sequence of values.
///
/// With a comparator, the sequence is re-sorted (stably) after every insert;
/// without one, values accumulate in insertion order. Keys with no remaining
/// values are removed from the map.
#[derive(Debug, Clone)]
pub(crate) struct MultiMap<K, V> {
    entries: HashMap<K, Vec<V>>,
    cmp: Option<fn(&V, &V) -> Ordering>,
}

impl<K: Eq + Hash, V> MultiMap<K, V> {
    /// Creates an insertion-ordered multi-map.
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            cmp: None,
        }
    }

    /// Creates a multi-map whose sequences stay sorted by `cmp`.
    pub(crate) fn with_comparator(cmp: fn(&V, &V) -> Ordering) -> Self {
        Self {
            entries: HashMap::new(),
            cmp: Some(cmp),
        }
    }

    /// Returns the sequence under `key`, empty if the key is absent.
    pub(crate) fn get<Q>(&self, key: &Q) -> &[V]
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends `value` under `key`, re-sorting the sequence when a comparator
    /// is configured. `Vec::sort_by` is stable, so comparator ties keep their
    /// relative insertion order.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        let seq = self.entries.entry(key).or_default();
        seq.push(value);
        if let Some(cmp) = self.cmp {
            seq.sort_by(cmp);
        }
    }

    /// Removes the first value under `key` matching `pred`, dropping the key
    /// if its sequence becomes empty.
    pub(crate) fn remove<Q>(&mut self, key: &Q, pred: impl Fn(&V) -> bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let seq = self.entries.get_mut(key)?;
        let index = seq.iter().position(pred)?;
        let value = seq.remove(index);
        if seq.is_empty() {
            self.entries.remove(key);
        }
        Some(value)
    }

    /// Removes and returns the whole sequence under `key`, empty if absent.
    pub(crate) fn take<Q>(&mut self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.remove(key).unwrap_or_default()
    }

    /// Total number of values across all keys.
    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if no values are held.
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
