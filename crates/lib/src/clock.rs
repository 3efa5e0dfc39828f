//! Time provider abstraction
//!
//! This module provides the [`Timestamp`] and [`Clock`] traits that abstract
//! over the host's time source. The engine treats timestamps opaquely: it only
//! compares them, and subtracts them (via [`Timestamp::age_since`]) when
//! purging old tombstones. Any totally ordered value works — epoch
//! milliseconds, a Lamport counter, a hybrid logical clock.
//!
//! Two implementations are provided: [`SystemClock`] for wall-clock hosts and
//! [`CounterClock`] for logical-time hosts and deterministic tests.
//!
//! # Example
//!
//! ```
//! use arbor::{Clock, CounterClock};
//!
//! let clock = CounterClock::new();
//! let t1 = clock.now();
//! let t2 = clock.now();
//! assert!(t2 > t1);
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, de::DeserializeOwned};

/// An opaque, totally ordered timestamp.
///
/// The engine relies only on comparison between timestamps produced by the
/// same replica's clock. `Default` must be the minimal timestamp; it stamps
/// the root sentinel, which every other timestamp must exceed.
///
/// [`Timestamp::age_since`] is needed solely by tombstone purging, which
/// removes tombstones older than a minimum age.
pub trait Timestamp: Clone + Ord + Debug + Default + Serialize + DeserializeOwned {
    /// The result of subtracting one timestamp from another.
    type Age: PartialOrd;

    /// Returns the age of `earlier` as seen from `self`.
    ///
    /// Only ever called with `self >= earlier`; implementations may saturate
    /// otherwise.
    fn age_since(&self, earlier: &Self) -> Self::Age;
}

impl Timestamp for u64 {
    type Age = u64;

    fn age_since(&self, earlier: &Self) -> u64 {
        self.saturating_sub(*earlier)
    }
}

/// A time provider for stamping local operations.
///
/// Each call to [`Clock::now`] must return a value that compares strictly
/// greater than every value previously returned by the same clock. Nothing is
/// assumed about ordering across replicas; concurrent edits resolve through
/// the merge rules, not through clock agreement.
pub trait Clock: Debug {
    /// The timestamp type this clock produces.
    type Time: Timestamp;

    /// Returns the next timestamp.
    fn now(&self) -> Self::Time;
}

/// Production clock using real system time.
///
/// Reports milliseconds since the Unix epoch, bumped by one whenever the wall
/// clock has not advanced since the previous call so that consecutive calls
/// stay strictly increasing.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    type Time = u64;

    fn now(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last + 1);
            match self
                .last
                .compare_exchange(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }
}

/// Monotonic counter clock.
///
/// Returns 1, 2, 3, … — a pure logical clock. This is the clock used
/// throughout the test suite, and the natural choice for hosts that already
/// maintain a per-replica operation counter.
///
/// # Example
///
/// ```
/// use arbor::{Clock, CounterClock};
///
/// let clock = CounterClock::starting_at(100);
/// assert_eq!(clock.now(), 101);
/// assert_eq!(clock.now(), 102);
/// ```
#[derive(Debug, Default)]
pub struct CounterClock {
    count: AtomicU64,
}

impl CounterClock {
    /// Creates a counter clock whose first tick is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter clock whose first tick is `start + 1`.
    ///
    /// Tests give each replica a disjoint range so that timestamps never
    /// collide across replicas.
    pub fn starting_at(start: u64) -> Self {
        Self {
            count: AtomicU64::new(start),
        }
    }

    /// Returns the last tick handed out without advancing.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Advances the counter by `n` without handing out a tick.
    pub fn advance(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }
}

impl Clock for CounterClock {
    type Time = u64;

    fn now(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }
}
