//! Discrete-event kernel: simulated clock plus a time-ordered event queue.
//!
//! The kernel owns the only notion of "now" in a simulation. Time moves
//! forward in two ways:
//! 1. [`Kernel::pop_due`] jumps the clock to the timestamp of the next event
//!    at or before a limit.
//! 2. [`Kernel::advance_to`] moves the clock to an arbitrary later instant
//!    (the poll loop uses this to spend a quantum with nothing due).
//!
//! Neither ever moves the clock backwards. Events scheduled for the same
//! instant are delivered in the order they were scheduled.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::Add;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Simulated time
// ---------------------------------------------------------------------------

/// A simulated timestamp with nanosecond resolution, measured from the start
/// of the simulation. Unrelated to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// Simulation start.
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    pub const fn from_micros(us: u64) -> Self {
        Self(us.saturating_mul(1_000))
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Simulated time elapsed since `earlier`, zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        let ns = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        SimTime(self.0.saturating_add(ns))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}us", self.0 / 1_000, self.0 % 1_000)
    }
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

struct Scheduled<E> {
    at: SimTime,
    seq: u64,
    event: E,
}

impl<E> Scheduled<E> {
    fn key(&self) -> (SimTime, u64) {
        (self.at, self.seq)
    }
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Simulated clock and pending-event queue.
pub struct Kernel<E> {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Scheduled<E>>>,
}

impl<E> Default for Kernel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Kernel<E> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` at `at`. Instants in the past are clamped to now.
    pub fn schedule_at(&mut self, at: SimTime, event: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { at, seq, event }));
    }

    /// Schedule `event` after `delay` of simulated time.
    pub fn schedule_in(&mut self, delay: Duration, event: E) {
        self.schedule_at(self.now + delay, event);
    }

    /// Timestamp of the earliest pending event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(s)| s.at)
    }

    /// Pop the earliest event if it is due at or before `limit`, moving the
    /// clock to its timestamp.
    pub fn pop_due(&mut self, limit: SimTime) -> Option<(SimTime, E)> {
        if self.next_event_time()? > limit {
            return None;
        }
        let Reverse(s) = self.queue.pop()?;
        self.now = self.now.max(s.at);
        Some((self.now, s.event))
    }

    /// Move the clock forward to `t`. Earlier instants are ignored.
    pub fn advance_to(&mut self, t: SimTime) {
        self.now = self.now.max(t);
    }

    /// Number of events not yet delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop every pending event. The clock is left where it is.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
