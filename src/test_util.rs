//! Shared fixtures for unit tests and benchmarks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::entity::Id;
use crate::gate::Gate;

crate::components! {
    /// One component per storage strategy, plus an empty marker.
    pub struct TestRegistry {
        dense0:  Dense0  [dense],
        linear1: Linear1 [sorted linear],
        binary2: Binary2 [sorted binary],
        sparse3: Sparse3 [sparse],
        marked:  Marked  [empty],
    }
}

/// Dense-stored test component recording which entity it was written for.
#[derive(Debug, Default, PartialEq)]
pub struct Dense0 {
    pub origin: Id,
    pub value:  i32,
}

/// Sorted-stored (linear cursor) test component.
#[derive(Debug, Default, PartialEq)]
pub struct Linear1 {
    pub origin: Id,
    pub value:  i32,
}

/// Sorted-stored (binary cursor) test component.
#[derive(Debug, Default, PartialEq)]
pub struct Binary2 {
    pub origin: Id,
    pub value:  i32,
}

/// Sparse-stored test component.
#[derive(Debug, Default, PartialEq)]
pub struct Sparse3 {
    pub origin: Id,
    pub value:  i32,
}

/// Payload-less marker component.
pub struct Marked;

/// One-shot proof that `N` tasks were in flight at the same time.
///
/// Every participating task calls [`join`](Self::join) exactly once, and no
/// call returns before the last participant has arrived. A test that drives
/// `N` tasks through a witness therefore only completes if the scheduler
/// really had all of them running concurrently; if it serialized them, the
/// first task parks inside its single visit until the deadline and panics.
///
/// Built from the crate's own [`Gate`] handoff primitive: the final arrival
/// opens one gate per participant, and earlier arrivals spin on theirs the
/// same way the frame loop busy-yields on idle workers.
#[derive(Debug)]
pub struct ConcurrencyWitness<const N: usize> {
    gates:   [Gate; N],
    pending: AtomicUsize,
}

impl<const N: usize> ConcurrencyWitness<N> {
    /// Creates a witness for `N` participants.
    /// Usable in statics so that plain-`fn` systems can reach it.
    pub const fn new() -> Self {
        const CLOSED: Gate = Gate::new();
        Self { gates: [CLOSED; N], pending: AtomicUsize::new(N) }
    }

    /// Registers one participant and blocks until all `N` have arrived.
    ///
    /// # Panics
    /// Panics when more than `N` tasks join, or when the remaining
    /// participants fail to arrive within five seconds, which in a scheduler
    /// test means the tasks were serialized instead of concurrent.
    pub fn join(&self) {
        let remaining = self.pending.fetch_sub(1, Ordering::SeqCst);
        assert!(remaining >= 1, "more joins than declared participants");
        let slot = remaining - 1;
        if slot == 0 {
            for gate in &self.gates {
                gate.open();
            }
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.gates[slot].is_open() {
            assert!(
                Instant::now() < deadline,
                "{} of {} participants never arrived: the tasks were serialized",
                slot,
                N,
            );
            thread::yield_now();
        }
        self.gates[slot].wait_enter_close();
    }
}
