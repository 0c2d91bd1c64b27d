//! Per-key single-flight coordination.
//!
//! Concurrent misses on the same cache key elect one leader; everyone else
//! waits on the leader's slot. The algorithm therefore runs at most once
//! per key per miss, and a stampede degrades to one computation plus cheap
//! waits. Waits are bounded: a follower that outlives the timeout fails
//! instead of blocking forever on untrusted algorithm code.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::cache::lock::mutex_lock;
use crate::domain::CalculationResult;

use super::error::EngineError;

type FlightOutcome = Result<CalculationResult, EngineError>;

pub(crate) struct FlightSlot {
    outcome: Mutex<Option<FlightOutcome>>,
    done: Condvar,
}

impl FlightSlot {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Block until the leader publishes or the timeout elapses.
    pub(crate) fn wait(&self, timeout: Duration) -> Option<FlightOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcome = mutex_lock(&self.outcome, "flight.wait");
        while outcome.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _timed_out) = self
                .done
                .wait_timeout(outcome, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            outcome = guard;
        }
        outcome.clone()
    }

    fn publish(&self, result: FlightOutcome) {
        *mutex_lock(&self.outcome, "flight.publish") = Some(result);
        self.done.notify_all();
    }
}

pub(crate) enum FlightPosition {
    Leader(Arc<FlightSlot>),
    Follower(Arc<FlightSlot>),
}

/// Tracks one in-flight slot per cache key.
pub(crate) struct FlightTable {
    slots: Mutex<HashMap<String, Arc<FlightSlot>>>,
}

impl FlightTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Join the flight for `key`: first caller becomes the leader, later
    /// callers follow.
    pub(crate) fn join(&self, key: &str) -> FlightPosition {
        let mut slots = mutex_lock(&self.slots, "flight.join");
        if let Some(slot) = slots.get(key) {
            FlightPosition::Follower(Arc::clone(slot))
        } else {
            let slot = Arc::new(FlightSlot::new());
            slots.insert(key.to_string(), Arc::clone(&slot));
            FlightPosition::Leader(slot)
        }
    }

    /// Publish the leader's outcome and retire the slot.
    pub(crate) fn complete(&self, key: &str, slot: &FlightSlot, outcome: &FlightOutcome) {
        slot.publish(outcome.clone());
        mutex_lock(&self.slots, "flight.complete").remove(key);
    }
}
