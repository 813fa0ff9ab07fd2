//! Admission gate and pool state.
//!
//! `capacity_limit`, the number of running tasks and the scheduling queue
//! live behind a single `parking_lot::Mutex`. Every admission, dispatch,
//! release and resize is one short critical section on that lock, so
//! `active + queued <= capacity_limit` holds whenever an admission succeeds.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::queue::{QueueOrder, SchedulingQueue};
use crate::core::ExecutorError;

/// Why an item was turned away. The item is handed back untouched.
#[derive(Debug)]
pub struct Rejected<T> {
    /// The item that was not admitted.
    pub item: T,
    /// Reason for the rejection.
    pub reason: ExecutorError,
}

/// An item handed to a worker, with the gauges observed at dispatch.
#[derive(Debug)]
pub struct Dispatch<T> {
    /// The dequeued item.
    pub item: T,
    /// Queue depth remaining after the pop.
    pub queue_depth: usize,
    /// `active / capacity_limit` including this item.
    pub load_factor: f64,
}

/// Point-in-time view of the pool state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateSnapshot {
    /// Target number of workers and ceiling on running plus queued tasks.
    pub capacity_limit: usize,
    /// Scale-downs requested while the limit was already zero. Each one is
    /// paid back by a later grow before the limit rises again.
    pub capacity_deficit: usize,
    /// Tasks currently being processed.
    pub active_count: usize,
    /// Tasks admitted but not yet picked up.
    pub queued_count: usize,
}

impl GateSnapshot {
    /// `capacity_limit - capacity_deficit - (active + queued)`; negative
    /// after a scale-down that left more work in flight than the new limit.
    #[must_use]
    pub fn remaining(&self) -> isize {
        let used = self.active_count + self.queued_count;
        isize::try_from(self.capacity_limit).unwrap_or(isize::MAX)
            - isize::try_from(self.capacity_deficit).unwrap_or(isize::MAX)
            - isize::try_from(used).unwrap_or(isize::MAX)
    }
}

struct PoolState<T> {
    capacity_limit: usize,
    capacity_deficit: usize,
    active_count: usize,
    queue: SchedulingQueue<T>,
    closed: bool,
}

impl<T> PoolState<T> {
    fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            capacity_limit: self.capacity_limit,
            capacity_deficit: self.capacity_deficit,
            active_count: self.active_count,
            queued_count: self.queue.len(),
        }
    }
}

/// Capacity check and reservation over the scheduling queue.
pub struct AdmissionGate<T> {
    state: Mutex<PoolState<T>>,
}

impl<T> AdmissionGate<T> {
    /// Create a gate with the given capacity and queue discipline.
    #[must_use]
    pub fn new(capacity_limit: usize, order: QueueOrder) -> Self {
        Self {
            state: Mutex::new(PoolState {
                capacity_limit,
                capacity_deficit: 0,
                active_count: 0,
                queue: SchedulingQueue::new(order),
                closed: false,
            }),
        }
    }

    /// Admit and enqueue `item` if `active + queued < capacity_limit`.
    ///
    /// The check and the push happen in one critical section. `on_admit`
    /// runs inside it just before the push and receives the time spent
    /// acquiring the lock. Returns the queue depth after the push.
    ///
    /// # Errors
    ///
    /// Hands the item back with `ExecutorError::Overloaded` when capacity is
    /// exhausted, or `ExecutorError::Shutdown` once the gate is closed.
    pub fn try_admit<F>(
        &self,
        mut item: T,
        arrival_micros: u128,
        on_admit: F,
    ) -> Result<usize, Rejected<T>>
    where
        F: FnOnce(&mut T, Duration),
    {
        let requested_at = Instant::now();
        let mut state = self.state.lock();
        let lock_time = requested_at.elapsed();

        if state.closed {
            return Err(Rejected {
                item,
                reason: ExecutorError::Shutdown,
            });
        }
        if state.active_count + state.queue.len() >= state.capacity_limit {
            return Err(Rejected {
                item,
                reason: ExecutorError::Overloaded {
                    capacity_limit: state.capacity_limit,
                },
            });
        }

        on_admit(&mut item, lock_time);
        state.queue.push(item, arrival_micros);
        Ok(state.queue.len())
    }

    /// Advisory remaining capacity, read under the admission lock.
    ///
    /// A positive value does not guarantee a later `try_admit` succeeds.
    #[must_use]
    pub fn capacity_remaining(&self) -> isize {
        self.state.lock().snapshot().remaining()
    }

    /// Pop the next item and count it as running.
    ///
    /// Moving an item from queued to active leaves `active + queued`
    /// unchanged, so this never breaks the capacity invariant.
    pub fn begin_next(&self) -> Option<Dispatch<T>> {
        let mut state = self.state.lock();
        let item = state.queue.pop()?;
        state.active_count += 1;
        let load_factor = load_factor(state.active_count, state.capacity_limit);
        Some(Dispatch {
            item,
            queue_depth: state.queue.len(),
            load_factor,
        })
    }

    /// Release the slot held by a finished item.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.active_count = state.active_count.saturating_sub(1);
    }

    /// Raise the capacity limit by one and return the new limit.
    ///
    /// An outstanding deficit is paid back first, in which case the limit
    /// stays where it is.
    pub fn grow(&self) -> usize {
        let mut state = self.state.lock();
        if state.capacity_deficit > 0 {
            state.capacity_deficit -= 1;
        } else {
            state.capacity_limit += 1;
        }
        state.capacity_limit
    }

    /// Lower the capacity limit by one and return the new limit. Running
    /// tasks are never aborted.
    ///
    /// At zero the limit stays put and the shortfall is recorded as a
    /// deficit, so `grow` and `shrink` always undo each other.
    pub fn shrink(&self) -> usize {
        let mut state = self.state.lock();
        if state.capacity_limit > 0 {
            state.capacity_limit -= 1;
        } else {
            state.capacity_deficit += 1;
        }
        state.capacity_limit
    }

    /// Stop admitting and return whatever is still queued.
    pub fn close(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.closed = true;
        state.queue.drain()
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Consistent view of limit, running and queued counts.
    #[must_use]
    pub fn snapshot(&self) -> GateSnapshot {
        self.state.lock().snapshot()
    }
}

/// A limit of zero is reported as fully loaded rather than dividing by zero.
#[allow(clippy::cast_precision_loss)]
fn load_factor(active: usize, limit: usize) -> f64 {
    if limit == 0 {
        return 1.0;
    }
    active as f64 / limit as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(limit: usize) -> AdmissionGate<&'static str> {
        AdmissionGate::new(limit, QueueOrder::YoungestFirst)
    }

    #[test]
    fn test_admit_until_full() {
        let gate = gate(2);
        assert_eq!(gate.try_admit("a", 1, |_, _| {}).unwrap(), 1);
        assert_eq!(gate.try_admit("b", 2, |_, _| {}).unwrap(), 2);

        let rejected = gate.try_admit("c", 3, |_, _| {}).unwrap_err();
        assert_eq!(rejected.item, "c");
        assert!(matches!(
            rejected.reason,
            ExecutorError::Overloaded { capacity_limit: 2 }
        ));
        assert_eq!(gate.capacity_remaining(), 0);
    }

    #[test]
    fn test_on_admit_runs_only_when_admitted() {
        let gate = gate(1);
        let mut calls = 0;
        gate.try_admit("a", 1, |_, _| calls += 1).unwrap();
        let _ = gate.try_admit("b", 2, |_, _| calls += 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_dispatch_keeps_sum_constant() {
        let gate = gate(3);
        gate.try_admit("old", 10, |_, _| {}).unwrap();
        gate.try_admit("new", 20, |_, _| {}).unwrap();

        let dispatch = gate.begin_next().unwrap();
        assert_eq!(dispatch.item, "new");
        assert_eq!(dispatch.queue_depth, 1);
        assert!((dispatch.load_factor - 1.0 / 3.0).abs() < f64::EPSILON);

        let snap = gate.snapshot();
        assert_eq!(snap.active_count, 1);
        assert_eq!(snap.queued_count, 1);
        assert_eq!(snap.remaining(), 1);

        gate.finish();
        assert_eq!(gate.snapshot().active_count, 0);
        assert_eq!(gate.capacity_remaining(), 2);
    }

    #[test]
    fn test_begin_next_on_empty_queue() {
        let gate = gate(1);
        assert!(gate.begin_next().is_none());
        assert_eq!(gate.snapshot().active_count, 0);
    }

    #[test]
    fn test_grow_makes_room_immediately() {
        let gate = gate(1);
        gate.try_admit("a", 1, |_, _| {}).unwrap();
        assert!(gate.try_admit("b", 2, |_, _| {}).is_err());
        assert_eq!(gate.grow(), 2);
        assert!(gate.try_admit("b", 2, |_, _| {}).is_ok());
    }

    #[test]
    fn test_shrink_below_in_flight() {
        let gate = gate(2);
        gate.try_admit("a", 1, |_, _| {}).unwrap();
        gate.try_admit("b", 2, |_, _| {}).unwrap();
        gate.begin_next().unwrap();

        assert_eq!(gate.shrink(), 1);
        assert_eq!(gate.capacity_remaining(), -1);
        assert_eq!(gate.shrink(), 0);
        assert_eq!(gate.shrink(), 0);

        let snap = gate.snapshot();
        assert_eq!(snap.capacity_deficit, 1);
        assert_eq!(snap.remaining(), -3);
    }

    #[test]
    fn test_grow_pays_back_deficit_first() {
        let gate = gate(1);
        assert_eq!(gate.shrink(), 0);
        assert_eq!(gate.shrink(), 0);
        assert_eq!(gate.shrink(), 0);
        assert_eq!(gate.snapshot().capacity_deficit, 2);

        assert_eq!(gate.grow(), 0);
        assert_eq!(gate.grow(), 0);
        assert!(gate.try_admit("a", 1, |_, _| {}).is_err());
        assert_eq!(gate.snapshot().capacity_deficit, 0);

        assert_eq!(gate.grow(), 1);
        assert!(gate.try_admit("a", 1, |_, _| {}).is_ok());
    }

    #[test]
    fn test_load_factor_with_zero_limit() {
        assert!((load_factor(1, 0) - 1.0).abs() < f64::EPSILON);
        assert!((load_factor(1, 4) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_close_rejects_and_drains() {
        let gate = gate(4);
        gate.try_admit("a", 1, |_, _| {}).unwrap();
        gate.try_admit("b", 2, |_, _| {}).unwrap();

        let leftover = gate.close();
        assert_eq!(leftover, vec!["b", "a"]);
        assert!(gate.is_closed());

        let rejected = gate.try_admit("c", 3, |_, _| {}).unwrap_err();
        assert!(matches!(rejected.reason, ExecutorError::Shutdown));
    }
}
