//! Deferred-callback executor for cooperative workers
//!
//! A single-threaded timer queue over virtual time. Callbacks run when the
//! event pump advances past their deadline; a scheduled callback can be
//! cancelled through its [`TimerId`] up to the moment it fires. Equal
//! deadlines fire in scheduling order, which keeps runs reproducible.

use core_types::Instant;
use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

/// Cancellable handle to a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct QueuedTimer {
    at: Instant,
    id: u64,
    callback: Box<dyn FnOnce()>,
}

impl PartialEq for QueuedTimer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueuedTimer {}

impl PartialOrd for QueuedTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Deadline first; the monotone id breaks ties FIFO.
        self.at.cmp(&other.at).then(self.id.cmp(&other.id))
    }
}

#[derive(Default)]
struct CoopExecutor {
    next_id: u64,
    queue: BinaryHeap<Reverse<QueuedTimer>>,
    cancelled: HashSet<u64>,
}

/// Shared handle to the executor
///
/// Clones refer to the same timer queue. The handle is single-threaded by
/// construction; cooperative workers and the event pump live on the same
/// thread as the scheduler.
#[derive(Clone, Default)]
pub struct ExecutorHandle {
    inner: Rc<RefCell<CoopExecutor>>,
}

impl ExecutorHandle {
    /// Creates an executor with an empty timer queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` to run once the pump reaches `at`
    pub fn schedule(&self, at: Instant, callback: impl FnOnce() + 'static) -> TimerId {
        let mut executor = self.inner.borrow_mut();
        let id = executor.next_id;
        executor.next_id += 1;
        executor.queue.push(Reverse(QueuedTimer {
            at,
            id,
            callback: Box::new(callback),
        }));
        TimerId(id)
    }

    /// Cancels a scheduled callback; a no-op if it already fired
    pub fn cancel(&self, id: TimerId) {
        self.inner.borrow_mut().cancelled.insert(id.0);
    }

    /// Fires every due callback and returns how many ran
    ///
    /// Callbacks may schedule or cancel further timers; the queue borrow is
    /// released around each invocation.
    pub fn run_due(&self, now: Instant) -> usize {
        let mut fired = 0;
        loop {
            let callback = {
                let mut executor = self.inner.borrow_mut();
                let due = matches!(executor.queue.peek(), Some(Reverse(timer)) if timer.at <= now);
                if !due {
                    break;
                }
                let Some(Reverse(timer)) = executor.queue.pop() else {
                    break;
                };
                if executor.cancelled.remove(&timer.id) {
                    None
                } else {
                    Some(timer.callback)
                }
            };
            if let Some(callback) = callback {
                callback();
                fired += 1;
            }
        }
        fired
    }

    /// Returns the deadline of the earliest live timer
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut executor = self.inner.borrow_mut();
        loop {
            let head = match executor.queue.peek() {
                Some(Reverse(timer)) => (timer.id, timer.at),
                None => return None,
            };
            if executor.cancelled.contains(&head.0) {
                executor.queue.pop();
                executor.cancelled.remove(&head.0);
            } else {
                return Some(head.1);
            }
        }
    }

    /// Returns the number of live (not cancelled) timers
    pub fn pending(&self) -> usize {
        let executor = self.inner.borrow();
        executor.queue.len().saturating_sub(executor.cancelled.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Duration;

    fn at_millis(ms: u64) -> Instant {
        Instant::ZERO + Duration::from_millis(ms)
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let executor = ExecutorHandle::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, deadline) in [("late", 300), ("early", 100), ("mid", 200)] {
            let order = Rc::clone(&order);
            executor.schedule(at_millis(deadline), move || {
                order.borrow_mut().push(label);
            });
        }

        assert_eq!(executor.run_due(at_millis(300)), 3);
        assert_eq!(*order.borrow(), vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_equal_deadlines_fire_fifo() {
        let executor = ExecutorHandle::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            executor.schedule(at_millis(100), move || {
                order.borrow_mut().push(label);
            });
        }

        executor.run_due(at_millis(100));
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_not_due_timers_stay_queued() {
        let executor = ExecutorHandle::new();
        let fired = Rc::new(RefCell::new(false));
        {
            let fired = Rc::clone(&fired);
            executor.schedule(at_millis(500), move || *fired.borrow_mut() = true);
        }

        assert_eq!(executor.run_due(at_millis(499)), 0);
        assert!(!*fired.borrow());
        assert_eq!(executor.pending(), 1);

        assert_eq!(executor.run_due(at_millis(500)), 1);
        assert!(*fired.borrow());
        assert_eq!(executor.pending(), 0);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let executor = ExecutorHandle::new();
        let fired = Rc::new(RefCell::new(false));
        let id = {
            let fired = Rc::clone(&fired);
            executor.schedule(at_millis(100), move || *fired.borrow_mut() = true)
        };

        executor.cancel(id);
        assert_eq!(executor.run_due(at_millis(200)), 0);
        assert!(!*fired.borrow());
    }

    #[test]
    fn test_callback_can_reschedule() {
        let executor = ExecutorHandle::new();
        let count = Rc::new(RefCell::new(0));

        fn arm(executor: &ExecutorHandle, count: &Rc<RefCell<u32>>, at: Instant) {
            let executor2 = executor.clone();
            let count2 = Rc::clone(count);
            executor.schedule(at, move || {
                *count2.borrow_mut() += 1;
                if *count2.borrow() < 3 {
                    arm(&executor2, &count2, at + Duration::from_millis(100));
                }
            });
        }

        arm(&executor, &count, at_millis(100));

        executor.run_due(at_millis(100));
        assert_eq!(*count.borrow(), 1);

        executor.run_due(at_millis(400));
        assert_eq!(*count.borrow(), 3);
        assert_eq!(executor.pending(), 0);
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let executor = ExecutorHandle::new();
        let early = executor.schedule(at_millis(100), || {});
        executor.schedule(at_millis(200), || {});

        assert_eq!(executor.next_deadline(), Some(at_millis(100)));
        executor.cancel(early);
        assert_eq!(executor.next_deadline(), Some(at_millis(200)));
    }
}
