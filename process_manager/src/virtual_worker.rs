//! Cooperative worker scheduled on the deferred executor

use crate::executor::{ExecutorHandle, TimerId};
use crate::worker::{ControlMessage, Dispatcher, LoopDirective, Worker, WorkerCore};
use core_types::{Duration, KernelClock};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Simulated latency of control-message delivery.
const CONTROL_DELIVERY_DELAY: Duration = Duration::from_millis(10);

/// A virtual process sharing the scheduler's thread
///
/// Control messages arrive after a short simulated delay, and the execution
/// loop interleaves with other processes through the deferred executor. The
/// pending loop timer is owned here: stopping the worker cancels it, so a
/// stale callback can never re-arm a paused loop.
pub struct VirtualWorker {
    core: Rc<RefCell<WorkerCore>>,
    executor: ExecutorHandle,
    clock: KernelClock,
    pending_loop: Rc<Cell<Option<TimerId>>>,
}

impl VirtualWorker {
    /// Creates a cooperative worker on the given executor and clock
    pub fn new(
        dispatcher: Dispatcher,
        executor: ExecutorHandle,
        clock: KernelClock,
        seed: u64,
    ) -> Self {
        Self {
            core: Rc::new(RefCell::new(WorkerCore::new(dispatcher, seed))),
            executor,
            clock,
            pending_loop: Rc::new(Cell::new(None)),
        }
    }

    fn deliver(
        core: &Rc<RefCell<WorkerCore>>,
        executor: &ExecutorHandle,
        clock: &KernelClock,
        pending: &Rc<Cell<Option<TimerId>>>,
        message: ControlMessage,
    ) {
        let directive = core.borrow_mut().handle(message);
        match directive {
            LoopDirective::Arm => Self::arm(core, executor, clock, pending),
            LoopDirective::Disarm | LoopDirective::Shutdown => {
                if let Some(id) = pending.take() {
                    executor.cancel(id);
                }
            }
            LoopDirective::Ignore => {}
        }
    }

    /// Runs one iteration now and schedules the next on a fresh timer
    fn arm(
        core: &Rc<RefCell<WorkerCore>>,
        executor: &ExecutorHandle,
        clock: &KernelClock,
        pending: &Rc<Cell<Option<TimerId>>>,
    ) {
        match core.borrow_mut().run_iteration() {
            Some(delay) => {
                let core = Rc::clone(core);
                let executor_again = executor.clone();
                let clock = clock.clone();
                let pending_again = Rc::clone(pending);
                let id = executor.schedule(clock.now() + delay, move || {
                    pending_again.set(None);
                    Self::arm(&core, &executor_again, &clock, &pending_again);
                });
                pending.set(Some(id));
            }
            None => pending.set(None),
        }
    }
}

impl Worker for VirtualWorker {
    fn send(&mut self, message: ControlMessage) {
        let core = Rc::clone(&self.core);
        let executor = self.executor.clone();
        let clock = self.clock.clone();
        let pending = Rc::clone(&self.pending_loop);
        self.executor.schedule(
            self.clock.now() + CONTROL_DELIVERY_DELAY,
            move || {
                Self::deliver(&core, &executor, &clock, &pending, message);
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{InitParams, ProcessLogSink};
    use core_types::{Pid, PrincipalId};
    use ipc_registry::{IpcRegistry, SharedRegistry};
    use std::sync::{Arc, Mutex};

    struct CollectingLogs {
        lines: Mutex<Vec<String>>,
    }

    impl ProcessLogSink for CollectingLogs {
        fn on_log(&self, _pid: Pid, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }
    }

    struct Rig {
        clock: KernelClock,
        executor: ExecutorHandle,
        registry: SharedRegistry,
        logs: Arc<CollectingLogs>,
    }

    fn rig() -> Rig {
        let clock = KernelClock::new();
        let mut registry = IpcRegistry::new(clock.clone());
        registry.seed_default_channels().unwrap();
        Rig {
            clock,
            executor: ExecutorHandle::new(),
            registry: registry.into_shared(),
            logs: Arc::new(CollectingLogs {
                lines: Mutex::new(Vec::new()),
            }),
        }
    }

    impl Rig {
        fn worker(&self, seed: u64) -> VirtualWorker {
            let dispatcher = Dispatcher::new(self.registry.clone(), self.logs.clone());
            VirtualWorker::new(dispatcher, self.executor.clone(), self.clock.clone(), seed)
        }

        /// Advances virtual time in small slices, firing due timers.
        fn pump(&self, total: Duration) {
            let slice = Duration::from_millis(5);
            let mut elapsed = Duration::ZERO;
            while elapsed < total {
                self.clock.advance(slice);
                self.executor.run_due(self.clock.now());
                elapsed = elapsed + slice;
            }
        }

        fn registry_log_len(&self) -> usize {
            self.registry.lock().unwrap().log().len()
        }
    }

    fn init(pid_raw: u64) -> ControlMessage {
        ControlMessage::Init(InitParams {
            pid: Pid::from_raw(pid_raw),
            name: format!("worker-{}", pid_raw),
            role: "daemon".to_string(),
            owner: PrincipalId::new("admin"),
        })
    }

    #[test]
    fn test_init_delivery_is_deferred() {
        let rig = rig();
        let mut worker = rig.worker(1);
        worker.send(init(1000));

        // Nothing happens until the simulated delivery delay elapses.
        assert!(rig.logs.lines.lock().unwrap().is_empty());
        rig.pump(Duration::from_millis(20));
        let lines = rig.logs.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("started"));
    }

    #[test]
    fn test_loop_emits_traffic_over_time() {
        let rig = rig();
        let mut worker = rig.worker(42);
        worker.send(init(1000));

        rig.pump(Duration::from_secs(120));

        let registry = rig.registry.lock().unwrap();
        // Seeded channels log 3 creation entries; the loop added more.
        assert!(registry.log().len() > 3);
        assert!(registry.messages_total() > 0);
    }

    #[test]
    fn test_stop_cancels_pending_iteration() {
        let rig = rig();
        let mut worker = rig.worker(42);
        worker.send(init(1000));
        rig.pump(Duration::from_secs(10));

        worker.send(ControlMessage::Stop);
        // Let the stop deliver and any in-flight iteration finish.
        rig.pump(Duration::from_secs(2));
        let settled = rig.registry_log_len();
        assert_eq!(rig.executor.pending(), 0);

        rig.pump(Duration::from_secs(30));
        assert_eq!(rig.registry_log_len(), settled);
    }

    #[test]
    fn test_resume_restarts_the_loop() {
        let rig = rig();
        let mut worker = rig.worker(42);
        worker.send(init(1000));
        rig.pump(Duration::from_secs(5));

        worker.send(ControlMessage::Stop);
        rig.pump(Duration::from_secs(2));
        let paused_len = rig.registry_log_len();

        worker.send(ControlMessage::Resume);
        rig.pump(Duration::from_secs(120));
        assert!(rig.registry_log_len() > paused_len);
    }

    #[test]
    fn test_shutdown_leaves_no_timers() {
        let rig = rig();
        let mut worker = rig.worker(7);
        worker.send(init(1000));
        rig.pump(Duration::from_secs(5));

        worker.send(ControlMessage::Shutdown);
        rig.pump(Duration::from_secs(2));
        assert_eq!(rig.executor.pending(), 0);
    }
}
