//! The scheduler: owns the process table and drives the fleet

use crate::executor::ExecutorHandle;
use crate::process::{Process, ProcessSnapshot, ProcessState};
use crate::thread_worker::ThreadWorker;
use crate::virtual_worker::VirtualWorker;
use crate::worker::{ControlMessage, Dispatcher, InitParams, Worker, WorkerModel};
use core_types::{Duration, KernelClock, Pid, PrincipalId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use thiserror::Error;

/// The fixed principal set processes are assigned owners from.
pub const PRINCIPAL_POOL: [&str; 3] = ["admin", "user1", "user2"];

/// Simulated time charged per single-step.
const STEP_DT: Duration = Duration::from_millis(16);

/// Process construction failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// The underlying execution context could not be constructed
    #[error("worker creation failed: {0}")]
    WorkerCreationFailed(String),
}

/// Builds workers behind the capability interface
///
/// The execution model is chosen once, here. When a parallel spawn fails
/// the factory degrades to the cooperative model for the rest of the
/// system's lifetime instead of failing the caller.
pub struct WorkerFactory {
    model: WorkerModel,
    dispatcher: Dispatcher,
    executor: ExecutorHandle,
    clock: KernelClock,
    seed: u64,
    spawned: u64,
}

impl WorkerFactory {
    /// Creates a factory for the given model
    pub fn new(
        model: WorkerModel,
        dispatcher: Dispatcher,
        executor: ExecutorHandle,
        clock: KernelClock,
        seed: u64,
    ) -> Self {
        Self {
            model,
            dispatcher,
            executor,
            clock,
            seed,
            spawned: 0,
        }
    }

    /// Returns the model currently in effect
    pub fn model(&self) -> WorkerModel {
        self.model
    }

    fn next_seed(&mut self) -> u64 {
        let seed = self
            .seed
            .wrapping_add(self.spawned.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        self.spawned += 1;
        seed
    }

    fn build(&mut self) -> Result<Box<dyn Worker>, SpawnError> {
        let seed = self.next_seed();
        match self.model {
            WorkerModel::Parallel => match ThreadWorker::spawn(self.dispatcher.clone(), seed) {
                Ok(worker) => Ok(Box::new(worker)),
                Err(err) => {
                    self.degrade(&err);
                    Ok(Box::new(self.build_cooperative(seed)))
                }
            },
            WorkerModel::Cooperative => Ok(Box::new(self.build_cooperative(seed))),
        }
    }

    fn build_cooperative(&self, seed: u64) -> VirtualWorker {
        VirtualWorker::new(
            self.dispatcher.clone(),
            self.executor.clone(),
            self.clock.clone(),
            seed,
        )
    }

    fn degrade(&mut self, _cause: &SpawnError) {
        self.model = WorkerModel::Cooperative;
    }
}

struct ManagedProcess {
    record: Process,
    worker: Box<dyn Worker>,
}

/// Owns every virtual process and its lifecycle
pub struct Scheduler {
    clock: KernelClock,
    factory: WorkerFactory,
    processes: HashMap<Pid, ManagedProcess>,
    next_pid: Pid,
    rng: StdRng,
}

impl Scheduler {
    /// Creates a scheduler with an empty process table
    pub fn new(factory: WorkerFactory, clock: KernelClock, seed: u64) -> Self {
        Self {
            clock,
            factory,
            processes: HashMap::new(),
            next_pid: Pid::FIRST,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a process and starts its execution loop
    ///
    /// The record enters the table in `Ready`; `start_all` moves it to
    /// `Running`. The owner is drawn at random from the fixed principal
    /// pool.
    pub fn create_process(
        &mut self,
        name: impl Into<String>,
        role: impl Into<String>,
        priority: u8,
    ) -> Result<Pid, SpawnError> {
        let name = name.into();
        let role = role.into();
        let pid = self.next_pid;
        let owner = PrincipalId::new(PRINCIPAL_POOL[self.rng.gen_range(0..PRINCIPAL_POOL.len())]);

        let mut worker = self.factory.build()?;
        worker.send(ControlMessage::Init(InitParams {
            pid,
            name: name.clone(),
            role: role.clone(),
            owner: owner.clone(),
        }));

        let record = Process {
            pid,
            name,
            role,
            owner,
            priority,
            state: ProcessState::Ready,
            created_at: self.clock.now(),
            cpu_time: Duration::ZERO,
        };
        self.processes.insert(pid, ManagedProcess { record, worker });
        self.next_pid = pid.next();
        Ok(pid)
    }

    /// Broadcasts `Resume` to every non-terminated process
    pub fn start_all(&mut self) {
        for process in self.processes.values_mut() {
            if !process.record.state.is_terminal() {
                process.record.state = ProcessState::Running;
                process.worker.send(ControlMessage::Resume);
            }
        }
    }

    /// Broadcasts `Stop` to every running process
    ///
    /// Idempotent: a second call finds nothing in `Running` and does
    /// nothing. In-flight requests already forwarded to the registry
    /// complete normally.
    pub fn pause_all(&mut self) {
        for process in self.processes.values_mut() {
            if process.record.state == ProcessState::Running {
                process.record.state = ProcessState::Paused;
                process.worker.send(ControlMessage::Stop);
            }
        }
    }

    /// Charges `dt` of cpu time to every running process
    ///
    /// Accounting only; worker loops self-schedule independently of ticks.
    pub fn tick(&mut self, dt: Duration) {
        for process in self.processes.values_mut() {
            if process.record.state.is_active() {
                process.record.cpu_time = process.record.cpu_time + dt;
            }
        }
    }

    /// Runs one manual accounting step
    pub fn step(&mut self) {
        self.tick(STEP_DT);
    }

    /// Marks a process terminated and shuts its worker down
    ///
    /// Returns false when the pid is unknown or already terminated.
    pub fn terminate(&mut self, pid: Pid) -> bool {
        match self.processes.get_mut(&pid) {
            Some(process) if !process.record.state.is_terminal() => {
                process.record.state = ProcessState::Terminated;
                process.worker.send(ControlMessage::Shutdown);
                true
            }
            _ => false,
        }
    }

    /// Returns read-only views of all processes, ordered by pid
    pub fn snapshots(&self) -> Vec<ProcessSnapshot> {
        let mut snapshots: Vec<ProcessSnapshot> = self
            .processes
            .values()
            .map(|process| process.record.snapshot())
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.pid);
        snapshots
    }

    /// Returns the number of processes ever created and still tracked
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Returns the lifecycle state of a process
    pub fn state_of(&self, pid: Pid) -> Option<ProcessState> {
        self.processes.get(&pid).map(|process| process.record.state)
    }

    /// Returns the execution model currently in effect
    pub fn model(&self) -> WorkerModel {
        self.factory.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::DiscardProcessLogs;
    use ipc_registry::{IpcRegistry, SharedRegistry};
    use std::sync::Arc;

    struct Rig {
        clock: KernelClock,
        executor: ExecutorHandle,
        registry: SharedRegistry,
        scheduler: Scheduler,
    }

    fn rig() -> Rig {
        let clock = KernelClock::new();
        let mut registry = IpcRegistry::new(clock.clone());
        registry.seed_default_channels().unwrap();
        let shared = registry.into_shared();
        let executor = ExecutorHandle::new();
        let dispatcher = Dispatcher::new(shared.clone(), Arc::new(DiscardProcessLogs));
        let factory = WorkerFactory::new(
            WorkerModel::Cooperative,
            dispatcher,
            executor.clone(),
            clock.clone(),
            99,
        );
        let scheduler = Scheduler::new(factory, clock.clone(), 99);
        Rig {
            clock,
            executor,
            registry: shared,
            scheduler,
        }
    }

    impl Rig {
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

    #[test]
    fn test_pids_are_monotonic_from_first() {
        let mut rig = rig();
        let a = rig.scheduler.create_process("a", "worker", 1).unwrap();
        let b = rig.scheduler.create_process("b", "worker", 1).unwrap();
        let c = rig.scheduler.create_process("c", "worker", 1).unwrap();

        assert_eq!(a, Pid::FIRST);
        assert_eq!(b, Pid::from_raw(1001));
        assert_eq!(c, Pid::from_raw(1002));
        assert_eq!(rig.scheduler.process_count(), 3);
    }

    #[test]
    fn test_owner_drawn_from_principal_pool() {
        let mut rig = rig();
        for i in 0..8 {
            rig.scheduler
                .create_process(format!("p{}", i), "worker", 1)
                .unwrap();
        }
        for snapshot in rig.scheduler.snapshots() {
            assert!(PRINCIPAL_POOL.contains(&snapshot.owner.as_str()));
        }
    }

    #[test]
    fn test_created_process_is_ready_until_started() {
        let mut rig = rig();
        let pid = rig.scheduler.create_process("p", "worker", 1).unwrap();
        assert_eq!(rig.scheduler.state_of(pid), Some(ProcessState::Ready));

        rig.scheduler.start_all();
        assert_eq!(rig.scheduler.state_of(pid), Some(ProcessState::Running));
    }

    #[test]
    fn test_pause_all_is_idempotent() {
        let mut rig = rig();
        let a = rig.scheduler.create_process("a", "worker", 1).unwrap();
        let b = rig.scheduler.create_process("b", "worker", 1).unwrap();
        rig.scheduler.start_all();

        rig.scheduler.pause_all();
        assert_eq!(rig.scheduler.state_of(a), Some(ProcessState::Paused));
        assert_eq!(rig.scheduler.state_of(b), Some(ProcessState::Paused));

        // The second pause finds nothing running and changes nothing.
        rig.scheduler.pause_all();
        assert_eq!(rig.scheduler.state_of(a), Some(ProcessState::Paused));
        assert_eq!(rig.scheduler.state_of(b), Some(ProcessState::Paused));
    }

    #[test]
    fn test_paused_fleet_goes_quiet() {
        let mut rig = rig();
        rig.scheduler.create_process("a", "worker", 1).unwrap();
        rig.scheduler.create_process("b", "worker", 1).unwrap();
        rig.scheduler.start_all();
        rig.pump(Duration::from_secs(30));

        rig.scheduler.pause_all();
        // Deliver the stops and drain any in-flight iteration.
        rig.pump(Duration::from_secs(2));
        let settled = rig.registry_log_len();

        rig.pump(Duration::from_secs(30));
        assert_eq!(rig.registry_log_len(), settled);
    }

    #[test]
    fn test_terminated_process_is_skipped_by_start_all() {
        let mut rig = rig();
        let keep = rig.scheduler.create_process("keep", "worker", 1).unwrap();
        let kill = rig.scheduler.create_process("kill", "worker", 1).unwrap();

        assert!(rig.scheduler.terminate(kill));
        assert!(!rig.scheduler.terminate(kill));

        rig.scheduler.start_all();
        assert_eq!(rig.scheduler.state_of(keep), Some(ProcessState::Running));
        assert_eq!(rig.scheduler.state_of(kill), Some(ProcessState::Terminated));
    }

    #[test]
    fn test_tick_charges_only_running_processes() {
        let mut rig = rig();
        let running = rig.scheduler.create_process("run", "worker", 1).unwrap();
        let idle = rig.scheduler.create_process("idle", "worker", 1).unwrap();

        rig.scheduler.start_all();
        rig.scheduler.pause_all();
        // Restart just one by terminating the other before starting again.
        rig.scheduler.terminate(idle);
        rig.scheduler.start_all();

        rig.scheduler.tick(Duration::from_millis(100));
        let snapshots = rig.scheduler.snapshots();
        let running_snap = snapshots.iter().find(|s| s.pid == running).unwrap();
        let idle_snap = snapshots.iter().find(|s| s.pid == idle).unwrap();

        assert_eq!(running_snap.cpu_time, Duration::from_millis(100));
        assert_eq!(idle_snap.cpu_time, Duration::ZERO);
    }

    #[test]
    fn test_step_charges_one_quantum() {
        let mut rig = rig();
        let pid = rig.scheduler.create_process("p", "worker", 1).unwrap();
        rig.scheduler.start_all();
        rig.scheduler.step();

        let snapshot = rig
            .scheduler
            .snapshots()
            .into_iter()
            .find(|s| s.pid == pid)
            .unwrap();
        assert_eq!(snapshot.cpu_time, STEP_DT);
    }

    #[test]
    fn test_factory_degradation_is_sticky() {
        let rig = rig();
        let dispatcher = Dispatcher::new(rig.registry.clone(), Arc::new(DiscardProcessLogs));
        let mut factory = WorkerFactory::new(
            WorkerModel::Parallel,
            dispatcher,
            rig.executor.clone(),
            rig.clock.clone(),
            1,
        );
        assert_eq!(factory.model(), WorkerModel::Parallel);

        factory.degrade(&SpawnError::WorkerCreationFailed("no threads".to_string()));
        assert_eq!(factory.model(), WorkerModel::Cooperative);

        // Subsequent builds stay cooperative.
        let _worker = factory.build().unwrap();
        assert_eq!(factory.model(), WorkerModel::Cooperative);
    }

    #[test]
    fn test_snapshots_sorted_by_pid() {
        let mut rig = rig();
        for i in 0..5 {
            rig.scheduler
                .create_process(format!("p{}", i), "worker", i as u8)
                .unwrap();
        }
        let snapshots = rig.scheduler.snapshots();
        let pids: Vec<u64> = snapshots.iter().map(|s| s.pid.as_raw()).collect();
        assert_eq!(pids, vec![1000, 1001, 1002, 1003, 1004]);
    }
}
