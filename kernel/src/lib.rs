//! # Kernel Facade
//!
//! Composes the clock, executor, registry and scheduler into one system
//! and exposes the external control surface: create process, create
//! channel, start all, pause all, single-step, and the access-enforcement
//! toggle. Everything else the outside world sees is a read-only snapshot.
//!
//! Two pumps drive the simulation: [`System::run_for`] fast-forwards
//! virtual time (the natural mode for tests and headless runs), while
//! [`System::run_realtime`] keeps the virtual clock in lockstep with host
//! time so thread-backed workers and audit stamps stay coherent.

use core_types::{Duration, Instant, KernelClock, Pid};
use ipc_registry::{IpcRegistry, SharedRegistry};
use process_manager::{Dispatcher, DiscardProcessLogs, ExecutorHandle, Scheduler, WorkerFactory};
use std::sync::{Arc, MutexGuard};

pub use audit::{LogEntry, LogSink, Severity};
pub use ipc::{ChannelKind, Occupancy};
pub use ipc_registry::{ChannelSnapshot, ChannelSpec, RegistryError};
pub use policy::AccessDescriptor;
pub use process_manager::{
    ProcessLogSink, ProcessSnapshot, ProcessState, SpawnError, WorkerModel,
};

/// Construction-time configuration of a [`System`]
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Execution model for all workers; chosen once, never per process
    pub model: WorkerModel,
    /// Seed for every random decision in the simulation
    pub seed: u64,
    /// Whether access enforcement starts enabled
    pub enforce_access: bool,
    /// Whether to register the well-known default channels
    pub seed_default_channels: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            model: WorkerModel::Cooperative,
            seed: 0,
            enforce_access: false,
            seed_default_channels: true,
        }
    }
}

/// The assembled simulation
pub struct System {
    clock: KernelClock,
    executor: ExecutorHandle,
    registry: SharedRegistry,
    scheduler: Scheduler,
}

impl System {
    /// Builds a system that discards process chatter
    pub fn new(config: SystemConfig) -> Self {
        Self::with_process_log(config, Arc::new(DiscardProcessLogs))
    }

    /// Builds a system routing process chatter to the given sink
    pub fn with_process_log(config: SystemConfig, sink: Arc<dyn ProcessLogSink>) -> Self {
        let clock = KernelClock::new();
        let executor = ExecutorHandle::new();

        let mut registry = IpcRegistry::new(clock.clone());
        registry.set_enforcement(config.enforce_access);
        if config.seed_default_channels {
            registry
                .seed_default_channels()
                .expect("fresh registry cannot contain channels");
        }
        let registry = registry.into_shared();

        let dispatcher = Dispatcher::new(registry.clone(), sink);
        let factory = WorkerFactory::new(
            config.model,
            dispatcher,
            executor.clone(),
            clock.clone(),
            config.seed,
        );
        let scheduler = Scheduler::new(factory, clock.clone(), config.seed);

        Self {
            clock,
            executor,
            registry,
            scheduler,
        }
    }

    fn registry(&self) -> MutexGuard<'_, IpcRegistry> {
        self.registry.lock().expect("registry mutex poisoned")
    }

    // ---- control surface ----

    /// Creates a virtual process
    pub fn create_process(
        &mut self,
        name: impl Into<String>,
        role: impl Into<String>,
        priority: u8,
    ) -> Result<Pid, SpawnError> {
        self.scheduler.create_process(name, role, priority)
    }

    /// Registers a new channel
    pub fn create_channel(&mut self, spec: ChannelSpec) -> Result<(), RegistryError> {
        self.registry().create_channel(spec)
    }

    /// Starts every non-terminated process
    pub fn start_all(&mut self) {
        self.scheduler.start_all();
    }

    /// Pauses every running process
    pub fn pause_all(&mut self) {
        self.scheduler.pause_all();
    }

    /// Runs one manual accounting step
    pub fn step(&mut self) {
        self.scheduler.step();
    }

    /// Enables or disables access enforcement
    pub fn set_enforcement(&mut self, enforced: bool) {
        self.registry().set_enforcement(enforced);
    }

    /// Flips access enforcement and returns the new state
    pub fn toggle_enforcement(&mut self) -> bool {
        self.registry().toggle_enforcement()
    }

    /// Returns whether access enforcement is enabled
    pub fn is_enforced(&self) -> bool {
        self.registry().is_enforced()
    }

    /// Registers an audit subscriber
    pub fn subscribe(&self, sink: Box<dyn LogSink>) {
        self.registry().subscribe(sink);
    }

    // ---- read-only surface ----

    /// Current instant on the simulation timeline
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// The execution model currently in effect
    pub fn model(&self) -> WorkerModel {
        self.scheduler.model()
    }

    /// Read-only views of all processes, ordered by pid
    pub fn process_snapshots(&self) -> Vec<ProcessSnapshot> {
        self.scheduler.snapshots()
    }

    /// Read-only views of all channels, ordered by name
    pub fn channel_snapshots(&self) -> Vec<ChannelSnapshot> {
        self.registry().channel_snapshots()
    }

    /// Total count of effectful operations since boot
    pub fn messages_total(&self) -> u64 {
        self.registry().messages_total()
    }

    /// Audit entries within the trailing one-second window
    pub fn throughput(&self) -> usize {
        self.registry().throughput()
    }

    /// The most recent audit entries, newest first
    pub fn recent_log(&self, n: usize) -> Vec<LogEntry> {
        self.registry()
            .log()
            .recent(n)
            .into_iter()
            .cloned()
            .collect()
    }

    // ---- pumps ----

    /// Fast-forwards virtual time, firing due timers along the way
    ///
    /// Cooperative workers advance exactly as far as the clock does.
    /// Thread-backed workers pace themselves on host time and are not
    /// accelerated by this pump.
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = self.clock.now() + duration;
        while self.clock.now() < deadline {
            let now = self.clock.now();
            let target = match self.executor.next_deadline() {
                Some(at) if at < deadline => at,
                _ => deadline,
            };
            if target > now {
                let step = target.duration_since(now);
                self.clock.advance(step);
                self.scheduler.tick(step);
            }
            self.executor.run_due(self.clock.now());
        }
    }

    /// Advances virtual time in lockstep with host time
    ///
    /// Sleeps the calling thread one `slice` at a time for `duration`
    /// total, pumping timers and accounting each slice.
    pub fn run_realtime(&mut self, duration: Duration, slice: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            std::thread::sleep(std::time::Duration::from_millis(slice.as_millis()));
            self.clock.advance(slice);
            self.scheduler.tick(slice);
            self.executor.run_due(self.clock.now());
            elapsed = elapsed + slice;
        }
    }
}
