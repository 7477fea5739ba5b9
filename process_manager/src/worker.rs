//! The worker capability interface and the shared execution-loop behavior

use core_types::{ChannelName, Duration, Pid, PrincipalId};
use ipc::{IpcOp, IpcRequest, MessagePayload};
use ipc_registry::SharedRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Well-known pipe the worker loops write to.
pub const WELL_KNOWN_PIPE: &str = "pipe-1";

/// Well-known shared memory segment the worker loops scribble in.
pub const WELL_KNOWN_SEGMENT: &str = "shm-1";

/// Probability of a pipe write per loop iteration.
const PIPE_WRITE_PROBABILITY: f64 = 0.05;

/// Cumulative probability bound for a shared-memory write.
const SHM_WRITE_PROBABILITY: f64 = 0.10;

/// Worker loops scribble within the first bytes of the segment.
const SHM_SCRIBBLE_RANGE: i64 = 60;

/// Bounds of the randomized delay between loop iterations, in milliseconds.
const LOOP_DELAY_MIN_MS: u64 = 200;
const LOOP_DELAY_MAX_MS: u64 = 1000;

/// Which execution model backs the workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerModel {
    /// Dedicated OS thread per worker, message passing only
    Parallel,
    /// Cooperatively scheduled on the deferred executor
    Cooperative,
}

/// Identity handed to a worker at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParams {
    pub pid: Pid,
    pub name: String,
    pub role: String,
    pub owner: PrincipalId,
}

/// Control messages delivered to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    /// Assign identity and start the execution loop
    Init(InitParams),
    /// Restart the loop after a stop; no-op while already running
    Resume,
    /// Halt the loop; in-flight requests complete normally
    Stop,
    /// Tear the worker down for good
    Shutdown,
}

/// Events a worker emits toward the scheduler side
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Free-form process chatter for the external log sink
    Log(String),
    /// An IPC operation to forward to the registry
    IpcRequest(IpcRequest),
}

/// The single surface the scheduler uses to drive a worker
///
/// Both execution models implement this; nothing outside the factory knows
/// which one is behind the box.
pub trait Worker {
    fn send(&mut self, message: ControlMessage);
}

/// External sink for process log chatter
pub trait ProcessLogSink: Send + Sync {
    fn on_log(&self, pid: Pid, message: &str);
}

/// Sink that drops all process chatter
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardProcessLogs;

impl ProcessLogSink for DiscardProcessLogs {
    fn on_log(&self, _pid: Pid, _message: &str) {}
}

/// Routes worker events to the registry and the log sink
///
/// Cloned into every worker. IPC replies are discarded here; the registry
/// records the outcome, and the loop retries on its next iteration anyway.
/// Registry errors are absorbed for the same reason: no worker fault may
/// affect another process or the registry's availability.
#[derive(Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
    log_sink: Arc<dyn ProcessLogSink>,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared registry and a log sink
    pub fn new(registry: SharedRegistry, log_sink: Arc<dyn ProcessLogSink>) -> Self {
        Self { registry, log_sink }
    }

    /// Forwards one worker event
    pub fn dispatch(&self, pid: Pid, owner: &PrincipalId, event: WorkerEvent) {
        match event {
            WorkerEvent::Log(message) => self.log_sink.on_log(pid, &message),
            WorkerEvent::IpcRequest(request) => {
                if let Ok(mut registry) = self.registry.lock() {
                    let _ = registry.handle_request(pid, owner, &request);
                }
            }
        }
    }
}

/// What a control message asks the surrounding execution model to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopDirective {
    /// Start (or restart) iterating
    Arm,
    /// Cancel the pending iteration
    Disarm,
    /// Tear down the worker
    Shutdown,
    /// Nothing changes
    Ignore,
}

/// The execution-loop behavior shared by both worker models
///
/// Each iteration draws one random sample: with low probability it emits a
/// pipe write, with a further small probability a single-byte shared-memory
/// write at a random offset, otherwise nothing. The loop then asks to be
/// rescheduled after a randomized delay. This is intentionally the entire
/// behavior; the only state is the lifecycle flag and the identity.
pub(crate) struct WorkerCore {
    identity: Option<InitParams>,
    running: bool,
    rng: StdRng,
    dispatcher: Dispatcher,
}

impl WorkerCore {
    pub(crate) fn new(dispatcher: Dispatcher, seed: u64) -> Self {
        Self {
            identity: None,
            running: false,
            rng: StdRng::seed_from_u64(seed),
            dispatcher,
        }
    }

    /// Applies a control message and reports what the loop should do next
    pub(crate) fn handle(&mut self, message: ControlMessage) -> LoopDirective {
        match message {
            ControlMessage::Init(params) => {
                let started = format!(
                    "Process {} (pid {}) started",
                    params.name,
                    params.pid.as_raw()
                );
                self.identity = Some(params);
                self.emit(WorkerEvent::Log(started));
                if self.running {
                    LoopDirective::Ignore
                } else {
                    self.running = true;
                    LoopDirective::Arm
                }
            }
            ControlMessage::Resume => {
                if self.running {
                    LoopDirective::Ignore
                } else {
                    self.running = true;
                    LoopDirective::Arm
                }
            }
            ControlMessage::Stop => {
                self.running = false;
                LoopDirective::Disarm
            }
            ControlMessage::Shutdown => {
                self.running = false;
                LoopDirective::Shutdown
            }
        }
    }

    /// Runs one loop iteration
    ///
    /// Returns the delay until the next iteration, or `None` when the loop
    /// must not re-arm (stopped, or never initialized).
    pub(crate) fn run_iteration(&mut self) -> Option<Duration> {
        if !self.running {
            return None;
        }
        let Some(identity) = self.identity.clone() else {
            return None;
        };

        let roll: f64 = self.rng.gen();
        if roll < PIPE_WRITE_PROBABILITY {
            self.emit_for(
                &identity,
                WorkerEvent::IpcRequest(IpcRequest::new(
                    ChannelName::new(WELL_KNOWN_PIPE),
                    IpcOp::WritePipe {
                        payload: MessagePayload::text(format!(
                            "Msg from {}",
                            identity.pid.as_raw()
                        )),
                    },
                )),
            );
        } else if roll < SHM_WRITE_PROBABILITY {
            let offset = self.rng.gen_range(0..SHM_SCRIBBLE_RANGE);
            let byte = self.rng.gen_range(b'A'..=b'Z');
            self.emit_for(
                &identity,
                WorkerEvent::IpcRequest(IpcRequest::new(
                    ChannelName::new(WELL_KNOWN_SEGMENT),
                    IpcOp::WriteShm {
                        offset,
                        bytes: vec![byte],
                    },
                )),
            );
        }

        Some(Duration::from_millis(
            self.rng.gen_range(LOOP_DELAY_MIN_MS..LOOP_DELAY_MAX_MS),
        ))
    }

    fn emit(&self, event: WorkerEvent) {
        if let Some(identity) = &self.identity {
            self.dispatcher.dispatch(identity.pid, &identity.owner, event);
        }
    }

    fn emit_for(&self, identity: &InitParams, event: WorkerEvent) {
        self.dispatcher.dispatch(identity.pid, &identity.owner, event);
    }
}
