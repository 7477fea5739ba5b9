//! # IPC Registry
//!
//! Owns every channel in the simulation and mediates all access to them.
//!
//! ## Philosophy
//!
//! - **Single synchronization point**: every request runs its
//!   lookup-check-dispatch sequence inside one registry call. The system
//!   wraps the registry in a mutex, so a channel's read-modify-write can
//!   never interleave with another request.
//! - **Faults stay inside**: policy refusals and kind mismatches come back
//!   as structured error values; nothing propagates into the scheduler or
//!   other processes.
//! - **Everything is accounted**: each effectful operation bumps the global
//!   message counter, and each audit entry feeds the throughput window.

use audit::{LogOrigin, LogRing, LogSink, Severity, ThroughputCounter};
use core_types::{ChannelName, Instant, KernelClock, Pid, PrincipalId};
use ipc::{
    ChannelKind, ChannelState, IpcError, IpcOp, IpcReply, IpcRequest, Occupancy, Pipe,
    PriorityQueue, SharedMemorySegment,
};
use policy::{AccessDescriptor, AccessPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Registry wrapped in the mutex that serializes channel access.
pub type SharedRegistry = Arc<Mutex<IpcRegistry>>;

/// Errors from channel registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A channel with this name already exists; channels are never
    /// implicitly destroyed, so registration does not replace.
    #[error("channel already registered: {0}")]
    ChannelExists(ChannelName),
}

/// Creation options for a channel
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: ChannelName,
    pub kind: ChannelKind,
    /// Pipe capacity override
    pub capacity: Option<usize>,
    /// Shared memory size override, in bytes
    pub size: Option<usize>,
    /// Ownership descriptor; `None` means public
    pub descriptor: Option<AccessDescriptor>,
}

impl ChannelSpec {
    /// Describes a pipe with the default capacity
    pub fn pipe(name: impl Into<ChannelName>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Pipe,
            capacity: None,
            size: None,
            descriptor: None,
        }
    }

    /// Describes a priority queue
    pub fn queue(name: impl Into<ChannelName>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::PriorityQueue,
            capacity: None,
            size: None,
            descriptor: None,
        }
    }

    /// Describes a shared memory segment with the default size
    pub fn shared_memory(name: impl Into<ChannelName>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::SharedMemory,
            capacity: None,
            size: None,
            descriptor: None,
        }
    }

    /// Overrides the pipe capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Overrides the segment size
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Attaches an ownership descriptor
    pub fn owned_by(mut self, owner: impl Into<PrincipalId>) -> Self {
        self.descriptor = Some(AccessDescriptor {
            owner: owner.into(),
        });
        self
    }
}

/// Read-only view of a channel for external rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub name: ChannelName,
    pub kind: ChannelKind,
    pub descriptor: Option<AccessDescriptor>,
    pub occupancy: Occupancy,
}

struct ChannelEntry {
    state: ChannelState,
    descriptor: Option<AccessDescriptor>,
}

enum DispatchOutcome {
    Denied,
    Unsupported(ChannelKind),
    Done(IpcReply, Option<String>),
}

/// The channel table and everything that guards it
pub struct IpcRegistry {
    clock: KernelClock,
    policy: AccessPolicy,
    channels: HashMap<ChannelName, ChannelEntry>,
    log: LogRing,
    sinks: Vec<Box<dyn LogSink>>,
    messages_total: u64,
    throughput: ThroughputCounter,
}

impl IpcRegistry {
    /// Creates an empty registry on the given clock
    pub fn new(clock: KernelClock) -> Self {
        Self {
            clock,
            policy: AccessPolicy::new(),
            channels: HashMap::new(),
            log: LogRing::new(),
            sinks: Vec::new(),
            messages_total: 0,
            throughput: ThroughputCounter::new(),
        }
    }

    /// Wraps the registry for shared use
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Registers the simulation's well-known channels
    ///
    /// `pipe-1` and `shm-1` are owned by `admin`; `queue-1` by `user1`.
    pub fn seed_default_channels(&mut self) -> Result<(), RegistryError> {
        self.create_channel(ChannelSpec::pipe("pipe-1").owned_by("admin"))?;
        self.create_channel(ChannelSpec::queue("queue-1").owned_by("user1"))?;
        self.create_channel(
            ChannelSpec::shared_memory("shm-1")
                .with_size(ipc::DEFAULT_SEGMENT_SIZE)
                .owned_by("admin"),
        )?;
        Ok(())
    }

    /// Registers a new channel
    pub fn create_channel(&mut self, spec: ChannelSpec) -> Result<(), RegistryError> {
        if self.channels.contains_key(&spec.name) {
            return Err(RegistryError::ChannelExists(spec.name));
        }

        let state = match spec.kind {
            ChannelKind::Pipe => ChannelState::Pipe(match spec.capacity {
                Some(capacity) => Pipe::with_capacity(capacity),
                None => Pipe::new(),
            }),
            ChannelKind::PriorityQueue => ChannelState::PriorityQueue(PriorityQueue::new()),
            ChannelKind::SharedMemory => ChannelState::SharedMemory(match spec.size {
                Some(size) => SharedMemorySegment::with_size(size),
                None => SharedMemorySegment::new(),
            }),
        };

        let detail = format!("Created {} channel: {}", spec.kind, spec.name);
        self.channels.insert(
            spec.name,
            ChannelEntry {
                state,
                descriptor: spec.descriptor,
            },
        );
        self.log_action(LogOrigin::System, "CREATE_CHANNEL", detail, Severity::Info);
        Ok(())
    }

    /// Routes one request: lookup, policy check, dispatch, audit
    ///
    /// Capacity and bounds rejections come back as `Accepted(false)`, not
    /// as errors. Empty reads and dequeues are not logged, to bound log
    /// volume.
    pub fn handle_request(
        &mut self,
        pid: Pid,
        owner: &PrincipalId,
        request: &IpcRequest,
    ) -> Result<IpcReply, IpcError> {
        let now = self.clock.now();
        let op = request.op.code();

        let outcome = match self.channels.get_mut(&request.target) {
            None => return Err(IpcError::ChannelNotFound(request.target.clone())),
            Some(entry) => {
                if !self.policy.check(entry.descriptor.as_ref(), op, owner) {
                    DispatchOutcome::Denied
                } else {
                    Self::dispatch(&request.target, entry, &request.op, now)
                }
            }
        };

        match outcome {
            DispatchOutcome::Denied => {
                self.log_action(
                    LogOrigin::Process(pid),
                    op.as_str(),
                    format!("Access denied to {}", request.target),
                    Severity::Error,
                );
                Err(IpcError::AccessDenied {
                    channel: request.target.clone(),
                    principal: owner.clone(),
                })
            }
            DispatchOutcome::Unsupported(kind) => Err(IpcError::UnsupportedOperation {
                op,
                kind,
                channel: request.target.clone(),
            }),
            DispatchOutcome::Done(reply, detail) => {
                if let Some(detail) = detail {
                    self.log_action(LogOrigin::Process(pid), op.as_str(), detail, Severity::Info);
                }
                if reply.is_effectful() {
                    self.messages_total += 1;
                }
                Ok(reply)
            }
        }
    }

    fn dispatch(
        name: &ChannelName,
        entry: &mut ChannelEntry,
        op: &IpcOp,
        now: Instant,
    ) -> DispatchOutcome {
        match (op, &mut entry.state) {
            (IpcOp::WritePipe { payload }, ChannelState::Pipe(pipe)) => {
                let accepted = pipe.write(payload.clone());
                let detail = if accepted {
                    format!("Wrote to pipe {}", name)
                } else {
                    format!("Write to pipe {} rejected (full)", name)
                };
                DispatchOutcome::Done(IpcReply::Accepted(accepted), Some(detail))
            }
            (IpcOp::ReadPipe, ChannelState::Pipe(pipe)) => {
                let payload = pipe.read();
                let detail = payload
                    .as_ref()
                    .map(|_| format!("Read from pipe {}", name));
                DispatchOutcome::Done(IpcReply::Payload(payload), detail)
            }
            (
                IpcOp::Enqueue {
                    payload,
                    priority,
                    ttl,
                },
                ChannelState::PriorityQueue(queue),
            ) => {
                queue.enqueue(payload.clone(), *priority, *ttl, now);
                DispatchOutcome::Done(
                    IpcReply::Accepted(true),
                    Some(format!("Enqueued message to {}", name)),
                )
            }
            (IpcOp::Dequeue, ChannelState::PriorityQueue(queue)) => {
                let item = queue.dequeue(now);
                let detail = item.as_ref().map(|_| format!("Dequeued from {}", name));
                DispatchOutcome::Done(IpcReply::Item(item), detail)
            }
            (IpcOp::WriteShm { offset, bytes }, ChannelState::SharedMemory(segment)) => {
                let accepted = segment.write(*offset, bytes);
                let detail = if accepted {
                    format!("Wrote {} bytes to shm {} at offset {}", bytes.len(), name, offset)
                } else {
                    format!("Write to shm {} at offset {} rejected (out of range)", name, offset)
                };
                DispatchOutcome::Done(IpcReply::Accepted(accepted), Some(detail))
            }
            (_, state) => DispatchOutcome::Unsupported(state.kind()),
        }
    }

    fn log_action(
        &mut self,
        origin: LogOrigin,
        operation: &str,
        detail: String,
        severity: Severity,
    ) {
        let now = self.clock.now();
        let entry = self.log.append(now, origin, operation, detail, severity);
        self.throughput.record(now);
        for sink in &self.sinks {
            sink.on_entry(&entry);
        }
    }

    /// Registers an audit subscriber
    pub fn subscribe(&mut self, sink: Box<dyn LogSink>) {
        self.sinks.push(sink);
    }

    /// Enables or disables access enforcement
    pub fn set_enforcement(&mut self, enforced: bool) {
        self.policy.set_enforced(enforced);
    }

    /// Flips access enforcement and returns the new state
    pub fn toggle_enforcement(&mut self) -> bool {
        self.policy.toggle()
    }

    /// Returns whether access enforcement is enabled
    pub fn is_enforced(&self) -> bool {
        self.policy.is_enforced()
    }

    /// Total count of effectful operations since boot
    pub fn messages_total(&self) -> u64 {
        self.messages_total
    }

    /// Audit entries within the trailing one-second window
    pub fn throughput(&mut self) -> usize {
        let now = self.clock.now();
        self.throughput.rate(now)
    }

    /// Returns the audit ring
    pub fn log(&self) -> &LogRing {
        &self.log
    }

    /// Returns the number of registered channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Read-only channel views, sorted by name
    pub fn channel_snapshots(&self) -> Vec<ChannelSnapshot> {
        let mut snapshots: Vec<ChannelSnapshot> = self
            .channels
            .iter()
            .map(|(name, entry)| ChannelSnapshot {
                name: name.clone(),
                kind: entry.state.kind(),
                descriptor: entry.descriptor.clone(),
                occupancy: entry.state.occupancy(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        snapshots
    }

    /// Returns the clock the registry stamps entries with
    pub fn clock(&self) -> &KernelClock {
        &self.clock
    }
}
