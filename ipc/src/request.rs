//! Request/reply vocabulary for channel operations

use crate::channel::{ChannelKind, QueuedMessage};
use crate::payload::MessagePayload;
use core_types::{ChannelName, Duration, PrincipalId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an IPC request
///
/// Carried for audit correlation; the registry itself routes by target
/// name, not by request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random request ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Req({})", self.0)
    }
}

/// Flat operation code, used by the access policy and audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    WritePipe,
    ReadPipe,
    Enqueue,
    Dequeue,
    WriteShm,
}

impl OpCode {
    /// Returns the operation name as it appears in audit entries
    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::WritePipe => "WRITE_PIPE",
            OpCode::ReadPipe => "READ_PIPE",
            OpCode::Enqueue => "ENQUEUE",
            OpCode::Dequeue => "DEQUEUE",
            OpCode::WriteShm => "WRITE_SHM",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A channel operation with its operands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcOp {
    /// Append a payload to a pipe
    WritePipe { payload: MessagePayload },
    /// Remove the oldest payload from a pipe
    ReadPipe,
    /// Insert an item into a priority queue
    Enqueue {
        payload: MessagePayload,
        priority: i64,
        ttl: Option<Duration>,
    },
    /// Remove the head item from a priority queue
    Dequeue,
    /// Write bytes into a shared memory segment
    WriteShm { offset: i64, bytes: Vec<u8> },
}

impl IpcOp {
    /// Returns the flat operation code
    pub fn code(&self) -> OpCode {
        match self {
            IpcOp::WritePipe { .. } => OpCode::WritePipe,
            IpcOp::ReadPipe => OpCode::ReadPipe,
            IpcOp::Enqueue { .. } => OpCode::Enqueue,
            IpcOp::Dequeue => OpCode::Dequeue,
            IpcOp::WriteShm { .. } => OpCode::WriteShm,
        }
    }
}

/// A request against a named channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    /// Correlation id for audit
    pub id: RequestId,
    /// The channel the operation targets
    pub target: ChannelName,
    /// The operation and its operands
    pub op: IpcOp,
}

impl IpcRequest {
    /// Creates a request with a fresh id
    pub fn new(target: ChannelName, op: IpcOp) -> Self {
        Self {
            id: RequestId::new(),
            target,
            op,
        }
    }
}

/// Result of a dispatched channel operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcReply {
    /// Write-class outcome: true when applied, false on backpressure or
    /// bounds rejection
    Accepted(bool),
    /// Pipe read outcome
    Payload(Option<MessagePayload>),
    /// Queue dequeue outcome
    Item(Option<QueuedMessage>),
}

impl IpcReply {
    /// Returns whether the operation had an effect or produced data
    ///
    /// Exactly these replies count toward the registry's global message
    /// counter.
    pub fn is_effectful(&self) -> bool {
        match self {
            IpcReply::Accepted(applied) => *applied,
            IpcReply::Payload(payload) => payload.is_some(),
            IpcReply::Item(item) => item.is_some(),
        }
    }
}

/// Structured failures surfaced by the registry
///
/// Capacity and bounds violations are not errors; they come back as
/// `IpcReply::Accepted(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    /// The target channel is not registered
    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelName),

    /// The access policy refused the operation
    #[error("access denied to {channel} for principal {principal}")]
    AccessDenied {
        channel: ChannelName,
        principal: PrincipalId,
    },

    /// The operation does not apply to the channel's kind
    #[error("operation {op} not supported by {kind} channel {channel}")]
    UnsupportedOperation {
        op: OpCode,
        kind: ChannelKind,
        channel: ChannelName,
    },
}
