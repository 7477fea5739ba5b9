//! # IPC Channels
//!
//! The three channel kinds of the simulation and the request/reply
//! vocabulary spoken over them.
//!
//! ## Philosophy
//!
//! - **Typed operations**: a request is an enum, not a string + blob; the
//!   registry dispatches on structure, not on convention.
//! - **Backpressure is a value**: capacity and bounds violations are
//!   reported as a negative result, never as a fault. Callers drop the
//!   attempt and retry on their own schedule.
//! - **No hidden clocks**: every time-dependent operation takes `now`
//!   explicitly, so channel behavior is reproducible under test.

pub mod channel;
pub mod payload;
pub mod request;

pub use channel::{
    ChannelKind, ChannelState, Occupancy, Pipe, PriorityQueue, QueuedMessage, SharedMemorySegment,
    DEFAULT_PIPE_CAPACITY, DEFAULT_SEGMENT_SIZE,
};
pub use payload::MessagePayload;
pub use request::{IpcError, IpcOp, IpcReply, IpcRequest, OpCode, RequestId};
