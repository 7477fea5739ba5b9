//! The three channel kinds: pipe, priority queue, shared memory segment

use crate::payload::MessagePayload;
use core_types::{Duration, Instant, Pid};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Default capacity of a pipe, in messages.
pub const DEFAULT_PIPE_CAPACITY: usize = 10;

/// Default size of a shared memory segment, in bytes.
pub const DEFAULT_SEGMENT_SIZE: usize = 1024;

/// Discriminant for the channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Bounded point-to-point FIFO
    Pipe,
    /// Unbounded queue ordered by priority with optional expiry
    PriorityQueue,
    /// Fixed-size byte buffer written at caller-chosen offsets
    SharedMemory,
}

impl ChannelKind {
    /// Returns the short kind name used in audit entries
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Pipe => "pipe",
            ChannelKind::PriorityQueue => "queue",
            ChannelKind::SharedMemory => "shm",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bounded FIFO pipe
///
/// A full pipe rejects the write and leaves its contents unchanged; that
/// rejection is the backpressure signal. Nothing blocks and nothing retries
/// on the pipe's behalf.
#[derive(Debug, Clone)]
pub struct Pipe {
    capacity: usize,
    buffer: VecDeque<MessagePayload>,
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipe {
    /// Creates a pipe with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PIPE_CAPACITY)
    }

    /// Creates a pipe with the specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::new(),
        }
    }

    /// Appends a payload, or returns false when the pipe is full
    pub fn write(&mut self, payload: MessagePayload) -> bool {
        if self.buffer.len() >= self.capacity {
            return false;
        }
        self.buffer.push_back(payload);
        true
    }

    /// Removes and returns the oldest payload
    pub fn read(&mut self) -> Option<MessagePayload> {
        self.buffer.pop_front()
    }

    /// Returns the configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of queued payloads
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns whether the pipe is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// An item queued in a [`PriorityQueue`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// The carried payload
    pub payload: MessagePayload,
    /// Higher values dequeue first
    pub priority: i64,
    /// When the item entered the queue
    pub enqueued_at: Instant,
    /// Optional time-to-live; expired items are dropped at dequeue time
    pub ttl: Option<Duration>,
}

impl QueuedMessage {
    /// Returns whether the item's ttl has elapsed at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.enqueued_at) > ttl,
            None => false,
        }
    }
}

/// Unbounded priority queue with per-item expiry
///
/// Invariant: the backing deque is always sorted highest-priority first,
/// with FIFO order among equal priorities.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    items: VecDeque<QueuedMessage>,
}

impl PriorityQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item, stamping its enqueue time
    ///
    /// Always succeeds; the queue is unbounded. The sort is stable, so
    /// equal-priority items keep their arrival order.
    pub fn enqueue(
        &mut self,
        payload: MessagePayload,
        priority: i64,
        ttl: Option<Duration>,
        now: Instant,
    ) -> bool {
        self.items.push_back(QueuedMessage {
            payload,
            priority,
            enqueued_at: now,
            ttl,
        });
        self.items
            .make_contiguous()
            .sort_by(|a, b| b.priority.cmp(&a.priority));
        true
    }

    /// Removes and returns the head item, purging expired items first
    ///
    /// Expired items are silently dropped; they are neither returned nor
    /// reported individually.
    pub fn dequeue(&mut self, now: Instant) -> Option<QueuedMessage> {
        while let Some(head) = self.items.front() {
            if head.is_expired(now) {
                self.items.pop_front();
            } else {
                break;
            }
        }
        self.items.pop_front()
    }

    /// Returns the number of queued items, including not-yet-purged expired ones
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fixed-size shared memory segment
///
/// Writes land at caller-specified offsets. A write that starts out of
/// bounds fails; a write that starts in bounds but runs past the end is
/// silently truncated at the buffer boundary.
#[derive(Debug, Clone)]
pub struct SharedMemorySegment {
    data: Vec<u8>,
    /// Per-offset lock table reserved for owner-tracked locking. The write
    /// path does not consult it.
    #[allow(dead_code)]
    locks: HashMap<usize, Pid>,
}

impl SharedMemorySegment {
    /// Creates a segment with the default size
    pub fn new() -> Self {
        Self::with_size(DEFAULT_SEGMENT_SIZE)
    }

    /// Creates a segment with the specified size in bytes
    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
            locks: HashMap::new(),
        }
    }

    /// Writes bytes at the given offset
    ///
    /// Returns false when `offset` lies outside `[0, size)`; the buffer is
    /// left unchanged. Otherwise writes as many bytes as fit before the end
    /// of the buffer and returns true, even when the tail was truncated.
    pub fn write(&mut self, offset: i64, bytes: &[u8]) -> bool {
        if offset < 0 {
            return false;
        }
        let offset = offset as usize;
        if offset >= self.data.len() {
            return false;
        }
        let writable = (self.data.len() - offset).min(bytes.len());
        self.data[offset..offset + writable].copy_from_slice(&bytes[..writable]);
        true
    }

    /// Returns the segment size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the segment contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for SharedMemorySegment {
    fn default() -> Self {
        Self::new()
    }
}

/// A channel's kind-specific state
#[derive(Debug, Clone)]
pub enum ChannelState {
    Pipe(Pipe),
    PriorityQueue(PriorityQueue),
    SharedMemory(SharedMemorySegment),
}

impl ChannelState {
    /// Returns the kind discriminant
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelState::Pipe(_) => ChannelKind::Pipe,
            ChannelState::PriorityQueue(_) => ChannelKind::PriorityQueue,
            ChannelState::SharedMemory(_) => ChannelKind::SharedMemory,
        }
    }

    /// Returns the current occupancy for read-only snapshots
    pub fn occupancy(&self) -> Occupancy {
        match self {
            ChannelState::Pipe(pipe) => Occupancy {
                used: pipe.len(),
                capacity: Some(pipe.capacity()),
            },
            ChannelState::PriorityQueue(queue) => Occupancy {
                used: queue.len(),
                capacity: None,
            },
            ChannelState::SharedMemory(segment) => Occupancy {
                used: segment.size(),
                capacity: Some(segment.size()),
            },
        }
    }
}

/// How full a channel is, for external rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// Items or bytes currently held
    pub used: usize,
    /// Upper bound, if the channel has one
    pub capacity: Option<usize>,
}
