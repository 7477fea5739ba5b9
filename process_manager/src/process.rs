//! Process records and lifecycle states

use core_types::{Duration, Instant, Pid, PrincipalId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a virtual process
///
/// Transitions: `Ready -> Running <-> Paused`, and any state to
/// `Terminated` on explicit removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Created but not yet started
    Ready,
    /// Actively scheduled; accumulates cpu time on every tick
    Running,
    /// Stopped; the worker loop no longer re-arms
    Paused,
    /// Removed from scheduling permanently
    Terminated,
}

impl ProcessState {
    /// Returns the state name as displayed externally
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Paused => "PAUSED",
            ProcessState::Terminated => "TERMINATED",
        }
    }

    /// Checks if the process can never run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Terminated)
    }

    /// Checks if the process is actively scheduled
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The scheduler-owned record of a virtual process
///
/// Only the scheduler mutates this; the worker loop communicates solely by
/// emitting events.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    /// Free-form role tag for display
    pub role: String,
    /// The principal this process runs as
    pub owner: PrincipalId,
    pub priority: u8,
    pub state: ProcessState,
    pub created_at: Instant,
    /// Time spent in the Running state, accumulated by ticks
    pub cpu_time: Duration,
}

impl Process {
    /// Returns a read-only view for external rendering
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            pid: self.pid,
            name: self.name.clone(),
            role: self.role.clone(),
            owner: self.owner.clone(),
            priority: self.priority,
            state: self.state,
            created_at: self.created_at,
            cpu_time: self.cpu_time,
        }
    }
}

/// Read-only view of a process for external rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub role: String,
    pub owner: PrincipalId,
    pub priority: u8,
    pub state: ProcessState,
    pub created_at: Instant,
    pub cpu_time: Duration,
}
