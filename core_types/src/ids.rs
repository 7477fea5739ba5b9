//! Identifiers for processes and channels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a virtual process
///
/// Pids are assigned monotonically by the scheduler, starting at
/// [`Pid::FIRST`]. They are never reused within a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pid(u64);

impl Pid {
    /// The first pid the scheduler hands out.
    pub const FIRST: Pid = Pid(1000);

    /// Creates a pid from its raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns the pid that follows this one
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({})", self.0)
    }
}

/// Registry-unique name of an IPC channel
///
/// Channels are addressed by human-readable names (`pipe-1`, `shm-1`), not
/// by opaque handles; the well-known names are part of the simulation's
/// contract with its processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelName(String);

impl ChannelName {
    /// Creates a channel name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
