//! # Core Types
//!
//! Shared vocabulary for the kernlab simulation: identifiers for processes,
//! principals and channels, plus the virtual time base everything else is
//! stamped with.
//!
//! ## Philosophy
//!
//! - **Identifiers are typed**: a `Pid` cannot be confused with a priority
//!   or a byte offset.
//! - **Time is virtual**: the simulation advances its own clock; nothing in
//!   the core reads wall-clock time directly.

pub mod ids;
pub mod principal;
pub mod time;

pub use ids::{ChannelName, Pid};
pub use principal::PrincipalId;
pub use time::{Duration, Instant, KernelClock};
