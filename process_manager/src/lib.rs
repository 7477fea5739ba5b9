//! # Process Manager
//!
//! Virtual processes, their lifecycle, and the scheduler that owns them.
//!
//! ## Philosophy
//!
//! - **One capability interface, two execution models**: a worker is either
//!   a dedicated OS thread or a cooperatively-scheduled task on the deferred
//!   executor. The scheduler talks to both through the same [`Worker`]
//!   trait and never branches on which is in use.
//! - **Records belong to the scheduler**: a worker loop emits requests; it
//!   never mutates its own process record.
//! - **Pause is a cancellation, not a flag race**: cooperative loops re-arm
//!   through a cancellable timer handle, so stopping a process removes the
//!   pending wakeup instead of hoping a flag is checked first.

pub mod executor;
pub mod process;
pub mod scheduler;
pub mod thread_worker;
pub mod virtual_worker;
pub mod worker;

pub use executor::{ExecutorHandle, TimerId};
pub use process::{Process, ProcessSnapshot, ProcessState};
pub use scheduler::{Scheduler, SpawnError, WorkerFactory, PRINCIPAL_POOL};
pub use thread_worker::ThreadWorker;
pub use virtual_worker::VirtualWorker;
pub use worker::{
    ControlMessage, Dispatcher, DiscardProcessLogs, InitParams, ProcessLogSink, Worker,
    WorkerEvent, WorkerModel,
};
