//! Thread-backed worker: the parallel execution model
//!
//! Each worker owns an OS thread and communicates with the scheduler side
//! purely by message passing; the only shared state is the registry mutex
//! behind the dispatcher. Loop iterations pace themselves on host time,
//! while audit stamps still come from the kernel clock.

use crate::scheduler::SpawnError;
use crate::worker::{ControlMessage, Dispatcher, LoopDirective, Worker, WorkerCore};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration as HostDuration;

/// A virtual process running on its own OS thread
pub struct ThreadWorker {
    sender: mpsc::Sender<ControlMessage>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    /// Spawns the worker thread
    ///
    /// Fails with [`SpawnError::WorkerCreationFailed`] when the underlying
    /// thread cannot be created; the factory reacts by degrading to the
    /// cooperative model.
    pub fn spawn(dispatcher: Dispatcher, seed: u64) -> Result<Self, SpawnError> {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("virtual-process".to_string())
            .spawn(move || Self::run(receiver, dispatcher, seed))
            .map_err(|err| SpawnError::WorkerCreationFailed(err.to_string()))?;
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    fn run(receiver: mpsc::Receiver<ControlMessage>, dispatcher: Dispatcher, seed: u64) {
        let mut core = WorkerCore::new(dispatcher, seed);
        // None parks the thread until the next control message.
        let mut wakeup: Option<HostDuration> = None;

        loop {
            let message = match wakeup {
                Some(timeout) => match receiver.recv_timeout(timeout) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                },
                None => match receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => return,
                },
            };

            match message {
                Some(message) => match core.handle(message) {
                    LoopDirective::Arm => wakeup = Some(HostDuration::ZERO),
                    LoopDirective::Disarm => wakeup = None,
                    LoopDirective::Shutdown => return,
                    LoopDirective::Ignore => {}
                },
                None => {
                    wakeup = core
                        .run_iteration()
                        .map(|delay| HostDuration::from_millis(delay.as_millis()));
                }
            }
        }
    }
}

impl Worker for ThreadWorker {
    fn send(&mut self, message: ControlMessage) {
        // A dead worker thread just means the message goes nowhere.
        let _ = self.sender.send(message);
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{InitParams, ProcessLogSink};
    use core_types::{KernelClock, Pid, PrincipalId};
    use ipc_registry::IpcRegistry;
    use std::sync::{Arc, Mutex};

    struct CollectingLogs {
        lines: Mutex<Vec<String>>,
    }

    impl ProcessLogSink for CollectingLogs {
        fn on_log(&self, _pid: Pid, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_thread_worker_initializes_and_shuts_down() {
        let mut registry = IpcRegistry::new(KernelClock::new());
        registry.seed_default_channels().unwrap();
        let logs = Arc::new(CollectingLogs {
            lines: Mutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::new(registry.into_shared(), logs.clone());

        let mut worker = ThreadWorker::spawn(dispatcher, 7).unwrap();
        worker.send(ControlMessage::Init(InitParams {
            pid: Pid::FIRST,
            name: "threaded".to_string(),
            role: "daemon".to_string(),
            owner: PrincipalId::new("admin"),
        }));

        // The init is handled as soon as the thread picks it up.
        let deadline = std::time::Instant::now() + HostDuration::from_secs(5);
        loop {
            if !logs.lines.lock().unwrap().is_empty() {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "worker never reported startup"
            );
            thread::sleep(HostDuration::from_millis(10));
        }
        assert!(logs.lines.lock().unwrap()[0].contains("started"));

        // Dropping joins the thread; the pending sleep is interrupted by
        // the shutdown message.
        drop(worker);
    }

    #[test]
    fn test_send_after_thread_exit_is_harmless() {
        let mut registry = IpcRegistry::new(KernelClock::new());
        registry.seed_default_channels().unwrap();
        let logs = Arc::new(CollectingLogs {
            lines: Mutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::new(registry.into_shared(), logs);

        let mut worker = ThreadWorker::spawn(dispatcher, 7).unwrap();
        worker.send(ControlMessage::Shutdown);
        if let Some(handle) = worker.handle.take() {
            handle.join().unwrap();
        }
        worker.send(ControlMessage::Resume);
    }
}
