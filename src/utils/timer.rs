use crossbeam::channel::{after, unbounded, Receiver, Sender};
use crossbeam::select;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{ModelError, ModelResult};

enum TimerCommand {
    Schedule { delay: Duration, generation: u64 },
    Cancel,
    Shutdown,
}

/// Cancellable one-shot delayed callback on a dedicated worker thread.
///
/// At most one deadline is armed at a time; scheduling replaces any armed
/// deadline. Cancellation is best-effort: a callback that already started
/// firing completes, so callers gate on the generation value they passed to
/// [`OneShotTimer::schedule`].
pub(crate) struct OneShotTimer {
    commands: Sender<TimerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    pub fn spawn<F>(name: &str, on_fire: F) -> ModelResult<Self>
    where
        F: Fn(u64) + Send + 'static,
    {
        let (commands, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(receiver, on_fire))
            .map_err(|e| ModelError::SystemError(format!("failed to spawn timer thread: {}", e)))?;
        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    pub fn schedule(&self, delay: Duration, generation: u64) {
        let _ = self.commands.send(TimerCommand::Schedule { delay, generation });
    }

    pub fn cancel(&self) {
        let _ = self.commands.send(TimerCommand::Cancel);
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop<F: Fn(u64)>(receiver: Receiver<TimerCommand>, on_fire: F) {
    let mut armed: Option<(Receiver<Instant>, u64)> = None;
    loop {
        match armed.take() {
            None => match receiver.recv() {
                Ok(TimerCommand::Schedule { delay, generation }) => {
                    armed = Some((after(delay), generation));
                }
                Ok(TimerCommand::Cancel) => {}
                Ok(TimerCommand::Shutdown) | Err(_) => return,
            },
            Some((deadline, generation)) => {
                select! {
                    recv(receiver) -> command => match command {
                        Ok(TimerCommand::Schedule { delay, generation }) => {
                            armed = Some((after(delay), generation));
                        }
                        Ok(TimerCommand::Cancel) => {}
                        Ok(TimerCommand::Shutdown) | Err(_) => return,
                    },
                    recv(deadline) -> _ => on_fire(generation),
                }
            }
        }
    }
}
