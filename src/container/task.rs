use crate::Context;
use crossbeam_channel::{at, bounded, never, Receiver, Select};
use derive_more::{Display, Error};
use parking_lot::Mutex;
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    thread::{self, JoinHandle},
};
use tracing::warn;

/// A task did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TaskError {
    /// The context deadline passed first.
    #[display(fmt = "{} wait: deadline exceeded", group)]
    Timeout {
        /// The name of the task group.
        group: String,
    },

    /// The context was cancelled first.
    #[display(fmt = "{} wait: context canceled", group)]
    Cancelled {
        /// The name of the task group.
        group: String,
    },

    /// The task panicked.
    #[display(fmt = "{} task panicked: {}", group, message)]
    Panicked {
        /// The name of the task group.
        group: String,
        /// The panic message.
        message: String,
    },

    /// No thread could be spawned for the task.
    #[display(fmt = "{} failed to spawn a task: {}", group, message)]
    Spawn {
        /// The name of the task group.
        group: String,
        /// Why spawning failed.
        message: String,
    },
}

/// Runs tasks on named worker threads.
///
/// Waiting for a task can be cut short by the context. The task keeps
/// running in that case, and its result is dropped when it finishes. Such
/// detached workers are joined by [`reap`](TaskGroup::reap).
#[derive(Debug)]
pub struct TaskGroup {
    name: String,
    detached: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskGroup {
    /// Creates a task group. Worker threads are named after it.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        TaskGroup {
            name: name.into(),
            detached: Mutex::new(Vec::new()),
        }
    }

    /// The name of the group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs a task on a new worker thread. The returned channel receives
    /// exactly one message: the task's result or its panic message.
    pub fn go<F, T>(&self, task: F) -> Result<Receiver<Result<T, TaskError>>, TaskError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (handle, results) = self.spawn(task)?;
        self.detached.lock().push(handle);
        Ok(results)
    }

    /// Runs a task on a new worker thread and waits until it finishes, the
    /// context deadline passes, or the context is cancelled.
    pub fn go_and_wait<F, T>(&self, context: &Context, task: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if context.is_cancelled() {
            return Err(self.cancelled());
        }

        let (handle, results) = self.spawn(task)?;
        let deadline = context.deadline().map_or_else(never, at);
        let done = context.done();

        let mut select = Select::new();
        let result_index = select.recv(&results);
        let deadline_index = select.recv(&deadline);
        for receiver in done {
            select.recv(receiver);
        }

        let operation = select.select();
        let index = operation.index();
        if index == result_index {
            let result = operation.recv(&results);
            if handle.join().is_err() {
                warn!(group = %self.name, "worker thread panicked after reporting");
            }
            return result.unwrap_or_else(|_| Err(self.panicked("worker exited silently")));
        }

        let error = if index == deadline_index {
            let _ = operation.recv(&deadline);
            TaskError::Timeout {
                group: self.name.clone(),
            }
        } else {
            // Cancellation receivers were registered after the first two
            let _ = operation.recv(&done[index - 2]);
            self.cancelled()
        };
        self.detached.lock().push(handle);
        Err(error)
    }

    /// Joins workers that have finished since they were detached.
    pub fn reap(&self) {
        let finished: Vec<JoinHandle<()>> = {
            let mut detached = self.detached.lock();
            let (finished, running) = detached
                .drain(..)
                .partition(|handle: &JoinHandle<()>| handle.is_finished());
            *detached = running;
            finished
        };

        for handle in finished {
            if handle.join().is_err() {
                warn!(group = %self.name, "detached worker panicked");
            }
        }
    }

    /// The number of workers that have not been joined yet.
    #[must_use]
    pub fn detached(&self) -> usize {
        self.detached.lock().len()
    }

    fn spawn<F, T>(
        &self,
        task: F,
    ) -> Result<(JoinHandle<()>, Receiver<Result<T, TaskError>>), TaskError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, results) = bounded(1);
        let group = self.name.clone();
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
                    TaskError::Panicked {
                        group,
                        message: panic_message(payload.as_ref()),
                    }
                });
                // The receiver is gone if nobody waits anymore
                let _ = sender.send(result);
            })
            .map_err(|error| TaskError::Spawn {
                group: self.name.clone(),
                message: error.to_string(),
            })?;

        Ok((handle, results))
    }

    fn cancelled(&self) -> TaskError {
        TaskError::Cancelled {
            group: self.name.clone(),
        }
    }

    fn panicked(&self, message: &str) -> TaskError {
        TaskError::Panicked {
            group: self.name.clone(),
            message: message.to_owned(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn results_are_returned() {
        let group = TaskGroup::new("test.results");
        let result = group.go_and_wait(&Context::new(), || 40 + 2);
        assert_eq!(Ok(42), result);
        assert_eq!(0, group.detached());
    }

    #[test]
    fn panics_are_captured() {
        let group = TaskGroup::new("test.panics");
        let result: Result<(), _> = group.go_and_wait(&Context::new(), || panic!("boom"));
        match result {
            Err(TaskError::Panicked { message, .. }) => assert_eq!("boom", message),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn deadlines_stop_the_wait() {
        let group = TaskGroup::new("test.deadline");
        let context = Context::new().with_timeout(Duration::from_millis(20));
        let (release, blocked) = bounded::<()>(0);

        let started = Instant::now();
        let result = group.go_and_wait(&context, move || blocked.recv().is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
        match result {
            Err(TaskError::Timeout { group }) => assert_eq!("test.deadline", group),
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(1, group.detached());
        drop(release);
        let deadline = Instant::now() + Duration::from_secs(5);
        while group.detached() > 0 && Instant::now() < deadline {
            group.reap();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(0, group.detached());
    }

    #[test]
    fn cancellation_stops_the_wait() {
        let group = TaskGroup::new("test.cancel");
        let (context, handle) = Context::new().with_cancel();
        let (_release, blocked) = bounded::<()>(0);

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });
        let result = group.go_and_wait(&context, move || blocked.recv().is_ok());
        canceller.join().unwrap();

        match result {
            Err(TaskError::Cancelled { .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            group.go_and_wait(&context, || ()),
            Err(TaskError::Cancelled { .. })
        ));
    }

    #[test]
    fn go_reports_through_a_channel() {
        let group = TaskGroup::new("test.go");
        let results = group.go(|| "done").unwrap();
        assert_eq!(Ok("done"), results.recv().unwrap());
    }
}
