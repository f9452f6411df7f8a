//! Schedulers running recurring reload tasks.

use crate::error::ConfigError;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// What a task wants after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    Continue,
    Stop,
}

/// Body of a recurring task.
pub type ScheduledFn = Box<dyn FnMut() -> TaskControl + Send>;

/// Runs a task every `interval` until it stops or its handle is cancelled.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, interval: Duration, task: ScheduledFn) -> Result<ScheduledTask, ConfigError>;
}

#[derive(Debug, Default)]
struct CancelFlag {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelFlag {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.wake.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Sleep until `deadline` or cancellation; true when cancelled.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            if self.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

/// Handle of a scheduled task; dropping it cancels the task.
///
/// A run already in progress completes; no further run starts.
#[derive(Debug)]
pub struct ScheduledTask {
    flag: Arc<CancelFlag>,
    abort: Option<AbortHandle>,
}

impl ScheduledTask {
    fn new(flag: Arc<CancelFlag>) -> Self {
        Self { flag, abort: None }
    }

    /// Stop future runs. A run in progress finishes.
    pub fn cancel(&self) {
        self.flag.cancel();
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One named OS thread per task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(
        &self,
        interval: Duration,
        mut task: ScheduledFn,
    ) -> Result<ScheduledTask, ConfigError> {
        let flag = Arc::new(CancelFlag::default());
        let thread_flag = Arc::clone(&flag);
        thread::Builder::new()
            .name("cascade-watch".to_string())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                loop {
                    if thread_flag.wait_until(next) {
                        break;
                    }
                    if task() == TaskControl::Stop || thread_flag.is_cancelled() {
                        break;
                    }
                    next = Instant::now() + interval;
                }
                debug!("watch thread stopped");
            })
            .map_err(|err| ConfigError::Watch(format!("failed to spawn watch thread: {err}")))?;
        Ok(ScheduledTask::new(flag))
    }
}

/// Ticks on a tokio runtime; each run happens on the blocking pool since
/// reloads do synchronous I/O.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule on the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler on the runtime this is called from.
    pub fn current() -> Result<Self, ConfigError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|err| ConfigError::Watch(err.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, interval: Duration, task: ScheduledFn) -> Result<ScheduledTask, ConfigError> {
        let flag = Arc::new(CancelFlag::default());
        let task_flag = Arc::clone(&flag);
        let task = Arc::new(Mutex::new(task));
        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if task_flag.is_cancelled() {
                    break;
                }
                let task = Arc::clone(&task);
                let run = tokio::task::spawn_blocking(move || {
                    let mut guard = task.lock();
                    (&mut **guard)()
                });
                match run.await {
                    Ok(TaskControl::Continue) => {}
                    Ok(TaskControl::Stop) | Err(_) => break,
                }
            }
            debug!("watch task stopped");
        });
        let mut scheduled = ScheduledTask::new(flag);
        scheduled.abort = Some(join.abort_handle());
        Ok(scheduled)
    }
}

type ManualTask = (Arc<CancelFlag>, Arc<Mutex<ScheduledFn>>);

/// Runs tasks only when [`run_pending`](Self::run_pending) is called, for
/// deterministic tests. Intervals are ignored.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    tasks: Arc<Mutex<Vec<ManualTask>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live task once; returns how many ran.
    pub fn run_pending(&self) -> usize {
        let tasks = {
            let mut tasks = self.tasks.lock();
            tasks.retain(|(flag, _)| !flag.is_cancelled());
            tasks.clone()
        };
        let mut ran = 0;
        for (flag, task) in tasks {
            if flag.is_cancelled() {
                continue;
            }
            ran += 1;
            let control = {
                let mut guard = task.lock();
                (&mut **guard)()
            };
            if control == TaskControl::Stop {
                flag.cancel();
            }
        }
        ran
    }

    /// Number of tasks not yet cancelled or stopped.
    pub fn task_count(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|(flag, _)| !flag.is_cancelled())
            .count()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("tasks", &self.task_count())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _interval: Duration, task: ScheduledFn) -> Result<ScheduledTask, ConfigError> {
        let flag = Arc::new(CancelFlag::default());
        self.tasks
            .lock()
            .push((Arc::clone(&flag), Arc::new(Mutex::new(task))));
        Ok(ScheduledTask::new(flag))
    }
}
