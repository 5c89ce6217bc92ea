//! Recurring scan jobs with non-overlapping execution.
//!
//! The dispatch loop in [`ScanScheduler::start`] is the only authority over
//! whether a job is due. Job bodies run on the blocking pool; a trigger that
//! arrives while the same job is still running is skipped and the job resumes
//! on its fixed interval (no catch-up). Every completed run, success or
//! failure, is recorded in the [`JobStatusStore`]. The store is updated in
//! memory on the loop and its document is rewritten on the blocking pool, so
//! a slow disk never delays the next due check.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::status_store::{JobOutcome, JobStatusStore};
use crate::task::{ScanOutcome, ScanTask};

pub const TERMINATED_BY_SHUTDOWN: &str = "terminated by shutdown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Idle,
    Running,
}

struct ScheduledJob {
    id: String,
    interval: Duration,
    task: Arc<dyn ScanTask>,
    next_due: Instant,
    state: JobState,
}

type Completion = (usize, Result<ScanOutcome, Error>);

pub struct ScanScheduler {
    store: Arc<JobStatusStore>,
    jobs: Vec<ScheduledJob>,
    shutdown: CancellationToken,
    stopped: CancellationToken,
    grace: Arc<Mutex<Duration>>,
    flushes: JoinSet<()>,
}

/// Control side of a running scheduler. Cheap to clone and safe to move into
/// a signal handler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    stopped: CancellationToken,
    grace: Arc<Mutex<Duration>>,
}

impl SchedulerHandle {
    /// Stop dispatching new runs, give an in-flight run up to `grace` to
    /// finish, and wait until the dispatch loop has exited.
    pub async fn shutdown(&self, grace: Duration) {
        *self.grace.lock().unwrap_or_else(PoisonError::into_inner) = grace;
        self.shutdown.cancel();
        self.stopped.cancelled().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

impl ScanScheduler {
    pub fn new(store: Arc<JobStatusStore>) -> Self {
        Self {
            store,
            jobs: Vec::new(),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
            grace: Arc::new(Mutex::new(Duration::ZERO)),
            flushes: JoinSet::new(),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shutdown: self.shutdown.clone(),
            stopped: self.stopped.clone(),
            grace: Arc::clone(&self.grace),
        }
    }

    /// Register `task` to run every `interval`. The first run happens one
    /// interval from now.
    ///
    /// Scheduling an id again with the same interval is a no-op and keeps
    /// the first task; a different interval fails with
    /// [`Error::DuplicateJob`].
    pub fn schedule(
        &mut self,
        job_id: impl Into<String>,
        interval: Duration,
        task: impl ScanTask,
    ) -> Result<(), Error> {
        let id = job_id.into();
        if interval.is_zero() {
            return Err(Error::Other(format!("Job '{}' needs a non-zero interval", id)));
        }
        if let Some(existing) = self.jobs.iter().find(|job| job.id == id) {
            if existing.interval == interval {
                debug!("Job '{}' is already scheduled every {}s", id, interval.as_secs_f64());
                return Ok(());
            }
            return Err(Error::DuplicateJob(id));
        }

        let next_due = Instant::now() + interval;
        if let Err(err) = self.store.register(&id, wall_clock(next_due)) {
            match err {
                Error::Persistence(_) => warn!("Job '{}' registered in memory only: {}", id, err),
                other => return Err(other),
            }
        }

        info!("Scheduled job '{}' every {}s", id, interval.as_secs_f64());
        self.jobs.push(ScheduledJob {
            id,
            interval,
            task: Arc::new(task),
            next_due,
            state: JobState::Idle,
        });
        Ok(())
    }

    /// Run a task immediately, outside any schedule. Nothing is written to
    /// the status store and no job timer is touched.
    pub async fn run_once_now(&self, task: Arc<dyn ScanTask>) -> Result<ScanOutcome, Error> {
        run_once_now(task).await
    }

    /// Dispatch due jobs until shutdown is requested through a
    /// [`SchedulerHandle`], then drain the in-flight runs.
    pub async fn start(mut self) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let shutdown = self.shutdown.clone();
        info!("Scheduler started with {} jobs", self.jobs.len());

        loop {
            let next_due = self.jobs.iter().map(|job| job.next_due).min();
            let wait_for_due = async move {
                match next_due {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some((index, result)) = done_rx.recv() => self.complete(index, result),
                _ = wait_for_due => self.dispatch_due(&done_tx),
            }
        }

        let grace = *self.grace.lock().unwrap_or_else(PoisonError::into_inner);
        self.drain(&mut done_rx, grace).await;
        while self.flushes.join_next().await.is_some() {}
        self.stopped.cancel();
        info!("Scheduler stopped");
    }

    fn dispatch_due(&mut self, done_tx: &mpsc::UnboundedSender<Completion>) {
        let now = Instant::now();

        for (index, job) in self.jobs.iter_mut().enumerate() {
            if job.next_due > now {
                continue;
            }

            if job.state == JobState::Running {
                warn!(
                    "Job '{}' is still running, skipping this trigger",
                    job.id
                );
            } else {
                debug!("Starting job '{}'", job.id);
                job.state = JobState::Running;
                let task = Arc::clone(&job.task);
                let done_tx = done_tx.clone();
                tokio::task::spawn_blocking(move || {
                    let result = execute(task.as_ref());
                    let _ = done_tx.send((index, result));
                });
            }

            while job.next_due <= now {
                job.next_due += job.interval;
            }
        }
    }

    fn complete(&mut self, index: usize, result: Result<ScanOutcome, Error>) {
        let Some(job) = self.jobs.get_mut(index) else {
            return;
        };
        job.state = JobState::Idle;
        let next_run_at = wall_clock(job.next_due);

        let (outcome, summary) = match result {
            Ok(scan) => {
                let summary = scan.summary();
                info!("Job '{}' finished: {}", job.id, summary);
                (JobOutcome::Success, summary)
            }
            Err(err) => {
                error!("Job '{}' failed: {:?}", job.id, err);
                (JobOutcome::Error, err.to_string())
            }
        };

        if let Err(err) = self.store.apply_outcome(&job.id, outcome, &summary, next_run_at) {
            warn!("Could not record outcome of job '{}': {}", job.id, err);
            return;
        }
        self.flush_store();
    }

    fn flush_store(&mut self) {
        while self.flushes.try_join_next().is_some() {}

        let store = Arc::clone(&self.store);
        self.flushes.spawn_blocking(move || {
            if let Err(err) = store.flush() {
                warn!("Job status kept in memory only: {}", err);
            }
        });
    }

    async fn drain(&mut self, done_rx: &mut mpsc::UnboundedReceiver<Completion>, grace: Duration) {
        let deadline = Instant::now() + grace;

        while self.jobs.iter().any(|job| job.state == JobState::Running) {
            match time::timeout_at(deadline, done_rx.recv()).await {
                Ok(Some((index, result))) => self.complete(index, result),
                Ok(None) | Err(_) => break,
            }
        }

        let mut terminated = 0;
        for job in self.jobs.iter_mut().filter(|job| job.state == JobState::Running) {
            terminated += 1;
            warn!(
                "Job '{}' did not finish within {}s of shutdown",
                job.id,
                grace.as_secs_f64()
            );
            job.state = JobState::Idle;
            if let Err(err) = self.store.apply_outcome(
                &job.id,
                JobOutcome::Error,
                TERMINATED_BY_SHUTDOWN,
                wall_clock(job.next_due),
            ) {
                warn!("Could not record termination of job '{}': {}", job.id, err);
            }
        }
        if terminated > 0 {
            self.flush_store();
        }
    }
}

/// Run `task` on the blocking pool and hand its result straight back.
pub async fn run_once_now(task: Arc<dyn ScanTask>) -> Result<ScanOutcome, Error> {
    tokio::task::spawn_blocking(move || execute(task.as_ref()))
        .await
        .map_err(|e| Error::JobExecution(e.to_string()))?
}

fn execute(task: &dyn ScanTask) -> Result<ScanOutcome, Error> {
    match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(result) => result,
        Err(payload) => Err(Error::JobExecution(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}

fn wall_clock(at: Instant) -> DateTime<Utc> {
    let until = at.saturating_duration_since(Instant::now());
    Utc::now() + chrono::Duration::from_std(until).unwrap_or_else(|_| chrono::Duration::zero())
}
