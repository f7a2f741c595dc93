//! Download worker pool.
//!
//! Keeps up to `max_concurrent` jobs in flight at once; when one finishes,
//! the next claimable queued job is started. Idles on the queue's notifier
//! (or a periodic tick) when nothing can be claimed.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;

use crate::control::JobControl;
use crate::platform_policy::{JobOutcome, PlatformPolicy};
use crate::store::{JobDetails, JobId, JobState, Store};

/// Fallback poll interval when no notification arrives.
const IDLE_TICK: Duration = Duration::from_secs(5);

/// What a finished job reports back to the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub state: JobState,
    pub outcome: JobOutcome,
    pub bytes: u64,
    pub error: Option<String>,
}

impl JobReport {
    pub fn completed(bytes: u64) -> Self {
        Self {
            state: JobState::Completed,
            outcome: JobOutcome::Success,
            bytes,
            error: None,
        }
    }

    pub fn failed(outcome: JobOutcome, error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            outcome,
            bytes: 0,
            error: Some(error.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            state: JobState::Cancelled,
            outcome: JobOutcome::Error,
            bytes: 0,
            error: None,
        }
    }
}

/// Executes one claimed job. Implemented by the request lifecycle.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run_job(&self, job: JobDetails, abort: Arc<AtomicBool>) -> Result<JobReport>;
}

type InFlight = Arc<Mutex<HashMap<String, usize>>>;

fn lock_in_flight(m: &Mutex<HashMap<String, usize>>) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Releases the job's platform slot and abort token when dropped, even if the runner panics.
struct InFlightGuard {
    in_flight: InFlight,
    platform: String,
    control: Arc<JobControl>,
    job_id: JobId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut map = lock_in_flight(&self.in_flight);
        if let Some(n) = map.get_mut(&self.platform) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                map.remove(&self.platform);
            }
        }
        self.control.unregister(self.job_id);
    }
}

struct Finished {
    job_id: JobId,
    platform: String,
    elapsed: Duration,
    result: Result<JobReport>,
}

pub struct WorkerPool {
    store: Store,
    notify: Arc<Notify>,
    control: Arc<JobControl>,
    policy: Arc<tokio::sync::Mutex<PlatformPolicy>>,
    max_concurrent: usize,
    max_per_user: usize,
}

impl WorkerPool {
    pub fn new(
        store: Store,
        notify: Arc<Notify>,
        control: Arc<JobControl>,
        policy: Arc<tokio::sync::Mutex<PlatformPolicy>>,
        max_concurrent: usize,
        max_per_user: usize,
    ) -> Self {
        Self {
            store,
            notify,
            control,
            policy,
            max_concurrent: max_concurrent.max(1),
            max_per_user: max_per_user.max(1),
        }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped), then
    /// stop claiming and wait for in-flight jobs. Returns the number of jobs run.
    ///
    /// Store errors never end the loop: they are logged and claiming resumes
    /// on the next notification or tick.
    pub async fn run(&self, runner: Arc<dyn JobRunner>, mut shutdown: watch::Receiver<bool>) -> u32 {
        match self.store.recover_running_jobs().await {
            Ok(0) => {}
            Ok(recovered) => {
                tracing::info!(recovered, "requeued jobs left running by a previous process")
            }
            Err(e) => tracing::warn!("could not requeue interrupted jobs: {:#}", e),
        }

        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
        let mut join_set: JoinSet<Finished> = JoinSet::new();
        let mut run_count = 0u32;
        let mut stopping = *shutdown.borrow();

        loop {
            if !stopping {
                if let Err(e) = self.fill(&mut join_set, &in_flight, &runner).await {
                    tracing::warn!(in_flight = join_set.len(), "claiming jobs failed, will retry: {:#}", e);
                }
            }
            if stopping && join_set.is_empty() {
                break;
            }

            tokio::select! {
                Some(res) = join_set.join_next(), if !join_set.is_empty() => {
                    run_count += 1;
                    match res {
                        Ok(finished) => self.record(finished).await,
                        Err(e) => tracing::error!("job task join: {}", e),
                    }
                }
                _ = self.notify.notified(), if !stopping => {}
                _ = tokio::time::sleep(IDLE_TICK), if !stopping => {}
                changed = shutdown.changed(), if !stopping => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(in_flight = join_set.len(), "worker pool stopping");
                        stopping = true;
                    }
                }
            }
        }
        run_count
    }

    /// Claim and spawn jobs until the pool is full or nothing is claimable.
    async fn fill(
        &self,
        join_set: &mut JoinSet<Finished>,
        in_flight: &InFlight,
        runner: &Arc<dyn JobRunner>,
    ) -> Result<()> {
        while join_set.len() < self.max_concurrent {
            let excluded = {
                let snapshot = lock_in_flight(in_flight).clone();
                self.policy.lock().await.saturated_platforms(&snapshot)
            };
            let Some(job_id) = self
                .store
                .claim_next_queued_job(self.max_per_user, &excluded)
                .await?
            else {
                break;
            };
            let Some(job) = self.store.get_job(job_id).await? else {
                continue;
            };

            *lock_in_flight(in_flight).entry(job.platform.clone()).or_default() += 1;
            let token = self.control.register(job.id, job.user_id);
            let guard = InFlightGuard {
                in_flight: Arc::clone(in_flight),
                platform: job.platform.clone(),
                control: Arc::clone(&self.control),
                job_id: job.id,
            };
            tracing::info!(job_id = job.id, user_id = job.user_id, platform = %job.platform, "job started");

            let runner = Arc::clone(runner);
            join_set.spawn(async move {
                let _guard = guard;
                let started = Instant::now();
                let job_id = job.id;
                let platform = job.platform.clone();
                let result = runner.run_job(job, token).await;
                Finished {
                    job_id,
                    platform,
                    elapsed: started.elapsed(),
                    result,
                }
            });
        }
        Ok(())
    }

    async fn record(&self, finished: Finished) {
        let Finished {
            job_id,
            platform,
            elapsed,
            result,
        } = finished;
        let report = match result {
            Ok(report) => report,
            Err(e) => JobReport::failed(JobOutcome::Error, format!("{:#}", e)),
        };

        let stored = match (&report.state, &report.error) {
            (JobState::Failed, Some(msg)) => self.store.set_job_error(job_id, msg).await,
            (state, _) => self.store.set_job_state(job_id, *state).await,
        };
        if let Err(e) = stored {
            tracing::error!(job_id, "failed to record job state: {:#}", e);
        }

        if report.state != JobState::Cancelled {
            self.policy
                .lock()
                .await
                .record_outcome(&platform, report.outcome, report.bytes, elapsed);
        }
        tracing::info!(
            job_id,
            platform = %platform,
            state = report.state.as_str(),
            bytes = report.bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "job finished"
        );
    }
}
