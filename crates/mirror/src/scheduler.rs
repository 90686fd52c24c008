//! Periodic job runner. Each job owns an interval, a run lock and a
//! queryable status. Scheduled runs never execute eagerly on startup (the
//! interval's immediate first tick is consumed before the loop), failures
//! are logged and swallowed, and a firing that finds the previous run
//! still active is skipped. Manual triggers share the run lock and
//! propagate errors to the caller.

use {
    anyhow::Result,
    chrono::{DateTime, Utc},
    futures::future::BoxFuture,
    serde::Serialize,
    std::{
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::{
        sync::{Mutex as AsyncMutex, OwnedMutexGuard},
        task::JoinHandle,
        time,
    },
};

pub const FULL_SYNC_JOB: &str = "full_sync";
pub const SETTLEMENT_SYNC_JOB: &str = "settlement_sync";
pub const PRICE_REFRESH_JOB: &str = "price_refresh";
pub const RETENTION_CLEANUP_JOB: &str = "retention_cleanup";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "state")]
pub enum JobStatus {
    Idle,
    Running,
    Succeeded { last_run: DateTime<Utc> },
    Failed { last_error: String, at: DateTime<Utc> },
}

type Task = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

pub struct Job {
    name: &'static str,
    interval: Duration,
    status: Mutex<JobStatus>,
    run_lock: Arc<AsyncMutex<()>>,
    task: Task,
}

impl Job {
    pub fn new<F, Fut>(name: &'static str, interval: Duration, task: F) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Arc::new(Self {
            name,
            interval,
            status: Mutex::new(JobStatus::Idle),
            run_lock: Arc::new(AsyncMutex::new(())),
            task: Arc::new(move || Box::pin(task())),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> JobStatus {
        self.status.lock().unwrap().clone()
    }

    /// Takes the job's run lock, waiting for an active run to finish.
    /// Callers running the job's work themselves (the manual trigger
    /// path) hold this guard for the duration.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.run_lock.clone().lock_owned().await
    }

    /// Runs the task once, waiting for an active run to finish first.
    /// Errors propagate to the caller.
    pub async fn run_once(&self) -> Result<()> {
        let _guard = self.acquire().await;
        self.execute().await
    }

    async fn execute(&self) -> Result<()> {
        *self.status.lock().unwrap() = JobStatus::Running;
        let result = (self.task)().await;
        let outcome = match &result {
            Ok(()) => {
                *self.status.lock().unwrap() = JobStatus::Succeeded {
                    last_run: Utc::now(),
                };
                "success"
            }
            Err(err) => {
                *self.status.lock().unwrap() = JobStatus::Failed {
                    last_error: format!("{err:#}"),
                    at: Utc::now(),
                };
                "failure"
            }
        };
        Metrics::get()
            .job_runs
            .with_label_values(&[self.name, outcome])
            .inc();
        result
    }

    /// One scheduled firing: skip if the previous run is still active,
    /// otherwise run and swallow errors.
    async fn fire(&self) {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!(job = self.name, "previous run still active, skipping");
            Metrics::get()
                .job_runs
                .with_label_values(&[self.name, "skipped"])
                .inc();
            return;
        };
        if let Err(err) = self.execute().await {
            tracing::warn!(job = self.name, ?err, "scheduled run failed");
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            interval.tick().await; // Initial tick to start the interval
            loop {
                interval.tick().await;
                self.fire().await;
            }
        })
    }
}

/// The set of periodic jobs, queryable by the API.
pub struct Scheduler {
    jobs: Vec<Arc<Job>>,
}

impl Scheduler {
    pub fn new(jobs: Vec<Arc<Job>>) -> Self {
        Self { jobs }
    }

    pub fn spawn_all(&self) -> Vec<JoinHandle<()>> {
        self.jobs.iter().cloned().map(Job::spawn).collect()
    }

    pub fn job(&self, name: &str) -> Option<&Arc<Job>> {
        self.jobs.iter().find(|job| job.name == name)
    }

    pub fn statuses(&self) -> Vec<(&'static str, JobStatus)> {
        self.jobs
            .iter()
            .map(|job| (job.name, job.status()))
            .collect()
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Scheduled and manual job executions by outcome.
    #[metric(labels("job", "outcome"))]
    job_runs: prometheus::IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        anyhow::anyhow,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    /// Steps the paused clock and yields so the spawned job task gets
    /// polled before the test asserts.
    async fn advance(duration: Duration) {
        time::advance(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_eager_first_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let job = Job::new("counter", Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        job.clone().spawn();
        tokio::task::yield_now().await;

        advance(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        advance(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_the_job_alive() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let job = Job::new("flaky", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("boom"))
            }
        });
        job.clone().spawn();
        tokio::task::yield_now().await;

        advance(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(matches!(job.status(), JobStatus::Failed { .. }));

        advance(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_firing_is_skipped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let job = Job::new("slow", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        job.clone().spawn();
        tokio::task::yield_now().await;

        // Simulate a run still in flight by holding the run lock across
        // several scheduled firings; every one of them must be skipped.
        let guard = job.acquire().await;
        for _ in 0..3 {
            advance(Duration::from_secs(10)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        drop(guard);

        advance(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manual_run_propagates_errors() {
        let job = Job::new("manual", Duration::from_secs(60), || async {
            Err(anyhow!("boom"))
        });
        assert!(job.run_once().await.is_err());
        assert!(matches!(job.status(), JobStatus::Failed { .. }));

        let job = Job::new("manual_ok", Duration::from_secs(60), || async { Ok(()) });
        assert!(job.run_once().await.is_ok());
        assert!(matches!(job.status(), JobStatus::Succeeded { .. }));
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let status = JobStatus::Failed {
            last_error: "boom".to_string(),
            at: DateTime::from_timestamp(1_717_777_777, 0).unwrap(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["lastError"], "boom");
    }
}
