// Shared helpers for the starling integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use starling::{Operation, Pool, PoolConfig, Worker};
use thiserror::Error;

/// Requests understood by [`TestWorker`].
#[derive(Clone, Debug, Operation)]
pub enum Job {
    Echo(String),
    SleepyEcho { input: String, delay_ms: u64 },
    Identify,
    Fail(String),
    /// Panics unconditionally.
    Crash,
    /// Panics while the probe's crash budget lasts, then echoes.
    Flaky(String),
    /// Like `Flaky`, after sleeping first.
    SlowFlaky { input: String, delay_ms: u64 },
    #[operation(protected)]
    Ping,
    #[operation(private)]
    Rehash,
}

/// What every job answers with.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// Start order of the worker that ran the job.
    pub serial: usize,
    pub text: String,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job failed: {0}")]
pub struct JobFailed(pub String);

/// Construction arguments shared by every worker of a pool. The counters
/// let tests observe the workers from outside.
#[derive(Clone, Debug, Default)]
pub struct Probe {
    pub spawned: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
    pub handled: Arc<AtomicUsize>,
    pub crash_budget: Arc<AtomicUsize>,
    pub crashed: Arc<Mutex<Vec<usize>>>,
    /// Starting fails for every worker whose serial is at least this.
    pub fail_start_from: Option<usize>,
}

impl Probe {
    pub fn with_crash_budget(budget: usize) -> Self {
        let probe = Self::default();
        probe.crash_budget.store(budget, Ordering::SeqCst);
        probe
    }

    pub fn failing_from(serial: usize) -> Self {
        Self {
            fail_start_from: Some(serial),
            ..Self::default()
        }
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    pub fn crashed(&self) -> Vec<usize> {
        self.crashed.lock().unwrap().clone()
    }
}

pub struct TestWorker {
    serial: usize,
    probe: Probe,
}

impl TestWorker {
    fn outcome(&self, text: String, started: Instant) -> Outcome {
        Outcome {
            serial: self.serial,
            text,
            started,
            finished: Instant::now(),
        }
    }

    fn spend_crash_budget(&self) -> bool {
        self.probe
            .crash_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn crash(&self) -> ! {
        self.probe.crashed.lock().unwrap().push(self.serial);
        panic!("worker {} crashed on purpose", self.serial);
    }
}

#[async_trait]
impl Worker for TestWorker {
    type Args = Probe;
    type Request = Job;
    type Response = Outcome;
    type Error = JobFailed;

    async fn start(probe: Probe) -> anyhow::Result<Self> {
        let serial = probe.spawned.fetch_add(1, Ordering::SeqCst);
        if let Some(from) = probe.fail_start_from {
            if serial >= from {
                anyhow::bail!("worker {} refused to start", serial);
            }
        }
        Ok(TestWorker { serial, probe })
    }

    async fn handle(&mut self, job: Job) -> Result<Outcome, JobFailed> {
        let started = Instant::now();
        self.probe.handled.fetch_add(1, Ordering::SeqCst);
        match job {
            Job::Echo(input) => Ok(self.outcome(input, started)),
            Job::SleepyEcho { input, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.outcome(input, started))
            }
            Job::Identify => Ok(self.outcome(self.serial.to_string(), started)),
            Job::Fail(reason) => Err(JobFailed(reason)),
            Job::Crash => self.crash(),
            Job::Flaky(input) => {
                if self.spend_crash_budget() {
                    self.crash();
                }
                Ok(self.outcome(input, started))
            }
            Job::SlowFlaky { input, delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                if self.spend_crash_budget() {
                    self.crash();
                }
                Ok(self.outcome(input, started))
            }
            Job::Ping => Ok(self.outcome("pong".to_string(), started)),
            Job::Rehash => Ok(self.outcome("rehashed".to_string(), started)),
        }
    }

    fn describe(&self) -> String {
        format!("#<TestWorker serial={}>", self.serial)
    }

    async fn stopping(&mut self) {
        self.probe.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn init_test_logging() {
    starling::logging::init_test();
}

pub fn sleepy(input: &str, delay_ms: u64) -> Job {
    Job::SleepyEcho {
        input: input.to_string(),
        delay_ms,
    }
}

/// A pool of `size` test workers.
pub async fn pool_of(size: usize, probe: &Probe) -> Pool<TestWorker> {
    pool_with(PoolConfig::default().with_size(size), probe).await
}

/// A pool of test workers built from `config`.
pub async fn pool_with(config: PoolConfig, probe: &Probe) -> Pool<TestWorker> {
    init_test_logging();
    Pool::new(probe.clone(), config).await.unwrap()
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Default timeout guarding waits on pool state.
pub const STATE_TIMEOUT: Duration = Duration::from_secs(2);
