use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RegistryMiss;

/// OS process identifier.
pub type Pid = libc::pid_t;

const MICROS_PER_SEC: i64 = 1_000_000;

/// A wall-clock instant: whole seconds plus microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub micros: i64,
}

impl Timestamp {
    pub const fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    pub fn now() -> Self {
        // A clock set before 1970 is treated as the epoch itself.
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: since_epoch.as_secs() as i64,
            micros: i64::from(since_epoch.subsec_micros()),
        }
    }
}

/// A non-negative duration. `micros` is always in `0..1_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Elapsed {
    pub secs: i64,
    pub micros: i64,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}s", self.secs, self.micros)
    }
}

/// Time between `start` and `end`, borrowing a second when the microsecond
/// difference underflows. An `end` earlier than `start` yields zero.
pub fn elapsed(start: Timestamp, end: Timestamp) -> Elapsed {
    let mut secs = end.secs - start.secs;
    let mut micros = end.micros - start.micros;
    if micros < 0 {
        secs -= 1;
        micros += MICROS_PER_SEC;
    }
    if secs < 0 {
        return Elapsed::default();
    }
    Elapsed { secs, micros }
}

/// One detached process launched with the background flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJob {
    pub pid: Pid,
    pub name: String,
    pub started_at: Timestamp,
}

/// Background processes that have not been observed to terminate yet,
/// oldest first.
#[derive(Debug, Default)]
pub struct BackgroundRegistry {
    jobs: Vec<BackgroundJob>,
}

/// Registry handle shared by the main loop and the termination notifier.
pub type SharedRegistry = Arc<Mutex<BackgroundRegistry>>;

impl BackgroundRegistry {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append a job. Live pids are unique, so no deduplication happens here.
    pub fn insert(&mut self, name: impl Into<String>, pid: Pid, started_at: Timestamp) {
        self.jobs.push(BackgroundJob {
            pid,
            name: name.into(),
            started_at,
        });
    }

    /// Remove the job for `pid` and return it with its run time.
    pub fn remove(
        &mut self,
        pid: Pid,
        ended_at: Timestamp,
    ) -> Result<(BackgroundJob, Elapsed), RegistryMiss> {
        let index = self
            .jobs
            .iter()
            .position(|job| job.pid == pid)
            .ok_or(RegistryMiss { pid })?;
        let job = self.jobs.remove(index);
        let took = elapsed(job.started_at, ended_at);
        Ok((job, took))
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.jobs.iter().any(|job| job.pid == pid)
    }

    /// Snapshot of all tracked jobs in insertion order.
    pub fn list(&self) -> Vec<BackgroundJob> {
        self.jobs.clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Lock the shared registry, recovering the data if a holder panicked.
pub fn lock(registry: &Mutex<BackgroundRegistry>) -> MutexGuard<'_, BackgroundRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
