//! Asynchronous reporting of background job termination.
//!
//! Each tracked pid gets a waiter thread blocked in `waitpid` on that pid
//! alone, so foreground children are never reaped behind the main loop's
//! back. Waiters forward a [`Termination`] over a channel to one notifier
//! thread, which is the only place the registry shrinks.

use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use crate::editor::EDITOR_ACTIVE;
use crate::error::ShellError;
use crate::jobs::{self, BackgroundRegistry, Pid, SharedRegistry, Timestamp};
use crate::process;
use crate::report;

/// "Process `pid` terminated at `ended_at`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub pid: Pid,
    pub ended_at: Timestamp,
    /// `None` when the exit status could not be collected.
    pub exit_code: Option<i32>,
}

/// Apply the termination policy: a tracked pid is removed and reported,
/// anything else is ignored. Returns whether a report was written.
pub fn on_termination(
    registry: &Mutex<BackgroundRegistry>,
    event: &Termination,
    line_end: &str,
    out: &mut dyn Write,
) -> bool {
    let removed = {
        let mut registry = jobs::lock(registry);
        if !registry.contains(event.pid) {
            return false;
        }
        registry.remove(event.pid, event.ended_at)
    };

    match removed {
        Ok((job, took)) => {
            debug!(pid = job.pid, name = %job.name, exit_code = ?event.exit_code, "background job finished");
            if let Err(e) = report::report_termination(&job, took, line_end, out) {
                warn!("cannot write termination report: {e}");
            }
            true
        }
        Err(miss) => {
            warn!("{miss}");
            false
        }
    }
}

/// Owns the notifier thread and starts a waiter per background pid.
pub struct TerminationNotifier {
    registry: SharedRegistry,
    events: Sender<Termination>,
}

impl TerminationNotifier {
    /// Start the notifier thread; reports go to stdout.
    pub fn spawn(registry: SharedRegistry) -> io::Result<Self> {
        let (events, receiver) = mpsc::channel();
        let shared = Arc::clone(&registry);
        thread::Builder::new()
            .name("pipesh-notifier".to_string())
            .spawn(move || notify_loop(&shared, receiver))?;
        Ok(Self { registry, events })
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Insert `pid` into the registry and watch for its exit.
    ///
    /// The job stays listed when the waiter thread cannot be started.
    pub fn track(&self, name: &str, pid: Pid) -> Result<(), ShellError> {
        jobs::lock(&self.registry).insert(name, pid, Timestamp::now());

        let events = self.events.clone();
        thread::Builder::new()
            .name(format!("pipesh-wait-{pid}"))
            .spawn(move || {
                let exit_code = match process::wait_for_pid(pid) {
                    Ok(code) => Some(code),
                    Err(e) => {
                        warn!(pid, "waitpid failed: {e}");
                        None
                    }
                };
                let ended_at = Timestamp::now();
                // The notifier is gone only while the process exits.
                let _ = events.send(Termination {
                    pid,
                    ended_at,
                    exit_code,
                });
            })
            .map_err(|source| ShellError::Watch { pid, source })?;
        Ok(())
    }
}

fn notify_loop(registry: &Mutex<BackgroundRegistry>, receiver: Receiver<Termination>) {
    for event in receiver {
        let raw_mode = EDITOR_ACTIVE.load(Ordering::Relaxed);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if raw_mode {
            let _ = out.write_all(b"\r\n");
        }
        on_termination(registry, &event, if raw_mode { "\r\n" } else { "\n" }, &mut out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn tracked_pid_is_reported_and_removed() {
        let registry = Mutex::new(BackgroundRegistry::new());
        jobs::lock(&registry).insert("sleep", 4242, Timestamp::new(10, 900_000));

        let event = Termination {
            pid: 4242,
            ended_at: Timestamp::new(11, 100_000),
            exit_code: Some(0),
        };
        let mut out = Vec::new();
        assert!(on_termination(&registry, &event, "\n", &mut out));
        assert_eq!(String::from_utf8(out).unwrap(), "[4242] sleep done 0.200000s\n");
        assert!(jobs::lock(&registry).is_empty());
    }

    #[test]
    fn untracked_pid_is_ignored() {
        let registry = Mutex::new(BackgroundRegistry::new());
        jobs::lock(&registry).insert("sleep", 1, Timestamp::new(0, 0));

        let event = Termination {
            pid: 2,
            ended_at: Timestamp::now(),
            exit_code: Some(0),
        };
        let mut out = Vec::new();
        assert!(!on_termination(&registry, &event, "\n", &mut out));
        assert!(out.is_empty());
        assert_eq!(jobs::lock(&registry).len(), 1);
    }

    #[test]
    fn tracked_child_leaves_registry_after_exit() {
        let registry = BackgroundRegistry::shared();
        let notifier = TerminationNotifier::spawn(Arc::clone(&registry)).unwrap();

        let child = std::process::Command::new("sleep").arg("0.1").spawn().unwrap();
        let pid = child.id() as Pid;
        notifier.track("sleep", pid).unwrap();
        assert!(jobs::lock(&registry).contains(pid));

        let deadline = Instant::now() + Duration::from_secs(5);
        while jobs::lock(notifier.registry()).contains(pid) {
            assert!(Instant::now() < deadline, "job was never reaped");
            thread::sleep(Duration::from_millis(20));
        }
    }
}
