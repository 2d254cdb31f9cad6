use std::io::{self, Write};

use crate::jobs::{BackgroundJob, BackgroundRegistry, Elapsed, Timestamp, elapsed};

/// Printed by the listing when nothing runs in the background.
pub const NO_BACKGROUND_PROCESS: &str = "no background process";

fn job_line(job: &BackgroundJob, status: &str, took: Elapsed) -> String {
    format!("[{}] {} {} {}", job.pid, job.name, status, took)
}

/// The `jobs` listing, one line per job in insertion order, with run time
/// measured against `now`.
pub fn format_listing(jobs: &[BackgroundJob], now: Timestamp) -> String {
    if jobs.is_empty() {
        return format!("{NO_BACKGROUND_PROCESS}\n");
    }
    jobs.iter()
        .map(|job| job_line(job, "running", elapsed(job.started_at, now)) + "\n")
        .collect()
}

pub fn format_termination(job: &BackgroundJob, took: Elapsed) -> String {
    job_line(job, "done", took)
}

pub fn report_all(registry: &BackgroundRegistry, out: &mut dyn Write) -> io::Result<()> {
    out.write_all(format_listing(&registry.list(), Timestamp::now()).as_bytes())?;
    out.flush()
}

/// `line_end` is `"\r\n"` while the terminal is in raw mode.
pub fn report_termination(
    job: &BackgroundJob,
    took: Elapsed,
    line_end: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    write!(out, "{}{line_end}", format_termination(job, took))?;
    out.flush()
}
