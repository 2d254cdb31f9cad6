use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pipesh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn pipesh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

/// Parse `[pid] name done 1.234567s` report lines into `(name, seconds)`.
fn done_reports(stdout: &str) -> Vec<(String, f64)> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim_start_matches("pipesh> ");
            let mut parts = line.split_whitespace();
            let pid = parts.next()?;
            let name = parts.next()?;
            let status = parts.next()?;
            let secs = parts.next()?.strip_suffix('s')?.parse().ok()?;
            (pid.starts_with('[') && status == "done").then(|| (name.to_string(), secs))
        })
        .collect()
}

#[test]
fn jobs_without_background_processes() {
    let output = run_shell(&["jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no background process"), "stdout was: {stdout}");
}

#[test]
fn jobs_is_pipeline_composable() {
    let output = run_shell(&["jobs | tr a-z A-Z"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("NO BACKGROUND PROCESS"), "stdout was: {stdout}");
}

#[test]
fn background_job_is_reported_when_it_terminates() {
    // The foreground sleep keeps the shell alive past the background job.
    let output = run_shell(&["sleep 0.3 &", "sleep 1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let reports = done_reports(&stdout);
    assert_eq!(reports.len(), 1, "stdout was: {stdout}");
    let (name, secs) = &reports[0];
    assert_eq!(name, "sleep");
    assert!((0.25..1.0).contains(secs), "elapsed was {secs}");
}

#[test]
fn background_returns_control_immediately() {
    let started = std::time::Instant::now();
    let output = run_shell(&["sleep 1 &", "echo PROMPT_BACK"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PROMPT_BACK"), "stdout was: {stdout}");
    // The orphaned sleep holds stdout open, so only bound the total loosely.
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn jobs_lists_running_background_processes_in_order() {
    let output = run_shell(&["sleep 1 &", "sh -c 'sleep 1' &", "jobs", "sleep 1.5", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let running: Vec<&str> = stdout.lines().filter(|l| l.contains(" running ")).collect();
    assert_eq!(running.len(), 2, "stdout was: {stdout}");
    assert!(running[0].contains("] sleep running"), "stdout was: {stdout}");
    assert!(running[1].contains("] sh running"), "stdout was: {stdout}");

    assert_eq!(done_reports(&stdout).len(), 2, "stdout was: {stdout}");
    assert!(stdout.contains("no background process"), "stdout was: {stdout}");
}

#[test]
fn every_stage_of_a_background_pipeline_is_tracked() {
    let output = run_shell(&["sleep 0.2 | cat &", "sleep 1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let mut names: Vec<String> = done_reports(&stdout).into_iter().map(|(n, _)| n).collect();
    names.sort();
    assert_eq!(names, vec!["cat", "sleep"], "stdout was: {stdout}");
}

#[test]
fn foreground_children_are_never_reported() {
    let output = run_shell(&["true", "echo hi | cat", "sleep 0.2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(done_reports(&stdout).is_empty(), "stdout was: {stdout}");
}
