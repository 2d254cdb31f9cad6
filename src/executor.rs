use std::io::{self, Write};
use std::os::fd::AsRawFd;

use os_pipe::{PipeReader, PipeWriter};
use tracing::{debug, warn};

use crate::error::ShellError;
use crate::jobs::{self, Pid, Timestamp};
use crate::notifier::TerminationNotifier;
use crate::pipeline::{Pipeline, StageKind};
use crate::process::{self, ExecArgs, Fork};
use crate::redirect::Redirection;
use crate::report;

/// Exit status of a child whose program could not be executed.
pub const LAUNCH_FAILURE_STATUS: i32 = 127;

/// When the parent collects the children of a foreground pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Launch every stage, then wait for each in launch order.
    #[default]
    AfterLaunch,
    /// Wait for each stage right after forking it, before the next exists.
    /// This is the reference ordering; a stage that fills the pipe buffer
    /// stalls until it is killed.
    PerStage,
}

enum Launch {
    Exec { args: ExecArgs, diagnostic: Vec<u8> },
    Listing(Vec<u8>),
}

/// Everything a stage's child needs, built before any fork.
struct PreparedStage {
    name: String,
    launch: Launch,
    redirection: Redirection,
}

fn prepare(pipeline: &Pipeline, notifier: &TerminationNotifier) -> Result<Vec<PreparedStage>, ShellError> {
    let last = pipeline.stages.len().saturating_sub(1);
    let mut listing: Option<Vec<u8>> = None;

    pipeline
        .stages
        .iter()
        .enumerate()
        .map(|(i, stage)| -> Result<PreparedStage, ShellError> {
            let launch = match stage.kind() {
                StageKind::External => Launch::Exec {
                    args: ExecArgs::new(stage.argv())
                        .map_err(|_| ShellError::InvalidArgument(stage.program().to_string()))?,
                    diagnostic: format!("pipesh: {}: command not valid\n", stage.program()).into_bytes(),
                },
                StageKind::JobsListing => {
                    let text = listing.get_or_insert_with(|| {
                        let snapshot = jobs::lock(notifier.registry()).list();
                        report::format_listing(&snapshot, Timestamp::now()).into_bytes()
                    });
                    Launch::Listing(text.clone())
                }
            };
            let input = if i == 0 { pipeline.input.as_deref() } else { None };
            let output = if i == last { pipeline.output.as_deref() } else { None };
            Ok(PreparedStage {
                name: stage.program().to_string(),
                launch,
                redirection: Redirection::new(input, output)?,
            })
        })
        .collect()
}

/// Run `pipeline`: one child per stage, consecutive stages joined by pipes.
///
/// Foreground pipelines return the last stage's exit status once every
/// stage has exited. Background pipelines register each stage with the
/// notifier and return 0 at once. Only [`ShellError::Fork`] is fatal; other
/// errors are reported after every launched child has been dealt with.
pub fn execute(
    pipeline: Pipeline,
    notifier: &TerminationNotifier,
    policy: WaitPolicy,
) -> Result<i32, ShellError> {
    if pipeline.stages.is_empty() {
        return Err(ShellError::EmptyPipeline);
    }
    let stages = prepare(&pipeline, notifier)?;
    debug!(stages = stages.len(), background = pipeline.background, "executing pipeline");

    let last = stages.len() - 1;
    let mut upstream: Option<PipeReader> = None;
    let mut launched: Vec<Pid> = Vec::with_capacity(stages.len());
    let mut status = 0;
    let mut failure: Option<ShellError> = None;

    for (i, stage) in stages.iter().enumerate() {
        let (reader, writer) = if i < last {
            match os_pipe::pipe() {
                Ok((reader, writer)) => (Some(reader), Some(writer)),
                Err(e) => {
                    failure = Some(ShellError::Pipe(e));
                    break;
                }
            }
        } else {
            (None, None)
        };

        // Buffered prompt text must not be written twice or after the child's output.
        let _ = io::stdout().flush();

        let pid = match unsafe { process::fork() } {
            Ok(Fork::Child) => run_child(stage, upstream.as_ref(), reader.as_ref(), writer.as_ref()),
            Ok(Fork::Parent(pid)) => pid,
            Err(e) => return Err(ShellError::Fork(e)),
        };
        debug!(pid, stage = i, name = %stage.name, "forked stage");

        // The child holds its own copies now.
        drop(writer);
        upstream = reader;

        if pipeline.background {
            if let Err(e) = notifier.track(&stage.name, pid) {
                failure.get_or_insert(e);
            }
        } else if policy == WaitPolicy::PerStage {
            status = wait_stage(pid);
        } else {
            launched.push(pid);
        }
    }
    drop(upstream);

    for pid in launched {
        status = wait_stage(pid);
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(status),
    }
}

fn wait_stage(pid: Pid) -> i32 {
    match process::wait_for_pid(pid) {
        Ok(code) => {
            debug!(pid, code, "stage exited");
            code
        }
        Err(e) => {
            warn!(pid, "cannot wait for stage: {e}");
            1
        }
    }
}

/// Child side: wire descriptors, apply redirections, then exec or list.
fn run_child(
    stage: &PreparedStage,
    upstream: Option<&PipeReader>,
    reader: Option<&PipeReader>,
    writer: Option<&PipeWriter>,
) -> ! {
    process::restore_default_signal(libc::SIGPIPE);

    let mut wired = true;
    if let Some(upstream) = upstream {
        wired &= process::move_fd(upstream.as_raw_fd(), libc::STDIN_FILENO);
    }
    if let Some(writer) = writer {
        wired &= process::move_fd(writer.as_raw_fd(), libc::STDOUT_FILENO);
    }
    // The read end belongs to the next stage.
    if let Some(reader) = reader {
        process::close_fd(reader.as_raw_fd());
    }
    if !wired {
        process::write_fd(libc::STDERR_FILENO, b"pipesh: cannot connect pipeline stage\n");
        process::exit_child(1);
    }

    stage.redirection.apply();

    match &stage.launch {
        Launch::Listing(text) => {
            process::write_fd(libc::STDOUT_FILENO, text);
            process::exit_child(0);
        }
        Launch::Exec { args, diagnostic } => {
            args.exec();
            process::write_fd(libc::STDERR_FILENO, diagnostic);
            process::exit_child(LAUNCH_FAILURE_STATUS);
        }
    }
}
