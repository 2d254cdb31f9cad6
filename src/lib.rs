//! pipesh: runs parsed command lines as process pipelines with boundary
//! redirections, and tracks background processes until they terminate.

#[cfg(not(unix))]
compile_error!("pipesh requires a Unix platform (fork, exec, waitpid)");

pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod notifier;
pub mod parser;
pub mod pipeline;
mod process;
mod redirect;
pub mod report;
pub mod shell;

pub use config::Config;
pub use error::{ParseError, RegistryMiss, ShellError};
pub use executor::WaitPolicy;
pub use jobs::{BackgroundJob, BackgroundRegistry, Elapsed, Pid, Timestamp};
pub use pipeline::{Pipeline, Stage, StageKind};
pub use shell::Shell;
