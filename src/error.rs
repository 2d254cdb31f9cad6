use std::io;

use thiserror::Error;

use crate::jobs::Pid;

/// A line the parser could not turn into a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("misplaced pipe")]
    MisplacedPipe,
    #[error("misplaced ampersand")]
    MisplacedAmpersand,
    #[error("only one input file supported")]
    DuplicateInput,
    #[error("only one output file supported")]
    DuplicateOutput,
    #[error("filename missing for input redirection")]
    MissingInputFile,
    #[error("filename missing for output redirection")]
    MissingOutputFile,
    #[error("redirection without command")]
    RedirectionWithoutCommand,
}

/// `remove` was asked for a pid the registry does not track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("process {pid} not found")]
pub struct RegistryMiss {
    pub pid: Pid,
}

/// Failures the interpreter itself can observe.
///
/// Redirection and launch failures happen inside the forked child; they show
/// up as the child's diagnostic and exit status and never reach this type.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),
    #[error("pipe failed: {0}")]
    Pipe(#[source] io::Error),
    #[error("cannot watch process {pid}: {source}")]
    Watch {
        pid: Pid,
        #[source]
        source: io::Error,
    },
    #[error("{0}: argument contains a NUL byte")]
    InvalidArgument(String),
    #[error("pipeline has no stages")]
    EmptyPipeline,
}

impl ShellError {
    /// Only losing the ability to create processes ends the interpreter.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Fork(_))
    }
}
