use std::fmt;
use std::path::PathBuf;

/// Program name that lists background jobs instead of exec'ing a program.
pub const JOBS_BUILTIN: &str = "jobs";

/// One element of a pipeline: program name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    argv: Vec<String>,
}

impl Stage {
    /// Returns `None` for an empty argv.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn kind(&self) -> StageKind {
        if self.program() == JOBS_BUILTIN {
            StageKind::JobsListing
        } else {
            StageKind::External
        }
    }
}

/// How a stage runs once its child process exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Replace the child image with the program found on `PATH`.
    External,
    /// Print the background job listing from the child and exit.
    JobsListing,
}

/// A parsed command line: stages joined by pipes, boundary redirections and
/// the background flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub background: bool,
}

impl Pipeline {
    /// A single foreground stage without redirection.
    pub fn simple(stage: Stage) -> Self {
        Self {
            stages: vec![stage],
            input: None,
            output: None,
            background: false,
        }
    }

    /// True for one foreground stage with no redirections.
    pub fn is_simple(&self) -> bool {
        self.stages.len() == 1 && self.input.is_none() && self.output.is_none() && !self.background
    }
}

/// Multi-line description used by `--echo` and the debug trace.
impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stages: {}", self.stages.len())?;
        for (i, stage) in self.stages.iter().enumerate() {
            write!(f, "stage[{i}]:")?;
            for arg in stage.argv() {
                write!(f, " '{arg}'")?;
            }
            writeln!(f)?;
        }
        if let Some(input) = &self.input {
            writeln!(f, "in: {}", input.display())?;
        }
        if let Some(output) = &self.output {
            writeln!(f, "out: {}", output.display())?;
        }
        if self.background {
            writeln!(f, "background (&)")?;
        }
        Ok(())
    }
}
