use std::io;

use tracing::debug;

use crate::config::Config;
use crate::error::ShellError;
use crate::executor::{self, WaitPolicy};
use crate::jobs::{BackgroundRegistry, SharedRegistry};
use crate::notifier::TerminationNotifier;
use crate::parser;
use crate::pipeline::Pipeline;

/// Status for a line that was rejected before anything ran.
pub const USAGE_STATUS: i32 = 2;

/// The interpreter state that outlives a single line: the background
/// registry and the notifier that reaps it.
pub struct Shell {
    notifier: TerminationNotifier,
    policy: WaitPolicy,
    echo: bool,
}

impl Shell {
    pub fn new(config: &Config) -> io::Result<Self> {
        let notifier = TerminationNotifier::spawn(BackgroundRegistry::shared())?;
        Ok(Self {
            notifier,
            policy: config.wait_policy(),
            echo: config.echo,
        })
    }

    pub fn registry(&self) -> &SharedRegistry {
        self.notifier.registry()
    }

    /// Run an already parsed pipeline.
    pub fn execute(&self, pipeline: Pipeline) -> Result<i32, ShellError> {
        debug!("pipeline:\n{pipeline}");
        if self.echo {
            print!("{pipeline}");
        }
        executor::execute(pipeline, &self.notifier, self.policy)
    }

    /// Parse and run one interactive line. Non-fatal errors are printed and
    /// turned into a status; only a fork failure is returned.
    pub fn run_line(&self, line: &str) -> Result<i32, ShellError> {
        let result = match parser::parse(line) {
            Ok(Some(pipeline)) => self.execute(pipeline),
            Ok(None) => Ok(0),
            Err(e) => Err(ShellError::Parse(e)),
        };
        match result {
            Err(e) if e.is_fatal() => Err(e),
            Err(e @ ShellError::Parse(_)) => {
                eprintln!("pipesh: {e}");
                Ok(USAGE_STATUS)
            }
            Err(e) => {
                eprintln!("pipesh: {e}");
                Ok(1)
            }
            Ok(status) => Ok(status),
        }
    }

    /// Entry point for a script host: run `line` as one foreground command
    /// without pipes or redirections and return its exit status.
    pub fn run_script_command(&self, line: String) -> i32 {
        let pipeline = match parser::parse(&line) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => return 0,
            Err(e) => {
                eprintln!("pipesh: syntax error: {e}");
                return USAGE_STATUS;
            }
        };
        drop(line);

        if !pipeline.is_simple() {
            eprintln!("pipesh: script commands run a single foreground command");
            return USAGE_STATUS;
        }

        match self.execute(pipeline) {
            Ok(status) => status,
            Err(e) => {
                eprintln!("pipesh: {e}");
                1
            }
        }
    }
}
