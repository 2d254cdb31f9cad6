use argh::FromArgs;

use crate::executor::WaitPolicy;

/// Environment variable holding the `tracing` filter directives.
pub const LOG_ENV: &str = "PIPESH_LOG";

pub const DEFAULT_PROMPT: &str = "pipesh> ";

/// Interactive command interpreter with pipelines, redirections and
/// background jobs.
#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// print each parsed pipeline before running it
    #[argh(switch)]
    pub echo: bool,

    /// wait for each foreground stage before launching the next one
    #[argh(switch)]
    pub wait_per_stage: bool,

    /// prompt shown before each line
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    pub prompt: String,

    /// run one command through the script entry point and exit with its status
    #[argh(option, short = 'c')]
    pub command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            echo: false,
            wait_per_stage: false,
            prompt: DEFAULT_PROMPT.to_string(),
            command: None,
        }
    }
}

impl Config {
    pub fn wait_policy(&self) -> WaitPolicy {
        if self.wait_per_stage {
            WaitPolicy::PerStage
        } else {
            WaitPolicy::AfterLaunch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, argh::EarlyExit> {
        Config::from_args(&["pipesh"], args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.wait_policy(), WaitPolicy::AfterLaunch);
    }

    #[test]
    fn all_options() {
        let config = parse(&["--echo", "--wait-per-stage", "--prompt", "$ ", "-c", "ls -l"]).unwrap();
        assert!(config.echo);
        assert_eq!(config.wait_policy(), WaitPolicy::PerStage);
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.command.as_deref(), Some("ls -l"));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&["--bogus"]).is_err());
    }
}
