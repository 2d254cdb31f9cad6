use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use pipesh::config::{self, Config};
use pipesh::editor::LineEditor;
use pipesh::Shell;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env(config::LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// A line whose first word is `exit` ends the session.
fn is_exit(line: &str) -> bool {
    line.split_whitespace().next() == Some("exit")
}

fn repl(shell: &Shell, prompt: &str) -> anyhow::Result<()> {
    let mut editor = LineEditor::new();

    loop {
        let line = match editor.read_line(prompt) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("cannot read input"),
        };
        if is_exit(&line) {
            break;
        }
        editor.add_to_history(&line);
        shell.run_line(&line)?;
    }

    println!("exit");
    io::stdout().flush()?;
    Ok(())
}

fn run(config: Config) -> anyhow::Result<ExitCode> {
    let shell = Shell::new(&config).context("cannot start the termination notifier")?;

    if let Some(command) = config.command {
        let status = shell.run_script_command(command);
        return Ok(ExitCode::from(status.clamp(0, 255) as u8));
    }

    ctrlc::set_handler(|| {
        println!();
        let _ = io::stdout().flush();
    })
    .context("cannot install the Ctrl-C handler")?;

    repl(&shell, &config.prompt)?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let config: Config = argh::from_env();
    init_logging();

    match run(config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pipesh: {e:#}");
            ExitCode::FAILURE
        }
    }
}
