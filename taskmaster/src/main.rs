pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod groups;
pub mod logging;
pub mod output;
pub mod range;
pub mod signals;
pub mod summary;
pub mod task;
#[cfg(all(test, unix))]
mod test_support;
pub mod types;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use colored::Colorize;
use tokio::sync::mpsc;

use crate::commands::run::RunOptions;
use crate::types::InterruptPolicy;

#[derive(Parser)]
#[command(
    name = "tm",
    version,
    about = "Run a task in parallel across a set of targets",
    long_about = "Runs TASK once per target, TASK TARGET, keeping a bounded number of \
                  processes alive and filing each target's output under the output directory. \
                  Targets may be literals, ranges like web[01:10] or groups from the targets \
                  file, combined with - | + & * ^ prefixes.",
    override_usage = "tm [OPTIONS] <TASK> [TARGET]...\n       tm [OPTIONS] --list [TARGET]..."
)]
struct Cli {
    /// Echo task stdout/stderr after the run
    #[arg(short, long)]
    echo: bool,

    /// Base directory for task stdout/stderr
    #[arg(short, long, value_name = "DIR")]
    out: Option<String>,

    /// Targets file
    #[arg(short, long = "targets", value_name = "FILE")]
    targets_file: Option<String>,

    /// Number of running tasks (default: number of CPUs or 1)
    #[arg(short = 'n', long)]
    running: Option<u32>,

    /// Polling interval in seconds
    #[arg(short, long, value_name = "SECONDS")]
    interval: Option<f64>,

    /// Decrease the logging verbosity
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// Silence the logger
    #[arg(short, long)]
    silent: bool,

    /// Increase the logging verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// What Ctrl-C does to running tasks: terminate or detach
    #[arg(long, value_name = "POLICY")]
    on_interrupt: Option<InterruptPolicy>,

    /// Config file (default: taskmaster.config.yaml in this or a parent directory)
    #[arg(long, env = "TASKMASTER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the final report as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Print the selected targets and exit; no TASK is taken
    #[arg(long)]
    list: bool,

    /// Executable to run once per target, followed by target expressions.
    /// Everything after the task is a target, even when it starts with `-`.
    #[arg(
        value_name = "TASK",
        required_unless_present = "list",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

#[cfg(test)]
impl Cli {
    fn task(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    fn targets(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        let mut command = cli.command.into_iter();
        // `--list` runs nothing, so every positional is a target expression.
        let task = if cli.list {
            String::new()
        } else {
            command.next().unwrap_or_default()
        };
        Self {
            task,
            targets: command.collect(),
            config: cli.config,
            echo: cli.echo,
            out: cli.out,
            targets_file: cli.targets_file,
            running: cli.running,
            interval: cli.interval,
            on_interrupt: cli.on_interrupt,
            json: cli.json,
            list: cli.list,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.silent);

    let (tx, events) = mpsc::unbounded_channel();
    if let Err(e) = signals::install_interrupt_handler(tx.clone()) {
        eprintln!("{}", format!("failed to install Ctrl-C handler: {}", e).red());
        std::process::exit(1);
    }

    match commands::run::run(&RunOptions::from(cli), tx, events) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", format!("{:#}", e).red());
            std::process::exit(1);
        }
    }
}
