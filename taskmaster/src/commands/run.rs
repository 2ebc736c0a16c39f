//! Run command - dispatch a task across the selected targets

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::{load_settings, validate_config};
use crate::executor::{RunOutcome, Scheduler, SchedulerEvent};
use crate::groups::{self, GroupTable};
use crate::output::{echo_lines, OutputRouter};
use crate::signals::{listen_for_status_requests, INTERRUPTED_EXIT_CODE};
use crate::summary::{write_report, RunReport};
use crate::task::resolve_task;
use crate::types::{InterruptPolicy, Settings};

/// Group that collects the command-line target expressions
pub const RUNTIME_GROUP: &str = ".runtime";

/// Command-line values for a run; `None` leaves the config value alone.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub task: String,
    pub targets: Vec<String>,
    pub config: Option<PathBuf>,
    pub echo: bool,
    pub out: Option<String>,
    pub targets_file: Option<String>,
    pub running: Option<u32>,
    /// Polling interval in seconds
    pub interval: Option<f64>,
    pub on_interrupt: Option<InterruptPolicy>,
    pub json: bool,
    pub list: bool,
}

impl RunOptions {
    /// Overlay flags on top of file settings.
    pub fn apply(&self, settings: &mut Settings) {
        if self.echo {
            settings.echo = true;
        }
        if let Some(out) = &self.out {
            settings.output_dir = out.clone();
        }
        if let Some(targets_file) = &self.targets_file {
            settings.targets_file = targets_file.clone();
        }
        if let Some(running) = self.running {
            settings.max_running = Some(running);
        }
        if let Some(interval) = self.interval {
            settings.poll_interval_ms = (interval * 1000.0).round().max(0.0) as u64;
        }
        if let Some(policy) = self.on_interrupt {
            settings.on_interrupt = policy;
        }
    }
}

/// Resolve command-line expressions against the targets file table.
///
/// Expressions are parsed as a second stream seeded with `table`, so they may
/// name any group defined there. The result is sorted.
pub fn select_targets(table: GroupTable, expressions: &[String]) -> Vec<String> {
    groups::parse(expressions, Some(RUNTIME_GROUP), Some(table)).targets(RUNTIME_GROUP)
}

/// Returns the process exit status.
///
/// `events` feeds the scheduler; the caller owns the sending side, so Ctrl-C
/// wiring stays with the process entry point. Status signals are forwarded
/// into a clone of `tx` for the duration of the run.
pub fn run(
    opts: &RunOptions,
    tx: UnboundedSender<SchedulerEvent>,
    events: UnboundedReceiver<SchedulerEvent>,
) -> anyhow::Result<i32> {
    let mut settings = load_settings(opts.config.as_deref())?;
    opts.apply(&mut settings);
    validate_config(&settings)?;

    let table = GroupTable::from_file(
        Path::new(&settings.targets_file),
        Some(&settings.default_group),
    )?;
    let targets = select_targets(table, &opts.targets);

    if opts.list {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for target in &targets {
            writeln!(out, "{target}")?;
        }
        return Ok(0);
    }

    let task = resolve_task(&opts.task)?;
    if targets.is_empty() {
        warn!("no targets selected");
    }
    info!(
        "running {} on {} targets, at most {} at a time, {} on interrupt",
        task.display(),
        targets.len(),
        settings.effective_max_running(),
        settings.on_interrupt
    );

    let scheduler = Scheduler::new(
        &task,
        settings.effective_max_running(),
        settings.poll_interval(),
    )
    .with_interrupt_policy(settings.on_interrupt);
    let mut output = OutputRouter::new(&settings.output_dir);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let outcome = runtime.block_on(async {
        listen_for_status_requests(tx).context("failed to listen for status signals")?;

        let outcome = scheduler
            .run(targets, &mut output, events, |snapshot| {
                if let Err(e) = write_report(&mut io::stderr().lock(), snapshot) {
                    warn!("cannot write status report: {}", e);
                }
            })
            .await?;
        anyhow::Ok(outcome)
    })?;

    if settings.echo {
        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr().lock();
        echo(&outcome, opts.json, &mut stdout, &mut stderr)?;
    }

    if opts.json {
        let report = RunReport::from_outcome(&outcome);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_report(&mut io::stderr().lock(), &outcome.snapshot())?;
    }

    if outcome.interrupted {
        debug!("run was interrupted");
        return Ok(INTERRUPTED_EXIT_CODE);
    }
    Ok(0)
}

/// Replay what each target wrote during this run.
///
/// Captured stdout goes to `out` unless stdout carries the JSON report, in
/// which case everything is replayed to `err`.
fn echo(
    outcome: &RunOutcome,
    json: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    for record in &outcome.records {
        let (path, offset) = &record.stdout;
        let stdout_sink: &mut dyn Write = if json { &mut *err } else { &mut *out };
        echo_lines(path, *offset, &record.target, stdout_sink)?;
        let (path, offset) = &record.stderr;
        echo_lines(path, *offset, &record.target, &mut *err)?;
    }
    Ok(())
}
