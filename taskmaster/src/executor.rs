use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::error::TaskmasterError;
use crate::output::{OutputRouter, STDERR, STDOUT};
use crate::types::{InterruptPolicy, TargetState};

/// Requests delivered to a running scheduler from outside its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Report a progress snapshot without disturbing the run
    StatusRequest,
    /// Stop dispatching new targets
    Interrupt,
}

/// One dispatched target and its child process
#[derive(Debug)]
pub struct ProcessRecord {
    pub target: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Local>,
    /// Capture file paths and their sizes at dispatch time
    pub stdout: (PathBuf, u64),
    pub stderr: (PathBuf, u64),
    state: TargetState,
    child: Child,
}

impl ProcessRecord {
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Refresh the cached state from the OS without blocking.
    fn poll(&mut self) -> TargetState {
        if self.state.is_running() {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    let code = exit_code(status);
                    debug!("{} exited with {}", self.target, code);
                    self.state = TargetState::Exited(code);
                }
                Ok(None) => {}
                Err(e) => warn!("cannot poll {}: {}", self.target, e),
            }
        }
        self.state
    }

    fn terminate(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                unsafe {
                    libc::kill(pid as i32, libc::SIGTERM);
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
    }
}

/// Exit code of a finished child; a signal death reads as `128 + signo`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// A target and the state it was in when a snapshot was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub target: String,
    pub state: TargetState,
}

/// Running, succeeded and failed targets at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub running: Vec<TargetOutcome>,
    pub succeeded: Vec<TargetOutcome>,
    pub failed: Vec<TargetOutcome>,
    /// Number of targets the run was started with
    pub total: usize,
}

impl RunSnapshot {
    /// Classify records by their last polled state.
    pub fn from_records(records: &[ProcessRecord], total: usize) -> Self {
        let mut snapshot = RunSnapshot {
            total,
            ..Default::default()
        };
        for record in records {
            let outcome = TargetOutcome {
                target: record.target.clone(),
                state: record.state,
            };
            if record.state.is_running() {
                snapshot.running.push(outcome);
            } else if record.state.is_success() {
                snapshot.succeeded.push(outcome);
            } else {
                snapshot.failed.push(outcome);
            }
        }
        snapshot
    }
}

/// Everything a finished (or interrupted) run leaves behind
#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<ProcessRecord>,
    pub total: usize,
    pub interrupted: bool,
    /// Highest number of simultaneously running children observed
    pub peak_running: usize,
}

impl RunOutcome {
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::from_records(&self.records, self.total)
    }
}

/// Dispatches one child per target, keeping at most `max_running` alive.
#[derive(Debug, Clone)]
pub struct Scheduler {
    task: PathBuf,
    name: String,
    max_running: usize,
    poll_interval: Duration,
    on_interrupt: InterruptPolicy,
}

impl Scheduler {
    pub fn new(task: impl Into<PathBuf>, max_running: usize, poll_interval: Duration) -> Self {
        let task = task.into();
        let name = task_name(&task);
        Self {
            task,
            name,
            max_running: max_running.max(1),
            poll_interval,
            on_interrupt: InterruptPolicy::default(),
        }
    }

    pub fn with_interrupt_policy(mut self, policy: InterruptPolicy) -> Self {
        self.on_interrupt = policy;
        self
    }

    /// Run the task once per target, in order, and wait for every child.
    ///
    /// `on_status` is called with a fresh snapshot whenever a
    /// [`SchedulerEvent::StatusRequest`] arrives.
    pub async fn run<F>(
        &self,
        targets: Vec<String>,
        output: &mut OutputRouter,
        mut events: UnboundedReceiver<SchedulerEvent>,
        mut on_status: F,
    ) -> Result<RunOutcome, TaskmasterError>
    where
        F: FnMut(&RunSnapshot),
    {
        let total = targets.len();
        let mut pending: VecDeque<String> = targets.into();
        let mut records: Vec<ProcessRecord> = Vec::with_capacity(total);
        let mut queued: Vec<SchedulerEvent> = Vec::new();
        let mut interrupted = false;
        let mut peak_running = 0;

        loop {
            for record in records.iter_mut() {
                // The child holds its own descriptors; ours are only needed
                // while the target runs.
                if record.state.is_running() && !record.poll().is_running() {
                    output.release(&self.name, &record.target);
                }
            }
            let snapshot = RunSnapshot::from_records(&records, total);

            while let Ok(event) = events.try_recv() {
                queued.push(event);
            }
            for event in queued.drain(..) {
                match event {
                    SchedulerEvent::StatusRequest => on_status(&snapshot),
                    SchedulerEvent::Interrupt if !interrupted => {
                        interrupted = true;
                        pending.clear();
                        warn!(
                            "interrupted, {} running, {} never started",
                            snapshot.running.len(),
                            total - records.len()
                        );
                        match self.on_interrupt {
                            InterruptPolicy::Terminate => {
                                for record in records.iter_mut().filter(|r| r.state.is_running()) {
                                    record.terminate();
                                }
                            }
                            InterruptPolicy::Detach => {
                                return Ok(RunOutcome {
                                    records,
                                    total,
                                    interrupted,
                                    peak_running,
                                });
                            }
                        }
                    }
                    SchedulerEvent::Interrupt => {}
                }
            }

            if pending.is_empty() {
                if snapshot.running.is_empty() {
                    break;
                }
            } else if snapshot.running.len() < self.max_running {
                if let Some(target) = pending.pop_front() {
                    records.push(self.dispatch(&target, output)?);
                    peak_running = peak_running.max(snapshot.running.len() + 1);
                }
                continue;
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                Some(event) = events.recv() => queued.push(event),
            }
        }

        Ok(RunOutcome {
            records,
            total,
            interrupted,
            peak_running,
        })
    }

    fn dispatch(
        &self,
        target: &str,
        output: &mut OutputRouter,
    ) -> Result<ProcessRecord, TaskmasterError> {
        let (out, stdout) = self.sink(output, target, STDOUT)?;
        let (err, stderr) = self.sink(output, target, STDERR)?;

        debug!("starting {} {:?}", self.task.display(), target);
        let child = Command::new(&self.task)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .spawn()
            .map_err(|source| TaskmasterError::Spawn {
                task: self.task.display().to_string(),
                target: target.to_string(),
                source,
            })?;

        Ok(ProcessRecord {
            target: target.to_string(),
            pid: child.id(),
            started_at: Local::now(),
            stdout,
            stderr,
            state: TargetState::Running,
            child,
        })
    }

    fn sink(
        &self,
        output: &mut OutputRouter,
        target: &str,
        stream: &str,
    ) -> Result<(std::fs::File, (PathBuf, u64)), TaskmasterError> {
        let sink = output.open(&self.name, target, stream)?;
        let file = sink
            .try_clone()
            .map_err(|source| TaskmasterError::OutputOpen {
                path: sink.path.clone(),
                source,
            })?;
        Ok((file, (sink.path.clone(), sink.offset)))
    }
}

fn task_name(task: &Path) -> String {
    task.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| task.display().to_string())
}
