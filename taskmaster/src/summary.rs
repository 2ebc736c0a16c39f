//! Aggregate pass/fail reporting.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::executor::{RunOutcome, RunSnapshot};
use crate::types::TargetState;

/// Column at which failed target lists are wrapped
const WRAP_WIDTH: usize = 80;
/// Hanging indent for wrapped failure lines
const INDENT: &str = "       ";

/// Counts derived from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub running: usize,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    pub failed_percentage: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} tasks running/completed/total, {:.2}% failed",
            self.running, self.completed, self.total, self.failed_percentage
        )
    }
}

/// Targets that failed with the same exit code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureGroup {
    pub code: i32,
    pub targets: Vec<String>,
}

pub fn summarize(snapshot: &RunSnapshot) -> Summary {
    let failed = snapshot.failed.len();
    Summary {
        running: snapshot.running.len(),
        completed: snapshot.succeeded.len() + failed,
        total: snapshot.total,
        failed,
        failed_percentage: 100.0 * failed as f64 / snapshot.total.max(1) as f64,
    }
}

/// Failed targets grouped by exit code, smallest group first.
///
/// Target names within a group are sorted.
pub fn failures_by_code(snapshot: &RunSnapshot) -> Vec<FailureGroup> {
    let mut by_code: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for outcome in &snapshot.failed {
        if let TargetState::Exited(code) = outcome.state {
            by_code.entry(code).or_default().push(outcome.target.clone());
        }
    }

    let mut groups: Vec<FailureGroup> = by_code
        .into_iter()
        .map(|(code, mut targets)| {
            targets.sort();
            FailureGroup { code, targets }
        })
        .collect();
    // Stable sort keeps ascending exit codes among equal-sized groups.
    groups.sort_by_key(|g| g.targets.len());
    groups
}

/// Write the one-line summary and, when anything failed, the per-code breakdown.
pub fn write_report(out: &mut dyn Write, snapshot: &RunSnapshot) -> io::Result<()> {
    writeln!(out, "{}", summarize(snapshot))?;

    let groups = failures_by_code(snapshot);
    if groups.is_empty() {
        return Ok(());
    }

    writeln!(
        out,
        "{} failed targets, {} unique return codes:",
        snapshot.failed.len(),
        groups.len()
    )?;
    for group in &groups {
        let lines = wrap(&group.targets.join(", "), WRAP_WIDTH, INDENT);
        let mut lines = lines.iter();
        let first = lines.next().map(|l| l.trim()).unwrap_or_default();
        writeln!(out, "{:5}: {}", group.code, first)?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

/// Greedy word wrap; every line starts with `indent` and stays within `width`
/// unless a single word is longer.
fn wrap(text: &str, width: usize, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::from(indent);
    for word in text.split_whitespace() {
        let fresh = line.len() == indent.len();
        if !fresh && line.len() + 1 + word.len() > width {
            lines.push(std::mem::replace(&mut line, String::from(indent)));
        }
        if line.len() > indent.len() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if line.len() > indent.len() {
        lines.push(line);
    }
    lines
}

/// Per-target entry of the machine-readable report
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub state: TargetState,
    pub started_at: DateTime<Local>,
}

/// Machine-readable report of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub summary: Summary,
    pub failures: Vec<FailureGroup>,
    pub targets: Vec<TargetReport>,
    pub peak_running: usize,
    pub interrupted: bool,
}

impl RunReport {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let snapshot = outcome.snapshot();
        Self {
            summary: summarize(&snapshot),
            failures: failures_by_code(&snapshot),
            targets: outcome
                .records
                .iter()
                .map(|r| TargetReport {
                    target: r.target.clone(),
                    state: r.state(),
                    started_at: r.started_at,
                })
                .collect(),
            peak_running: outcome.peak_running,
            interrupted: outcome.interrupted,
        }
    }
}
