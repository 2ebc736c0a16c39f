//! Errors that abort a run.
//!
//! A target whose task exits non-zero is not an error; it is recorded and
//! reported with the rest of the run.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TaskmasterError {
    #[error("cannot execute task '{task}' ({reason})")]
    TaskNotExecutable { task: String, reason: String },
    #[error("cannot create output directory {path}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open output file {path}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start {task} for target '{target}'")]
    Spawn {
        task: String,
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read targets file {path}")]
    TargetsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
