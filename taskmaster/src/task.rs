//! Locate the task executable before anything is dispatched.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TaskmasterError;

/// Resolve `task` to an executable file.
///
/// Anything that exists relative to the working directory (or contains a path
/// separator) is taken as a path; a bare name is looked up on `PATH`.
pub fn resolve_task(task: &str) -> Result<PathBuf, TaskmasterError> {
    let not_executable = |reason: String| TaskmasterError::TaskNotExecutable {
        task: task.to_string(),
        reason,
    };

    let given = Path::new(task);
    let path = if given.exists() || task.contains(std::path::MAIN_SEPARATOR) {
        given.to_path_buf()
    } else {
        which::which(task).map_err(|e| not_executable(e.to_string()))?
    };

    let metadata = path
        .metadata()
        .map_err(|e| not_executable(e.to_string()))?;
    if !metadata.is_file() {
        return Err(not_executable("not a regular file".to_string()));
    }
    if !is_executable(&metadata) {
        return Err(not_executable("permission denied".to_string()));
    }

    debug!("task {} resolved to {}", task, path.display());
    Ok(path)
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}
