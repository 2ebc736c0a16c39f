//! Helpers shared by tests that spawn scripts.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use std::os::unix::fs::PermissionsExt;

// Scripts are written and then executed; forking from parallel tests while
// one is being written can fail the exec with ETXTBSY.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

pub fn spawn_lock() -> MutexGuard<'static, ()> {
    SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
