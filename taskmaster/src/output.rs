//! Capture files for task output.
//!
//! For task `T` and target `X` the router hands out `<root>/<T>/<X>.out` and
//! `<root>/<T>/<X>.err`, opened for append so repeated runs accumulate. A file is
//! opened at most once per router until it is released.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::TaskmasterError;

/// Stream name for captured standard output
pub const STDOUT: &str = "out";
/// Stream name for captured standard error
pub const STDERR: &str = "err";

/// An open capture file and its size when it was opened.
#[derive(Debug)]
pub struct Sink {
    pub path: PathBuf,
    pub offset: u64,
    file: File,
}

impl Sink {
    /// Independent handle to the same file, for handing to a child process.
    pub fn try_clone(&self) -> io::Result<File> {
        self.file.try_clone()
    }
}

/// Hands out append-mode capture files rooted under one directory.
#[derive(Debug)]
pub struct OutputRouter {
    root: PathBuf,
    sinks: HashMap<(String, String, String), Sink>,
}

impl OutputRouter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sinks: HashMap::new(),
        }
    }

    /// Path of the capture file for a (task, target, stream) triple.
    pub fn path(&self, task: &str, target: &str, stream: &str) -> PathBuf {
        self.root.join(task).join(format!("{target}.{stream}"))
    }

    /// Open (or return the already open) capture file for a triple.
    pub fn open(
        &mut self,
        task: &str,
        target: &str,
        stream: &str,
    ) -> Result<&Sink, TaskmasterError> {
        let key = (task.to_string(), target.to_string(), stream.to_string());
        if !self.sinks.contains_key(&key) {
            let sink = self.create(task, target, stream)?;
            self.sinks.insert(key.clone(), sink);
        }
        // Inserted above when missing.
        Ok(&self.sinks[&key])
    }

    /// Close both capture files of a target. A later `open` reopens them in
    /// append mode with a fresh offset.
    pub fn release(&mut self, task: &str, target: &str) {
        self.sinks
            .retain(|(t, x, _), _| !(t.as_str() == task && x.as_str() == target));
    }

    #[cfg(test)]
    pub(crate) fn open_count(&self) -> usize {
        self.sinks.len()
    }

    fn create(&self, task: &str, target: &str, stream: &str) -> Result<Sink, TaskmasterError> {
        let path = self.path(task, target, stream);
        if let Some(dir) = path.parent() {
            // create_dir_all already treats an existing directory as success
            fs::create_dir_all(dir).map_err(|source| TaskmasterError::OutputDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| TaskmasterError::OutputOpen {
                path: path.clone(),
                source,
            })?;
        let offset = file
            .metadata()
            .map_err(|source| TaskmasterError::OutputOpen {
                path: path.clone(),
                source,
            })?
            .len();

        Ok(Sink { path, offset, file })
    }
}

/// Copy lines written to `path` after `offset` into `out`, each prefixed `<target>> `.
pub fn echo_lines(path: &Path, offset: u64, target: &str, out: &mut dyn Write) -> io::Result<()> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let prefix = if target.is_empty() {
        String::new()
    } else {
        format!("{target}> ")
    };
    for line in BufReader::new(file).lines() {
        writeln!(out, "{prefix}{}", line?.trim_end())?;
    }
    Ok(())
}
