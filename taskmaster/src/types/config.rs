use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::enums::InterruptPolicy;

/// Run configuration, read from `taskmaster.config.yaml` and overridden by flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Target-set definition file
    #[serde(default = "default_targets_file")]
    pub targets_file: String,
    /// Root directory for captured task output
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Maximum number of concurrently running tasks (defaults to the CPU count)
    #[serde(default)]
    pub max_running: Option<u32>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Group that accumulates every literal in the targets file
    #[serde(default = "default_group")]
    pub default_group: String,
    /// Replay captured output after the run
    #[serde(default)]
    pub echo: bool,
    #[serde(default)]
    pub on_interrupt: InterruptPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            targets_file: default_targets_file(),
            output_dir: default_output_dir(),
            max_running: None,
            poll_interval_ms: default_poll_interval_ms(),
            default_group: default_group(),
            echo: false,
            on_interrupt: InterruptPolicy::default(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Configured concurrency bound, falling back to the number of CPUs or 1.
    pub fn effective_max_running(&self) -> usize {
        match self.max_running {
            Some(n) => n as usize,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

// Default value helpers
fn default_targets_file() -> String {
    "./targets".to_string()
}

fn default_output_dir() -> String {
    "./".to_string()
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_group() -> String {
    "all".to_string()
}
