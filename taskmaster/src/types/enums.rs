use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Set operation selected by the first character of a member line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Difference,
    Intersection,
    SymmetricDifference,
}

impl SetOperator {
    /// Every character that may prefix a member expression.
    pub const PREFIXES: [char; 6] = ['-', '|', '+', '&', '*', '^'];

    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '-' => Some(SetOperator::Difference),
            '|' | '+' => Some(SetOperator::Union),
            '&' | '*' => Some(SetOperator::Intersection),
            '^' => Some(SetOperator::SymmetricDifference),
            _ => None,
        }
    }
}

/// What happens to running children when the run is interrupted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptPolicy {
    /// Send SIGTERM to running children and wait for them to exit
    #[default]
    Terminate,
    /// Stop dispatching and return, leaving children running
    Detach,
}

impl fmt::Display for InterruptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptPolicy::Terminate => write!(f, "terminate"),
            InterruptPolicy::Detach => write!(f, "detach"),
        }
    }
}

impl FromStr for InterruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terminate" => Ok(InterruptPolicy::Terminate),
            "detach" => Ok(InterruptPolicy::Detach),
            _ => Err(format!(
                "Unknown interrupt policy: '{s}'. Expected: terminate, detach"
            )),
        }
    }
}

/// Latest known state of a dispatched target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "code")]
pub enum TargetState {
    Running,
    Exited(i32),
}

impl TargetState {
    pub fn is_running(&self) -> bool {
        matches!(self, TargetState::Running)
    }

    /// Succeeded iff the exit code is exactly zero
    pub fn is_success(&self) -> bool {
        matches!(self, TargetState::Exited(0))
    }
}
