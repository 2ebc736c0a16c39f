pub mod config;
pub mod enums;

// Re-export commonly used types for convenience
pub use config::Settings;
pub use enums::{InterruptPolicy, SetOperator, TargetState};
