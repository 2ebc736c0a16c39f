pub mod error;
pub mod loader;
pub mod paths;

pub use error::ConfigError;
pub use loader::{load_settings, read_config, validate_config};
pub use paths::{find_local_config, get_global_config_path, resolve_config_path};
