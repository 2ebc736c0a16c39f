use std::env;
use std::path::{Path, PathBuf};

/// File name searched for in the working directory and its parents
pub const LOCAL_CONFIG_NAME: &str = "taskmaster.config.yaml";

/// Get the global config directory (~/.config/taskmaster or $XDG_CONFIG_HOME/taskmaster)
pub fn get_global_config_dir() -> PathBuf {
    let base = if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config")
    } else {
        PathBuf::from(".config")
    };
    base.join("taskmaster")
}

pub fn get_global_config_path() -> PathBuf {
    get_global_config_dir().join("config.yaml")
}

/// Walk up from start_dir looking for taskmaster.config.yaml
pub fn find_local_config(start_dir: Option<&Path>) -> Option<PathBuf> {
    let start = match start_dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().ok()?,
    };

    start
        .ancestors()
        .map(|dir| dir.join(LOCAL_CONFIG_NAME))
        .find(|candidate| candidate.is_file())
}

/// Pick the config file to load.
/// Priority: explicit path > local config (walk up tree) > global config
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    find_local_config(None).unwrap_or_else(get_global_config_path)
}
