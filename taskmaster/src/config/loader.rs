use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use super::error::ConfigError;
use super::paths::resolve_config_path;
use crate::types::Settings;

/// Read settings from a YAML file.
pub fn read_config(path: &Path) -> Result<Settings, ConfigError> {
    if path.is_dir() {
        return Err(ConfigError::InvalidPath(format!(
            "{} is a directory",
            path.display()
        )));
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    Ok(serde_yaml::from_str(&content)?)
}

/// Check value ranges that serde cannot express.
pub fn validate_config(settings: &Settings) -> Result<(), ConfigError> {
    let mut errors = Vec::new();
    if settings.max_running == Some(0) {
        errors.push("max_running must be at least 1".to_string());
    }
    if settings.poll_interval_ms == 0 {
        errors.push("poll_interval_ms must be at least 1".to_string());
    }
    if settings.default_group.trim().is_empty() {
        errors.push("default_group must not be empty".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors))
    }
}

/// Locate, read and validate settings.
///
/// A missing file is not an error: defaults apply. An explicitly named file
/// must exist.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = resolve_config_path(explicit);
    let settings = match read_config(&path) {
        Ok(settings) => {
            debug!("loaded settings from {}", path.display());
            settings
        }
        Err(ConfigError::NotFound(_)) if explicit.is_none() => {
            debug!("no config at {}, using defaults", path.display());
            Settings::default()
        }
        Err(e) => return Err(e),
    };
    validate_config(&settings)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InterruptPolicy;

    #[test]
    fn test_read_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(
            &path,
            "targets_file: /etc/tm/targets\nmax_running: 8\non_interrupt: detach\n",
        )
        .unwrap();

        let settings = read_config(&path).unwrap();
        assert_eq!(settings.targets_file, "/etc/tm/targets");
        assert_eq!(settings.max_running, Some(8));
        assert_eq!(settings.on_interrupt, InterruptPolicy::Detach);
        assert_eq!(settings.poll_interval_ms, 200);
    }

    #[test]
    fn test_read_config_empty_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "\n").unwrap();

        let settings = read_config(&path).unwrap();
        assert_eq!(settings.default_group, "all");
    }

    #[test]
    fn test_read_config_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_config(&tmp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_read_config_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_config(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath(_)));
    }

    #[test]
    fn test_read_config_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "on_interrupt: explode\n").unwrap();

        let err = read_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&Settings::default()).is_ok());

        let settings = Settings {
            max_running: Some(0),
            poll_interval_ms: 0,
            default_group: " ".to_string(),
            ..Settings::default()
        };
        match validate_config(&settings) {
            Err(ConfigError::ValidationError(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_settings_explicit_missing_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&tmp.path().join("missing.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_settings_explicit_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "max_running: 0\n").unwrap();

        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
