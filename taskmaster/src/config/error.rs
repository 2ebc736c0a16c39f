/// Why settings could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly named settings file does not exist
    #[error("config file not found: {0}")]
    NotFound(String),
    /// YAML that does not deserialize into `Settings`
    #[error("cannot parse config: {0}")]
    ParseError(String),
    #[error("cannot read config")]
    IoError(#[from] std::io::Error),
    /// Values that parse but are out of range, one message per field
    #[error("invalid config: {}", .0.join("; "))]
    ValidationError(Vec<String>),
    /// The settings path exists but is not a file
    #[error("invalid config path: {0}")]
    InvalidPath(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
