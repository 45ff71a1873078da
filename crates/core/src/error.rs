/// Result alias that carries the custom [`PagePulseError`] type.
pub type Result<T> = std::result::Result<T, PagePulseError>;

/// Common error type for the core crate.
///
/// Only the configuration and file boundaries produce errors. A missing page
/// element never does: components that cannot find their target simply stay
/// inactive.
#[derive(Debug, thiserror::Error)]
pub enum PagePulseError {
    /// Free-form message, mostly surfaced by the command line front end.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    /// A configuration value that parsed but cannot drive the engine.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PagePulseError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for PagePulseError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PagePulseError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
