use thiserror::Error;

pub type LiveHtmlResult<T> = Result<T, LiveHtmlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiveHtmlError {
    #[error("Invalid config value for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Failed to read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("View is closed")]
    ViewClosed,
}

impl From<serde_yaml::Error> for LiveHtmlError {
    fn from(err: serde_yaml::Error) -> Self {
        LiveHtmlError::ConfigError(err.to_string())
    }
}

impl From<std::fmt::Error> for LiveHtmlError {
    fn from(err: std::fmt::Error) -> Self {
        LiveHtmlError::RenderError(err.to_string())
    }
}
