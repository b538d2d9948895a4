use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("directory rejected request (code {code}): {message}")]
    DirectoryRejected { code: u32, message: String },

    #[error("ownership record '{0}' not found")]
    RecordNotFound(String),

    #[error("remote exec '{step}' on {target} failed: {reason}")]
    RemoteExecFailed {
        step: String,
        target: String,
        reason: String,
    },

    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RotationError>;
