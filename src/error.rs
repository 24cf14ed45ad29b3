use thiserror::Error;

/// Unified error type for the navgate library.
#[derive(Debug, Error)]
pub enum NavgateError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Settings serialize error: {0}")]
    SettingsSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audit error: {0}")]
    Audit(String),
}

pub type Result<T> = std::result::Result<T, NavgateError>;
