//! Error types for acid9
//!
//! Only the persistence and configuration edges can fail. Everything on the
//! step path clamps or wraps its input instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Acid9Error {
    #[error("State JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Acid9Error>;
