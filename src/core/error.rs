use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unit not found: {0:?}")]
    UnitNotFound(crate::core::types::UnitId),

    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    #[error("Invalid casualty selection: {0}")]
    InvalidSelection(String),

    #[error("Casualty selection still invalid after {attempts} attempts")]
    SelectionRetriesExhausted { attempts: u32 },

    #[error("Required AA attachment missing on unit type: {0}")]
    MissingAaAttachment(String),

    #[error("Corrupted game state: {0}")]
    CorruptGameState(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
