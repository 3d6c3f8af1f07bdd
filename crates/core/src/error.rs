use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisaggError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Input length mismatch: {active} active samples vs {reactive} reactive samples")]
    InputMismatch { active: usize, reactive: usize },

    #[error("Invalid sample at index {index}: {reason}")]
    InvalidSample { index: i64, reason: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DisaggError>;
