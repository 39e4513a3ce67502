use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("{0}")]
    Other(String),
}
