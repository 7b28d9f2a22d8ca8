//! Error types for hpgen-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HpgenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("missing op '{0}' in guild file")]
    OperationNotFound(String),

    /// A flag value whose runtime type has no hparams representation.
    #[error("unsupported value for flag '{name}': {value}")]
    ContractViolation { name: String, value: String },

    #[error("Corrupt event record: {0}")]
    CorruptRecord(String),
}

pub type Result<T> = std::result::Result<T, HpgenError>;
