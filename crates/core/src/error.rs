use crate::access::{AccessLevel, ResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model {0} does not have a corresponding resource kind")]
    UnknownResourceKind(String),

    #[error("Access level {level} is not valid for resource {resource}")]
    InvalidAccessLevel {
        resource: ResourceKind,
        level: AccessLevel,
    },

    #[error("Unknown access level: {0}")]
    UnknownAccessLevel(String),

    #[error("Invalid organization membership level: {0}")]
    InvalidMembershipLevel(i64),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("State backend error: {0}")]
    StateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
