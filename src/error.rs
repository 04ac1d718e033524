use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {origin} as {parser}: {reason}")]
    Parse {
        origin: String,
        parser: String,
        reason: String,
    },

    #[error("Cannot cast {value} to {target}")]
    Cast { value: String, target: &'static str },

    #[error("Invalid path expression '{expr}': {reason}")]
    InvalidPath { expr: String, reason: String },

    #[error("Key '{key}' was missing from secret '{secret}'")]
    MissingSecretKey { key: String, secret: String },

    #[error("{service} request failed: {source}")]
    Remote {
        service: &'static str,
        source: RemoteError,
    },

    #[error("Plugin '{kind}' is not enabled — add it to the environment before creating the field")]
    PluginNotEnabled { kind: &'static str },

    #[error("Field '{0}' is registered more than once")]
    DuplicateField(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field '{field}' has an invalid chain: {source}")]
    InvalidChain {
        field: String,
        source: Arc<ConfigError>,
    },

    #[error("Field '{field}' references '{dependency}', which is not declared before it")]
    ForwardReference { field: String, dependency: String },

    #[error("Failed to deserialize {target}: {source}")]
    Deserialize {
        target: &'static str,
        source: serde_json::Error,
    },

    #[error("Field '{0}' depends on its own value")]
    CyclicReference(String),

    #[error("No parser bound — call .bind_parser() on the command-line plugin")]
    ParserNotBound,

    #[cfg(feature = "clap")]
    #[error("Command-line argument '{0}' is defined more than once")]
    DuplicateArgument(String),

    #[cfg(feature = "clap")]
    #[error(transparent)]
    Cli(#[from] clap::Error),
}
