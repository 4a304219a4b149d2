//! TPD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TpdError>;

/// Top-level error type for the telemetry post-daemon.
#[derive(Debug, Error)]
pub enum TpdError {
    #[error("[TPD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TPD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TPD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TPD-1004] invalid window length {value}: must be in [1,60]")]
    InvalidWindowLength { value: i64 },

    #[error("[TPD-2001] malformed staged record at {path}: {details}")]
    ParseFailure { path: PathBuf, details: String },

    #[error("[TPD-2002] journal failure: {details}")]
    Journal { details: String },

    #[error("[TPD-2003] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TPD-2101] send failure: {details}")]
    SendFailure { details: String },

    #[error("[TPD-2102] spool full, dropping record")]
    SpoolFull,

    #[error("[TPD-2103] journal prune failure: {details}")]
    JournalPruneFailure { details: String },

    #[error("[TPD-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[TPD-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TPD-3003] fatal initialization failure: {details}")]
    FatalInit { details: String },

    #[error("[TPD-3004] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[TPD-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TpdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TPD-1001",
            Self::MissingConfig { .. } => "TPD-1002",
            Self::ConfigParse { .. } => "TPD-1003",
            Self::InvalidWindowLength { .. } => "TPD-1004",
            Self::ParseFailure { .. } => "TPD-2001",
            Self::Journal { .. } => "TPD-2002",
            Self::Serialization { .. } => "TPD-2003",
            Self::SendFailure { .. } => "TPD-2101",
            Self::SpoolFull => "TPD-2102",
            Self::JournalPruneFailure { .. } => "TPD-2103",
            Self::PermissionDenied { .. } => "TPD-3001",
            Self::Io { .. } => "TPD-3002",
            Self::FatalInit { .. } => "TPD-3003",
            Self::ChannelClosed { .. } => "TPD-3004",
            Self::Runtime { .. } => "TPD-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::SendFailure { .. }
                | Self::JournalPruneFailure { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for TpdError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TpdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
