//! Error taxonomy
//!
//! Every failure in the crate is one of a small set of kinds. Operations wrap
//! the errors they receive with the name of what they were doing, so the
//! message reads like a trail (`could not upload parts: failed to upload
//! partition #2: ...`) while [`Error::kind`] still exposes the root cause.

use std::fmt;
use thiserror::Error;

/// Crate result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Stage of the upload orchestration that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    OpenAsset,
    CreateMetadata,
    UploadParts,
    ConfirmUpload,
}

impl UploadStage {
    /// Short label used in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAsset => "open_asset",
            Self::CreateMetadata => "create_metadata",
            Self::UploadParts => "upload_parts",
            Self::ConfirmUpload => "confirm_upload",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::OpenAsset => "could not open asset",
            Self::CreateMetadata => "could not create metadata",
            Self::UploadParts => "could not upload asset parts",
            Self::ConfirmUpload => "could not confirm upload",
        };
        f.write_str(msg)
    }
}

/// Root classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Io,
    Network,
    Protocol,
    NotFound,
    RateLimited,
}

/// Asset upload errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Consumed by the backoff policy, never returned from a public operation
    #[error("rate limited")]
    RateLimited,

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{stage}: {source}")]
    Stage {
        stage: UploadStage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            context: context.into(),
            source,
        }
    }

    /// Wrap this error with the operation that produced it
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Io { .. } => ErrorKind::Io,
            Self::Network { .. } => ErrorKind::Network,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Context { source, .. } | Self::Stage { source, .. } => source.kind(),
        }
    }

    /// Orchestration stage that failed, if this error came out of `upload_asset`
    pub fn stage(&self) -> Option<UploadStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Context { source, .. } => source.stage(),
            _ => None,
        }
    }
}

/// Adds operation context to fallible results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.context(f()))
    }
}
