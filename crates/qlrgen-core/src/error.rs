//! Error types for qlrgen

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QlrError {
    // Registry errors
    #[error("Unknown collection: {id}")]
    UnknownCollection { id: String },

    #[error("Failed to load configuration {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    // Extraction errors
    #[error("Source unreachable: {url}: {reason}")]
    UnreachableSource {
        url: String,
        reason: String,
        timed_out: bool,
    },

    #[error("Invalid raster at {url}: {reason}")]
    InvalidRaster { url: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Template errors
    #[error("Template {template} references {{{token}}} but no value was supplied")]
    MissingSubstitution { template: PathBuf, token: String },

    #[error("Invalid template {template} at byte {offset}: {reason}")]
    Template {
        template: PathBuf,
        offset: usize,
        reason: String,
    },

    #[error("Internal error: {reason}")]
    Internal { reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QlrError {
    pub fn unreachable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreachableSource {
            url: url.into(),
            reason: reason.into(),
            timed_out: false,
        }
    }

    pub fn timed_out(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreachableSource {
            url: url.into(),
            reason: reason.into(),
            timed_out: true,
        }
    }

    pub fn invalid_raster(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRaster {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QlrError::UnknownCollection { .. }
                | QlrError::InvalidRaster { .. }
                | QlrError::InvalidUrl { .. }
        )
    }

    /// Only transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QlrError::UnreachableSource { .. })
    }
}

pub type Result<T> = std::result::Result<T, QlrError>;
