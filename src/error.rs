//! Error types for the binding layer.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the binding layer.
///
/// `Load`, `MissingSymbol`, `Disposed` and `Guard` are detected locally and never
/// cross into native code. `Construction` and `Native` carry the message the
/// native side delivered through the error callback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not load native library '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("symbol '{symbol}' not found in '{}': {source}", path.display())]
    MissingSymbol {
        symbol: &'static str,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("{kind} has been disposed")]
    Disposed { kind: &'static str },

    #[error("construction failed: {0}")]
    Construction(String),

    #[error("pipeline failed: {0}")]
    Native(String),

    #[error("{call} returned null without signalling an error")]
    Guard { call: &'static str },

    #[error("response is not valid UTF-8: {0}")]
    Decode(#[from] FromUtf8Error),

    #[error("response is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to encode pipeline config: {0}")]
    ConfigEncode(#[source] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// True for failures to locate, open, or bind the native library.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Error::Load { .. } | Error::MissingSymbol { .. })
    }

    /// True when an operation was attempted on a disposed wrapper.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::Disposed { .. })
    }
}

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, Error>;
