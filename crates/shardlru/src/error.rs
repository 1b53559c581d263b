//! Error types for shardlru

use std::fmt;

/// Result type alias for shardlru operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache construction and key routing
///
/// A missing key is not an error: lookups return `Option`.
#[derive(Debug)]
pub enum Error {
    /// A key could not be turned into bytes for routing
    Encoding {
        /// Rust type name of the offending key
        key_type: &'static str,
        /// Serializer message
        reason: String,
    },

    /// Invalid construction parameters
    Config(String),
}

impl Error {
    pub(crate) fn encoding(key_type: &'static str, err: bincode::Error) -> Self {
        Error::Encoding {
            key_type,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Encoding { key_type, reason } => {
                write!(f, "Could not encode key of type {} as bytes: {}", key_type, reason)
            }
            Error::Config(msg) => write!(f, "Invalid cache configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
