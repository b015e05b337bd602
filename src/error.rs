//! Error types.

use crate::registry::ContextKey;

/// Errors raised while reading or writing ambient context.
///
/// Capturing never fails: an absent value is recorded as absent. Errors only
/// come from the thread-local write primitives behind an accessor and from
/// configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// A thread-local accessor could not write or clear its slot.
    #[error("accessor for `{key}` failed: {message}")]
    Accessor {
        /// Key the failing accessor is registered under.
        key: ContextKey,
        /// Failure reported by the accessor.
        message: String,
    },

    /// A write was addressed to a key nobody registered.
    #[error("no accessor registered for `{0}`")]
    UnknownKey(ContextKey),

    /// An environment override did not parse.
    #[error("invalid value for {var}: {reason} (got {value:?})")]
    Config {
        /// Environment variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// What was expected instead.
        reason: String,
    },
}

impl ContextError {
    /// Build an [`ContextError::Accessor`] for `key`.
    pub fn accessor(key: ContextKey, message: impl Into<String>) -> Self {
        Self::Accessor {
            key,
            message: message.into(),
        }
    }

    /// The key this error concerns, if any.
    pub fn key(&self) -> Option<&ContextKey> {
        match self {
            Self::Accessor { key, .. } | Self::UnknownKey(key) => Some(key),
            Self::Config { .. } => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ContextError> = std::result::Result<T, E>;
