//! Error types for cache operations.

use thiserror::Error;

/// Cache operation result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Backend operation result.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by [`Cache`](crate::Cache) and [`CacheWrapper`](crate::CacheWrapper).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Logical cache miss: the key is absent, or present but empty.
    #[error("key not found: {key}")]
    NotFound {
        /// Backend key that missed.
        key: String,
    },

    /// The backend lacks the requested operation, or the call itself failed.
    #[error("backend operation `{operation}` failed: {source}")]
    Adapter {
        /// Name of the backend operation.
        operation: &'static str,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// Key template and call arguments do not fit together.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A value cannot be encoded for, or decoded from, the requested shape.
    #[error("codec error: {message}")]
    Codec {
        /// What went wrong.
        message: String,
    },

    /// An option in a string-keyed bag carries an unparseable value.
    #[error("invalid value `{value}` for option `{name}`")]
    InvalidOption {
        /// Normalized option name.
        name: &'static str,
        /// Raw value that failed to parse.
        value: String,
    },

    /// The wrapped computation failed.
    #[error(transparent)]
    Computation(anyhow::Error),
}

impl CacheError {
    /// Create a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create a not-found error for `key`.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Whether this error is a logical cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error came from the backend adapter.
    pub fn is_adapter(&self) -> bool {
        matches!(self, Self::Adapter { .. })
    }
}

/// Failures reported by a [`Backend`](crate::Backend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend does not implement this operation.
    #[error("operation not supported by this backend")]
    Unsupported,

    /// The key holds a value of a different shape.
    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the command.
    #[error("command error: {0}")]
    Command(String),
}

/// Key template and argument mismatches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A named placeholder was found while rendering positional arguments.
    #[error("template `{template}` expects named argument `{name}` but positional arguments were given")]
    NamedPlaceholder {
        /// Template being rendered.
        template: String,
        /// Placeholder name.
        name: String,
    },

    /// A positional placeholder was found while rendering named arguments.
    #[error("template `{template}` has positional placeholders but no positional arguments were given")]
    PositionalPlaceholder {
        /// Template being rendered.
        template: String,
    },

    /// More positional placeholders than positional arguments.
    #[error("template `{template}` needs more than {given} positional arguments")]
    NotEnoughArguments {
        /// Template being rendered.
        template: String,
        /// Number of positional arguments supplied.
        given: usize,
    },

    /// Positional arguments left over after rendering.
    #[error("template `{template}` used {used} of {given} positional arguments")]
    TooManyArguments {
        /// Template being rendered.
        template: String,
        /// Number of placeholders filled.
        used: usize,
        /// Number of positional arguments supplied.
        given: usize,
    },

    /// A named placeholder has no matching argument.
    #[error("template `{template}` is missing named argument `{name}`")]
    MissingArgument {
        /// Template being rendered.
        template: String,
        /// Placeholder name.
        name: String,
    },

    /// A brace is not closed or not escaped.
    #[error("template `{template}` has an unbalanced brace at byte {position}")]
    UnbalancedBrace {
        /// Template being rendered.
        template: String,
        /// Byte offset of the offending brace.
        position: usize,
    },
}
