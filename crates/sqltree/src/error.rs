//! Error types for sqltree

use thiserror::Error;

/// Result type alias for sqltree operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Why a join condition could not be derived from foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoForeignKeysReason {
    /// Neither side declares any foreign key.
    NoneDeclared,
    /// Foreign keys exist, but none of them link the two sides.
    NoneLinking,
}

/// Errors raised while constructing or resolving SQL expression trees.
///
/// Every error is raised synchronously at construction or resolution time.
#[derive(Debug, Error)]
pub enum SqlError {
    /// Mutually exclusive or malformed builder arguments
    #[error("Argument error: {0}")]
    Argument(String),

    /// Join resolution found no usable foreign-key column pairs
    #[error(
        "Can't find any foreign key relationships between '{left}' and '{right}'{}",
        no_foreign_keys_detail(.reason, .hint)
    )]
    NoForeignKeys {
        left: String,
        right: String,
        reason: NoForeignKeysReason,
        hint: Option<String>,
    },

    /// More than one foreign-key constraint could join the two sides
    #[error(
        "Can't determine join between '{left}' and '{right}'{}; tables have more than one foreign key constraint relationship between them. Please specify the 'onclause' of this join explicitly.",
        secondary_detail(.secondary)
    )]
    AmbiguousForeignKeys {
        left: String,
        right: String,
        secondary: Option<String>,
    },

    /// Operation invoked in a context that violates a structural invariant
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl SqlError {
    /// Create an argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create an invalid-request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Check if this is an argument error
    pub fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }

    /// Check if this is a no-foreign-keys error
    pub fn is_no_foreign_keys(&self) -> bool {
        matches!(self, Self::NoForeignKeys { .. })
    }

    /// Check if this is an ambiguous-foreign-keys error
    pub fn is_ambiguous_foreign_keys(&self) -> bool {
        matches!(self, Self::AmbiguousForeignKeys { .. })
    }

    /// Check if this is an invalid-request error
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

fn no_foreign_keys_detail(reason: &NoForeignKeysReason, hint: &Option<String>) -> String {
    let mut detail = match reason {
        NoForeignKeysReason::NoneDeclared => "; neither side declares a foreign key.".to_string(),
        NoForeignKeysReason::NoneLinking => {
            "; foreign keys are present but none of them link these two sides.".to_string()
        }
    };
    if let Some(hint) = hint {
        detail.push(' ');
        detail.push_str(hint);
    }
    detail
}

fn secondary_detail(secondary: &Option<String>) -> String {
    match secondary {
        Some(s) => format!(" via secondary table '{}'", s),
        None => String::new(),
    }
}

impl From<toml::de::Error> for SqlError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
