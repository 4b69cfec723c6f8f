//! Error types for value-set resolution.

use thiserror::Error;
use valueset_model::ModelError;

/// Errors that can occur while resolving a value set.
///
/// Missing rows in the concept database are never an error; they resolve to
/// an empty [`CodeSet`](valueset_model::CodeSet).
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The code system is neither a static code system nor mapped to a
    /// concept-database vocabulary.
    #[error("Unknown code system: {0}")]
    UnknownCodeSystem(String),

    /// The filter operator cannot be applied to the code system.
    #[error("Cannot handle filter operation '{operator}' on {system}")]
    UnsupportedFilterOperation {
        /// Offending operator, as written in the value set.
        operator: String,
        /// Code system the filter was applied to.
        system: String,
    },

    /// The filter property is not a queryable column or attribute.
    #[error("Cannot filter on property '{property}' of {system}")]
    UnsupportedFilterProperty {
        /// Offending property name.
        property: String,
        /// Code system the filter was applied to.
        system: String,
    },

    /// The filter value is not valid for its property.
    #[error("Invalid value '{value}' for filter property '{property}'")]
    InvalidFilterValue {
        /// Filter property.
        property: String,
        /// Rejected value.
        value: String,
    },

    /// A value-set authority does not know the referenced value set.
    #[error("Value set not found: {0}")]
    ValueSetNotFound(String),

    /// A rule references a nested value set but no authority is configured.
    #[error("No value set authority configured to resolve {0}")]
    NoValueSetAuthority(String),

    /// A static code-system document could not be loaded.
    #[error("Failed to load code system {system}: {message}")]
    CodeSystemLoad {
        /// Code system URI.
        system: String,
        /// Underlying failure.
        message: String,
    },

    /// Result set exceeds the configured limit.
    #[error("Result set too large: {count} exceeds limit {limit}")]
    ResultTooLarge {
        /// Number of codes resolved.
        count: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Error from the underlying concept store.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Error building a model value.
    #[error(transparent)]
    ModelError(#[from] ModelError),
}

impl ResolveError {
    /// Creates an unsupported-operation error.
    pub fn unsupported_operation(operator: impl Into<String>, system: impl Into<String>) -> Self {
        Self::UnsupportedFilterOperation {
            operator: operator.into(),
            system: system.into(),
        }
    }

    /// Creates a code-system load error.
    pub fn code_system_load(system: impl Into<String>, message: impl ToString) -> Self {
        Self::CodeSystemLoad {
            system: system.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for ResolveError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreError(err.to_string())
    }
}

/// Result type for resolver operations.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
