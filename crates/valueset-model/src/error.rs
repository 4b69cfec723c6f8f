//! Error types for the value-set model.

use thiserror::Error;

/// Errors raised while building model values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A BCP-47 language tag did not match the tag grammar.
    #[error("invalid language tag '{tag}' at position {position}")]
    InvalidLanguageTag {
        /// The rejected tag.
        tag: String,
        /// Byte offset where parsing stopped.
        position: usize,
    },

    /// Empty input where a language tag was expected.
    #[error("empty language tag")]
    EmptyLanguageTag,
}

/// Result type for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_tag() {
        let err = ModelError::InvalidLanguageTag {
            tag: "e".to_string(),
            position: 0,
        };
        assert_eq!(err.to_string(), "invalid language tag 'e' at position 0");
    }

    #[test]
    fn test_error_display_empty() {
        assert_eq!(ModelError::EmptyLanguageTag.to_string(), "empty language tag");
    }
}
