//! # Mapping Error Types
//!
//! Errors raised by the mapping service: missing type or enum maps, catalog
//! lookups, mapping-file loading and validation, and value materialization.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    #[error("No type map from `{source_type}` to `{destination_type}`")]
    TypeMapNotFound {
        source_type: String,
        destination_type: String,
    },
    #[error("No enum map from `{source_type}` to `{destination_type}`")]
    EnumMapNotFound {
        source_type: String,
        destination_type: String,
    },
    #[error("Unknown type `{0}`")]
    UnknownType(String),
    #[error("Type `{type_name}` has no member `{member}`")]
    UnknownMember { type_name: String, member: String },
    #[error("Enum `{enum_type}` has no variant `{variant}`")]
    UnknownVariant { enum_type: String, variant: String },
    #[error("Expected a value of type `{expected}`, found {actual}")]
    ValueMismatch { expected: String, actual: String },
    #[error("Invalid mapping configuration: {message}")]
    InvalidConfig { message: String },
    #[error("Failed to read mapping file: {error}")]
    ConfigRead { error: String },
    #[error("Failed to parse mapping file: {error}")]
    ConfigParse { error: String },
    #[error("Failed to evaluate conversion `{expression}`: {error}")]
    Evaluation { expression: String, error: String },
}

impl MappingError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        MappingError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn type_map_not_found(source_type: &str, destination_type: &str) -> Self {
        MappingError::TypeMapNotFound {
            source_type: source_type.to_string(),
            destination_type: destination_type.to_string(),
        }
    }
}
