// src/error.rs
//! Error types for descriptor migration

use std::path::PathBuf;
use thiserror::Error;

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating an extension descriptor
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure on a specific path
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed markup, with the location of the failure
    #[error("Failed to parse '{resource}' at line {line}, column {column}: {message}")]
    Parse {
        resource: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Event stream violated node/attribute nesting
    #[error("Invalid document structure in '{resource}': {message}")]
    Structure { resource: String, message: String },

    /// Required attribute lookup failed on a node
    #[error("Node '{node}': attribute '{attribute}' {problem}")]
    Attribute {
        node: String,
        attribute: String,
        problem: String,
    },

    /// Literal value could not be interpreted as its declared type
    #[error("Node '{node}': invalid {expected} value '{value}' for '{attribute}'")]
    InvalidValue {
        node: String,
        attribute: String,
        expected: String,
        value: String,
    },

    /// Descriptor entry is not a supported instruction or combination
    #[error("Initialize item '{item}': {message}")]
    UnsupportedItem { item: String, message: String },

    /// Two descriptor entries share a name
    #[error("Duplicate initialize item name: {0}")]
    DuplicateItem(String),

    /// Referenced resource is missing or of the wrong file type
    #[error("Initialize item '{item}': resource '{resource}' {problem}")]
    Resource {
        item: String,
        resource: String,
        problem: String,
    },

    /// Descriptor root is not an initialize folder
    #[error("Descriptor '{path}': {message}")]
    Descriptor { path: PathBuf, message: String },

    /// Resource bundle JSON has an unsupported shape
    #[error("Resource bundle '{resource}': {message}")]
    Bundle { resource: String, message: String },

    /// JSON decoding failure
    #[error("Invalid JSON in '{resource}': {source}")]
    Json {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    /// YAML encoding failure
    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Instruction reached module assembly without a target document
    #[error("Initialize item '{0}' has no target document")]
    Unallocated(String),

    /// Output target exists and is not a directory
    #[error("Target '{0}' exists and is not a directory")]
    TargetNotDirectory(PathBuf),

    /// Invalid migration options
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an unsupported-item error
    pub fn unsupported(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedItem {
            item: item.into(),
            message: message.into(),
        }
    }

    /// Build a resource resolution error
    pub fn resource(
        item: impl Into<String>,
        resource: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::Resource {
            item: item.into(),
            resource: resource.into(),
            problem: problem.into(),
        }
    }
}
