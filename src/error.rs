use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type covering every failure mode of the transform
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Schema unavailable: {location} - {reason}")]
    SchemaUnavailable { location: String, reason: String },

    #[error("Schema compilation error: {location} - {details}")]
    SchemaCompilation { location: String, details: String },

    #[error("XML parse error: {0}")]
    XmlParse(#[from] BindError),

    #[error("Unsupported bound type: {type_name} {reason}")]
    UnsupportedBoundType { type_name: String, reason: String },

    #[error("Resource release failed: {path} - {source}")]
    ResourceRelease {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transform is not ready: {state}")]
    NotReady { state: String },

    #[error("Unsupported input: {details}")]
    UnsupportedInput { details: String },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl TransformError {
    /// Errors raised while configuring an instance; the instance cannot serve input afterwards
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransformError::SchemaUnavailable { .. }
                | TransformError::SchemaCompilation { .. }
                | TransformError::Config(_)
                | TransformError::Cache(_)
        )
    }

    /// Errors scoped to a single input; the host decides whether to drop, dead-letter or halt
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            TransformError::XmlParse(_)
                | TransformError::UnsupportedBoundType { .. }
                | TransformError::UnsupportedInput { .. }
                | TransformError::Data(_)
        )
    }

    pub(crate) fn compilation(location: &str, details: impl Into<String>) -> Self {
        TransformError::SchemaCompilation {
            location: location.to_string(),
            details: details.into(),
        }
    }
}

/// Line/column of a node inside an XML input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

impl From<roxmltree::TextPos> for Position {
    fn from(pos: roxmltree::TextPos) -> Self {
        Position {
            row: pos.row,
            col: pos.col,
        }
    }
}

/// Failure to bind one XML input against the binding model
#[derive(Error, Debug)]
pub enum BindError {
    #[error("malformed XML: {0}")]
    Malformed(#[from] roxmltree::Error),

    #[error("cannot decode input as {encoding}: {details}")]
    Encoding { encoding: String, details: String },

    #[error("unknown root element {name} at {position}")]
    UnknownRoot { name: String, position: Position },

    #[error("missing required element {expected} in <{parent}> at {position}")]
    MissingElement {
        parent: String,
        expected: String,
        position: Position,
    },

    #[error("unexpected element <{name}> in <{parent}> at {position}")]
    UnexpectedElement {
        parent: String,
        name: String,
        position: Position,
    },

    #[error("missing required attribute {name} on <{element}> at {position}")]
    MissingAttribute {
        element: String,
        name: String,
        position: Position,
    },

    #[error("undeclared attribute {name} on <{element}> at {position}")]
    UndeclaredAttribute {
        element: String,
        name: String,
        position: Position,
    },

    #[error("invalid {datatype} value '{value}' for {context} at {position}: {reason}")]
    InvalidValue {
        context: String,
        datatype: String,
        value: String,
        reason: String,
        position: Position,
    },

    #[error("character content is not allowed in <{element}> at {position}")]
    UnexpectedText { element: String, position: Position },

    #[error("element <{element}> is not nillable at {position}")]
    NotNillable { element: String, position: Position },

    #[error("xsi:type {requested} on <{element}> at {position}: {reason}")]
    TypeSubstitution {
        element: String,
        requested: String,
        reason: String,
        position: Position,
    },
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value: {field} = {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),

    #[error("Environment variable error: {0}")]
    Environment(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::InvalidFormat {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::InvalidFormat {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TransformError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Bind result type alias
pub type BindResult<T> = std::result::Result<T, BindError>;
