//! Error types for schema composition and field resolution

use thiserror::Error;

/// Failure to turn the current registry snapshot into an executable contract.
///
/// Fatal to the compile attempt only; the lifecycle stays invalid and the
/// next invocation compiles again from scratch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Malformed declaration {declaration:?} on {owner}: no field name before '(' or ':'")]
    MalformedDeclaration { owner: String, declaration: String },

    #[error("Resolver {type_name}.{field} points at unknown action '{action}'")]
    UnknownAction {
        type_name: String,
        field: String,
        action: String,
    },

    #[error("Type '{0}' defined in resolvers, but not in the contract document")]
    UnknownType(String),

    #[error("{type_name}.{field} defined in resolvers, but not in the contract document")]
    UnknownField { type_name: String, field: String },

    #[error("Contract builder rejected the document: {0}")]
    Builder(String),
}

/// Error returned by the remote call primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CallError {
    pub message: String,
    pub code: Option<String>,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Failure of a single field
///
/// Returned as the field's value, never raised across the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Call to '{action}' failed: {source}")]
    CallFailed { action: String, source: CallError },

    #[error("No resolver bound to {type_name}.{field}")]
    NoResolver { type_name: String, field: String },

    #[error("{type_name}.{field} is a subscription field and cannot be invoked directly")]
    NotInvokable { type_name: String, field: String },

    #[error("Subscription broker unavailable: {0}")]
    Broker(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required collaborator: {0}")]
    MissingCollaborator(&'static str),
}

/// Top-level error for the gateway surface
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
