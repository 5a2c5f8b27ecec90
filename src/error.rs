//! Error types for dependency resolution
//!
//! Errors are layered: a [`ReflectionError`] is the leaf cause raised by the
//! introspection cache, a [`DefinitionError`] wraps it when an identifier cannot
//! be turned into a definition, a [`ResolveError`] describes one failed call,
//! and [`DiError`] is what the container hands back to its caller, annotated
//! with the resolution path.

use thiserror::Error;

/// Failure to look up or normalize a described type, member or function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReflectionError {
    /// No type description is registered under this name
    #[error("Type [{0}] is not described")]
    TypeNotFound(String),

    /// The type exists but has no such method
    #[error("Method [{type_name}::{method}] does not exist")]
    MethodNotFound { type_name: String, method: String },

    /// No free function is registered under this name
    #[error("Function [{0}] does not exist")]
    FunctionNotFound(String),

    /// A description with this name was already registered
    #[error("[{0}] is already described")]
    AlreadyDescribed(String),

    /// The signature cannot be normalized
    #[error("Signature of [{declaring}] cannot be introspected: {reason}")]
    Malformed { declaring: String, reason: String },

    /// A shared instance whose concrete type was never described
    #[error("Instance of an undescribed type cannot be introspected")]
    UnknownInstance,
}

/// A binding source cannot be turned into a usable definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The type is abstract and has no constructible shape
    #[error("Type [{0}] is abstract and cannot be instantiated")]
    Abstract(String),

    /// The identifier could not be introspected
    #[error("{0}")]
    Reflection(#[from] ReflectionError),
}

/// Resolving one particular call failed although its definition is valid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A required parameter has no argument, default, nullability or type
    #[error("Parameter [{parameter}] of {declaring} has no value provided")]
    ValueNotProvided { parameter: String, declaring: String },

    /// A required injectable property has no value
    #[error("Property {declaring} has no value provided")]
    PropertyNotProvided { declaring: String },

    /// No constructor and no blank instantiator are available
    #[error("{declaring} is an internal immutable type and cannot be instantiated without its constructor")]
    InternalImmutableType { declaring: String },

    /// The constructor exists but is not public
    #[error("Constructor of {declaring} is not publicly invocable")]
    ConstructorNotPublic { declaring: String },

    /// The method exists but is not public
    #[error("Method {declaring} is not publicly invocable")]
    MethodNotPublic { declaring: String },

    /// The underlying constructor, method or function rejected the call
    #[error("Invocation of {declaring} failed: {reason}")]
    InvocationFailed { declaring: String, reason: String },

    /// A property setter refused the resolved value
    #[error("Property {declaring} rejected the injected value: {reason}")]
    PropertyRejected { declaring: String, reason: String },

    /// The resolved entry is not of the requested Rust type
    #[error("Entry [{id}] is not a {expected}")]
    UnexpectedType { id: String, expected: &'static str },
}

/// Errors surfaced by the container
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A definition source could not be bound
    #[error("Definition failed: {0}")]
    Definition(#[from] DefinitionError),

    /// A call failed outside of a container request
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Nothing is bound to the identifier and no definition can be derived
    #[error("No entry found for [{id}] while resolving {path}")]
    NotFound {
        id: String,
        path: String,
        #[source]
        source: DefinitionError,
    },

    /// A resolve error annotated with the resolution path that led to it
    #[error("Failed to resolve {path}: {source}")]
    Container {
        path: String,
        #[source]
        source: ResolveError,
    },

    /// The resolution path grew past the configured limit (usually a cycle)
    #[error("Resolution depth limit of {limit} exceeded while resolving {path}")]
    DepthExceeded { limit: usize, path: String },
}

impl DiError {
    /// Rendered resolution path carried by this error, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path, .. }
            | Self::Container { path, .. }
            | Self::DepthExceeded { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether this is a [`DiError::NotFound`]
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, DiError>;
