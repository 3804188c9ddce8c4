//! Error types for the dependency injection container.

use thiserror::Error;

/// Dependency injection errors
///
/// Every variant is fatal for the resolution request that produced it. None
/// of them is retried: a missing binding or a cycle cannot resolve itself
/// without a configuration change.
///
/// # Examples
///
/// ```rust
/// use resolvit::{ContainerBuilder, DiError};
///
/// let container = ContainerBuilder::new().build();
/// match container.get("Missing") {
///     Err(DiError::NotFound { id }) => assert_eq!(id, "Missing"),
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use resolvit::DiError;
///
/// let circular = DiError::Circular { path: vec!["A".into(), "B".into(), "A".into()] };
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Nothing is bound under the identifier and it is not an autowireable class.
    #[error("Service not found: {id}")]
    NotFound { id: String },

    /// The concrete class is an interface or abstract type with no binding.
    #[error("Target [{class}] is not instantiable")]
    NotInstantiable { class: String },

    /// A constructor or injection-method parameter could not be satisfied.
    #[error(
        "Unresolvable dependency resolving [{parameter}] (parameter #{position}) in {class}::{method}"
    )]
    UnresolvableDependency {
        class: String,
        method: String,
        parameter: String,
        position: usize,
    },

    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", path.join(" -> "))]
    Circular { path: Vec<String> },

    /// The introspector could not describe the class.
    #[error("Reflection failed for [{class}]: {reason}")]
    Reflection { class: String, reason: String },

    /// Type downcast failed
    #[error("Type mismatch for [{id}]: expected {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// `end_scope` called with no active scope
    #[error("end_scope called without a matching begin_scope")]
    ScopeUnderflow,

    /// Scoped service requested while no scope is active
    #[error("Scoped service [{id}] requested with no active scope")]
    NoActiveScope { id: String },

    /// Alias points at itself or forms a loop
    #[error("Invalid alias [{alias}]: {reason}")]
    InvalidAlias { alias: String, reason: String },

    /// A resolved argument could not be converted to the type a constructor asked for
    #[error("Invalid argument [{parameter}]: {reason}")]
    InvalidArgument { parameter: String, reason: String },

    /// A user factory reported a failure
    #[error("Factory for [{id}] failed: {message}")]
    Factory { id: String, message: String },

    /// Container configuration could not be parsed
    #[error("Invalid container configuration: {0}")]
    Config(String),
}

impl DiError {
    /// Returns `true` for errors that can only be fixed by changing the
    /// container's bindings, as opposed to caller misuse.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DiError::NotFound { .. }
                | DiError::NotInstantiable { .. }
                | DiError::UnresolvableDependency { .. }
                | DiError::Circular { .. }
                | DiError::Reflection { .. }
                | DiError::InvalidAlias { .. }
                | DiError::Config(_)
        )
    }

    /// Shorthand used by constructors and factories to report their own failures.
    pub fn factory(id: impl Into<String>, message: impl Into<String>) -> Self {
        DiError::Factory {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
