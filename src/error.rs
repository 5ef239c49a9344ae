//! Error types for the resolution container.

use std::fmt;

/// Resolution and registration errors.
///
/// # Examples
///
/// ```
/// use crucible_di::{ContainerBuilder, DiError};
///
/// let container = ContainerBuilder::new().build().unwrap();
/// match container.instance::<String>(None) {
///     Err(DiError::NotFound(desc)) => assert!(desc.contains("String")),
///     other => panic!("expected NotFound, got {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// No binding satisfies the requested key and context, directly or via
    /// wildcard fallback or context translation.
    NotFound(String),
    /// A second binding was registered for a non-overridable key.
    BindingConflict(String),
    /// A key was re-entered while still under construction on the same
    /// logical call path. Carries the full cycle trace in resolution order.
    DependencyLoop(Vec<String>),
    /// A resolved value could not be downcast to the requested type.
    TypeMismatch(&'static str),
    /// The resolution stack exceeded its depth cap.
    DepthExceeded(usize),
    /// A user-supplied factory failed.
    Factory(String),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(desc) => write!(f, "No binding found for {}", desc),
            DiError::BindingConflict(desc) => {
                write!(f, "Binding already registered for {} (override not allowed)", desc)
            }
            DiError::DependencyLoop(trace) => {
                write!(f, "Dependency loop: {}", trace.join(" -> "))
            }
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for {}", name),
            DiError::DepthExceeded(depth) => write!(f, "Max resolution depth {} exceeded", depth),
            DiError::Factory(msg) => write!(f, "Factory failed: {}", msg),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for container operations.
pub type DiResult<T> = Result<T, DiError>;
