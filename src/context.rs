//! Caller-supplied resolution contexts.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::ContextKind;

/// Type-erased shared value, the storage currency of the container.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// The context a caller supplies at resolution time.
///
/// `Context::any()` is the unit context: it matches wildcard bindings and is
/// what tag-only resolution uses. A typed context carries an `Arc`'d value;
/// scope caches are keyed by that `Arc`'s identity, so resolving with the
/// same `Arc` reaches the same per-context cache while a different `Arc` of
/// the same type gets an independent one.
///
/// # Examples
///
/// ```
/// use crucible_di::Context;
/// use std::sync::Arc;
///
/// struct Session { user: String }
///
/// let ctx = Context::of(Arc::new(Session { user: "ada".into() }));
/// assert!(!ctx.is_any());
/// assert_eq!(ctx.downcast::<Session>().unwrap().user, "ada");
/// ```
#[derive(Clone)]
pub struct Context {
    inner: ContextInner,
}

#[derive(Clone)]
enum ContextInner {
    Any,
    Value {
        type_id: TypeId,
        type_name: &'static str,
        value: AnyArc,
    },
}

/// Cache identity of a context: the unit context, or a typed `Arc` identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ContextId {
    Any,
    Value(TypeId, usize),
}

impl Context {
    /// The unit context, accepted by every wildcard binding.
    pub fn any() -> Self {
        Self { inner: ContextInner::Any }
    }

    /// A typed context wrapping an already shared value.
    pub fn of<C: Send + Sync + 'static>(value: Arc<C>) -> Self {
        Self {
            inner: ContextInner::Value {
                type_id: TypeId::of::<C>(),
                type_name: std::any::type_name::<C>(),
                value,
            },
        }
    }

    /// A typed context taking ownership of `value`.
    pub fn new<C: Send + Sync + 'static>(value: C) -> Self {
        Self::of(Arc::new(value))
    }

    /// Whether this is the unit context.
    pub fn is_any(&self) -> bool {
        matches!(self.inner, ContextInner::Any)
    }

    /// The context type name, or `"Any"` for the unit context.
    pub fn type_name(&self) -> &'static str {
        match &self.inner {
            ContextInner::Any => "Any",
            ContextInner::Value { type_name, .. } => type_name,
        }
    }

    /// Downcasts the context value to `C`.
    ///
    /// Fails with `TypeMismatch` for the unit context or a differently
    /// typed context.
    pub fn downcast<C: Send + Sync + 'static>(&self) -> DiResult<Arc<C>> {
        match &self.inner {
            ContextInner::Value { value, .. } => value
                .clone()
                .downcast::<C>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<C>())),
            ContextInner::Any => Err(DiError::TypeMismatch(std::any::type_name::<C>())),
        }
    }

    pub(crate) fn type_id(&self) -> Option<TypeId> {
        match &self.inner {
            ContextInner::Any => None,
            ContextInner::Value { type_id, .. } => Some(*type_id),
        }
    }

    /// The context requirement this value satisfies exactly.
    pub(crate) fn kind(&self) -> ContextKind {
        match &self.inner {
            ContextInner::Any => ContextKind::Any,
            ContextInner::Value { type_id, type_name, .. } => {
                ContextKind::Exact(*type_id, type_name)
            }
        }
    }

    pub(crate) fn id(&self) -> ContextId {
        match &self.inner {
            ContextInner::Any => ContextId::Any,
            ContextInner::Value { type_id, value, .. } => {
                ContextId::Value(*type_id, Arc::as_ptr(value) as *const () as usize)
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.type_name())
    }
}
