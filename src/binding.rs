//! Binding descriptions: factory, reference policy, and cache identity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::container::BindingRuntime;
use crate::context::AnyArc;
use crate::error::DiResult;
use crate::scope::Scope;

/// Type-erased binding factory.
///
/// Receives the runtime view of the resolution (context, container access,
/// override delegation) and the optional type-erased argument.
pub type FactoryFn =
    Arc<dyn Fn(&BindingRuntime, Option<AnyArc>) -> DiResult<AnyArc> + Send + Sync>;

/// Fingerprints a type-erased argument for multiton cache keying.
///
/// Returns `None` when the argument is missing or of the wrong type; the
/// factory surfaces the actual error in that case.
pub(crate) type ArgKeyer = Arc<dyn Fn(&AnyArc) -> Option<u64> + Send + Sync>;

/// How a binding's produced values are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefPolicy {
    /// First value per (context, argument) is retained indefinitely.
    Strong,
    /// One retained value per calling thread; a new thread recomputes.
    PerThread,
    /// Retained only while an external strong reference keeps it alive.
    Weak,
    /// Never retained; the factory runs on every call.
    Unscoped,
}

/// Process-unique identity of a registered binding, used as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub(crate) u64);

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// A registered recipe for producing values of a key.
///
/// Immutable once registered. Bindings sharing a key form an override chain,
/// most recent first. A binding owns at most one [`Scope`], created here and
/// shared by every resolution of the binding.
#[derive(Clone)]
pub struct Binding {
    pub(crate) id: BindingId,
    pub(crate) factory: FactoryFn,
    pub(crate) policy: RefPolicy,
    pub(crate) scope: Option<Arc<Scope>>,
    pub(crate) arg_keyer: Option<ArgKeyer>,
    pub(crate) kind: &'static str,
}

impl Binding {
    /// Creates a binding with the given diagnostic kind, reference policy,
    /// and type-erased factory.
    pub fn new(kind: &'static str, policy: RefPolicy, factory: FactoryFn) -> Self {
        let scope = match policy {
            RefPolicy::Unscoped => None,
            cached => Some(Arc::new(Scope::new(cached))),
        };
        Self {
            id: BindingId(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed)),
            factory,
            policy,
            scope,
            arg_keyer: None,
            kind,
        }
    }

    /// Erases a closure into a [`FactoryFn`].
    pub fn erase<F>(f: F) -> FactoryFn
    where
        F: Fn(&BindingRuntime, Option<AnyArc>) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    pub(crate) fn with_arg_keyer(mut self, keyer: ArgKeyer) -> Self {
        self.arg_keyer = Some(keyer);
        self
    }

    /// The binding's reference policy.
    pub fn policy(&self) -> RefPolicy {
        self.policy
    }

    /// Diagnostic kind, e.g. `"provider"` or `"singleton"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .finish()
    }
}
