//! Binding keys for the resolution container.

use std::any::TypeId;
use std::fmt;

/// A type reference: a `TypeId` paired with its human-readable name.
///
/// Names come from `std::any::type_name`, so they are deterministic per type
/// and safe to compare alongside the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Type identity used for lookups.
    pub id: TypeId,
    /// Type name used for diagnostics.
    pub name: &'static str,
}

impl TypeRef {
    /// The type reference for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The context requirement a binding declares.
///
/// `Any` is a wildcard: the binding accepts whatever context the caller
/// supplies (including none). `Exact` requires a context of a specific type,
/// either supplied directly by the caller or reached through the translator
/// graph. Lookup checks exact-context chains first and falls back to the
/// wildcard chain; an exact chain entirely shadows the wildcard one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Any caller context is acceptable.
    Any,
    /// The binding requires a context of this exact type.
    Exact(TypeId, &'static str),
}

impl ContextKind {
    /// The exact-context requirement for `C`.
    pub fn of<C: 'static>() -> Self {
        ContextKind::Exact(TypeId::of::<C>(), std::any::type_name::<C>())
    }

    /// Whether this is the wildcard requirement.
    pub fn is_any(&self) -> bool {
        matches!(self, ContextKind::Any)
    }

    /// The context type name, or `"Any"` for the wildcard.
    pub fn display_name(&self) -> &'static str {
        match self {
            ContextKind::Any => "Any",
            ContextKind::Exact(_, name) => name,
        }
    }
}

/// Identity of a binding: `(context, argument, result, tag)`.
///
/// Keys are created at registration and at every lookup, and are never
/// mutated. Two keys are equal iff all four components are equal. They are
/// the sole addressing mechanism into the registry.
///
/// # Examples
///
/// ```
/// use crucible_di::Key;
///
/// struct Person;
///
/// // Provider key: any context, no argument.
/// let plain = Key::of::<Person>(None);
/// let named = Key::of::<Person>(Some("named"));
/// assert_ne!(plain, named);
///
/// // Factory key: takes a String argument.
/// let factory = Key::of::<Person>(Some("factory")).with_arg::<String>();
/// assert!(!factory.has_unit_arg());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    /// Declared context requirement.
    pub context: ContextKind,
    /// Argument type; `()` means no argument is accepted.
    pub arg: TypeRef,
    /// Result type produced by the binding.
    pub result: TypeRef,
    /// Optional tag distinguishing multiple bindings of the same type.
    pub tag: Option<&'static str>,
}

impl Key {
    /// A key for result type `T` with the wildcard context and no argument.
    pub fn of<T: 'static>(tag: Option<&'static str>) -> Self {
        Self {
            context: ContextKind::Any,
            arg: TypeRef::of::<()>(),
            result: TypeRef::of::<T>(),
            tag,
        }
    }

    /// Returns this key with argument type `A`.
    pub fn with_arg<A: 'static>(mut self) -> Self {
        self.arg = TypeRef::of::<A>();
        self
    }

    /// Returns this key with an exact context requirement of type `C`.
    pub fn in_context<C: 'static>(mut self) -> Self {
        self.context = ContextKind::of::<C>();
        self
    }

    /// The wildcard-context form of this key, used for fallback lookup.
    pub(crate) fn with_any_context(&self) -> Self {
        Self {
            context: ContextKind::Any,
            ..self.clone()
        }
    }

    /// Whether the binding takes no argument.
    pub fn has_unit_arg(&self) -> bool {
        self.arg.id == TypeId::of::<()>()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.result.name)?;
        if let Some(tag) = self.tag {
            write!(f, " (tag = {:?})", tag)?;
        }
        if !self.has_unit_arg() {
            write!(f, " <- {}", self.arg.name)?;
        }
        if let ContextKind::Exact(_, name) = self.context {
            write!(f, " @ {}", name)?;
        }
        Ok(())
    }
}
