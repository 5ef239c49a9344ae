//! Read-only introspection of a container's registrations.

use std::fmt;

use crate::binding::RefPolicy;
use crate::key::Key;

/// Metadata for one registered binding, as reported by
/// [`Container::descriptors`](crate::Container::descriptors).
#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    /// The key the binding is registered under.
    pub key: Key,
    /// Binding kind, e.g. `"singleton"`.
    pub kind: &'static str,
    /// The binding's reference policy.
    pub policy: RefPolicy,
    /// Position in the key's override chain; 0 is the active binding.
    pub override_level: usize,
}

impl fmt::Display for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.key, self.kind)?;
        if self.override_level > 0 {
            write!(f, " (overridden, level {})", self.override_level)?;
        }
        Ok(())
    }
}
