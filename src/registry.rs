//! Binding registry: mutable during composition, frozen for the container's
//! lifetime.

use std::collections::HashMap;

use crate::binding::Binding;
use crate::error::{DiError, DiResult};
use crate::key::{ContextKind, Key};

/// Mutable registry used while the container is being composed.
///
/// Each key maps to its override chain, ordered most-recently-registered
/// first (override level 0).
pub(crate) struct RegistryBuilder {
    chains: HashMap<Key, Vec<Binding>>,
    allow_silent_override: bool,
}

impl RegistryBuilder {
    pub(crate) fn new(allow_silent_override: bool) -> Self {
        Self {
            chains: HashMap::new(),
            allow_silent_override,
        }
    }

    pub(crate) fn set_silent_override(&mut self, allowed: bool) -> bool {
        std::mem::replace(&mut self.allow_silent_override, allowed)
    }

    /// Inserts `binding` at the head of the chain for `key`.
    ///
    /// Registering over an existing chain requires `allow_override` or the
    /// registry-wide silent-override policy; otherwise this is a
    /// composition-time conflict.
    pub(crate) fn register(
        &mut self,
        key: Key,
        binding: Binding,
        allow_override: bool,
    ) -> DiResult<()> {
        use std::collections::hash_map::Entry;
        match self.chains.entry(key) {
            Entry::Occupied(mut occupied) => {
                if !allow_override && !self.allow_silent_override {
                    return Err(DiError::BindingConflict(occupied.key().to_string()));
                }
                occupied.get_mut().insert(0, binding);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(vec![binding]);
            }
        }
        Ok(())
    }

    pub(crate) fn freeze(self) -> Registry {
        Registry {
            chains: self.chains,
        }
    }
}

/// Frozen registry. Exposes no insertion operation; lookups never mutate it.
pub(crate) struct Registry {
    chains: HashMap<Key, Vec<Binding>>,
}

impl Registry {
    /// The chain registered under exactly `key`, without any fallback.
    pub(crate) fn exact(&self, key: &Key) -> Option<&[Binding]> {
        self.chains.get(key).map(Vec::as_slice)
    }

    /// Keys sharing `key`'s argument, result, and tag but declaring some
    /// other exact context, in deterministic (context-name) order. These are
    /// the candidates a translator path may make reachable.
    pub(crate) fn contextual_candidates(&self, key: &Key) -> Vec<&Key> {
        let mut candidates: Vec<&Key> = self
            .chains
            .keys()
            .filter(|k| {
                k.result == key.result
                    && k.arg == key.arg
                    && k.tag == key.tag
                    && matches!(k.context, ContextKind::Exact(..))
                    && k.context != key.context
            })
            .collect();
        candidates.sort_by_key(|k| k.context.display_name());
        candidates
    }

    /// Enumerates every chain for introspection.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &[Binding])> {
        self.chains.iter().map(|(k, chain)| (k, chain.as_slice()))
    }
}
