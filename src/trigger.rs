//! Eager construction of marked bindings.

use crate::container::Container;
use crate::context::Context;
use crate::error::DiResult;
use crate::key::Key;

impl Container {
    /// Constructs every binding marked eager at composition time, in
    /// registration order under the unit context.
    ///
    /// Stops at the first failure; already-cached values stay cached.
    pub fn trigger(&self) -> DiResult<()> {
        let keys: Vec<Key> = self.inner().eager.clone();
        self.trigger_keys(&keys)
    }

    /// Constructs the given keys under the unit context.
    pub fn trigger_keys(&self, keys: &[Key]) -> DiResult<()> {
        self.trigger_keys_at(&Context::any(), keys)
    }

    /// Constructs the given keys under `context`.
    ///
    /// Keys that take an argument cannot be constructed without one; such
    /// bindings are resolved (verifying the key exists) but not invoked.
    pub fn trigger_keys_at(&self, context: &Context, keys: &[Key]) -> DiResult<()> {
        for key in keys {
            let producer = self.resolve_factory(key, context, 0)?;
            if key.has_unit_arg() {
                producer.call(None)?;
            }
        }
        Ok(())
    }
}
