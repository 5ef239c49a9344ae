//! Reference-policy caches for binding-produced values.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;

use crate::binding::{BindingId, RefPolicy};
use crate::context::{AnyArc, ContextId};
use crate::error::DiResult;

/// Cache key within one context's cache: the binding identity, plus an
/// argument fingerprint for multitons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ScopeSlot {
    pub(crate) binding: BindingId,
    pub(crate) arg: Option<u64>,
}

/// Owner of per-context caches for a single binding.
///
/// Created once per binding that declares a caching policy and shared by all
/// resolutions of that binding. Per-context caches are created lazily on
/// first resolution for a given context.
///
/// Construction discipline: the outer maps are locked only long enough to
/// fetch or insert an entry handle; the factory runs against the entry alone,
/// so constructions of different slots never serialize against each other.
/// Re-entrant access to the same slot on one thread is cut off earlier by the
/// resolution stack and surfaces as a dependency loop, never a deadlock.
pub struct Scope {
    policy: RefPolicy,
    caches: Mutex<HashMap<ContextId, Arc<ContextCache>>>,
}

struct ContextCache {
    entries: Mutex<HashMap<ScopeSlot, Entry>>,
}

#[derive(Clone)]
enum Entry {
    // Stores the whole Result: one factory run per slot, and every waiter
    // (concurrent or later) observes the same success or failure.
    Strong(Arc<OnceCell<DiResult<AnyArc>>>),
    PerThread(Arc<Mutex<HashMap<ThreadId, AnyArc>>>),
    Weak(Arc<Mutex<Weak<dyn Any + Send + Sync>>>),
}

impl Scope {
    pub(crate) fn new(policy: RefPolicy) -> Self {
        debug_assert!(policy != RefPolicy::Unscoped);
        Self {
            policy,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `(slot, context)`, or invokes `factory`
    /// exactly once to produce it.
    ///
    /// For the strong policy the value (or failure) is published into the
    /// cell before any concurrent waiter is released.
    pub(crate) fn get_or_create<F>(
        &self,
        slot: ScopeSlot,
        context: ContextId,
        factory: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let cache = {
            let mut caches = self.caches.lock().unwrap();
            caches
                .entry(context)
                .or_insert_with(|| {
                    Arc::new(ContextCache {
                        entries: Mutex::new(HashMap::new()),
                    })
                })
                .clone()
        };

        let entry = {
            let mut entries = cache.entries.lock().unwrap();
            entries
                .entry(slot)
                .or_insert_with(|| match self.policy {
                    RefPolicy::Strong => Entry::Strong(Arc::new(OnceCell::new())),
                    RefPolicy::PerThread => Entry::PerThread(Arc::new(Mutex::new(HashMap::new()))),
                    RefPolicy::Weak => {
                        let empty: Weak<dyn Any + Send + Sync> = Weak::<()>::new();
                        Entry::Weak(Arc::new(Mutex::new(empty)))
                    }
                    RefPolicy::Unscoped => unreachable!("unscoped bindings own no scope"),
                })
                .clone()
        };

        match entry {
            Entry::Strong(cell) => cell.get_or_init(factory).clone(),
            Entry::PerThread(per_thread) => {
                let tid = thread::current().id();
                if let Some(value) = per_thread.lock().unwrap().get(&tid) {
                    return Ok(value.clone());
                }
                // Not held while the factory runs; only this thread can
                // insert under its own id, so no duplicate construction.
                let value = factory()?;
                per_thread
                    .lock()
                    .unwrap()
                    .entry(tid)
                    .or_insert_with(|| value.clone());
                Ok(value)
            }
            Entry::Weak(cell) => {
                let mut guard = cell.lock().unwrap();
                if let Some(value) = guard.upgrade() {
                    return Ok(value);
                }
                let value = factory()?;
                *guard = Arc::downgrade(&value);
                Ok(value)
            }
        }
    }
}
