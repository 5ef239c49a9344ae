//! Resolution observation hooks.
//!
//! Observers see every producer invocation: start, completion with timing,
//! and failure with the error. They exist for diagnostics and must not
//! affect resolution semantics.

use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::DiError;
use crate::key::Key;

/// Hook invoked around producer calls.
///
/// All methods have empty defaults so implementations override only what
/// they care about.
pub trait ResolutionObserver: Send + Sync {
    /// A producer for `key` is about to run in `context`.
    fn resolving(&self, key: &Key, context: &Context) {
        let _ = (key, context);
    }

    /// The producer for `key` completed after `elapsed`.
    fn resolved(&self, key: &Key, elapsed: Duration) {
        let _ = (key, elapsed);
    }

    /// The producer for `key` failed with `error`.
    fn failed(&self, key: &Key, error: &DiError) {
        let _ = (key, error);
    }
}

/// Observer writing one line per event to stderr.
#[derive(Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ResolutionObserver for LoggingObserver {
    fn resolving(&self, key: &Key, context: &Context) {
        eprintln!("[crucible-di] resolving {} (context: {})", key, context.type_name());
    }

    fn resolved(&self, key: &Key, elapsed: Duration) {
        eprintln!("[crucible-di] resolved {} in {:?}", key, elapsed);
    }

    fn failed(&self, key: &Key, error: &DiError) {
        eprintln!("[crucible-di] failed {}: {}", key, error);
    }
}

/// Frozen observer set carried by the container.
#[derive(Clone)]
pub(crate) struct Observers {
    list: Arc<[Arc<dyn ResolutionObserver>]>,
}

impl Default for Observers {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl Observers {
    pub(crate) fn from_vec(list: Vec<Arc<dyn ResolutionObserver>>) -> Self {
        Self { list: list.into() }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub(crate) fn resolving(&self, key: &Key, context: &Context) {
        for observer in self.list.iter() {
            observer.resolving(key, context);
        }
    }

    pub(crate) fn resolved(&self, key: &Key, elapsed: Duration) {
        for observer in self.list.iter() {
            observer.resolved(key, elapsed);
        }
    }

    pub(crate) fn failed(&self, key: &Key, error: &DiError) {
        for observer in self.list.iter() {
            observer.failed(key, error);
        }
    }
}
