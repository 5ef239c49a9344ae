//! Runtime dependency-resolution container with override chains, pluggable
//! reference policies, and context translation.
//!
//! Bindings are registered against a [`Key`] (context, argument, result
//! type, optional tag) on a [`ContainerBuilder`], then frozen into an
//! immutable [`Container`] that is cheap to clone and safe to resolve from
//! any thread.
//!
//! # Quick start
//!
//! ```
//! use crucible_di::ContainerBuilder;
//!
//! struct Config { url: String }
//! struct Database { url: String }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.bind_instance(None, Config { url: "postgres://localhost".into() })?;
//! builder.bind_singleton::<Database, _>(None, |rt| {
//!     let config = rt.instance::<Config>(None)?;
//!     Ok(Database { url: config.url.clone() })
//! })?;
//! let container = builder.build()?;
//!
//! let db = container.instance::<Database>(None)?;
//! let again = container.instance::<Database>(None)?;
//! assert!(std::sync::Arc::ptr_eq(&db, &again));
//! # Ok::<(), crucible_di::DiError>(())
//! ```
//!
//! # Binding kinds
//!
//! | method | runs | retention |
//! |---|---|---|
//! | [`bind_instance`](ContainerBuilder::bind_instance) | never (pre-built) | container lifetime |
//! | [`bind_provider`](ContainerBuilder::bind_provider) | every resolution | none |
//! | [`bind_singleton`](ContainerBuilder::bind_singleton) | at most once | container lifetime |
//! | [`bind_thread_singleton`](ContainerBuilder::bind_thread_singleton) | once per thread | per thread |
//! | [`bind_weak_singleton`](ContainerBuilder::bind_weak_singleton) | when unreferenced | while referenced |
//! | [`bind_factory`](ContainerBuilder::bind_factory) | every call | none |
//! | [`bind_multiton`](ContainerBuilder::bind_multiton) | once per argument | container lifetime |
//!
//! # Overrides
//!
//! Re-binding a bound key requires the `_override` method variants (or a
//! [`ContainerBuilder::with_silent_override`] builder). Overridden bindings
//! stay reachable: a factory can delegate to the binding it shadows through
//! [`BindingRuntime::overridden_instance`] and friends.
//!
//! # Contexts
//!
//! Bindings may require a context of a specific type
//! ([`bind_contextual_singleton`](ContainerBuilder::bind_contextual_singleton));
//! callers supply one via the `*_at` resolution methods, or let a registered
//! translator ([`ContainerBuilder::register_translator`]) derive it from the
//! context they do have. Dependency loops are detected per thread and
//! reported as [`DiError::DependencyLoop`] with the full cycle.

pub mod binding;
pub mod collection;
pub mod container;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod observer;

mod internal;
mod registry;
mod scope;
mod translator;
mod trigger;

pub use binding::{Binding, BindingId, FactoryFn, RefPolicy};
pub use collection::{ContainerBuilder, ContainerModule};
pub use container::{BindingRuntime, Container, Factory, Producer, Provider};
pub use context::{AnyArc, Context};
pub use descriptors::BindingDescriptor;
pub use error::{DiError, DiResult};
pub use key::{ContextKind, Key, TypeRef};
pub use observer::{LoggingObserver, ResolutionObserver};

#[cfg(test)]
mod smoke {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn provider_runs_every_time() {
        let mut builder = ContainerBuilder::new();
        builder
            .bind_provider::<String, _>(None, |_| Ok("fresh".to_string()))
            .unwrap();
        let container = builder.build().unwrap();
        let a = container.instance::<String>(None).unwrap();
        let b = container.instance::<String>(None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn missing_binding_is_not_found() {
        let container = ContainerBuilder::new().build().unwrap();
        let err = container.instance::<u32>(None).unwrap_err();
        assert!(matches!(err, DiError::NotFound(_)));
    }

    #[test]
    fn or_none_does_not_error_on_missing() {
        let container = ContainerBuilder::new().build().unwrap();
        assert!(container.instance_or_none::<u32>(None).unwrap().is_none());
    }
}
