//! The frozen container and its resolution engine.
//!
//! Resolution walks: registry lookup (exact chain, wildcard fallback,
//! translator-reachable chains), override-level selection, context
//! translation, loop detection, and scope caching. The container is
//! immutable and safe for concurrent resolution from any number of threads.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::binding::Binding;
use crate::context::{AnyArc, Context, ContextId};
use crate::descriptors::BindingDescriptor;
use crate::error::{DiError, DiResult};
use crate::internal::{Frame, StackGuard};
use crate::key::Key;
use crate::observer::Observers;
use crate::registry::Registry;
use crate::scope::ScopeSlot;
use crate::translator::TranslatorGraph;

/// The immutable aggregate of a frozen registry, the translator graph, and
/// global policy. Built once by [`ContainerBuilder`](crate::ContainerBuilder)
/// and never mutated after.
///
/// Cloning is cheap (`Arc` internally); clones share all caches.
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").finish_non_exhaustive()
    }
}

pub(crate) struct ContainerInner {
    pub(crate) registry: Registry,
    pub(crate) translators: TranslatorGraph,
    pub(crate) observers: Observers,
    pub(crate) eager: Vec<Key>,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Container {
    pub(crate) fn from_inner(inner: ContainerInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    /// Resolves a producer for `key` at the given override level.
    ///
    /// Fails with `NotFound` when no binding satisfies the key and context,
    /// directly, via the wildcard chain, or via context translation.
    pub fn resolve_factory(
        &self,
        key: &Key,
        context: &Context,
        level: usize,
    ) -> DiResult<Producer> {
        self.resolve_factory_or_none(key, context, level)?
            .ok_or_else(|| DiError::NotFound(key.to_string()))
    }

    /// Like [`resolve_factory`](Self::resolve_factory) but yields `Ok(None)`
    /// instead of `NotFound`.
    pub fn resolve_factory_or_none(
        &self,
        key: &Key,
        context: &Context,
        level: usize,
    ) -> DiResult<Option<Producer>> {
        let Some((binding, resolved_key, translated)) = self.lookup(key, context, level)? else {
            return Ok(None);
        };
        Ok(Some(Producer {
            container: self.clone(),
            key: resolved_key,
            binding,
            context: translated,
            level,
        }))
    }

    // Chain selection order: exact-context chain, then the wildcard chain,
    // then exact chains in other contexts reachable through translation
    // (deterministic candidate order). An exact chain entirely shadows the
    // wildcard one, so an out-of-range level inside it is NotFound rather
    // than a fallthrough.
    fn lookup(
        &self,
        key: &Key,
        context: &Context,
        level: usize,
    ) -> DiResult<Option<(Binding, Key, Context)>> {
        let registry = &self.inner.registry;

        if let Some(chain) = registry.exact(key) {
            let Some(binding) = chain.get(level) else {
                return Ok(None);
            };
            let Some(translated) = self.inner.translators.translate(context, &key.context)? else {
                return Ok(None);
            };
            return Ok(Some((binding.clone(), key.clone(), translated)));
        }

        if !key.context.is_any() {
            let fallback = key.with_any_context();
            if let Some(chain) = registry.exact(&fallback) {
                let Some(binding) = chain.get(level) else {
                    return Ok(None);
                };
                // Wildcard bindings take the caller context as-is.
                return Ok(Some((binding.clone(), fallback, context.clone())));
            }
        }

        for candidate in registry.contextual_candidates(key) {
            if let Some(translated) =
                self.inner.translators.translate(context, &candidate.context)?
            {
                let Some(chain) = registry.exact(candidate) else {
                    continue;
                };
                let Some(binding) = chain.get(level) else {
                    return Ok(None);
                };
                return Ok(Some((binding.clone(), candidate.clone(), translated)));
            }
        }

        Ok(None)
    }

    /// A zero-argument provider for `T` under the unit context.
    pub fn provider<T: Send + Sync + 'static>(
        &self,
        tag: Option<&'static str>,
    ) -> DiResult<Provider<T>> {
        self.provider_at(&Context::any(), tag)
    }

    /// A zero-argument provider for `T` under `context`.
    pub fn provider_at<T: Send + Sync + 'static>(
        &self,
        context: &Context,
        tag: Option<&'static str>,
    ) -> DiResult<Provider<T>> {
        let key = typed_key::<T>(context, tag);
        let producer = self.resolve_factory(&key, context, 0)?;
        Ok(Provider {
            producer,
            arg: None,
            _marker: PhantomData,
        })
    }

    /// Resolves an instance of `T` immediately under the unit context.
    pub fn instance<T: Send + Sync + 'static>(
        &self,
        tag: Option<&'static str>,
    ) -> DiResult<Arc<T>> {
        self.instance_at(&Context::any(), tag)
    }

    /// Resolves an instance of `T` immediately under `context`.
    pub fn instance_at<T: Send + Sync + 'static>(
        &self,
        context: &Context,
        tag: Option<&'static str>,
    ) -> DiResult<Arc<T>> {
        self.provider_at::<T>(context, tag)?.get()
    }

    /// Resolves an instance of `T`, yielding `Ok(None)` when no binding
    /// exists instead of `NotFound`.
    pub fn instance_or_none<T: Send + Sync + 'static>(
        &self,
        tag: Option<&'static str>,
    ) -> DiResult<Option<Arc<T>>> {
        let context = Context::any();
        let key = typed_key::<T>(&context, tag);
        match self.resolve_factory_or_none(&key, &context, 0)? {
            Some(producer) => Ok(Some(downcast::<T>(producer.call(None)?)?)),
            None => Ok(None),
        }
    }

    /// A one-argument factory handle producing `T` from `A` under the unit
    /// context.
    pub fn factory<A, T>(&self, tag: Option<&'static str>) -> DiResult<Factory<A, T>>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.factory_at(&Context::any(), tag)
    }

    /// A one-argument factory handle producing `T` from `A` under `context`.
    pub fn factory_at<A, T>(
        &self,
        context: &Context,
        tag: Option<&'static str>,
    ) -> DiResult<Factory<A, T>>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let key = typed_key::<T>(context, tag).with_arg::<A>();
        let producer = self.resolve_factory(&key, context, 0)?;
        Ok(Factory {
            producer,
            _marker: PhantomData,
        })
    }

    /// Enumerates `(key, binding metadata)` for every registered binding,
    /// in deterministic order, without affecting resolution.
    pub fn descriptors(&self) -> Vec<BindingDescriptor> {
        let mut out = Vec::new();
        for (key, chain) in self.inner.registry.iter() {
            for (level, binding) in chain.iter().enumerate() {
                out.push(BindingDescriptor {
                    key: key.clone(),
                    kind: binding.kind,
                    policy: binding.policy,
                    override_level: level,
                });
            }
        }
        out.sort_by(|a, b| {
            (a.key.to_string(), a.override_level).cmp(&(b.key.to_string(), b.override_level))
        });
        out
    }
}

fn typed_key<T: 'static>(context: &Context, tag: Option<&'static str>) -> Key {
    let mut key = Key::of::<T>(tag);
    key.context = context.kind();
    key
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

/// A resolved producer: the selected binding bound to its translated context
/// and override level.
///
/// Calling a producer performs loop detection, scope caching, and the actual
/// factory invocation. Lookup failures surface at
/// [`resolve_factory`](Container::resolve_factory); construction failures
/// surface here, at the point of use.
pub struct Producer {
    container: Container,
    key: Key,
    binding: Binding,
    context: Context,
    level: usize,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("key", &self.key)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl Producer {
    /// The key this producer was resolved under (after wildcard or
    /// translation fallback).
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The translated context the binding will see.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Invokes the binding, honoring its reference policy.
    ///
    /// The loop-detection frame is pushed before the scope is consulted and
    /// popped on every exit path, so a failed construction never leaves a
    /// stale entry behind.
    pub fn call(&self, arg: Option<AnyArc>) -> DiResult<AnyArc> {
        // A wildcard binding is not context-keyed: whatever context the
        // caller carries, it shares one cache identity. Only bindings that
        // declare an exact context get per-context caching, and the loop
        // frame uses the same identity so re-entry through any caller
        // context is still caught.
        let cache_context = if self.key.context.is_any() {
            ContextId::Any
        } else {
            self.context.id()
        };
        let observers = &self.container.inner.observers;
        let _guard = match StackGuard::push(Frame {
            key: self.key.clone(),
            context: cache_context,
            level: self.level,
            context_name: self.context.type_name(),
        }) {
            Ok(guard) => guard,
            Err(err) => {
                observers.failed(&self.key, &err);
                return Err(err);
            }
        };

        let watched = !observers.is_empty();
        let start = if watched {
            observers.resolving(&self.key, &self.context);
            Some(Instant::now())
        } else {
            None
        };

        let runtime = BindingRuntime {
            container: self.container.clone(),
            key: self.key.clone(),
            context: self.context.clone(),
            level: self.level,
        };
        let result = match &self.binding.scope {
            Some(scope) => {
                let slot = ScopeSlot {
                    binding: self.binding.id,
                    arg: match (&self.binding.arg_keyer, &arg) {
                        (Some(keyer), Some(value)) => keyer(value),
                        _ => None,
                    },
                };
                let factory = self.binding.factory.clone();
                scope.get_or_create(slot, cache_context, || factory(&runtime, arg))
            }
            None => (self.binding.factory)(&runtime, arg),
        };

        match &result {
            Ok(_) => {
                if let Some(start) = start {
                    observers.resolved(&self.key, start.elapsed());
                }
            }
            Err(err) => observers.failed(&self.key, err),
        }
        result
    }
}

/// Typed zero-argument producer wrapper.
pub struct Provider<T> {
    producer: Producer,
    // Pre-bound argument when this provider was curried from a factory.
    arg: Option<AnyArc>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    /// Produces a value, consulting the binding's scope cache.
    pub fn get(&self) -> DiResult<Arc<T>> {
        downcast::<T>(self.producer.call(self.arg.clone())?)
    }

    /// The underlying producer.
    pub fn producer(&self) -> &Producer {
        &self.producer
    }
}

/// Typed one-argument producer wrapper.
pub struct Factory<A, T> {
    producer: Producer,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A, T> Factory<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Produces a value from `arg`, consulting the binding's scope cache.
    pub fn call(&self, arg: A) -> DiResult<Arc<T>> {
        downcast::<T>(self.producer.call(Some(Arc::new(arg) as AnyArc))?)
    }

    /// Pre-binds `arg`, yielding a zero-argument provider.
    pub fn curry(self, arg: A) -> Provider<T> {
        Provider {
            producer: self.producer,
            arg: Some(Arc::new(arg) as AnyArc),
            _marker: PhantomData,
        }
    }
}

/// The runtime view a factory receives while it is being invoked.
///
/// Gives access to the (translated) context, nested resolution sharing that
/// context, and delegation to the next binding in the same override chain.
pub struct BindingRuntime {
    container: Container,
    key: Key,
    context: Context,
    level: usize,
}

impl BindingRuntime {
    /// The container this resolution runs in.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The translated context of this resolution.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Downcasts the context to `C`.
    pub fn context_as<C: Send + Sync + 'static>(&self) -> DiResult<Arc<C>> {
        self.context.downcast::<C>()
    }

    /// Resolves an instance of `T`, sharing this resolution's context.
    pub fn instance<T: Send + Sync + 'static>(
        &self,
        tag: Option<&'static str>,
    ) -> DiResult<Arc<T>> {
        self.container.instance_at(&self.context, tag)
    }

    /// Resolves a provider of `T`, sharing this resolution's context.
    pub fn provider<T: Send + Sync + 'static>(
        &self,
        tag: Option<&'static str>,
    ) -> DiResult<Provider<T>> {
        self.container.provider_at(&self.context, tag)
    }

    /// Resolves a factory of `T` from `A`, sharing this resolution's context.
    pub fn factory<A, T>(&self, tag: Option<&'static str>) -> DiResult<Factory<A, T>>
    where
        A: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.container.factory_at(&self.context, tag)
    }

    /// The producer of the binding this one overrides (next in the chain).
    ///
    /// Fails with `NotFound` when no deeper binding exists.
    pub fn overridden_factory(&self) -> DiResult<Producer> {
        self.container
            .resolve_factory(&self.key, &self.context, self.level + 1)
    }

    /// Like [`overridden_factory`](Self::overridden_factory), but yields
    /// `Ok(None)` when this binding overrides nothing.
    pub fn overridden_factory_or_none(&self) -> DiResult<Option<Producer>> {
        self.container
            .resolve_factory_or_none(&self.key, &self.context, self.level + 1)
    }

    /// A typed provider over the overridden binding.
    pub fn overridden_provider<T: Send + Sync + 'static>(&self) -> DiResult<Provider<T>> {
        Ok(Provider {
            producer: self.overridden_factory()?,
            arg: None,
            _marker: PhantomData,
        })
    }

    /// Forces the overridden binding once and returns its typed value.
    pub fn overridden_instance<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast::<T>(self.overridden_factory()?.call(None)?)
    }

    /// Forces the overridden binding once, or yields `Ok(None)` when this
    /// binding overrides nothing.
    pub fn overridden_instance_or_none<T: Send + Sync + 'static>(
        &self,
    ) -> DiResult<Option<Arc<T>>> {
        match self.overridden_factory_or_none()? {
            Some(producer) => Ok(Some(downcast::<T>(producer.call(None)?)?)),
            None => Ok(None),
        }
    }
}
