//! Container composition: the builder, typed bind methods, and modules.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::binding::{ArgKeyer, Binding, RefPolicy};
use crate::container::{BindingRuntime, Container, ContainerInner};
use crate::context::AnyArc;
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::observer::{Observers, ResolutionObserver};
use crate::registry::RegistryBuilder;
use crate::translator::TranslatorGraphBuilder;

type ReadyCallback = Box<dyn FnOnce(&Container) -> DiResult<()> + Send>;

/// Mutable composition surface for a [`Container`].
///
/// Registrations happen here and only here; [`build`](Self::build) freezes
/// everything into an immutable container. Re-binding an already-bound key
/// is a composition-time conflict unless explicitly marked as an override
/// (or the builder was created with
/// [`with_silent_override`](Self::with_silent_override)).
///
/// # Examples
///
/// ```
/// use crucible_di::ContainerBuilder;
///
/// struct Config { url: String }
/// struct Database { url: String }
///
/// let mut builder = ContainerBuilder::new();
/// builder.bind_instance(None, Config { url: "postgres://localhost".into() })?;
/// builder.bind_singleton::<Database, _>(None, |rt| {
///     let config = rt.instance::<Config>(None)?;
///     Ok(Database { url: config.url.clone() })
/// })?;
/// let container = builder.build()?;
///
/// let db = container.instance::<Database>(None)?;
/// assert_eq!(db.url, "postgres://localhost");
/// # Ok::<(), crucible_di::DiError>(())
/// ```
pub struct ContainerBuilder {
    registry: RegistryBuilder,
    translators: TranslatorGraphBuilder,
    observers: Vec<Arc<dyn ResolutionObserver>>,
    eager: Vec<Key>,
    ready: Vec<ReadyCallback>,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    /// A builder where re-binding a bound key conflicts unless marked as an
    /// override.
    pub fn new() -> Self {
        Self {
            registry: RegistryBuilder::new(false),
            translators: TranslatorGraphBuilder::new(),
            observers: Vec::new(),
            eager: Vec::new(),
            ready: Vec::new(),
        }
    }

    /// A builder where any registration may silently shadow an earlier one.
    /// Useful for test harnesses that patch a production composition.
    pub fn with_silent_override() -> Self {
        Self {
            registry: RegistryBuilder::new(true),
            ..Self::new()
        }
    }

    /// Registers a pre-built binding under an explicit key. The typed
    /// `bind_*` methods funnel through here.
    pub fn register(&mut self, key: Key, binding: Binding, allow_override: bool) -> DiResult<()> {
        self.registry.register(key, binding, allow_override)
    }

    /// Binds an existing value; every resolution yields the same `Arc`.
    pub fn bind_instance<T: Send + Sync + 'static>(
        &mut self,
        tag: Option<&'static str>,
        value: T,
    ) -> DiResult<()> {
        let shared = Arc::new(value);
        let binding = Binding::new(
            "instance",
            RefPolicy::Unscoped,
            Binding::erase(move |_, _| Ok(shared.clone() as AnyArc)),
        );
        self.register(Key::of::<T>(tag), binding, false)
    }

    /// Binds a provider: the closure runs on every resolution.
    pub fn bind_provider<T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_provider_with(tag, f, false)
    }

    /// Like [`bind_provider`](Self::bind_provider), shadowing an existing
    /// binding for the same key.
    pub fn bind_provider_override<T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_provider_with(tag, f, true)
    }

    fn bind_provider_with<T, F>(
        &mut self,
        tag: Option<&'static str>,
        f: F,
        allow_override: bool,
    ) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = Binding::new(
            "provider",
            RefPolicy::Unscoped,
            Binding::erase(move |rt, _| Ok(Arc::new(f(rt)?) as AnyArc)),
        );
        self.register(Key::of::<T>(tag), binding, allow_override)
    }

    /// Binds a singleton: the closure runs at most once, and the value is
    /// retained for the container's lifetime.
    pub fn bind_singleton<T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_cached(tag, RefPolicy::Strong, "singleton", f, false)
    }

    /// Like [`bind_singleton`](Self::bind_singleton), shadowing an existing
    /// binding for the same key.
    pub fn bind_singleton_override<T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_cached(tag, RefPolicy::Strong, "singleton", f, true)
    }

    /// Binds a singleton cached per calling thread.
    pub fn bind_thread_singleton<T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_cached(tag, RefPolicy::PerThread, "thread singleton", f, false)
    }

    /// Binds a singleton retained only while externally referenced.
    pub fn bind_weak_singleton<T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_cached(tag, RefPolicy::Weak, "weak singleton", f, false)
    }

    fn bind_cached<T, F>(
        &mut self,
        tag: Option<&'static str>,
        policy: RefPolicy,
        kind: &'static str,
        f: F,
        allow_override: bool,
    ) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = Binding::new(
            kind,
            policy,
            Binding::erase(move |rt, _| Ok(Arc::new(f(rt)?) as AnyArc)),
        );
        self.register(Key::of::<T>(tag), binding, allow_override)
    }

    /// Binds a one-argument factory: the closure runs on every call with the
    /// caller-supplied argument.
    pub fn bind_factory<A, T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        A: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime, A) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_factory_with(tag, f, false)
    }

    /// Like [`bind_factory`](Self::bind_factory), shadowing an existing
    /// binding for the same key.
    pub fn bind_factory_override<A, T, F>(
        &mut self,
        tag: Option<&'static str>,
        f: F,
    ) -> DiResult<()>
    where
        A: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime, A) -> DiResult<T> + Send + Sync + 'static,
    {
        self.bind_factory_with(tag, f, true)
    }

    fn bind_factory_with<A, T, F>(
        &mut self,
        tag: Option<&'static str>,
        f: F,
        allow_override: bool,
    ) -> DiResult<()>
    where
        A: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime, A) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = Binding::new(
            "factory",
            RefPolicy::Unscoped,
            Binding::erase(move |rt, arg| {
                let arg = typed_arg::<A>(arg)?;
                Ok(Arc::new(f(rt, arg)?) as AnyArc)
            }),
        );
        self.register(Key::of::<T>(tag).with_arg::<A>(), binding, allow_override)
    }

    /// Binds a multiton: one cached value per distinct argument, retained
    /// for the container's lifetime. The argument doubles as the cache key,
    /// hence the `Hash` bound.
    pub fn bind_multiton<A, T, F>(&mut self, tag: Option<&'static str>, f: F) -> DiResult<()>
    where
        A: Clone + Hash + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime, A) -> DiResult<T> + Send + Sync + 'static,
    {
        let keyer: ArgKeyer = Arc::new(|any: &AnyArc| {
            let arg = any.clone().downcast::<A>().ok()?;
            let mut hasher = DefaultHasher::new();
            arg.hash(&mut hasher);
            Some(hasher.finish())
        });
        let binding = Binding::new(
            "multiton",
            RefPolicy::Strong,
            Binding::erase(move |rt, arg| {
                let arg = typed_arg::<A>(arg)?;
                Ok(Arc::new(f(rt, arg)?) as AnyArc)
            }),
        )
        .with_arg_keyer(keyer);
        self.register(Key::of::<T>(tag).with_arg::<A>(), binding, false)
    }

    /// Binds a provider available only under a context of type `C`.
    pub fn bind_contextual_provider<C, T, F>(
        &mut self,
        tag: Option<&'static str>,
        f: F,
    ) -> DiResult<()>
    where
        C: Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime, Arc<C>) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = Binding::new(
            "provider",
            RefPolicy::Unscoped,
            Binding::erase(move |rt, _| {
                let ctx = rt.context_as::<C>()?;
                Ok(Arc::new(f(rt, ctx)?) as AnyArc)
            }),
        );
        self.register(Key::of::<T>(tag).in_context::<C>(), binding, false)
    }

    /// Binds a singleton available only under a context of type `C`,
    /// cached once per context value.
    pub fn bind_contextual_singleton<C, T, F>(
        &mut self,
        tag: Option<&'static str>,
        f: F,
    ) -> DiResult<()>
    where
        C: Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&BindingRuntime, Arc<C>) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = Binding::new(
            "singleton",
            RefPolicy::Strong,
            Binding::erase(move |rt, _| {
                let ctx = rt.context_as::<C>()?;
                Ok(Arc::new(f(rt, ctx)?) as AnyArc)
            }),
        );
        self.register(Key::of::<T>(tag).in_context::<C>(), binding, false)
    }

    /// Registers a directed context translator from `C` to `S`.
    pub fn register_translator<C, S, F>(&mut self, f: F)
    where
        C: Send + Sync + 'static,
        S: Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<S> + Send + Sync + 'static,
    {
        self.translators.register::<C, S, F>(f);
    }

    /// Registers a context finder: produces an `S` context from any caller
    /// context, including none.
    pub fn register_context_finder<S, F>(&mut self, f: F)
    where
        S: Send + Sync + 'static,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        self.translators.register_finder::<S, F>(f);
    }

    /// Marks the binding for `T` for eager construction when
    /// [`Container::trigger`] runs.
    pub fn eager<T: Send + Sync + 'static>(&mut self, tag: Option<&'static str>) {
        self.eager_key(Key::of::<T>(tag));
    }

    /// Marks an explicit key for eager construction.
    pub fn eager_key(&mut self, key: Key) {
        self.eager.push(key);
    }

    /// Adds a resolution observer.
    pub fn add_observer(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    /// Registers a callback run by [`build`](Self::build) once the container
    /// is frozen, receiving the finished container.
    ///
    /// Callbacks run in registration order; the first failure aborts the
    /// build.
    pub fn on_ready<F>(&mut self, f: F)
    where
        F: FnOnce(&Container) -> DiResult<()> + Send + 'static,
    {
        self.ready.push(Box::new(f));
    }

    /// Imports a module's registrations into this builder.
    ///
    /// With `allow_override` set, every registration the module makes may
    /// shadow existing bindings; the builder's own policy is restored
    /// afterwards, even when the module fails.
    pub fn extend(&mut self, module: ContainerModule, allow_override: bool) -> DiResult<()> {
        let previous = self.registry.set_silent_override(allow_override);
        let result = (module.init)(self);
        self.registry.set_silent_override(previous);
        result.map_err(|err| match err {
            DiError::BindingConflict(key) => {
                DiError::BindingConflict(format!("{} (module {:?})", key, module.name))
            }
            other => other,
        })
    }

    /// Freezes the composition into an immutable container, then runs the
    /// [`on_ready`](Self::on_ready) callbacks against it.
    pub fn build(self) -> DiResult<Container> {
        let Self {
            registry,
            translators,
            observers,
            eager,
            ready,
        } = self;
        let container = Container::from_inner(ContainerInner {
            registry: registry.freeze(),
            translators: translators.freeze(),
            observers: Observers::from_vec(observers),
            eager,
        });
        for callback in ready {
            callback(&container)?;
        }
        Ok(container)
    }
}

fn typed_arg<A: Clone + Send + Sync + 'static>(arg: Option<AnyArc>) -> DiResult<A> {
    let arg = arg.ok_or(DiError::TypeMismatch(std::any::type_name::<A>()))?;
    let arg = arg
        .downcast::<A>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<A>()))?;
    Ok((*arg).clone())
}

/// A named, reusable set of registrations.
///
/// Modules let independent pieces of an application describe their own
/// bindings; a composition root imports them with
/// [`ContainerBuilder::extend`].
pub struct ContainerModule {
    name: &'static str,
    init: Box<dyn FnOnce(&mut ContainerBuilder) -> DiResult<()> + Send>,
}

impl ContainerModule {
    pub fn new<F>(name: &'static str, init: F) -> Self
    where
        F: FnOnce(&mut ContainerBuilder) -> DiResult<()> + Send + 'static,
    {
        Self {
            name,
            init: Box::new(init),
        }
    }

    /// The module's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}
