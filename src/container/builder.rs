//! Registration phase: bindings, classes and hooks, frozen by `build`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::class::{ClassDescriptor, ClassRegistry};
use crate::config::ContainerConfig;
use crate::container::{CallbackFn, Container, ExtenderFn, ResolverContext, Shared};
use crate::definition::{Concrete, DefinitionStore, FactoryFn, ServiceDefinition};
use crate::error::{DiError, DiResult};
use crate::lifetime::Lifetime;
use crate::metrics::{MetricsCollector, MetricsSink};
use crate::prototype::{PrototypeAnalyzer, PrototypeCache, TypeIntrospector};
use crate::registration::Registrar;
use crate::scope::ScopeRegistry;
use crate::AnyArc;

type IntrospectorLayer = Box<dyn FnOnce(Arc<dyn TypeIntrospector>) -> Arc<dyn TypeIntrospector>>;

/// Collects definitions, classes and hooks, then builds a [`Container`].
///
/// Definitions cannot change once the container is built; pre-built
/// instances can still be added at runtime with [`Container::instance`].
///
/// # Examples
///
/// ```rust
/// use resolvit::{ClassBuilder, ContainerBuilder, Param, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct ServiceY;
/// struct ServiceX { dependency: Arc<ServiceY> }
///
/// let mut builder = ContainerBuilder::new();
/// builder.class(ClassBuilder::<ServiceY>::with_default("ServiceY"));
/// builder.class(
///     ClassBuilder::<ServiceX>::new("ServiceX")
///         .param(Param::service("dependency", "ServiceY"))
///         .constructor(|args| Ok(ServiceX { dependency: args.service("dependency")? })),
/// );
/// builder.bind("ServiceX", "ServiceX");
///
/// let container = builder.build();
/// let x = container.get_as::<ServiceX>("ServiceX").unwrap();
/// let _y: &ServiceY = &x.dependency;
/// ```
pub struct ContainerBuilder {
    definitions: DefinitionStore,
    classes: ClassRegistry,
    instances: Vec<(String, AnyArc)>,
    extenders: HashMap<String, Vec<ExtenderFn>>,
    callbacks: HashMap<String, Vec<CallbackFn>>,
    global_callbacks: Vec<CallbackFn>,
    sinks: Vec<Arc<dyn MetricsSink>>,
    collector: Option<Arc<MetricsCollector>>,
    introspector_layer: Option<IntrospectorLayer>,
    config: ContainerConfig,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            definitions: DefinitionStore::new(),
            classes: ClassRegistry::new(),
            instances: Vec::new(),
            extenders: HashMap::new(),
            callbacks: HashMap::new(),
            global_callbacks: Vec::new(),
            sinks: Vec::new(),
            collector: None,
            introspector_layer: None,
            config: ContainerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Reports every resolution to `sink`. Several sinks may be installed.
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Installs the bundled [`MetricsCollector`], reachable afterwards via
    /// [`Container::metrics`].
    pub fn with_metrics(mut self) -> Self {
        let collector = Arc::new(MetricsCollector::new());
        self.sinks.push(collector.clone());
        self.collector = Some(collector);
        self
    }

    /// Wraps the introspector built from the registered classes, e.g. to
    /// count or log lookups. Prototype analysis goes through the result.
    pub fn layer_introspector<F>(mut self, layer: F) -> Self
    where
        F: FnOnce(Arc<dyn TypeIntrospector>) -> Arc<dyn TypeIntrospector> + 'static,
    {
        self.introspector_layer = Some(Box::new(layer));
        self
    }

    // ----- Classes -----

    /// Registers a class so it can be bound by name or autowired.
    pub fn class(&mut self, class: impl Into<ClassDescriptor>) -> &mut Self {
        let class = class.into();
        tracing::trace!(class = class.name(), "class registered");
        self.classes.register(class);
        self
    }

    /// Registers an interface or abstract type that must be bound to be built.
    pub fn interface(&mut self, name: impl Into<String>) -> &mut Self {
        self.class(ClassDescriptor::interface(name))
    }

    // ----- Class bindings -----

    /// Binds `abstract_id` to the class `concrete` with a transient lifetime.
    pub fn bind(&mut self, abstract_id: impl Into<String>, concrete: impl Into<String>) -> Registrar<'_> {
        self.register(abstract_id, concrete, Lifetime::Transient)
    }

    pub fn singleton(&mut self, abstract_id: impl Into<String>, concrete: impl Into<String>) -> Registrar<'_> {
        self.register(abstract_id, concrete, Lifetime::Singleton)
    }

    pub fn scoped(&mut self, abstract_id: impl Into<String>, concrete: impl Into<String>) -> Registrar<'_> {
        self.register(abstract_id, concrete, Lifetime::Scoped)
    }

    pub fn register(
        &mut self,
        abstract_id: impl Into<String>,
        concrete: impl Into<String>,
        lifetime: Lifetime,
    ) -> Registrar<'_> {
        let definition = ServiceDefinition::new(abstract_id, Concrete::Class(concrete.into()), lifetime);
        self.define(definition)
    }

    /// Stores a fully formed definition, replacing any previous one.
    pub fn define(&mut self, definition: ServiceDefinition) -> Registrar<'_> {
        tracing::trace!(
            id = %definition.abstract_id,
            concrete = %definition.concrete,
            lifetime = %definition.lifetime,
            "binding registered"
        );
        Registrar::new(self.definitions.upsert(definition))
    }

    // ----- Factory bindings -----

    pub fn bind_factory<T, F>(&mut self, abstract_id: impl Into<String>, factory: F) -> Registrar<'_>
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.factory(abstract_id, Lifetime::Transient, factory)
    }

    pub fn singleton_factory<T, F>(&mut self, abstract_id: impl Into<String>, factory: F) -> Registrar<'_>
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.factory(abstract_id, Lifetime::Singleton, factory)
    }

    pub fn scoped_factory<T, F>(&mut self, abstract_id: impl Into<String>, factory: F) -> Registrar<'_>
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.factory(abstract_id, Lifetime::Scoped, factory)
    }

    pub fn factory<T, F>(&mut self, abstract_id: impl Into<String>, lifetime: Lifetime, factory: F) -> Registrar<'_>
    where
        T: Any + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let erased: FactoryFn = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let instance: AnyArc = factory(ctx)?;
            Ok(instance)
        });
        self.define(ServiceDefinition::new(abstract_id, Concrete::Factory(erased), lifetime))
    }

    /// Factory producing a trait object, resolved with
    /// [`Resolver::get_trait`](crate::Resolver::get_trait).
    pub fn trait_factory<Trait, F>(
        &mut self,
        abstract_id: impl Into<String>,
        lifetime: Lifetime,
        factory: F,
    ) -> Registrar<'_>
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        // Stored as Arc<Arc<dyn Trait>> so it survives the trip through Any.
        let erased: FactoryFn = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let instance = factory(ctx)?;
            Ok(Arc::new(instance))
        });
        self.define(ServiceDefinition::new(abstract_id, Concrete::Factory(erased), lifetime))
    }

    pub fn singleton_trait_factory<Trait, F>(&mut self, abstract_id: impl Into<String>, factory: F) -> Registrar<'_>
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.trait_factory(abstract_id, Lifetime::Singleton, factory)
    }

    // ----- Instances and aliases -----

    /// Pre-built instance placed in the singleton tier at build time.
    pub fn instance<T: Any + Send + Sync>(&mut self, abstract_id: impl Into<String>, value: Arc<T>) -> &mut Self {
        self.instances.push((abstract_id.into(), value));
        self
    }

    pub fn instance_trait<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        abstract_id: impl Into<String>,
        value: Arc<T>,
    ) -> &mut Self {
        self.instances.push((abstract_id.into(), Arc::new(value)));
        self
    }

    /// Makes `alias` resolve exactly like `abstract_id`.
    pub fn alias(&mut self, alias: impl Into<String>, abstract_id: impl Into<String>) -> DiResult<&mut Self> {
        self.definitions.alias(alias, abstract_id)?;
        Ok(self)
    }

    // ----- Hooks -----

    /// Decorates every freshly built `T` registered under `abstract_id`
    /// before it is cached.
    pub fn extend<T, F>(&mut self, abstract_id: impl Into<String>, extender: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>, &ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let abstract_id = abstract_id.into();
        let id = abstract_id.clone();
        self.extend_any(abstract_id, move |instance: AnyArc, ctx: &ResolverContext<'_>| {
            let typed = instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
                id: id.clone(),
                expected: std::any::type_name::<T>(),
            })?;
            let extended: AnyArc = extender(typed, ctx)?;
            Ok(extended)
        })
    }

    pub fn extend_any<F>(&mut self, abstract_id: impl Into<String>, extender: F) -> &mut Self
    where
        F: Fn(AnyArc, &ResolverContext<'_>) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        self.extenders
            .entry(abstract_id.into())
            .or_default()
            .push(Arc::new(extender));
        self
    }

    /// Called with every instance built for `abstract_id`, after it is
    /// cached. Cache hits do not trigger it.
    pub fn resolving<F>(&mut self, abstract_id: impl Into<String>, callback: F) -> &mut Self
    where
        F: Fn(&str, &AnyArc) + Send + Sync + 'static,
    {
        self.callbacks
            .entry(abstract_id.into())
            .or_default()
            .push(Arc::new(callback));
        self
    }

    /// Like [`resolving`](Self::resolving), for every service.
    pub fn resolving_any<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&str, &AnyArc) + Send + Sync + 'static,
    {
        self.global_callbacks.push(Arc::new(callback));
        self
    }

    // ----- Inspection -----

    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Freezes the registrations into a container.
    pub fn build(self) -> Container {
        let registry: Arc<dyn TypeIntrospector> = Arc::new(self.classes.clone());
        let introspector = match self.introspector_layer {
            Some(layer) => layer(registry),
            None => registry,
        };
        let prototypes = match &self.config.prototype_cache_dir {
            Some(dir) => PrototypeCache::persisted(dir.clone()),
            None => PrototypeCache::in_memory(),
        };

        let scopes = ScopeRegistry::new();
        for (id, instance) in self.instances {
            let target = self.definitions.resolve_alias(&id).unwrap_or(&id);
            scopes.put_singleton(target, instance);
        }

        tracing::debug!(
            definitions = self.definitions.len(),
            classes = self.classes.len(),
            singletons = scopes.singleton_count(),
            persisted_prototypes = self.config.prototype_cache_dir.is_some(),
            "container built"
        );

        let shared = Shared {
            definitions: self.definitions,
            classes: self.classes,
            analyzer: PrototypeAnalyzer::new(introspector),
            prototypes,
            extenders: self.extenders,
            callbacks: self.callbacks,
            global_callbacks: self.global_callbacks,
            sinks: self.sinks,
            collector: self.collector,
            config: self.config,
        };
        Container::from_parts(shared, scopes)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("definitions", &self.definitions.len())
            .field("classes", &self.classes.len())
            .field("instances", &self.instances.len())
            .field("config", &self.config)
            .finish()
    }
}
