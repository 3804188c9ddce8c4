//! The resolution state machine.
//!
//! One call to [`Engine::resolve`] walks
//! `CacheCheck -> DefinitionLookup -> PrototypeLookup -> ParameterResolution
//! -> Instantiate -> PropertyInjection -> MethodInjection -> ScopeStore`,
//! re-entering itself for nested dependencies. Any step may fail; the
//! session guard pops the in-flight stack on every exit path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::arguments::Parameters;
use crate::container::{Container, ResolverContext};
use crate::definition::{Concrete, ServiceDefinition};
use crate::error::{DiError, DiResult};
use crate::internal::ResolutionSession;
use crate::lifetime::Lifetime;
use crate::metrics::{ResolutionEvent, ResolutionStrategy};
use crate::resolver::DependencyResolver;
use crate::AnyArc;

pub(crate) struct Engine<'a> {
    container: &'a Container,
    session: &'a ResolutionSession,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(container: &'a Container, session: &'a ResolutionSession) -> Self {
        Self { container, session }
    }

    pub(crate) fn container(&self) -> &'a Container {
        self.container
    }

    /// Resolves `id`. With `overrides` the caches are skipped and the
    /// overrides apply to the top-level constructor only.
    pub(crate) fn resolve(&self, id: &str, overrides: Option<&Parameters>) -> DiResult<AnyArc> {
        let started = Instant::now();
        let shared = self.container.shared();
        let scopes = self.container.scopes();
        let abstract_id = shared.definitions.resolve_alias(id)?;

        if overrides.is_none() {
            if let Some(cached) = scopes.get(abstract_id) {
                tracing::trace!(id = abstract_id, "cache hit");
                if shared.config.record_cache_hits {
                    self.report(abstract_id, ResolutionStrategy::CacheHit, started);
                }
                return Ok(cached);
            }
        }

        let _in_flight = self.session.enter(abstract_id)?;
        tracing::trace!(id = abstract_id, depth = self.session.depth(), "resolving");

        let definition = shared.definitions.get(abstract_id);
        let lifetime = definition.map_or(Lifetime::Transient, |d| d.lifetime);
        if lifetime == Lifetime::Scoped && !scopes.in_scope() {
            return Err(DiError::NoActiveScope {
                id: abstract_id.to_string(),
            });
        }

        // Serialize construction per singleton; whoever waited reuses the winner's instance.
        let init_lock = (lifetime == Lifetime::Singleton && overrides.is_none())
            .then(|| scopes.singleton_init_lock(abstract_id));
        let initializing = init_lock.as_ref().map(|lock| lock.lock());
        if initializing.is_some() {
            if let Some(cached) = scopes.singleton(abstract_id) {
                tracing::trace!(id = abstract_id, "built by a concurrent caller");
                return Ok(cached);
            }
        }

        let (instance, strategy) = match definition {
            Some(definition) => self.build_bound(definition, overrides)?,
            None => {
                if !shared.config.autowire || !shared.classes.contains(abstract_id) {
                    return Err(DiError::NotFound { id: id.to_string() });
                }
                tracing::trace!(id = abstract_id, "autowiring");
                let instance = self.build_class(abstract_id, None, overrides)?;
                (instance, ResolutionStrategy::Autowire)
            }
        };

        let instance = self.apply_extenders(abstract_id, instance)?;
        let instance = self.store(abstract_id, lifetime, instance, overrides.is_some())?;
        self.fire_callbacks(abstract_id, &instance);
        self.report(abstract_id, strategy, started);
        Ok(instance)
    }

    fn build_bound(
        &self,
        definition: &ServiceDefinition,
        overrides: Option<&Parameters>,
    ) -> DiResult<(AnyArc, ResolutionStrategy)> {
        match &definition.concrete {
            Concrete::Factory(factory) => {
                tracing::trace!(id = %definition.abstract_id, "calling factory");
                let instance = factory(&ResolverContext::new(self.container, self.session))?;
                Ok((instance, ResolutionStrategy::Factory))
            }
            Concrete::Class(class) => {
                let definitions = &self.container.shared().definitions;
                let instance = match definition.delegates_to_other() {
                    // The concrete is itself bound: let its own definition decide how it is built.
                    Some(other) if definitions.has(other) || definitions.is_alias(other) => {
                        tracing::trace!(id = %definition.abstract_id, concrete = other, "delegating");
                        self.resolve(other, overrides)?
                    }
                    _ => self.build_class(class, Some(definition), overrides)?,
                };
                Ok((instance, ResolutionStrategy::Constructor))
            }
        }
    }

    /// Builds a class from its prototype: constructor, then properties,
    /// then injection methods in declaration order.
    fn build_class(
        &self,
        class: &str,
        definition: Option<&ServiceDefinition>,
        overrides: Option<&Parameters>,
    ) -> DiResult<AnyArc> {
        let prototype = self.container.prototype(class)?;
        if !prototype.is_instantiable {
            return Err(DiError::NotInstantiable {
                class: class.to_string(),
            });
        }
        let descriptor = self
            .container
            .shared()
            .classes
            .get(class)
            .ok_or_else(|| DiError::Reflection {
                class: class.to_string(),
                reason: "described by the introspector but never registered".to_string(),
            })?;
        let constructor = prototype.constructor.as_ref().ok_or_else(|| DiError::Reflection {
            class: class.to_string(),
            reason: "instantiable class has no constructor plan".to_string(),
        })?;

        let resolver = DependencyResolver::new(self, definition, overrides);
        let arguments = resolver.resolve_method(class, constructor)?;
        tracing::trace!(class, arguments = arguments.len(), "constructing");
        let mut instance = descriptor.construct(&arguments)?;

        for (position, property) in prototype.injected_properties.iter().enumerate() {
            let parameter = property.as_parameter(position);
            let argument = resolver.resolve_parameter(class, &property.name, &parameter)?;
            descriptor.inject_property(&mut *instance, &property.name, argument)?;
        }

        for method in &prototype.injected_methods {
            let arguments = resolver.resolve_method(class, method)?;
            descriptor.invoke_method(&mut *instance, &method.name, &arguments)?;
        }

        Ok(Arc::from(instance))
    }

    fn apply_extenders(&self, id: &str, mut instance: AnyArc) -> DiResult<AnyArc> {
        let Some(extenders) = self.container.shared().extenders.get(id) else {
            return Ok(instance);
        };
        let context = ResolverContext::new(self.container, self.session);
        for extender in extenders {
            instance = extender(instance, &context)?;
        }
        Ok(instance)
    }

    fn store(&self, id: &str, lifetime: Lifetime, instance: AnyArc, replace: bool) -> DiResult<AnyArc> {
        let scopes = self.container.scopes();
        match (lifetime, replace) {
            (Lifetime::Transient, _) => Ok(instance),
            (Lifetime::Singleton, false) => Ok(scopes.store_singleton(id, instance)),
            (Lifetime::Singleton, true) => {
                scopes.put_singleton(id, instance.clone());
                Ok(instance)
            }
            (Lifetime::Scoped, false) => scopes.store_scoped(id, instance),
            (Lifetime::Scoped, true) => {
                scopes.put_scoped(id, instance.clone())?;
                Ok(instance)
            }
        }
    }

    fn fire_callbacks(&self, id: &str, instance: &AnyArc) {
        let shared = self.container.shared();
        let specific = shared.callbacks.get(id).into_iter().flatten();
        for callback in shared.global_callbacks.iter().chain(specific) {
            callback(id, instance);
        }
    }

    /// Best-effort telemetry. Sink errors and panics are logged and dropped.
    fn report(&self, id: &str, strategy: ResolutionStrategy, started: Instant) {
        let sinks = &self.container.shared().sinks;
        if sinks.is_empty() {
            return;
        }
        let event = ResolutionEvent {
            service_id: id.to_string(),
            duration: started.elapsed(),
            strategy,
        };
        for sink in sinks {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.record(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::debug!(service = id, error = %err, "metrics sink failed"),
                Err(_) => tracing::debug!(service = id, "metrics sink panicked"),
            }
        }
    }
}
