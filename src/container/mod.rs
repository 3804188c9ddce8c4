//! The container façade.
//!
//! A [`Container`] is produced by [`ContainerBuilder::build`] and is the
//! entry point for every resolution. Definitions, classes, prototypes and
//! singletons live in state shared by all handles; each handle owns its own
//! scope stack, so [`Container::fork`] gives a concurrent request an
//! isolated set of scoped instances.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::arguments::Parameters;
use crate::class::ClassRegistry;
use crate::config::ContainerConfig;
use crate::definition::DefinitionStore;
use crate::engine::Engine;
use crate::error::DiResult;
use crate::internal::ResolutionSession;
use crate::metrics::{MetricsCollector, MetricsSink};
use crate::prototype::{
    metadata_fingerprint, PrototypeAnalyzer, PrototypeCache, PrototypeCacheStats, ServicePrototype,
};
use crate::scope::{EndedScope, ScopeRegistry};
use crate::traits::{Resolver, ResolverCore};
use crate::AnyArc;

pub mod builder;
pub mod context;

pub use builder::ContainerBuilder;
pub use context::ResolverContext;

pub(crate) type ExtenderFn =
    Arc<dyn for<'a> Fn(AnyArc, &ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type CallbackFn = Arc<dyn Fn(&str, &AnyArc) + Send + Sync>;

/// State shared by every handle of one container.
pub(crate) struct Shared {
    pub(crate) definitions: DefinitionStore,
    pub(crate) classes: ClassRegistry,
    pub(crate) analyzer: PrototypeAnalyzer,
    pub(crate) prototypes: PrototypeCache,
    pub(crate) extenders: HashMap<String, Vec<ExtenderFn>>,
    pub(crate) callbacks: HashMap<String, Vec<CallbackFn>>,
    pub(crate) global_callbacks: Vec<CallbackFn>,
    pub(crate) sinks: Vec<Arc<dyn MetricsSink>>,
    pub(crate) collector: Option<Arc<MetricsCollector>>,
    pub(crate) config: ContainerConfig,
}

/// Resolves services by abstract identifier.
///
/// # Examples
///
/// ```rust
/// use resolvit::{ClassBuilder, ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct ConsoleLogger;
/// #[derive(Default)]
/// struct RequestContext;
///
/// let mut builder = ContainerBuilder::new();
/// builder.class(ClassBuilder::<ConsoleLogger>::with_default("ConsoleLogger"));
/// builder.class(ClassBuilder::<RequestContext>::with_default("RequestContext"));
/// builder.singleton("Logger", "ConsoleLogger");
/// builder.scoped("RequestContext", "RequestContext");
/// let container = builder.build();
///
/// let a = container.get("Logger").unwrap();
/// let b = container.get("Logger").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let first = {
///     let scope = container.scope();
///     scope.get_as::<RequestContext>("RequestContext").unwrap()
/// };
/// let scope = container.scope();
/// let second = scope.get_as::<RequestContext>("RequestContext").unwrap();
/// assert!(!Arc::ptr_eq(&first, &second));
/// ```
pub struct Container {
    shared: Arc<Shared>,
    scopes: ScopeRegistry,
}

impl Container {
    pub(crate) fn from_parts(shared: Shared, scopes: ScopeRegistry) -> Self {
        Self {
            shared: Arc::new(shared),
            scopes,
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub(crate) fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.shared.config
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.shared.definitions
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.shared.classes
    }

    /// True when `id` is cached, bound, an alias of something that is, or
    /// (with autowiring on) a registered instantiable class. Never resolves.
    pub fn has(&self, id: &str) -> bool {
        let Ok(target) = self.shared.definitions.resolve_alias(id) else {
            return false;
        };
        self.scopes.has(target)
            || self.shared.definitions.has(target)
            || (self.shared.config.autowire && self.shared.classes.is_instantiable(target))
    }

    /// Resolves `id`, serving cached singleton and scoped instances.
    pub fn get(&self, id: &str) -> DiResult<AnyArc> {
        let session = ResolutionSession::new(self.shared.config.max_depth);
        Engine::new(self, &session).resolve(id, None)
    }

    /// Builds `id` with `parameters` taking precedence over every other
    /// source for the top-level constructor. Caches are skipped on the way
    /// in; the result replaces any cached instance on the way out.
    pub fn make(&self, id: &str, parameters: &Parameters) -> DiResult<AnyArc> {
        let session = ResolutionSession::new(self.shared.config.max_depth);
        Engine::new(self, &session).resolve(id, Some(parameters))
    }

    /// Registers a pre-built instance in the singleton tier.
    pub fn instance<T: Any + Send + Sync>(&self, id: &str, value: Arc<T>) {
        self.instance_any(id, value);
    }

    /// Registers a pre-built trait object; read it back with
    /// [`Resolver::get_trait`].
    pub fn instance_trait<T: ?Sized + Send + Sync + 'static>(&self, id: &str, value: Arc<T>) {
        self.instance_any(id, Arc::new(value));
    }

    pub fn instance_any(&self, id: &str, value: AnyArc) {
        let target = self.shared.definitions.resolve_alias(id).unwrap_or(id);
        tracing::debug!(id = target, "instance registered");
        self.scopes.put_singleton(target, value);
    }

    /// Opens a scope and returns the new depth.
    pub fn begin_scope(&self) -> usize {
        self.open_scope().1
    }

    fn open_scope(&self) -> (u64, usize) {
        let (id, depth) = self.scopes.open_scope();
        if let Some(collector) = &self.shared.collector {
            collector.record_scope_created();
        }
        tracing::debug!(scope = id, depth, "scope opened");
        (id, depth)
    }

    /// Closes the innermost scope, releasing its instances.
    ///
    /// Fails with [`DiError::ScopeUnderflow`](crate::DiError::ScopeUnderflow)
    /// when no scope is open.
    pub fn end_scope(&self) -> DiResult<EndedScope> {
        let ended = self.scopes.end_scope()?;
        self.scope_closed(&ended);
        Ok(ended)
    }

    fn scope_closed(&self, ended: &EndedScope) {
        if let Some(collector) = &self.shared.collector {
            collector.record_scope_ended();
        }
        tracing::debug!(
            scope = ended.id,
            released = ended.released,
            depth = ended.remaining_depth,
            "scope closed"
        );
    }

    /// Opens a scope that closes when the guard drops, including on panic.
    pub fn scope(&self) -> ScopeGuard<'_> {
        let (id, depth) = self.open_scope();
        ScopeGuard {
            container: self,
            id,
            depth,
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    /// Every service tagged `tag`, in registration order.
    pub fn tagged(&self, tag: &str) -> DiResult<Vec<AnyArc>> {
        self.shared
            .definitions
            .tagged(tag)
            .into_iter()
            .map(|id| self.get(id))
            .collect()
    }

    /// Drops the cached instance of `id` from every tier this handle sees.
    pub fn forget_instance(&self, id: &str) -> bool {
        let target = self.shared.definitions.resolve_alias(id).unwrap_or(id);
        self.scopes.forget(target)
    }

    /// Drops every cached singleton and closes every scope of this handle.
    /// Singletons are shared, so other handles lose them too.
    pub fn flush(&self) {
        tracing::debug!(
            singletons = self.scopes.singleton_count(),
            scopes = self.scopes.depth(),
            "flushing container"
        );
        self.scopes.clear();
    }

    /// New handle over the same definitions and singletons with an empty
    /// scope stack of its own.
    pub fn fork(&self) -> Container {
        Container {
            shared: self.shared.clone(),
            scopes: self.scopes.fork(),
        }
    }

    /// Construction plan for `class`, computed once and then cached.
    pub fn prototype(&self, class: &str) -> DiResult<Arc<ServicePrototype>> {
        let analyzer = &self.shared.analyzer;
        let fingerprint = self
            .shared
            .classes
            .get(class)
            .and_then(|descriptor| metadata_fingerprint(descriptor.metadata()));
        self.shared
            .prototypes
            .get_or_compute(class, fingerprint, || analyzer.analyze(class))
    }

    pub fn prototype_stats(&self) -> PrototypeCacheStats {
        self.shared.prototypes.stats()
    }

    /// Forgets every cached prototype, in memory and on disk.
    pub fn clear_prototypes(&self) {
        self.shared.prototypes.clear();
    }

    /// The bundled collector, when installed with `ContainerBuilder::with_metrics`.
    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.shared.collector.as_ref()
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, id: &str) -> DiResult<AnyArc> {
        self.get(id)
    }

    fn make_any(&self, id: &str, parameters: &Parameters) -> DiResult<AnyArc> {
        self.make(id, parameters)
    }

    fn contains(&self, id: &str) -> bool {
        self.has(id)
    }
}

impl Resolver for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.shared.definitions.len())
            .field("classes", &self.shared.classes.len())
            .field("prototypes", &self.shared.prototypes.len())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Open scope on a [`Container`], closed on drop.
///
/// Derefs to the container, so services resolve through the guard.
pub struct ScopeGuard<'c> {
    container: &'c Container,
    id: u64,
    depth: usize,
}

impl ScopeGuard<'_> {
    /// Depth of the scope this guard opened.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Container;

    fn deref(&self) -> &Container {
        self.container
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let Some(ended) = self.container.scopes.end_scopes_through(self.id) else {
            tracing::debug!(scope = self.id, "guarded scope already closed");
            return;
        };
        if ended.len() > 1 {
            tracing::warn!(
                scope = self.id,
                unclosed = ended.len() - 1,
                "closing scopes left open inside a guarded scope"
            );
        }
        for scope in &ended {
            self.container.scope_closed(scope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    #[derive(Default)]
    struct Clock;

    fn container() -> Container {
        let mut builder = ContainerBuilder::new();
        builder.class(ClassBuilder::<Clock>::with_default("Clock"));
        builder.alias("time", "Clock").unwrap();
        builder.build()
    }

    #[test]
    fn has_covers_every_source() {
        let container = container();
        assert!(container.has("Clock"));
        assert!(container.has("time"));
        assert!(!container.has("Calendar"));

        container.instance("Calendar", Arc::new(1u8));
        assert!(container.has("Calendar"));
    }

    #[test]
    fn guard_closes_scope_on_drop() {
        let container = container();
        {
            let scope = container.scope();
            assert_eq!(scope.depth(), 1);
            assert_eq!(scope.scope_depth(), 1);
        }
        assert_eq!(container.scope_depth(), 0);
    }

    #[test]
    fn forget_goes_through_aliases() {
        let container = container();
        container.instance("Clock", Arc::new(Clock));
        assert!(container.forget_instance("time"));
        assert!(!container.forget_instance("time"));
    }
}
