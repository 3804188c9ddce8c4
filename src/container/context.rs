//! Resolver context handed to factories and extenders.

use crate::arguments::Parameters;
use crate::container::Container;
use crate::engine::Engine;
use crate::error::DiResult;
use crate::internal::ResolutionSession;
use crate::traits::{Resolver, ResolverCore};
use crate::AnyArc;

/// Context passed to factory functions for resolving dependencies.
///
/// Resolutions made through the context join the enclosing resolution, so
/// a factory that asks for its own service fails with a cycle error instead
/// of recursing.
///
/// # Examples
///
/// ```
/// use resolvit::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut builder = ContainerBuilder::new();
/// builder.instance("Database", Arc::new(Database { url: "postgres://localhost".to_string() }));
/// builder.bind_factory("UserService", |ctx| {
///     Ok(Arc::new(UserService { db: ctx.get_as::<Database>("Database")? }))
/// });
///
/// let container = builder.build();
/// let users = container.get_as::<UserService>("UserService").unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    container: &'a Container,
    session: &'a ResolutionSession,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(container: &'a Container, session: &'a ResolutionSession) -> Self {
        Self { container, session }
    }

    /// Number of resolutions in flight on this path, the current one included.
    pub fn depth(&self) -> usize {
        self.session.depth()
    }

    /// Identifiers in flight, outermost first.
    pub fn path(&self) -> Vec<String> {
        self.session.path()
    }

    fn engine(&self) -> Engine<'a> {
        Engine::new(self.container, self.session)
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, id: &str) -> DiResult<AnyArc> {
        self.engine().resolve(id, None)
    }

    fn make_any(&self, id: &str, parameters: &Parameters) -> DiResult<AnyArc> {
        self.engine().resolve(id, Some(parameters))
    }

    fn contains(&self, id: &str) -> bool {
        self.container.has(id)
    }
}

impl Resolver for ResolverContext<'_> {}
