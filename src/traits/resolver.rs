//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::arguments::Parameters;
use crate::error::{DiError, DiResult};
use crate::AnyArc;

/// Object-safe resolution by abstract identifier.
///
/// Implemented by [`Container`](crate::Container) for top-level calls and by
/// [`ResolverContext`](crate::ResolverContext) for calls made from inside a
/// factory, where cycle detection must see the enclosing resolution.
///
/// Most users should use the [`Resolver`] trait instead, which adds typed
/// accessors on top of this one.
pub trait ResolverCore {
    /// Resolves `id`, returning a cached instance when the lifetime allows.
    fn resolve_any(&self, id: &str) -> DiResult<AnyArc>;

    /// Builds `id` with explicit parameter overrides, bypassing the caches on
    /// the way in. The result is still stored according to its lifetime.
    fn make_any(&self, id: &str, parameters: &Parameters) -> DiResult<AnyArc>;

    /// Whether `id` could be resolved, without resolving it.
    fn contains(&self, id: &str) -> bool;
}

/// Typed resolution helpers.
///
/// # Examples
///
/// ```
/// use resolvit::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {}", msg)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.instance("answer", Arc::new(42usize));
/// builder.singleton_trait_factory::<dyn Logger, _>("Logger", |_| Ok(Arc::new(ConsoleLogger)));
///
/// let container = builder.build();
/// assert_eq!(*container.get_as::<usize>("answer").unwrap(), 42);
///
/// let logger = container.get_trait::<dyn Logger>("Logger").unwrap();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `id` and downcasts it to `T`.
    fn get_as<T: Any + Send + Sync>(&self, id: &str) -> DiResult<Arc<T>> {
        let any = self.resolve_any(id)?;
        downcast(id, any)
    }

    /// Like [`get_as`](Self::get_as), but `Ok(None)` when nothing can
    /// resolve `id`. Other failures still propagate.
    fn try_get_as<T: Any + Send + Sync>(&self, id: &str) -> DiResult<Option<Arc<T>>> {
        if !self.contains(id) {
            return Ok(None);
        }
        self.get_as(id).map(Some)
    }

    /// Resolves a trait object stored as `Arc<Arc<T>>`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, id: &str) -> DiResult<Arc<T>> {
        let any = self.resolve_any(id)?;
        any.downcast::<Arc<T>>()
            .map(|outer| (*outer).clone())
            .map_err(|_| DiError::TypeMismatch {
                id: id.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Typed [`make_any`](ResolverCore::make_any).
    fn make_as<T: Any + Send + Sync>(&self, id: &str, parameters: &Parameters) -> DiResult<Arc<T>> {
        let any = self.make_any(id, parameters)?;
        downcast(id, any)
    }

    /// Resolves `id` as `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved or is not a `T`.
    fn get_required<T: Any + Send + Sync>(&self, id: &str) -> Arc<T> {
        self.get_as::<T>(id)
            .unwrap_or_else(|e| panic!("Failed to resolve {} as {}: {}", id, std::any::type_name::<T>(), e))
    }
}

fn downcast<T: Any + Send + Sync>(id: &str, any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        id: id.to_string(),
        expected: std::any::type_name::<T>(),
    })
}
