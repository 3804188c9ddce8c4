//! # resolvit
//!
//! String-keyed dependency injection with cached construction plans,
//! Singleton/Scoped/Transient lifetimes and request scopes.
//!
//! ## Features
//!
//! - **Autowiring**: classes declared once with [`ClassBuilder`] are built by
//!   name, their constructor parameters resolved from the container
//! - **Prototype caching**: each class's construction plan is derived once,
//!   optionally persisted to disk across restarts
//! - **Lifetimes**: singleton, scoped and transient services
//! - **Circular dependency detection**: cycles fail with the full path
//! - **Scoped isolation**: nested scopes, RAII scope guards, forked handles
//!   for concurrent requests
//! - **Telemetry**: optional metrics sink that can never fail a resolution
//!
//! ## Quick Start
//!
//! ```rust
//! use resolvit::{ClassBuilder, ContainerBuilder, Param, Parameters, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//!     page_size: u32,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.class(
//!     ClassBuilder::<Database>::new("Database")
//!         .param(Param::new("dsn").default("postgres://localhost"))
//!         .constructor(|args| Ok(Database { connection_string: args.value("dsn")? })),
//! );
//! builder.class(
//!     ClassBuilder::<UserService>::new("UserService")
//!         .param(Param::service("db", "Database"))
//!         .param(Param::new("page_size").default(20))
//!         .constructor(|args| {
//!             Ok(UserService {
//!                 db: args.service("db")?,
//!                 page_size: args.value("page_size")?,
//!             })
//!         }),
//! );
//! builder.singleton("Database", "Database");
//!
//! let container = builder.build();
//!
//! // Autowired: no binding for UserService, its class is enough.
//! let users = container.get_as::<UserService>("UserService").unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//!
//! // Explicit overrides win over every other source.
//! let custom = container
//!     .make_as::<UserService>("UserService", &Parameters::new().value("page_size", 50))
//!     .unwrap();
//! assert_eq!(custom.page_size, 50);
//! assert!(Arc::ptr_eq(&users.db, &custom.db));
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: created once and shared by every scope and forked handle
//! - **Scoped**: created once per scope, released when the scope ends
//! - **Transient**: created fresh on every resolution
//!
//! ## Scopes
//!
//! ```rust
//! use resolvit::{ContainerBuilder, DiError, Resolver};
//! use std::sync::Arc;
//!
//! struct RequestId(u32);
//!
//! let mut builder = ContainerBuilder::new();
//! let next = Arc::new(std::sync::atomic::AtomicU32::new(0));
//! builder.scoped_factory("RequestId", move |_| {
//!     Ok(Arc::new(RequestId(next.fetch_add(1, std::sync::atomic::Ordering::SeqCst))))
//! });
//! let container = builder.build();
//!
//! // Scoped services need an open scope.
//! assert!(matches!(container.get("RequestId"), Err(DiError::NoActiveScope { .. })));
//!
//! let scope = container.scope();
//! let a = scope.get_as::<RequestId>("RequestId").unwrap();
//! let b = scope.get_as::<RequestId>("RequestId").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! drop(scope);
//!
//! // Ending more scopes than were begun is an error.
//! assert!(matches!(container.end_scope(), Err(DiError::ScopeUnderflow)));
//! ```

use std::any::Any;
use std::sync::Arc;

pub mod arguments;
pub mod class;
pub mod config;
pub mod container;
pub mod definition;
pub mod diagnostics;
pub mod error;
pub mod lifetime;
pub mod metrics;
pub mod prototype;
pub mod registration;
pub mod scope;
pub mod traits;

mod engine;
mod internal;
mod resolver;

/// Type-erased shared instance, as stored by the container.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub use arguments::{Argument, Arguments, Parameters};
pub use class::{AnyBox, ClassBuilder, ClassDescriptor, ClassMetadata, ClassRegistry, MethodDecl, Param};
pub use config::ContainerConfig;
pub use container::{Container, ContainerBuilder, ResolverContext, ScopeGuard};
pub use definition::{Concrete, DefinitionStore, ServiceDefinition};
pub use diagnostics::ServiceInspection;
pub use error::{DiError, DiResult};
pub use lifetime::Lifetime;
pub use metrics::{MetricsCollector, MetricsError, MetricsSink, ResolutionEvent, ResolutionStrategy};
pub use prototype::{
    MethodPrototype, ParameterPrototype, PropertyPrototype, PrototypeAnalyzer, PrototypeCache,
    PrototypeCacheStats, ServicePrototype, TypeIntrospector,
};
pub use registration::Registrar;
pub use scope::{CacheLocation, EndedScope, ScopeRegistry};
pub use traits::{Resolver, ResolverCore};
