//! Service lifetime definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Service lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use resolvit::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// struct Database;
/// struct RequestModel;
///
/// let mut builder = ContainerBuilder::new();
/// builder.singleton_factory("Database", |_| Ok(Arc::new(Database)));
/// builder.bind_factory("RequestModel", |_| Ok(Arc::new(RequestModel)));
/// let container = builder.build();
///
/// let db1 = container.get_as::<Database>("Database").unwrap();
/// let db2 = container.get_as::<Database>("Database").unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// let m1 = container.get_as::<RequestModel>("RequestModel").unwrap();
/// let m2 = container.get_as::<RequestModel>("RequestModel").unwrap();
/// assert!(!Arc::ptr_eq(&m1, &m2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// Single instance per container, kept until the container is flushed or
    /// dropped. Shared by every scope and every forked handle.
    Singleton,
    /// Single instance per scope, released when the scope ends.
    Scoped,
    /// New instance per resolution, never cached.
    Transient,
}

impl Lifetime {
    /// Whether instances of this lifetime are stored after construction.
    pub fn is_cached(self) -> bool {
        !matches!(self, Lifetime::Transient)
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::Transient
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => f.write_str("singleton"),
            Lifetime::Scoped => f.write_str("scoped"),
            Lifetime::Transient => f.write_str("transient"),
        }
    }
}
