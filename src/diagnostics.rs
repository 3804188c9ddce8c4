//! Inspection and debug output for a built container.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::container::Container;
use crate::lifetime::Lifetime;
use crate::scope::CacheLocation;

/// Snapshot of everything the container knows about one identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInspection {
    /// Identifier as requested.
    pub id: String,
    /// Identifier after following aliases.
    pub resolved_id: String,
    pub bound: bool,
    /// Bound class name, `<factory>`, or `None` when unbound.
    pub concrete: Option<String>,
    pub lifetime: Option<Lifetime>,
    pub tags: Vec<String>,
    /// Tier holding a cached instance, if any.
    pub cached: Option<CacheLocation>,
    pub class_registered: bool,
    pub instantiable: bool,
    /// Whether a construction plan has already been computed.
    pub prototype_cached: bool,
    /// Type names the constructor and injection points ask for, when the
    /// plan is cached.
    pub dependencies: Vec<String>,
    pub resolvable: bool,
}

impl fmt::Display for ServiceInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if self.resolved_id != self.id {
            write!(f, " (alias of {})", self.resolved_id)?;
        }
        match (&self.concrete, self.lifetime) {
            (Some(concrete), Some(lifetime)) => write!(f, " -> {} [{}]", concrete, lifetime)?,
            _ if self.class_registered => write!(f, " [autowired]")?,
            _ => write!(f, " [unbound]")?,
        }
        if !self.tags.is_empty() {
            write!(f, " tags={}", self.tags.join(","))?;
        }
        match self.cached {
            Some(CacheLocation::Singleton) => write!(f, " cached=singleton")?,
            Some(CacheLocation::Scoped(depth)) => write!(f, " cached=scope#{}", depth)?,
            None => {}
        }
        if !self.dependencies.is_empty() {
            write!(f, " needs={}", self.dependencies.join(","))?;
        }
        Ok(())
    }
}

impl Container {
    /// Describes `id` without resolving it.
    pub fn inspect(&self, id: &str) -> ServiceInspection {
        let definitions = self.definitions();
        let resolved_id = definitions.resolve_alias(id).unwrap_or(id).to_string();
        let definition = definitions.get(&resolved_id);
        let class_name = definition
            .and_then(|d| d.concrete.class_name())
            .unwrap_or(&resolved_id)
            .to_string();
        let prototype = self.shared().prototypes.get(&class_name);

        ServiceInspection {
            id: id.to_string(),
            bound: definition.is_some(),
            concrete: definition.map(|d| d.concrete.to_string()),
            lifetime: definition.map(|d| d.lifetime),
            tags: definition.map(|d| d.tags.iter().cloned().collect()).unwrap_or_default(),
            cached: self.scopes().locate(&resolved_id),
            class_registered: self.classes().contains(&class_name),
            instantiable: self.classes().is_instantiable(&class_name),
            prototype_cached: prototype.is_some(),
            dependencies: prototype
                .map(|p| p.dependencies().into_iter().map(String::from).collect())
                .unwrap_or_default(),
            resolvable: self.has(id),
            resolved_id,
        }
    }

    /// Human-readable listing of bindings, aliases, autowireable classes
    /// and cache state.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        let definitions = self.definitions();

        let _ = writeln!(out, "Container");
        let _ = writeln!(
            out,
            "  scope depth: {}, singletons: {}, scoped instances: {}",
            self.scope_depth(),
            self.scopes().singleton_count(),
            self.scopes().scoped_count()
        );

        let _ = writeln!(out, "Bindings ({}):", definitions.len());
        for definition in definitions.definitions() {
            let _ = writeln!(out, "  {}", self.inspect(&definition.abstract_id));
        }

        let mut aliases: Vec<_> = definitions.aliases().collect();
        if !aliases.is_empty() {
            aliases.sort();
            let _ = writeln!(out, "Aliases ({}):", aliases.len());
            for (alias, target) in aliases {
                let _ = writeln!(out, "  {} => {}", alias, target);
            }
        }

        let bound: BTreeSet<&str> = definitions
            .definitions()
            .filter_map(|d| d.concrete.class_name())
            .collect();
        let mut unbound: Vec<&str> = self
            .classes()
            .names()
            .filter(|name| !definitions.has(name) && !bound.contains(name))
            .collect();
        if !unbound.is_empty() {
            unbound.sort_unstable();
            let _ = writeln!(out, "Classes without bindings ({}):", unbound.len());
            for name in unbound {
                let _ = writeln!(out, "  {}", self.inspect(name));
            }
        }

        let stats = self.prototype_stats();
        let _ = writeln!(
            out,
            "Prototypes: {} cached (hits {}, disk hits {}, misses {}, disk errors {})",
            self.shared().prototypes.len(),
            stats.hits,
            stats.disk_hits,
            stats.misses,
            stats.disk_errors
        );

        #[cfg(feature = "diagnostics")]
        {
            let mut classes: Vec<&str> = self.classes().names().collect();
            classes.sort_unstable();
            for class in classes {
                if let Some(prototype) = self.shared().prototypes.get(class) {
                    let plan = serde_json::to_string(&*prototype).unwrap_or_default();
                    let _ = writeln!(out, "  {}: {}", class, plan);
                }
            }
        }

        out
    }

    /// Dependency graph of the computed prototypes in Graphviz DOT format.
    pub fn dependency_graph_dot(&self) -> String {
        let mut out = String::from("digraph resolvit {\n  rankdir=LR;\n");
        let mut classes: Vec<&str> = self.classes().names().collect();
        classes.sort_unstable();
        for class in classes {
            let Some(prototype) = self.shared().prototypes.get(class) else {
                continue;
            };
            let _ = writeln!(out, "  \"{}\";", class);
            for dependency in prototype.dependencies() {
                let _ = writeln!(out, "  \"{}\" -> \"{}\";", class, dependency);
            }
        }
        out.push_str("}\n");
        out
    }
}
