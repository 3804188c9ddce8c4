//! Service definitions and the store that holds them.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::container::ResolverContext;
use crate::error::{DiError, DiResult};
use crate::lifetime::Lifetime;
use crate::AnyArc;

/// Longest alias chain followed before the alias is considered looping.
const MAX_ALIAS_HOPS: usize = 32;

pub(crate) type FactoryFn =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// What gets built to satisfy an abstract identifier.
#[derive(Clone)]
pub enum Concrete {
    /// A class registered with the container's class registry.
    Class(String),
    /// A closure producing the instance directly.
    Factory(FactoryFn),
}

impl Concrete {
    /// The class name, or `None` for factories.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Concrete::Class(name) => Some(name),
            Concrete::Factory(_) => None,
        }
    }
}

impl fmt::Debug for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concrete::Class(name) => f.debug_tuple("Class").field(name).finish(),
            Concrete::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl fmt::Display for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concrete::Class(name) => f.write_str(name),
            Concrete::Factory(_) => f.write_str("<factory>"),
        }
    }
}

/// One binding: abstract identifier to concrete, lifetime and tags.
///
/// Definitions are created through [`ContainerBuilder`](crate::ContainerBuilder)
/// and frozen once the container is built.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Identifier the service is requested by.
    pub abstract_id: String,
    /// Class or factory that satisfies it.
    pub concrete: Concrete,
    /// Instance reuse policy.
    pub lifetime: Lifetime,
    /// Tags for grouped resolution.
    pub tags: BTreeSet<String>,
    /// Per-parameter values applied on every build of this binding.
    pub parameters: HashMap<String, Value>,
}

impl ServiceDefinition {
    pub fn new(abstract_id: impl Into<String>, concrete: Concrete, lifetime: Lifetime) -> Self {
        Self {
            abstract_id: abstract_id.into(),
            concrete,
            lifetime,
            tags: BTreeSet::new(),
            parameters: HashMap::new(),
        }
    }

    /// Binding of a class to its own name.
    pub fn for_class(class: impl Into<String>, lifetime: Lifetime) -> Self {
        let class = class.into();
        Self::new(class.clone(), Concrete::Class(class), lifetime)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Whether the concrete names a class other than the abstract itself.
    pub(crate) fn delegates_to_other(&self) -> Option<&str> {
        match &self.concrete {
            Concrete::Class(class) if class != &self.abstract_id => Some(class),
            _ => None,
        }
    }
}

/// Mapping from abstract identifier to [`ServiceDefinition`].
///
/// Keys are unique and the last write wins. Aliases are kept next to the
/// definitions because they are resolved before every lookup.
#[derive(Debug, Default, Clone)]
pub struct DefinitionStore {
    definitions: HashMap<String, ServiceDefinition>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or overwrites the definition for its abstract identifier.
    pub fn set(&mut self, definition: ServiceDefinition) {
        let id = definition.abstract_id.clone();
        if self.definitions.insert(id.clone(), definition).is_none() {
            self.order.push(id);
        }
    }

    /// Looks up a definition. Absence is not an error: the identifier may
    /// still be autowired as a class name.
    pub fn get(&self, abstract_id: &str) -> Option<&ServiceDefinition> {
        self.definitions.get(abstract_id)
    }

    /// Like [`set`](Self::set), returning the stored definition for further edits.
    pub(crate) fn upsert(&mut self, definition: ServiceDefinition) -> &mut ServiceDefinition {
        match self.definitions.entry(definition.abstract_id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(definition);
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(definition)
            }
        }
    }

    pub fn has(&self, abstract_id: &str) -> bool {
        self.definitions.contains_key(abstract_id)
    }

    pub fn remove(&mut self, abstract_id: &str) -> Option<ServiceDefinition> {
        let removed = self.definitions.remove(abstract_id)?;
        self.order.retain(|id| id != abstract_id);
        Some(removed)
    }

    /// Registers `alias` as another name for `abstract_id`.
    pub fn alias(&mut self, alias: impl Into<String>, abstract_id: impl Into<String>) -> DiResult<()> {
        let alias = alias.into();
        let abstract_id = abstract_id.into();
        if alias == abstract_id {
            return Err(DiError::InvalidAlias {
                alias,
                reason: "aliased to itself".to_string(),
            });
        }
        let previous = self.aliases.insert(alias.clone(), abstract_id);
        let Some(err) = self.resolve_alias(&alias).err() else {
            return Ok(());
        };
        // Put back whatever the alias pointed at before.
        match previous {
            Some(previous) => self.aliases.insert(alias, previous),
            None => self.aliases.remove(&alias),
        };
        Err(err)
    }

    pub fn is_alias(&self, id: &str) -> bool {
        self.aliases.contains_key(id)
    }

    /// Follows alias chains to the identifier definitions are stored under.
    pub fn resolve_alias<'s>(&'s self, id: &'s str) -> DiResult<&'s str> {
        let mut current = id;
        for _ in 0..MAX_ALIAS_HOPS {
            match self.aliases.get(current) {
                Some(next) if next == id => {
                    return Err(DiError::InvalidAlias {
                        alias: id.to_string(),
                        reason: format!("alias loop through [{}]", current),
                    })
                }
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Err(DiError::InvalidAlias {
            alias: id.to_string(),
            reason: format!("more than {} alias hops", MAX_ALIAS_HOPS),
        })
    }

    /// Identifiers carrying `tag`, in registration order.
    pub fn tagged(&self, tag: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|id| self.definitions.get(id))
            .filter(|definition| definition.has_tag(tag))
            .map(|definition| definition.abstract_id.as_str())
            .collect()
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.order.iter().filter_map(|id| self.definitions.get(id))
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
