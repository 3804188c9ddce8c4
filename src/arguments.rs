//! Resolved argument values handed to constructors, setters and injection methods.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DiError, DiResult};
use crate::AnyArc;

/// A single resolved parameter value.
#[derive(Clone)]
pub enum Argument {
    /// A service instance resolved from the container or passed explicitly.
    Service(AnyArc),
    /// A literal, from a declared default, a binding parameter or an override.
    Value(Value),
    /// Nothing could be resolved and the parameter is nullable.
    Null,
    /// Values collected for a variadic parameter.
    List(Vec<Argument>),
}

impl Argument {
    /// Wraps a typed instance.
    pub fn service<T: Any + Send + Sync>(instance: Arc<T>) -> Self {
        Argument::Service(instance)
    }

    /// Wraps a trait object; read it back with [`Arguments::service_trait`].
    pub fn service_trait<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Argument::Service(Arc::new(instance))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Argument::Null) || matches!(self, Argument::Value(Value::Null))
    }

    /// Downcasts a service argument.
    pub fn into_service<T: Any + Send + Sync>(self, parameter: &str) -> DiResult<Arc<T>> {
        match self {
            Argument::Service(any) => any.downcast::<T>().map_err(|_| DiError::InvalidArgument {
                parameter: parameter.to_string(),
                reason: format!("service is not a {}", std::any::type_name::<T>()),
            }),
            other => Err(DiError::InvalidArgument {
                parameter: parameter.to_string(),
                reason: format!("expected a service, got {}", other.kind()),
            }),
        }
    }

    /// Downcasts a service argument stored as `Arc<Arc<T>>`.
    pub fn into_service_trait<T: ?Sized + Send + Sync + 'static>(
        self,
        parameter: &str,
    ) -> DiResult<Arc<T>> {
        let outer = self.into_service::<Arc<T>>(parameter)?;
        Ok((*outer).clone())
    }

    /// Deserializes a literal argument. `Null` deserializes as JSON `null`,
    /// so `Option<T>` targets accept it.
    pub fn into_value<T: DeserializeOwned>(self, parameter: &str) -> DiResult<T> {
        let value = match self {
            Argument::Value(value) => value,
            Argument::Null => Value::Null,
            Argument::List(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Argument::Value(v) => Ok(v),
                        Argument::Null => Ok(Value::Null),
                        other => Err(DiError::InvalidArgument {
                            parameter: parameter.to_string(),
                            reason: format!("list contains a {}", other.kind()),
                        }),
                    })
                    .collect::<DiResult<Vec<_>>>()?,
            ),
            Argument::Service(_) => {
                return Err(DiError::InvalidArgument {
                    parameter: parameter.to_string(),
                    reason: "expected a literal, got a service".to_string(),
                })
            }
        };
        serde_json::from_value(value).map_err(|e| DiError::InvalidArgument {
            parameter: parameter.to_string(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Argument::Service(_) => "service",
            Argument::Value(_) => "literal",
            Argument::Null => "null",
            Argument::List(_) => "list",
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Service(_) => f.write_str("Service(..)"),
            Argument::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Argument::Null => f.write_str("Null"),
            Argument::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

/// Ordered, named arguments for one constructor or injection method.
///
/// Accessors clone out of the list, so a constructor may read the same
/// argument twice.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    owner: String,
    entries: Vec<(String, Argument)>,
}

impl Arguments {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, argument: Argument) {
        self.entries.push((name.into(), argument));
    }

    /// `Class::method` these arguments were resolved for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, argument)| argument)
    }

    /// Positional access.
    pub fn at(&self, position: usize) -> Option<&Argument> {
        self.entries.get(position).map(|(_, argument)| argument)
    }

    fn require(&self, name: &str) -> DiResult<Argument> {
        self.get(name).cloned().ok_or_else(|| DiError::InvalidArgument {
            parameter: name.to_string(),
            reason: format!("{} declares no such parameter", self.owner),
        })
    }

    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        self.require(name)?.into_service(name)
    }

    pub fn service_trait<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.require(name)?.into_service_trait(name)
    }

    /// `None` when the parameter resolved to null.
    pub fn optional_service<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Option<Arc<T>>> {
        let argument = self.require(name)?;
        if argument.is_null() {
            return Ok(None);
        }
        argument.into_service(name).map(Some)
    }

    pub fn value<T: DeserializeOwned>(&self, name: &str) -> DiResult<T> {
        self.require(name)?.into_value(name)
    }

    /// Every service collected for a variadic parameter.
    pub fn services<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Vec<Arc<T>>> {
        match self.require(name)? {
            Argument::List(items) => items.into_iter().map(|item| item.into_service(name)).collect(),
            Argument::Null => Ok(Vec::new()),
            single => Ok(vec![single.into_service(name)?]),
        }
    }
}

/// Explicit parameter overrides passed to `make`.
///
/// Keys match a parameter's name first and its declared type second.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: HashMap<String, Argument>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), Argument::Value(value.into()));
        self
    }

    pub fn service<T: Any + Send + Sync>(mut self, key: impl Into<String>, instance: Arc<T>) -> Self {
        self.entries.insert(key.into(), Argument::Service(instance));
        self
    }

    pub fn service_any(mut self, key: impl Into<String>, instance: AnyArc) -> Self {
        self.entries.insert(key.into(), Argument::Service(instance));
        self
    }

    pub fn null(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), Argument::Null);
        self
    }

    pub fn argument(mut self, key: impl Into<String>, argument: Argument) -> Self {
        self.entries.insert(key.into(), argument);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Argument> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
