//! Derives validated [`ServicePrototype`]s from introspected class metadata.

use std::collections::HashSet;
use std::sync::Arc;

use super::{MethodPrototype, ParameterPrototype, PropertyPrototype, ServicePrototype};
use crate::class::{ClassMetadata, Param};
use crate::error::{DiError, DiResult};

/// Capability to describe a class by name.
///
/// The container's own implementation is
/// [`ClassRegistry`](crate::ClassRegistry), filled at registration time.
/// Other implementations can wrap it, e.g. to count calls.
pub trait TypeIntrospector: Send + Sync {
    /// Metadata for `class`, or `None` when the class does not exist.
    fn describe(&self, class: &str) -> Option<ClassMetadata>;
}

impl<T: TypeIntrospector + ?Sized> TypeIntrospector for Arc<T> {
    fn describe(&self, class: &str) -> Option<ClassMetadata> {
        (**self).describe(class)
    }
}

/// Turns class metadata into construction plans.
#[derive(Clone)]
pub struct PrototypeAnalyzer {
    introspector: Arc<dyn TypeIntrospector>,
}

impl PrototypeAnalyzer {
    pub fn new(introspector: Arc<dyn TypeIntrospector>) -> Self {
        Self { introspector }
    }

    /// Builds the prototype for `class`.
    ///
    /// Fails with [`DiError::Reflection`] when the class is unknown or its
    /// declared shape cannot be executed.
    pub fn analyze(&self, class: &str) -> DiResult<ServicePrototype> {
        tracing::debug!(class, "analyzing class");
        let metadata = self.introspector.describe(class).ok_or_else(|| DiError::Reflection {
            class: class.to_string(),
            reason: "class does not exist or is not registered".to_string(),
        })?;
        build_prototype(class, metadata)
    }
}

impl std::fmt::Debug for PrototypeAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrototypeAnalyzer").finish_non_exhaustive()
    }
}

fn build_prototype(class: &str, metadata: ClassMetadata) -> DiResult<ServicePrototype> {
    let reflection = |reason: String| DiError::Reflection {
        class: class.to_string(),
        reason,
    };

    if metadata.name != class {
        return Err(reflection(format!("introspector described [{}] instead", metadata.name)));
    }

    let constructor = match (metadata.instantiable, metadata.constructor) {
        (true, None) => return Err(reflection("instantiable class declares no constructor".into())),
        (false, Some(_)) => return Err(reflection("abstract class declares a constructor".into())),
        (_, Some(params)) => Some(method_prototype("new", params).map_err(reflection)?),
        (false, None) => None,
    };

    let mut seen = HashSet::new();
    let mut injected_properties = Vec::with_capacity(metadata.properties.len());
    for property in metadata.properties {
        if !seen.insert(property.name.clone()) {
            return Err(reflection(format!("property [{}] declared twice", property.name)));
        }
        if property.variadic {
            return Err(reflection(format!("property [{}] cannot be variadic", property.name)));
        }
        injected_properties.push(PropertyPrototype {
            name: property.name,
            type_name: property.type_name,
            nullable: property.nullable,
            default: property.default,
        });
    }

    let mut seen = HashSet::new();
    let mut injected_methods = Vec::with_capacity(metadata.methods.len());
    for method in metadata.methods {
        if !seen.insert(method.name.clone()) {
            return Err(reflection(format!("method [{}] declared twice", method.name)));
        }
        injected_methods.push(method_prototype(&method.name, method.params).map_err(reflection)?);
    }

    Ok(ServicePrototype {
        class: class.to_string(),
        is_instantiable: metadata.instantiable,
        constructor,
        injected_properties,
        injected_methods,
    })
}

fn method_prototype(name: &str, params: Vec<Param>) -> Result<MethodPrototype, String> {
    let mut seen = HashSet::new();
    let last = params.len().saturating_sub(1);
    let mut parameters = Vec::with_capacity(params.len());

    for (position, param) in params.into_iter().enumerate() {
        if !seen.insert(param.name.clone()) {
            return Err(format!("parameter [{}] of {} declared twice", param.name, name));
        }
        if param.variadic && position != last {
            return Err(format!("variadic parameter [{}] of {} is not last", param.name, name));
        }
        parameters.push(ParameterPrototype {
            has_default: param.default.is_some(),
            name: param.name,
            position,
            type_name: param.type_name,
            default: param.default,
            nullable: param.nullable,
            is_variadic: param.variadic,
        });
    }

    Ok(MethodPrototype {
        name: name.to_string(),
        parameters,
    })
}
