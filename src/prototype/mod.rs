//! Construction plans ("prototypes") for registered classes.
//!
//! A prototype is derived once per class from what a [`TypeIntrospector`]
//! reports, validated by the [`PrototypeAnalyzer`], and memoized by the
//! [`PrototypeCache`]. Prototypes carry no closures, so they serialize and
//! can survive restarts in the persisted cache tier.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod analyzer;
pub mod cache;

pub use analyzer::{PrototypeAnalyzer, TypeIntrospector};
pub use cache::{metadata_fingerprint, PrototypeCache, PrototypeCacheStats};

/// One constructor or method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPrototype {
    pub name: String,
    /// Zero-based position in the owning method.
    pub position: usize,
    pub type_name: Option<String>,
    pub has_default: bool,
    pub default: Option<Value>,
    pub nullable: bool,
    pub is_variadic: bool,
}

/// A property injected after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPrototype {
    pub name: String,
    pub type_name: Option<String>,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl PropertyPrototype {
    /// Views the property as a single parameter so it can go through the
    /// same resolution rules as constructor arguments.
    pub fn as_parameter(&self, position: usize) -> ParameterPrototype {
        ParameterPrototype {
            name: self.name.clone(),
            position,
            type_name: self.type_name.clone(),
            has_default: self.default.is_some(),
            default: self.default.clone(),
            nullable: self.nullable,
            is_variadic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodPrototype {
    pub name: String,
    pub parameters: Vec<ParameterPrototype>,
}

impl MethodPrototype {
    /// Parameters that recurse into the container when resolved.
    pub fn service_dependencies(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().filter_map(|p| p.type_name.as_deref())
    }
}

/// Cached construction plan for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePrototype {
    pub class: String,
    pub is_instantiable: bool,
    pub constructor: Option<MethodPrototype>,
    pub injected_properties: Vec<PropertyPrototype>,
    pub injected_methods: Vec<MethodPrototype>,
}

impl ServicePrototype {
    /// Every type name this class may pull from the container, in plan order.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        if let Some(ctor) = &self.constructor {
            deps.extend(ctor.service_dependencies());
        }
        deps.extend(self.injected_properties.iter().filter_map(|p| p.type_name.as_deref()));
        for method in &self.injected_methods {
            deps.extend(method.service_dependencies());
        }
        deps
    }

    /// Number of constructor parameters.
    pub fn arity(&self) -> usize {
        self.constructor.as_ref().map_or(0, |c| c.parameters.len())
    }
}
