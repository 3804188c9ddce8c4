//! Parameter resolution.
//!
//! Each parameter is satisfied from the first source that applies:
//!
//! 1. an override passed to `make`, matched by parameter name, then by type;
//! 2. a value configured on the binding with `with_parameter`;
//! 3. the container, when the declared type is resolvable;
//! 4. the declared default;
//! 5. null, when the parameter is nullable;
//! 6. an empty list, when the parameter is variadic.
//!
//! Anything else is an [`DiError::UnresolvableDependency`] naming the
//! class, method, parameter and position.

use serde_json::Value;

use crate::arguments::{Argument, Arguments, Parameters};
use crate::definition::ServiceDefinition;
use crate::engine::Engine;
use crate::error::{DiError, DiResult};
use crate::prototype::{MethodPrototype, ParameterPrototype};

pub(crate) struct DependencyResolver<'e, 'a> {
    engine: &'e Engine<'a>,
    definition: Option<&'e ServiceDefinition>,
    overrides: Option<&'e Parameters>,
}

impl<'e, 'a> DependencyResolver<'e, 'a> {
    pub(crate) fn new(
        engine: &'e Engine<'a>,
        definition: Option<&'e ServiceDefinition>,
        overrides: Option<&'e Parameters>,
    ) -> Self {
        Self {
            engine,
            definition,
            overrides,
        }
    }

    /// Resolves every parameter of `method`, in order.
    pub(crate) fn resolve_method(&self, class: &str, method: &MethodPrototype) -> DiResult<Arguments> {
        let mut arguments = Arguments::new(format!("{}::{}", class, method.name));
        for parameter in &method.parameters {
            let argument = self.resolve_parameter(class, &method.name, parameter)?;
            arguments.push(parameter.name.clone(), argument);
        }
        Ok(arguments)
    }

    pub(crate) fn resolve_parameter(
        &self,
        class: &str,
        method: &str,
        parameter: &ParameterPrototype,
    ) -> DiResult<Argument> {
        if let Some(argument) = self.explicit_override(parameter) {
            tracing::trace!(class, parameter = %parameter.name, "using override");
            return Ok(shape(parameter, argument.clone()));
        }

        if let Some(value) = self.definition.and_then(|d| d.parameters.get(&parameter.name)) {
            return Ok(shape(parameter, Argument::Value(value.clone())));
        }

        // Variadic parameters only take explicit values.
        if !parameter.is_variadic {
            if let Some(type_name) = parameter.type_name.as_deref() {
                if self.engine.container().has(type_name) {
                    return self.engine.resolve(type_name, None).map(Argument::Service);
                }
            }
        }

        if parameter.has_default {
            let default = parameter.default.clone().unwrap_or(Value::Null);
            return Ok(Argument::Value(default));
        }
        if parameter.nullable {
            return Ok(Argument::Null);
        }
        if parameter.is_variadic {
            return Ok(Argument::List(Vec::new()));
        }

        Err(DiError::UnresolvableDependency {
            class: class.to_string(),
            method: method.to_string(),
            parameter: parameter.name.clone(),
            position: parameter.position,
        })
    }

    fn explicit_override(&self, parameter: &ParameterPrototype) -> Option<&'e Argument> {
        let overrides = self.overrides?;
        overrides.get(&parameter.name).or_else(|| {
            parameter
                .type_name
                .as_deref()
                .and_then(|type_name| overrides.get(type_name))
        })
    }
}

/// Variadic parameters always receive a list.
fn shape(parameter: &ParameterPrototype, argument: Argument) -> Argument {
    if !parameter.is_variadic {
        return argument;
    }
    match argument {
        Argument::List(items) => Argument::List(items),
        Argument::Value(Value::Array(items)) => {
            Argument::List(items.into_iter().map(Argument::Value).collect())
        }
        Argument::Null => Argument::List(Vec::new()),
        single => Argument::List(vec![single]),
    }
}
