//! Fluent registrar returned by the builder's binding methods.

use serde_json::Value;

use crate::definition::ServiceDefinition;
use crate::lifetime::Lifetime;

/// Refines a binding right after it is declared.
///
/// # Examples
///
/// ```rust
/// use resolvit::{ClassBuilder, ContainerBuilder, Param, Resolver};
///
/// struct Mailer { retries: u32 }
///
/// let mut builder = ContainerBuilder::new();
/// builder.class(
///     ClassBuilder::<Mailer>::new("SmtpMailer")
///         .param(Param::new("retries").default(1))
///         .constructor(|args| Ok(Mailer { retries: args.value("retries")? })),
/// );
/// builder
///     .singleton("Mailer", "SmtpMailer")
///     .tag("notifier")
///     .with_parameter("retries", 5);
///
/// let container = builder.build();
/// assert_eq!(container.get_as::<Mailer>("Mailer").unwrap().retries, 5);
/// assert_eq!(container.tagged("notifier").unwrap().len(), 1);
/// ```
pub struct Registrar<'b> {
    definition: &'b mut ServiceDefinition,
}

impl<'b> Registrar<'b> {
    pub(crate) fn new(definition: &'b mut ServiceDefinition) -> Self {
        Self { definition }
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.definition.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Value used for the named constructor parameter on every build of
    /// this binding. Explicit `make` overrides still win.
    pub fn with_parameter(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.definition.parameters.insert(name.into(), value.into());
        self
    }

    /// Changes the lifetime after the fact.
    pub fn lifetime(self, lifetime: Lifetime) -> Self {
        self.definition.lifetime = lifetime;
        self
    }

    pub fn definition(&self) -> &ServiceDefinition {
        self.definition
    }
}
